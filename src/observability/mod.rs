pub mod metrics;
pub mod tracing;

pub use metrics::{EngineMetrics, TimingGuard};
pub use tracing::init_tracing;
