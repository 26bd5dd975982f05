pub mod batch;
pub mod locks;
pub mod pipeline;

pub use batch::{run_batch, BatchResult};
pub use locks::{KeyLock, LockPool, LockPoolStats};
pub use pipeline::{validate, Engine};
