pub mod hot_reload;
pub mod loader;

pub use hot_reload::RuleBookWatcher;
pub use loader::{load_rule_book, parse_rule_book, RuleBookError, RuleBookLoader};
