use rust_decimal::Decimal;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::dedup::DedupConfig;
use crate::domain::ProductType;
use crate::matching::{MatchConfig, DEFAULT_NAME_SIMILARITY_THRESHOLD};

/// Dedup engine configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "dedupr")]
#[command(about = "Customer and offer deduplication with eligibility rules")]
pub struct Config {
    /// Path to rule book YAML file
    #[arg(long, default_value = "rules.yaml", env = "DEDUPR_RULES_PATH")]
    pub rules_path: PathBuf,

    /// Path to live-book JSON array (optional, empty live book if not set)
    #[arg(long, env = "DEDUPR_LIVE_BOOK_PATH")]
    pub live_book_path: Option<PathBuf>,

    /// Path to JSON-lines input records (reads stdin if not set)
    #[arg(long, env = "DEDUPR_INPUT_PATH")]
    pub input_path: Option<PathBuf>,

    /// Path to state snapshot, loaded at start and written at exit (optional)
    #[arg(long, env = "DEDUPR_STATE_PATH")]
    pub state_path: Option<PathBuf>,

    /// Path to audit journal (optional, disables journaling if not set)
    #[arg(long, env = "DEDUPR_JOURNAL_PATH")]
    pub journal_path: Option<PathBuf>,

    /// Path to write Prometheus metrics at exit (optional)
    #[arg(long, env = "DEDUPR_METRICS_PATH")]
    pub metrics_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DEDUPR_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON objects
    #[arg(long, default_value = "false", env = "DEDUPR_LOG_JSON")]
    pub log_json: bool,

    /// Minimum name token overlap for mobile or email matches
    #[arg(long, default_value = "0.6", env = "DEDUPR_NAME_SIMILARITY_THRESHOLD")]
    pub name_similarity_threshold: f64,

    /// Maximum amount difference for duplicate offers, in percent
    #[arg(long, default_value = "1.0", env = "DEDUPR_AMOUNT_TOLERANCE_PCT")]
    pub amount_tolerance_pct: Decimal,

    /// Product types that bypass deduplication (comma separated)
    #[arg(long, value_delimiter = ',', env = "DEDUPR_DEDUP_EXCLUDED_PRODUCTS")]
    pub dedup_excluded_products: Vec<String>,

    /// Rule book reload check interval in seconds (0 disables reloading)
    #[arg(long, default_value = "30", env = "DEDUPR_RULES_RELOAD_SECS")]
    pub rules_reload_secs: u64,

    /// Idle identity lock eviction timeout in seconds
    #[arg(long, default_value = "3600", env = "DEDUPR_LOCK_IDLE_SECS")]
    pub lock_idle_secs: u64,

    /// Maximum records processed concurrently
    #[arg(long, default_value = "64", env = "DEDUPR_MAX_IN_FLIGHT")]
    pub max_in_flight: usize,

    /// Records read from input per batch
    #[arg(long, default_value = "1024", env = "DEDUPR_BATCH_SIZE")]
    pub batch_size: usize,
}

impl Config {
    /// Get rule book reload interval, if reloading is enabled.
    pub fn rules_reload_interval(&self) -> Option<Duration> {
        (self.rules_reload_secs > 0).then(|| Duration::from_secs(self.rules_reload_secs))
    }

    /// Get identity lock idle timeout as Duration.
    pub fn lock_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_idle_secs)
    }

    /// Amount tolerance as a fraction of the existing amount.
    pub fn amount_tolerance(&self) -> Decimal {
        self.amount_tolerance_pct / Decimal::ONE_HUNDRED
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            name_similarity_threshold: self.name_similarity_threshold,
        }
    }

    pub fn dedup_config(&self) -> DedupConfig {
        let excluded_products: HashSet<ProductType> = self
            .dedup_excluded_products
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(ProductType::parse)
            .collect();

        DedupConfig {
            amount_tolerance: self.amount_tolerance(),
            excluded_products,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rules_path: PathBuf::from("rules.yaml"),
            live_book_path: None,
            input_path: None,
            state_path: None,
            journal_path: None,
            metrics_path: None,
            log_level: "info".to_string(),
            log_json: false,
            name_similarity_threshold: DEFAULT_NAME_SIMILARITY_THRESHOLD,
            amount_tolerance_pct: Decimal::ONE,
            dedup_excluded_products: Vec::new(),
            rules_reload_secs: 30,
            lock_idle_secs: 3600,
            max_in_flight: 64,
            batch_size: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DEFAULT_AMOUNT_TOLERANCE;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.rules_path, PathBuf::from("rules.yaml"));
        assert_eq!(config.max_in_flight, 64);
        assert_eq!(config.amount_tolerance(), DEFAULT_AMOUNT_TOLERANCE);
        assert!(config.dedup_config().excluded_products.is_empty());
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config {
            rules_reload_secs: 60,
            lock_idle_secs: 1800,
            ..Default::default()
        };

        assert_eq!(config.rules_reload_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.lock_idle_timeout(), Duration::from_secs(1800));

        let disabled = Config {
            rules_reload_secs: 0,
            ..Default::default()
        };
        assert!(disabled.rules_reload_interval().is_none());
    }

    #[test]
    fn test_parse_cli() {
        let config = Config::parse_from([
            "dedupr",
            "--rules-path",
            "book.yaml",
            "--amount-tolerance-pct",
            "2.5",
            "--dedup-excluded-products",
            "e_aggregator,LOYALTY",
            "--name-similarity-threshold",
            "0.75",
        ]);

        assert_eq!(config.rules_path, PathBuf::from("book.yaml"));
        assert_eq!(config.amount_tolerance(), Decimal::new(25, 3));
        assert_eq!(config.match_config().name_similarity_threshold, 0.75);

        let dedup = config.dedup_config();
        assert!(dedup.excluded_products.contains(&ProductType::EAggregator));
        assert!(dedup.excluded_products.contains(&ProductType::Loyalty));
    }
}
