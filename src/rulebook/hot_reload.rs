use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use crate::observability::EngineMetrics;
use crate::rules::RuleEvaluator;

use super::loader::{RuleBookError, RuleBookLoader};

/// Polls the rule book file and installs new versions into an evaluator.
///
/// A broken file never replaces a working rule book; the previous one
/// stays in force until a valid new version appears.
pub struct RuleBookWatcher {
    loader: RuleBookLoader,
    check_interval: Duration,
    last_version: Option<String>,
}

impl RuleBookWatcher {
    pub fn new(loader: RuleBookLoader, check_interval: Duration) -> Self {
        RuleBookWatcher {
            loader,
            check_interval,
            last_version: None,
        }
    }

    /// Start from a version that is already installed.
    pub fn with_current_version(mut self, version: impl Into<String>) -> Self {
        self.last_version = Some(version.into());
        self
    }

    /// Spawn the polling task.
    pub fn start(
        mut self,
        evaluator: Arc<RuleEvaluator>,
        metrics: Arc<EngineMetrics>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval(self.check_interval);

            loop {
                interval.tick().await;

                match self.check_for_updates(&evaluator) {
                    Ok(true) => {
                        metrics.record_rule_book_reload(true);
                        info!(path = self.loader.path(), "Rule book reloaded");
                    }
                    Ok(false) => {}
                    Err(e) => {
                        metrics.record_rule_book_reload(false);
                        warn!(error = %e, "Error checking for rule book updates");
                    }
                }
            }
        })
    }

    /// Install the rule book if its version changed.
    fn check_for_updates(&mut self, evaluator: &RuleEvaluator) -> Result<bool, RuleBookError> {
        let book = self.loader.load_rule_book()?;

        if self.last_version.as_ref() == Some(&book.version) {
            return Ok(false);
        }

        let (book, registry) = self.loader.load()?;

        info!(
            "Rule book version changed: {:?} -> {}",
            self.last_version, book.version
        );

        self.last_version = Some(book.version);
        evaluator.install(registry);

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const V1: &str = r#"
rule_book_version: "v1"
rule_sets:
  - product_type: PREAPPROVED
    rules:
      - id: MIN_SCORE
        type: min_credit_score
        threshold: 700
"#;

    #[tokio::test]
    async fn test_watcher_installs_new_version() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", V1).unwrap();
        let path = file.path().to_path_buf();

        let loader = RuleBookLoader::new(file.path().to_string_lossy());
        let (book, registry) = loader.load().unwrap();
        let evaluator = Arc::new(RuleEvaluator::new(registry));
        let metrics = Arc::new(EngineMetrics::new());

        let watcher = RuleBookWatcher::new(loader, Duration::from_millis(20))
            .with_current_version(book.version);
        let handle = watcher.start(evaluator.clone(), metrics.clone());

        std::fs::write(
            &path,
            r#"
rule_book_version: "v2"
rule_sets:
  - product_type: PREAPPROVED
    rules:
      - id: MIN_SCORE
        type: min_credit_score
        threshold: 750
  - product_type: TOP_UP
    rules: []
"#,
        )
        .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while evaluator.current().version != "v2" {
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for reload");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(evaluator.current().len(), 2);
        handle.abort();
    }

    #[test]
    fn test_watcher_keeps_previous_on_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", V1).unwrap();

        let loader = RuleBookLoader::new(file.path().to_string_lossy());
        let (book, registry) = loader.load().unwrap();
        let evaluator = RuleEvaluator::new(registry);

        std::fs::write(file.path(), "rule_book_version: [not valid").unwrap();

        let mut watcher =
            RuleBookWatcher::new(loader, Duration::from_secs(60)).with_current_version(book.version);
        assert!(watcher.check_for_updates(&evaluator).is_err());
        assert_eq!(evaluator.current().version, "v1");
    }
}
