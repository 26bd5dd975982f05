use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

use dedupr::config::Config;
use dedupr::domain::{IncomingRecord, ProcessOutcome};
use dedupr::engine::{run_batch, Engine};
use dedupr::observability::{init_tracing, EngineMetrics};
use dedupr::rulebook::{RuleBookLoader, RuleBookWatcher};
use dedupr::rules::RuleEvaluator;
use dedupr::store::{
    load_snapshot, write_snapshot, JournalWriter, LiveBook, MemoryLiveBook, MemoryStore,
};

/// One line of output per input record.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum OutputLine<'a> {
    Processed {
        #[serde(flatten)]
        outcome: &'a ProcessOutcome,
    },
    Refused {
        record_id: &'a str,
        error: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    init_tracing(&config.log_level, config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting dedupr engine"
    );

    // Rule book
    let loader = RuleBookLoader::new(config.rules_path.to_string_lossy());
    let (book, registry) = loader.load()?;
    info!(
        version = %book.version,
        rule_sets = registry.len(),
        "Rule book loaded"
    );
    let evaluator = Arc::new(RuleEvaluator::new(registry));
    let metrics = Arc::new(EngineMetrics::new());

    // Live book
    let live_book = match &config.live_book_path {
        Some(path) => {
            let book = MemoryLiveBook::load_json(path)?;
            info!(path = %path.display(), records = book.len(), "Live book loaded");
            book
        }
        None => {
            info!("No live book configured");
            MemoryLiveBook::empty()
        }
    };

    // CDP state
    let store = match config
        .state_path
        .as_ref()
        .map(|path| load_snapshot(path))
        .transpose()?
        .flatten()
    {
        Some(snapshot) => {
            info!(
                snapshot_id = %snapshot.id,
                profiles = snapshot.profiles.len(),
                offers = snapshot.offers.len(),
                "State restored"
            );
            Arc::new(MemoryStore::from_snapshot(snapshot)?)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let mut engine = Engine::new(
        store.clone(),
        Arc::new(live_book),
        evaluator.clone(),
        metrics.clone(),
    )
    .with_match_config(config.match_config())
    .with_dedup_config(config.dedup_config());

    if let Some(path) = &config.journal_path {
        let journal = JournalWriter::open(path)?;
        info!(path = journal.path(), "Audit journal enabled");
        engine = engine.with_journal(journal);
    }
    let engine = Arc::new(engine);
    engine.note_rule_book(&book.version);

    // Background tasks
    let watcher_handle = config.rules_reload_interval().map(|interval| {
        RuleBookWatcher::new(loader.clone(), interval)
            .with_current_version(book.version.clone())
            .start(evaluator.clone(), metrics.clone())
    });

    let eviction_handle = {
        let engine = engine.clone();
        let idle = config.lock_idle_timeout();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(idle.max(std::time::Duration::from_secs(1)));
            loop {
                interval.tick().await;
                let evicted = engine.locks().evict_idle(idle);
                if evicted > 0 {
                    info!(evicted, "Evicted idle identity locks");
                }
            }
        })
    };

    // Process input
    let summary = match &config.input_path {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            process_input(BufReader::new(file), &engine, &config).await?
        }
        None => process_input(BufReader::new(tokio::io::stdin()), &engine, &config).await?,
    };

    info!(
        processed = summary.processed,
        refused = summary.refused,
        "Input exhausted"
    );

    // Cleanup
    if let Some(handle) = watcher_handle {
        handle.abort();
    }
    eviction_handle.abort();

    engine.flush_journal()?;

    if let Some(path) = &config.state_path {
        write_snapshot(path, &store.to_snapshot())?;
        info!(path = %path.display(), profiles = store.profile_count(), "State saved");
    }

    if let Some(path) = &config.metrics_path {
        tokio::fs::write(path, metrics.to_prometheus()).await?;
    }

    info!("Shutdown complete");
    Ok(())
}

#[derive(Debug, Default)]
struct Summary {
    processed: u64,
    refused: u64,
}

/// Read JSON-lines records in batches until input ends or Ctrl+C.
async fn process_input<R>(
    reader: R,
    engine: &Arc<Engine>,
    config: &Config,
) -> anyhow::Result<Summary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stdout = tokio::io::stdout();
    let mut summary = Summary::default();
    let batch_size = config.batch_size.max(1);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let mut batch = Vec::with_capacity(batch_size);
        let mut exhausted = false;

        while batch.len() < batch_size {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        error!(error = %e, "Failed to listen for Ctrl+C");
                    }
                    info!("Received shutdown signal");
                    exhausted = true;
                    break;
                }
            };

            let Some(line) = line else {
                exhausted = true;
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<IncomingRecord>(&line) {
                Ok(record) => batch.push(record),
                Err(e) => {
                    warn!(error = %e, "Unparseable input line");
                    engine.metrics().record_validation_error();
                    summary.refused += 1;
                    let output = OutputLine::Refused {
                        record_id: "",
                        error: format!("unparseable record: {}", e),
                    };
                    write_line(&mut stdout, &output).await?;
                }
            }
        }

        if !batch.is_empty() {
            let results = run_batch(engine.clone(), batch, config.max_in_flight).await;
            for (record_id, result) in &results {
                let output = match result {
                    Ok(outcome) => {
                        summary.processed += 1;
                        OutputLine::Processed { outcome }
                    }
                    Err(e) => {
                        summary.refused += 1;
                        OutputLine::Refused {
                            record_id: record_id.as_str(),
                            error: e.to_string(),
                        }
                    }
                };
                write_line(&mut stdout, &output).await?;
            }
            stdout.flush().await?;
        }

        if exhausted {
            return Ok(summary);
        }
    }
}

async fn write_line(stdout: &mut tokio::io::Stdout, output: &OutputLine<'_>) -> anyhow::Result<()> {
    let mut json = serde_json::to_vec(output)?;
    json.push(b'\n');
    stdout.write_all(&json).await?;
    Ok(())
}
