use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;

use crate::domain::{IncomingRecord, ProcessOutcome};
use crate::error::EngineError;

use super::pipeline::Engine;

/// Outcome of one record in a batch, tagged with its record id.
pub type BatchResult = (String, Result<ProcessOutcome, EngineError>);

/// Process records concurrently, at most `max_in_flight` at a time.
///
/// Each record runs on the blocking pool since the pipeline takes locks and
/// does synchronous I/O. Results come back in input order.
pub async fn run_batch(
    engine: Arc<Engine>,
    records: Vec<IncomingRecord>,
    max_in_flight: usize,
) -> Vec<BatchResult> {
    let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut handles = Vec::with_capacity(records.len());

    for record in records {
        let permit = semaphore.clone().acquire_owned().await.ok();
        let engine = engine.clone();
        let record_id = record.record_id.clone();

        let handle = spawn_blocking(move || {
            let _permit = permit;
            engine.process(&record)
        });
        handles.push((record_id, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (record_id, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::Worker(e.to_string())),
        };
        results.push((record_id, result));
    }

    results
}
