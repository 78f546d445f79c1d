//! One end-to-end run: load, filter, dispatch.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::RunConfig;
use crate::dispatch::Dispatcher;
use crate::inspect::Inspector;
use crate::ledger::CompletionSet;
use crate::processor::Processor;
use crate::progress::RunSummary;
use crate::source::load_items;
use crate::store::sink::ResultSink;
use crate::worker::Worker;

/// Run every input item that the output does not already hold.
///
/// An unreadable input or a failed write ends the run with an error. Item
/// failures do not: they are written as `failed` records.
pub async fn run_batch(
    config: &RunConfig,
    processor: Arc<dyn Processor>,
    inspector: Arc<dyn Inspector>,
    show_progress: bool,
) -> Result<RunSummary> {
    config.validate()?;

    let items = load_items(&config.infile, config.sample, config.duplicates)
        .context("failed to load input items")?;
    let done = CompletionSet::load(&config.outfile, config.resume);
    let partition = done.partition(items);

    info!(
        total = partition.total,
        already_done = partition.already_done,
        remaining = partition.pending.len(),
        concurrency = config.concurrency,
        "work list ready"
    );

    if partition.pending.is_empty() {
        info!("nothing to do");
        return Ok(RunSummary {
            total: partition.total,
            already_done: partition.already_done,
            ..RunSummary::default()
        });
    }

    let sink = Arc::new(ResultSink::open(&config.outfile)?);
    let worker = Arc::new(Worker::new(processor, inspector, config.session.clone()));

    Dispatcher::new(worker, sink, config.concurrency)
        .show_progress(show_progress)
        .run(partition)
        .await
}
