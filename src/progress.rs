//! Progress over the completion stream.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, info};

use crate::record::{ResultRecord, Status};

/// Counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items in the input, after sampling and duplicate handling.
    pub total: usize,
    /// Items skipped because prior output already had them.
    pub already_done: usize,
    /// Items dispatched this run.
    pub pending: usize,
    pub newly_completed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    /// Done across all runs so far.
    pub fn cumulative(&self) -> usize {
        self.already_done + self.newly_completed
    }

    pub fn remaining(&self) -> usize {
        self.pending.saturating_sub(self.newly_completed)
    }
}

/// Watches records go by. Never affects control flow.
pub struct Progress {
    bar: ProgressBar,
    summary: RunSummary,
}

impl Progress {
    pub fn new(total: usize, already_done: usize, pending: usize, visible: bool) -> Self {
        let bar = ProgressBar::new(pending as u64);
        if visible {
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} ({eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(4));
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }

        Self {
            bar,
            summary: RunSummary {
                total,
                already_done,
                pending,
                ..RunSummary::default()
            },
        }
    }

    /// Count one completed record.
    pub fn observe(&mut self, record: &ResultRecord) {
        let s = &mut self.summary;
        s.newly_completed += 1;
        match record.status() {
            Status::Success => s.succeeded += 1,
            Status::Failed => s.failed += 1,
        }

        self.bar.inc(1);
        self.bar
            .set_message(format!("ok {} / failed {}", s.succeeded, s.failed));
        debug!(
            completed = s.newly_completed,
            pending = s.pending,
            cumulative = s.cumulative(),
            total = s.total,
            "progress"
        );
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn finish(self) -> RunSummary {
        self.bar.finish_and_clear();
        let s = self.summary;
        info!(
            total = s.total,
            already_done = s.already_done,
            newly_completed = s.newly_completed,
            succeeded = s.succeeded,
            failed = s.failed,
            cumulative = s.cumulative(),
            "run finished"
        );
        s
    }
}
