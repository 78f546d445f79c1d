//! What earlier runs already finished.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ResumePolicy;
use crate::item::WorkItem;
use crate::record::Status;
use crate::store::read_records;

/// Questions that already have a record in the output store.
///
/// A snapshot taken once before dispatch. It is not updated as the run
/// writes new records.
#[derive(Debug, Default, Clone)]
pub struct CompletionSet {
    questions: HashSet<String>,
}

/// The input split against a [`CompletionSet`].
#[derive(Debug, Default)]
pub struct Partition {
    pub pending: Vec<WorkItem>,
    /// Input items before filtering.
    pub total: usize,
    /// Input items skipped because they were already done.
    pub already_done: usize,
}

impl CompletionSet {
    /// Load from prior output. Any failure means "nothing done yet".
    pub fn load(path: &Path, policy: ResumePolicy) -> Self {
        match read_records(path) {
            Ok(records) => {
                let set = Self::from_records(&records, policy);
                debug!(
                    path = %path.display(),
                    records = records.len(),
                    completed = set.len(),
                    "loaded prior output"
                );
                set
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "no prior output");
                Self::default()
            }
            Err(e) => {
                warn!("ignoring unreadable prior output: {e}");
                Self::default()
            }
        }
    }

    pub fn from_records(records: &[Value], policy: ResumePolicy) -> Self {
        let questions = records
            .iter()
            .filter(|r| match policy {
                ResumePolicy::SkipAll => true,
                ResumePolicy::RetryFailed => Status::of(r) == Some(Status::Success),
            })
            .filter_map(|r| r.get("question")?.as_str())
            .map(str::to_string)
            .collect();
        Self { questions }
    }

    pub fn contains(&self, question: &str) -> bool {
        self.questions.contains(question)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Keep the items with no prior record, in input order.
    pub fn partition(&self, items: Vec<WorkItem>) -> Partition {
        let total = items.len();
        let pending: Vec<WorkItem> = items
            .into_iter()
            .filter(|item| !self.contains(&item.question))
            .collect();
        Partition {
            already_done: total - pending.len(),
            pending,
            total,
        }
    }
}
