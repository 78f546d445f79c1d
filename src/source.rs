//! Loading the work list.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::config::DuplicatePolicy;
use crate::item::WorkItem;
use crate::store::{LoadError, read_records};

/// Load the items to process from `path`, in file order.
///
/// `sample` keeps only the first N records and is applied before duplicate
/// handling, so the cap always counts raw input records.
pub fn load_items(
    path: &Path,
    sample: Option<usize>,
    duplicates: DuplicatePolicy,
) -> Result<Vec<WorkItem>, LoadError> {
    let mut records = read_records(path)?;
    if let Some(n) = sample
        && records.len() > n
    {
        info!(sample = n, available = records.len(), "truncating input to sample");
        records.truncate(n);
    }

    let mut items = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let item = WorkItem::from_value(record).ok_or_else(|| LoadError::MissingQuestion {
            path: path.to_path_buf(),
            index,
        })?;
        items.push(item);
    }

    apply_duplicate_policy(items, duplicates, path)
}

fn apply_duplicate_policy(
    items: Vec<WorkItem>,
    policy: DuplicatePolicy,
    path: &Path,
) -> Result<Vec<WorkItem>, LoadError> {
    if policy == DuplicatePolicy::Allow {
        return Ok(items);
    }

    let mut seen = HashSet::with_capacity(items.len());
    let mut kept = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if seen.insert(item.question.clone()) {
            kept.push(item);
            continue;
        }
        match policy {
            DuplicatePolicy::Reject => {
                return Err(LoadError::DuplicateQuestion {
                    path: path.to_path_buf(),
                    index,
                    question: item.question,
                });
            }
            _ => warn!(index, question = %item.question, "skipping duplicate question"),
        }
    }
    Ok(kept)
}
