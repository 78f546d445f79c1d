use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Context, Step, StepResult, Thinker};

/// A scripted thinker for tests. Returns pre-defined steps in order.
///
/// Also records what it was shown on each call so tests can check the
/// summary and last-step flags.
pub struct MockThinker {
    steps: Vec<StepResult>,
    index: AtomicUsize,
    seen: Mutex<Vec<(usize, bool, bool)>>,
}

impl MockThinker {
    pub fn new(steps: Vec<StepResult>) -> Self {
        Self {
            steps,
            index: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for a step with no token usage.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self::new(
            steps
                .into_iter()
                .map(|step| StepResult { step, usage: None })
                .collect(),
        )
    }

    /// `(step, summary_due, final_step)` for every call so far.
    pub fn seen(&self) -> Vec<(usize, bool, bool)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Thinker for MockThinker {
    async fn next_step(&self, context: &Context) -> Result<StepResult> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((context.step, context.summary_due, context.final_step));
        }
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        let result = self
            .steps
            .get(i)
            .ok_or_else(|| anyhow::anyhow!("MockThinker: no more steps (called {} times)", i + 1))?;
        Ok(StepResult {
            step: result.step.clone(),
            usage: result.usage,
        })
    }
}
