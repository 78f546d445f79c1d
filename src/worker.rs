use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use tracing::{debug, error};

use crate::config::SessionConfig;
use crate::consts::preview;
use crate::inspect::{Inspector, describe_attachment};
use crate::item::WorkItem;
use crate::processor::Processor;
use crate::record::ResultRecord;

/// Processes one item at a time and never fails: every error or panic
/// becomes a `failed` record.
pub struct Worker {
    processor: Arc<dyn Processor>,
    inspector: Arc<dyn Inspector>,
    session: SessionConfig,
}

impl Worker {
    pub fn new(
        processor: Arc<dyn Processor>,
        inspector: Arc<dyn Inspector>,
        session: SessionConfig,
    ) -> Self {
        Self {
            processor,
            inspector,
            session,
        }
    }

    pub async fn run(&self, item: &WorkItem) -> ResultRecord {
        let outcome = AssertUnwindSafe(self.process(item)).catch_unwind().await;
        let record = match outcome {
            Ok(Ok(output)) => ResultRecord::success(item, output),
            Ok(Err(e)) => {
                error!(question = %preview(&item.question, 80), "item failed: {e:#}");
                ResultRecord::from_error(item, &e)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(question = %preview(&item.question, 80), "item panicked: {message}");
                ResultRecord::failed(item, format!("panic: {message}"), format!("panic: {message}"))
            }
        };
        debug!(
            question = %preview(&item.question, 80),
            status = record.status().as_str(),
            "item done"
        );
        record
    }

    async fn process(&self, item: &WorkItem) -> Result<serde_json::Map<String, serde_json::Value>> {
        let prompt = self.build_prompt(item).await?;
        self.processor.process(&prompt, &self.session).await
    }

    /// The question, plus the attachment description when there is one.
    pub async fn build_prompt(&self, item: &WorkItem) -> Result<String> {
        let mut prompt = item.question.clone();
        if let Some(file_name) = &item.file_name {
            let text =
                describe_attachment(self.inspector.as_ref(), file_name, &item.question).await?;
            prompt.push_str(&text);
        }
        Ok(prompt)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
