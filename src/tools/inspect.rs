use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::Tool;
use crate::inspect::Inspector;

/// Lets the agent look at files on its own, through the same inspector the
/// runner uses for attachments.
pub struct InspectTool {
    inspector: Arc<dyn Inspector>,
}

impl InspectTool {
    pub fn new(inspector: Arc<dyn Inspector>) -> Self {
        Self { inspector }
    }
}

#[async_trait]
impl Tool for InspectTool {
    fn name(&self) -> &str {
        "inspect_file"
    }

    fn description(&self) -> &str {
        "Describe a local file. Args: {\"path\": \"file path\", \"question\": \"optional focus\"}"
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<String> {
        let Some(path) = args.get("path").filter(|p| !p.trim().is_empty()) else {
            bail!("missing 'path' argument");
        };
        let question = args.get("question").map(String::as_str).unwrap_or_default();
        self.inspector.describe(Path::new(path), question).await
    }
}
