pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::thinker::ToolCall;
use crate::tools::ToolResult;

/// A single entry in the agent's memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryEntry {
    /// The task given to the agent.
    Task { content: String },
    /// A thought, the calls it made and what came back.
    Iteration {
        thought: String,
        calls: Vec<ToolCall>,
        results: Vec<ToolResult>,
    },
    /// The final answer.
    Answer { thought: String, content: String },
}

/// What the agent remembers while working on one task.
#[async_trait]
pub trait Memory: Send + Sync {
    async fn store(&self, entry: MemoryEntry) -> Result<()>;
    async fn history(&self) -> Result<Vec<MemoryEntry>>;
}
