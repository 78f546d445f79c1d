pub mod react;

use anyhow::Result;
use async_trait::async_trait;

use crate::thinker::TokenUsage;

/// How one task ended.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub answer: String,
    /// The thought that came with the answer.
    pub thought: String,
    /// Thinker calls it took, the answering one included.
    pub steps: usize,
    pub usage: TokenUsage,
}

/// Solves a single task. The agent processor only knows this trait.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn run(&mut self, task: &str) -> Result<AgentOutcome>;
}
