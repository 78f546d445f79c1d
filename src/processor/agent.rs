use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;

use super::Processor;
use crate::config::SessionConfig;
use crate::engine::Engine;
use crate::engine::react::{ReactConfig, ReactEngine};
use crate::memory::sqlite::SqliteMemory;
use crate::thinker::Thinker;
use crate::tools::ToolRegistry;

/// Runs the ReAct agent on each prompt.
///
/// The thinker and tools are shared by the whole run. Each call gets its
/// own engine and its own in-memory history.
pub struct AgentProcessor {
    thinker: Arc<dyn Thinker>,
    tools: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl AgentProcessor {
    pub fn new(thinker: Arc<dyn Thinker>, tools: Arc<ToolRegistry>, tool_timeout: Duration) -> Self {
        Self {
            thinker,
            tools,
            tool_timeout,
        }
    }
}

#[async_trait]
impl Processor for AgentProcessor {
    async fn process(&self, prompt: &str, session: &SessionConfig) -> Result<Map<String, Value>> {
        let memory = SqliteMemory::in_memory().context("failed to open session memory")?;
        let mut engine = ReactEngine::new(
            Arc::clone(&self.thinker),
            Arc::clone(&self.tools),
            Box::new(memory),
            ReactConfig::from_session(session, self.tool_timeout),
        );

        let outcome = engine.run(prompt).await?;
        let trajectory = engine.memory().history().await?;

        let mut out = Map::new();
        out.insert("agent_result".to_string(), json!(outcome.answer));
        out.insert("final_thought".to_string(), json!(outcome.thought));
        out.insert("steps".to_string(), json!(outcome.steps));
        out.insert("input_tokens".to_string(), json!(outcome.usage.input_tokens));
        out.insert("output_tokens".to_string(), json!(outcome.usage.output_tokens));
        out.insert("agent_trajectory".to_string(), serde_json::to_value(trajectory)?);
        Ok(out)
    }
}
