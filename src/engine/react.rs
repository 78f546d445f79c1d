use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{AgentOutcome, Engine};
use crate::config::SessionConfig;
use crate::consts::{DEFAULT_TOOL_TIMEOUT_SECS, preview};
use crate::memory::{Memory, MemoryEntry};
use crate::prompts::PromptVariant;
use crate::thinker::{Context, Step, Thinker, TokenUsage};
use crate::tools::{Outcome, ToolRegistry, ToolResult};

pub struct ReactConfig {
    pub max_steps: usize,
    pub tool_timeout: Duration,
    /// Ask for a progress summary every this many steps.
    pub summary_interval: usize,
    pub prompt_variant: PromptVariant,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self::from_session(
            &SessionConfig::default(),
            Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
        )
    }
}

impl ReactConfig {
    pub fn from_session(session: &SessionConfig, tool_timeout: Duration) -> Self {
        Self {
            max_steps: session.max_steps,
            tool_timeout,
            summary_interval: session.summary_interval,
            prompt_variant: session.prompt_variant,
        }
    }

    fn summary_due(&self, step: usize) -> bool {
        step > 0 && self.summary_interval > 0 && step.is_multiple_of(self.summary_interval)
    }
}

/// The ReAct loop. Wires together a Thinker, ToolRegistry, and Memory.
pub struct ReactEngine {
    thinker: Arc<dyn Thinker>,
    tools: Arc<ToolRegistry>,
    memory: Box<dyn Memory>,
    config: ReactConfig,
}

impl ReactEngine {
    pub fn new(
        thinker: Arc<dyn Thinker>,
        tools: Arc<ToolRegistry>,
        memory: Box<dyn Memory>,
        config: ReactConfig,
    ) -> Self {
        Self {
            thinker,
            tools,
            memory,
            config,
        }
    }

    pub fn memory(&self) -> &dyn Memory {
        self.memory.as_ref()
    }

    async fn execute_calls(&self, calls: &[crate::thinker::ToolCall]) -> Vec<ToolResult> {
        let timeout = self.config.tool_timeout;
        let futures: Vec<_> = calls
            .iter()
            .map(|call| {
                let tools = Arc::clone(&self.tools);
                async move {
                    match tokio::time::timeout(timeout, tools.execute(&call.tool, &call.args))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => ToolResult {
                            tool: call.tool.clone(),
                            outcome: Outcome::Error("timed out".to_string()),
                        },
                    }
                }
            })
            .collect();

        futures::future::join_all(futures).await
    }
}

#[async_trait]
impl Engine for ReactEngine {
    async fn run(&mut self, task: &str) -> Result<AgentOutcome> {
        self.memory
            .store(MemoryEntry::Task {
                content: task.to_string(),
            })
            .await?;

        let mut usage = TokenUsage::default();
        for step in 0..self.config.max_steps {
            let context = Context {
                task: task.to_string(),
                history: self.memory.history().await?,
                available_tools: self.tools.descriptions().await,
                variant: self.config.prompt_variant,
                step,
                summary_due: self.config.summary_due(step),
                final_step: step + 1 == self.config.max_steps,
            };

            let result = self.thinker.next_step(&context).await?;
            if let Some(u) = result.usage {
                usage.add(u);
            }

            match result.step {
                Step::Act { thought, calls } => {
                    debug!(
                        step = step + 1,
                        calls = calls.len(),
                        thought = %preview(&thought, 120),
                        "acting"
                    );
                    let results = self.execute_calls(&calls).await;
                    for result in &results {
                        match &result.outcome {
                            Outcome::Success(out) => {
                                debug!(tool = %result.tool, "✓ {}", preview(out, 120))
                            }
                            Outcome::Error(err) => debug!(tool = %result.tool, "✗ {err}"),
                        }
                    }

                    self.memory
                        .store(MemoryEntry::Iteration {
                            thought,
                            calls,
                            results,
                        })
                        .await?;
                }

                Step::Finish { thought, answer } => {
                    debug!(step = step + 1, answer = %preview(&answer, 120), "finished");

                    self.memory
                        .store(MemoryEntry::Answer {
                            thought: thought.clone(),
                            content: answer.clone(),
                        })
                        .await?;

                    return Ok(AgentOutcome {
                        answer,
                        thought,
                        steps: step + 1,
                        usage,
                    });
                }
            }
        }

        bail!("max steps ({}) reached without an answer", self.config.max_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_due_on_interval_multiples_only() {
        let config = ReactConfig {
            summary_interval: 3,
            ..ReactConfig::default()
        };
        let due: Vec<_> = (0..10).filter(|&s| config.summary_due(s)).collect();
        assert_eq!(due, vec![3, 6, 9]);
    }

    #[test]
    fn default_follows_session_defaults() {
        let config = ReactConfig::default();
        assert_eq!(config.max_steps, crate::consts::DEFAULT_MAX_STEPS);
        assert_eq!(config.prompt_variant, PromptVariant::Default);
    }
}
