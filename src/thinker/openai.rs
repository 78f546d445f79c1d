use anyhow::{Context as _, Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::memory::MemoryEntry;
use crate::prompts::{build_react_system_prompt, final_step_reminder, summary_reminder};
use crate::tools::Outcome;

use super::{Context, Step, StepResult, Thinker, TokenUsage, ToolCall};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const TEMPERATURE: f32 = 0.0;

/// An LLM thinker that calls an OpenAI-compatible chat completions API.
pub struct OpenAiThinker {
    client: reqwest::Client,
    provider: ProviderConfig,
}

impl OpenAiThinker {
    pub fn new(provider: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, provider })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.provider.api_base.trim_end_matches('/')
        )
    }

    fn build_messages(context: &Context) -> Vec<Message> {
        let mut messages = vec![
            Message::new(
                "system",
                build_react_system_prompt(context.variant, &context.available_tools),
            ),
            Message::new("user", format!("Task: {}", context.task)),
        ];

        for entry in &context.history {
            let MemoryEntry::Iteration {
                thought,
                calls,
                results,
            } = entry
            else {
                continue;
            };

            let assistant = serde_json::json!({
                "thought": thought,
                "action": { "calls": calls },
            });
            messages.push(Message::new("assistant", assistant.to_string()));

            let mut observation = String::from("Tool results:\n");
            for result in results {
                match &result.outcome {
                    Outcome::Success(out) => {
                        observation.push_str(&format!("[{}] ✓ {}\n", result.tool, out));
                    }
                    Outcome::Error(err) => {
                        observation.push_str(&format!("[{}] ✗ {}\n", result.tool, err));
                    }
                }
            }
            messages.push(Message::new("user", observation));
        }

        if context.summary_due {
            messages.push(Message::new("user", summary_reminder(context.step)));
        }
        if context.final_step {
            messages.push(Message::new("user", final_step_reminder()));
        }
        messages
    }

    fn parse_response(text: &str) -> Result<Step> {
        let json_str = extract_json(text);
        let response: Value = serde_json::from_str(json_str)
            .map_err(|e| anyhow!("failed to parse LLM response as JSON: {e}\nraw: {text}"))?;

        let thought = response
            .get("thought")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        if let Some(answer) = response.get("answer") {
            let answer = match answer {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            return Ok(Step::Finish { thought, answer });
        }

        if let Some(calls) = response
            .get("action")
            .and_then(|a| a.get("calls"))
            .and_then(|c| c.as_array())
        {
            let calls: Vec<ToolCall> = calls.iter().filter_map(parse_call).collect();
            if calls.is_empty() {
                bail!("LLM returned action with no valid tool calls: {text}");
            }
            return Ok(Step::Act { thought, calls });
        }

        bail!("LLM response is neither an answer nor a tool call: {text}")
    }
}

fn parse_call(call: &Value) -> Option<ToolCall> {
    let tool = call.get("tool")?.as_str()?.to_string();
    let args = call
        .get("args")
        .and_then(|a| a.as_object())
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let val = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), val)
                })
                .collect()
        })
        .unwrap_or_else(HashMap::new);
    Some(ToolCall { tool, args })
}

#[async_trait]
impl Thinker for OpenAiThinker {
    async fn next_step(&self, context: &Context) -> Result<StepResult> {
        let messages = Self::build_messages(context);
        let body = ChatRequest {
            model: &self.provider.model,
            messages: &messages,
            temperature: TEMPERATURE,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.provider.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("chat completion API error ({status}): {text}");
        }

        let api_resp: ChatResponse = resp
            .json()
            .await
            .context("malformed chat completion response")?;
        let text = api_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            bail!("chat completion API returned an empty response");
        }

        let usage = api_resp.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });
        if let Some(u) = usage {
            debug!(input = u.input_tokens, output = u.output_tokens, "tokens");
        }

        Ok(StepResult {
            step: Self::parse_response(&text)?,
            usage,
        })
    }
}

/// Extract JSON from text that may be wrapped in markdown code fences.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(after) = trimmed.strip_prefix("```json")
        && let Some(json) = after.strip_suffix("```")
    {
        return json.trim();
    }
    if let Some(after) = trimmed.strip_prefix("```")
        && let Some(json) = after.strip_suffix("```")
    {
        return json.trim();
    }

    trimmed
}

// --- API types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptVariant;
    use crate::thinker::ToolDescription;
    use crate::tools::ToolResult;

    fn context(history: Vec<MemoryEntry>) -> Context {
        Context {
            task: "What is 2+2?".to_string(),
            history,
            available_tools: vec![ToolDescription {
                name: "inspect_file".to_string(),
                description: "read files".to_string(),
            }],
            variant: PromptVariant::Default,
            step: 0,
            summary_due: false,
            final_step: false,
        }
    }

    #[test]
    fn parse_finish_response() {
        let step =
            OpenAiThinker::parse_response(r#"{"thought": "easy", "answer": "4"}"#).unwrap();
        match step {
            Step::Finish { thought, answer } => {
                assert_eq!(thought, "easy");
                assert_eq!(answer, "4");
            }
            _ => panic!("expected Finish"),
        }
    }

    #[test]
    fn parse_numeric_answer() {
        let step = OpenAiThinker::parse_response(r#"{"thought": "", "answer": 4}"#).unwrap();
        assert!(matches!(step, Step::Finish { answer, .. } if answer == "4"));
    }

    #[test]
    fn parse_parallel_calls() {
        let text = r#"{"thought": "look", "action": {"calls": [
            {"tool": "inspect_file", "args": {"path": "a.txt"}},
            {"tool": "inspect_file", "args": {"path": "b.txt", "limit": 3}}
        ]}}"#;
        match OpenAiThinker::parse_response(text).unwrap() {
            Step::Act { calls, .. } => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].args["path"], "a.txt");
                assert_eq!(calls[1].args["limit"], "3");
            }
            _ => panic!("expected Act"),
        }
    }

    #[test]
    fn parse_call_without_args() {
        let text = r#"{"thought": "", "action": {"calls": [{"tool": "inspect_file"}]}}"#;
        match OpenAiThinker::parse_response(text).unwrap() {
            Step::Act { calls, .. } => assert!(calls[0].args.is_empty()),
            _ => panic!("expected Act"),
        }
    }

    #[test]
    fn parse_fenced_json() {
        let text = "```json\n{\"thought\": \"t\", \"answer\": \"a\"}\n```";
        assert!(matches!(
            OpenAiThinker::parse_response(text).unwrap(),
            Step::Finish { .. }
        ));
    }

    #[test]
    fn parse_failures() {
        assert!(OpenAiThinker::parse_response("not json").is_err());
        assert!(OpenAiThinker::parse_response(r#"{"thought": "hmm"}"#).is_err());
        assert!(
            OpenAiThinker::parse_response(r#"{"thought": "", "action": {"calls": []}}"#).is_err()
        );
    }

    #[test]
    fn extract_json_variants() {
        assert_eq!(extract_json("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(extract_json("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("```json\n{\"a\":1}"), "```json\n{\"a\":1}");
    }

    #[test]
    fn messages_start_with_system_and_task() {
        let messages = OpenAiThinker::build_messages(&context(Vec::new()));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("- inspect_file: read files"));
        assert_eq!(messages[1].content, "Task: What is 2+2?");
    }

    #[test]
    fn messages_replay_iterations_with_args() {
        let mut args = HashMap::new();
        args.insert("path".to_string(), "a.txt".to_string());
        let history = vec![
            MemoryEntry::Task {
                content: "What is 2+2?".to_string(),
            },
            MemoryEntry::Iteration {
                thought: "read it".to_string(),
                calls: vec![ToolCall {
                    tool: "inspect_file".to_string(),
                    args,
                }],
                results: vec![ToolResult {
                    tool: "inspect_file".to_string(),
                    outcome: Outcome::Error("no such file".to_string()),
                }],
            },
        ];

        let messages = OpenAiThinker::build_messages(&context(history));
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, "assistant");
        assert!(messages[2].content.contains("a.txt"));
        assert!(messages[3].content.contains("[inspect_file] ✗ no such file"));
    }

    #[test]
    fn summary_and_final_step_add_reminders() {
        let mut ctx = context(Vec::new());
        ctx.step = 8;
        ctx.summary_due = true;
        ctx.final_step = true;
        let messages = OpenAiThinker::build_messages(&ctx);
        assert_eq!(messages.len(), 4);
        assert!(messages[2].content.contains("8 steps"));
        assert!(messages[3].content.contains("last step"));
    }

    #[test]
    fn endpoint_joins_base() {
        let thinker = OpenAiThinker::new(ProviderConfig {
            api_key: "k".to_string(),
            api_base: "http://localhost:8000/v1/".to_string(),
            model: "m".to_string(),
        })
        .unwrap();
        assert_eq!(thinker.endpoint(), "http://localhost:8000/v1/chat/completions");
    }
}
