pub mod agent;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::SessionConfig;

/// The slow, fallible call made once per item.
///
/// Implementations must build any per-call state inside `process`. The
/// runner calls it concurrently from many tasks and shares nothing between
/// calls except `&self`.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Answer `prompt`. The returned fields are merged into the result
    /// record as-is.
    async fn process(&self, prompt: &str, session: &SessionConfig) -> Result<Map<String, Value>>;
}
