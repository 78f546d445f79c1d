pub mod react;

use clap::ValueEnum;

pub use react::{build_react_system_prompt, final_step_reminder, summary_reminder};

/// Which system prompt the agent runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PromptVariant {
    /// Full instructions with worked rules.
    #[default]
    Default,
    /// Short instructions for models that follow the format on their own.
    Concise,
}

impl PromptVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptVariant::Default => "default",
            PromptVariant::Concise => "concise",
        }
    }
}
