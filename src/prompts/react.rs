use super::PromptVariant;
use crate::thinker::ToolDescription;

const INTRO: &str = "You are a research agent that answers one question using a ReAct loop.";
const CONCISE_INTRO: &str = "Answer the question. Use tools when needed.";
const RESPONSE_HEADER: &str = "You MUST respond with valid JSON in one of two formats:";
const TOOL_FORMAT: &str = "To use tools:\n{\"thought\": \"your reasoning about what to do next\", \"action\": {\"calls\": [{\"tool\": \"tool_name\", \"args\": {\"arg_name\": \"arg_value\"}}]}}";
const ANSWER_FORMAT: &str = "To give the final answer:\n{\"thought\": \"your reasoning about why you're done\", \"answer\": \"your final answer to the question\"}";
const RULES_HEADER: &str = "Rules:";
const RULES: &[&str] = &[
    "Output JSON only. No markdown, no extra text, no extra keys.",
    "Thought should be brief (1-2 sentences).",
    "Use only the tools listed above. Never invent tools.",
    "Use the calls array to run tools in parallel.",
    "If a tool returns an error, analyze it and try a different approach.",
    "Make the answer as short as the question allows: a number, a name, or a phrase.",
    "When you have enough information, respond with the answer format.",
];

/// System prompt for the agent, listing the tools it may call.
pub fn build_react_system_prompt(variant: PromptVariant, tools: &[ToolDescription]) -> String {
    let mut tools_desc = String::new();
    for tool in tools {
        tools_desc.push_str(&format!("- {}: {}\n", tool.name, tool.description));
    }
    if tools_desc.is_empty() {
        tools_desc.push_str("(none)\n");
    }

    match variant {
        PromptVariant::Concise => format!(
            "{CONCISE_INTRO}\n\nTools:\n{tools_desc}\n{RESPONSE_HEADER}\n\n{TOOL_FORMAT}\n\n{ANSWER_FORMAT}\n"
        ),
        PromptVariant::Default => {
            let rules = RULES
                .iter()
                .map(|rule| format!("- {rule}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "{INTRO}\n\nYou have access to these tools:\n{tools_desc}\n{RESPONSE_HEADER}\n\n{TOOL_FORMAT}\n\n{ANSWER_FORMAT}\n\n{RULES_HEADER}\n{rules}\n"
            )
        }
    }
}

/// Injected every `summary_interval` steps.
pub fn summary_reminder(step: usize) -> String {
    format!(
        "You have taken {step} steps. Before acting again, use your thought to summarize \
         what you have learned so far and what is still missing."
    )
}

/// Injected on the last allowed step.
pub fn final_step_reminder() -> &'static str {
    "This is your last step. Respond with the answer format now, using your best answer."
}
