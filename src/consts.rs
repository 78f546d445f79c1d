//! Project-wide constants.

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");
pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// Model used when neither `--model` nor `DEFAULT_MODEL` is set.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible endpoint used when `OPENAI_API_BASE` is unset.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub const DEFAULT_CONCURRENCY: usize = 15;
pub const DEFAULT_MAX_STEPS: usize = 6;
pub const DEFAULT_SUMMARY_INTERVAL: usize = 8;

/// Base directory for bare input file names.
pub const DEFAULT_INPUT_DIR: &str = "mm";

/// Base directory for bare output file names.
pub const DEFAULT_RESULTS_DIR: &str = "output_for_analysis/mm";

/// Per tool call, inside the agent loop.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;

/// Characters of file content an inspector hands back before truncating.
pub const MAX_DESCRIPTION_CHARS: usize = 100_000;

/// Format a number with comma separators (e.g. 1,234,567).
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Shorten `text` to at most `max` characters for log lines.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut cut: String = flat.chars().take(max).collect();
    cut.push('…');
    cut
}
