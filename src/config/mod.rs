//! Run configuration.
//!
//! Everything a run needs is resolved once at startup into plain values and
//! handed down explicitly. Nothing below `main` reads the environment.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use clap::ValueEnum;
use rand::RngExt;

use crate::consts::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::prompts::PromptVariant;

/// Which prior records count as "done" when resuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResumePolicy {
    /// Any record for a question marks it done, failed ones included.
    #[default]
    SkipAll,
    /// Only `success` records mark a question done; failures run again.
    RetryFailed,
}

/// What to do with repeated questions in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DuplicatePolicy {
    /// Keep the first occurrence, drop the rest with a warning.
    #[default]
    Skip,
    /// Fail the load.
    Reject,
    /// Run every occurrence; each appends its own record.
    Allow,
}

/// Per-item settings handed to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Steps between progress summaries inside the agent loop.
    pub summary_interval: usize,
    pub prompt_variant: PromptVariant,
    /// Upper bound on agent steps for one item.
    pub max_steps: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            summary_interval: crate::consts::DEFAULT_SUMMARY_INTERVAL,
            prompt_variant: PromptVariant::default(),
            max_steps: crate::consts::DEFAULT_MAX_STEPS,
        }
    }
}

/// Everything one batch run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub infile: PathBuf,
    pub outfile: PathBuf,
    /// Only process the first N items of the input.
    pub sample: Option<usize>,
    pub concurrency: usize,
    pub resume: ResumePolicy,
    pub duplicates: DuplicatePolicy,
    pub session: SessionConfig,
}

impl RunConfig {
    pub fn new(infile: impl Into<PathBuf>, outfile: impl Into<PathBuf>) -> Self {
        Self {
            infile: infile.into(),
            outfile: outfile.into(),
            sample: None,
            concurrency: crate::consts::DEFAULT_CONCURRENCY,
            resume: ResumePolicy::default(),
            duplicates: DuplicatePolicy::default(),
            session: SessionConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.session.max_steps == 0 {
            bail!("max steps must be at least 1");
        }
        if self.session.summary_interval == 0 {
            bail!("summary interval must be at least 1");
        }
        if same_file(&self.infile, &self.outfile) {
            bail!(
                "input and output are the same file: {}",
                self.infile.display()
            );
        }
        Ok(())
    }
}

/// Paths name the same file, compared canonically when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Credentials and model for the OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

impl ProviderConfig {
    /// Read `OPENAI_API_KEY`, `OPENAI_API_BASE` and `DEFAULT_MODEL`.
    /// `model` overrides the environment's model name.
    pub fn from_env(model: Option<String>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            bail!("OPENAI_API_KEY is not set");
        }
        let api_base = std::env::var("OPENAI_API_BASE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let model = model
            .or_else(|| std::env::var("DEFAULT_MODEL").ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key,
            api_base,
            model,
        })
    }

    /// The key with all but its last four characters hidden.
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
        format!("{}{}", "*".repeat(20), tail)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.masked_key())
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

/// Pick this run's summary interval: uniformly within one of `base`, never
/// below 1. Runs started together drift apart this way.
pub fn jitter_interval(base: usize) -> usize {
    let low = base.saturating_sub(1).max(1);
    let high = base.saturating_add(1).max(low);
    rand::rng().random_range(low..=high)
}

/// An explicit path is absolute or starts with `.` / `..`. Everything else
/// is a bare name resolved against a base directory.
fn is_explicit(path: &Path) -> bool {
    path.is_absolute()
        || matches!(
            path.components().next(),
            Some(Component::CurDir | Component::ParentDir)
        )
}

/// Resolve the input path. Bare names live under `input_dir`.
pub fn resolve_input(infile: &Path, input_dir: &Path) -> PathBuf {
    if is_explicit(infile) {
        infile.to_path_buf()
    } else {
        input_dir.join(infile)
    }
}

/// Resolve the output path.
///
/// Without an explicit output the input's stem is reused with a `.jsonl`
/// extension under `results_dir`. A bare output name is placed under
/// `results_dir` unless it already starts at the results root.
pub fn resolve_output(outfile: Option<&Path>, infile: &Path, results_dir: &Path) -> PathBuf {
    let Some(outfile) = outfile else {
        let stem = infile
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "results".into());
        let mut name = PathBuf::from(stem);
        name.set_extension("jsonl");
        return results_dir.join(name);
    };

    if is_explicit(outfile) {
        return outfile.to_path_buf();
    }

    let root = results_dir.components().next();
    match root {
        Some(root) if outfile.components().next() == Some(root) => outfile.to_path_buf(),
        _ => results_dir.join(outfile),
    }
}
