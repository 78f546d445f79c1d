//! Turning attachments into text the agent can read.

pub mod archive;
pub mod local;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::debug;

pub use local::LocalInspector;

/// Header appended after the question for a `.zip` attachment.
pub const ARCHIVE_HEADER: &str =
    "\n\nTo solve the task above, you will have to use these attached files:\n";

/// Header appended after the question for a single attached file.
pub const FILE_HEADER: &str =
    "\n\nTo solve the task above, you will have to use this attached file:";

/// Describes one file in the context of a question.
#[async_trait]
pub trait Inspector: Send + Sync {
    async fn describe(&self, path: &Path, question: &str) -> Result<String>;
}

/// True when the attachment names a zip archive.
pub fn is_archive(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Build the text appended to a question for its attachment, header
/// included. Errors propagate: an unreadable attachment fails the item.
pub async fn describe_attachment(
    inspector: &dyn Inspector,
    file_name: &str,
    question: &str,
) -> Result<String> {
    let path = PathBuf::from(file_name);
    if !is_archive(file_name) {
        let description = describe_entry(inspector, &path, file_name, question).await?;
        return Ok(format!("{FILE_HEADER}\n{description}"));
    }

    let scratch = tempfile::tempdir().context("failed to create scratch dir")?;
    let dest = scratch.path().to_path_buf();
    let source = path.clone();
    let files = tokio::task::spawn_blocking(move || archive::extract(&source, &dest))
        .await
        .context("archive extraction task failed")??;
    if files.is_empty() {
        bail!("archive {file_name} contains no files");
    }
    debug!(archive = file_name, files = files.len(), "unpacked attachment");

    let mut out = String::from(ARCHIVE_HEADER);
    for file in &files {
        let shown = file
            .strip_prefix(scratch.path())
            .unwrap_or(file)
            .display()
            .to_string();
        out.push_str(&describe_entry(inspector, file, &shown, question).await?);
    }
    Ok(out)
}

async fn describe_entry(
    inspector: &dyn Inspector,
    path: &Path,
    shown: &str,
    question: &str,
) -> Result<String> {
    let description = inspector
        .describe(path, question)
        .await
        .with_context(|| format!("failed to inspect attachment {shown}"))?;
    Ok(format!(
        "- Attached file: {shown}\n     -> Description: {description}\n"
    ))
}
