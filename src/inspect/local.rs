use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::Inspector;
use crate::consts::MAX_DESCRIPTION_CHARS;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "tsv", "json", "jsonl", "xml", "html", "htm", "yaml", "yml", "toml",
    "py", "rs", "js", "ts", "log", "tex",
];

/// Reads attachments from the local disk without a model.
///
/// Text files are described by their content, truncated. Anything else is
/// described by kind and size only.
pub struct LocalInspector {
    max_chars: usize,
}

impl Default for LocalInspector {
    fn default() -> Self {
        Self {
            max_chars: MAX_DESCRIPTION_CHARS,
        }
    }
}

impl LocalInspector {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn kind(ext: &str) -> &'static str {
    match ext {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tif" | "tiff" => "image",
        "mp3" | "wav" | "m4a" | "flac" | "ogg" => "audio",
        "mp4" | "mov" | "avi" | "mkv" | "webm" => "video",
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" => "document",
        _ => "binary",
    }
}

#[async_trait]
impl Inspector for LocalInspector {
    async fn describe(&self, path: &Path, _question: &str) -> Result<String> {
        let ext = extension(path);
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let total = content.chars().count();
            if total <= self.max_chars {
                return Ok(content);
            }
            let mut cut: String = content.chars().take(self.max_chars).collect();
            cut.push_str(&format!("\n[truncated: showing {} of {total} characters]", self.max_chars));
            return Ok(cut);
        }

        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to stat {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(format!(
            "{} file '{name}' ({} bytes); its content cannot be shown as text",
            kind(&ext),
            meta.len()
        ))
    }
}
