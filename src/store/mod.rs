//! On-disk record formats.
//!
//! Two encodings share one schema: a single JSON array document (`.json`)
//! and JSON lines (`.jsonl`, one object per line). Reading picks the
//! encoding from the extension and only sniffs the content when the
//! extension says nothing.

pub mod sink;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Physical layout of a record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One JSON array holding every record. Rewritten whole on append.
    Array,
    /// One JSON object per line. Append-only.
    Lines,
}

impl Encoding {
    /// The encoding named by the file extension, if it names one.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Encoding::Array),
            "jsonl" | "ndjson" => Some(Encoding::Lines),
            _ => None,
        }
    }

    /// Guess from content: a document starting with `[` is an array.
    pub fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('[') {
            Encoding::Array
        } else {
            Encoding::Lines
        }
    }

    /// Encoding used to read an existing file.
    pub fn detect(path: &Path, content: &str) -> Self {
        Self::from_extension(path).unwrap_or_else(|| Self::sniff(content))
    }

    /// Encoding used to write output. Only `.json` gets the array layout.
    pub fn for_output(path: &Path) -> Self {
        match Self::from_extension(path) {
            Some(Encoding::Array) => Encoding::Array,
            _ => Encoding::Lines,
        }
    }
}

/// Why a record file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON document {}: {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} must hold a top-level JSON array", .path.display())]
    NotArray { path: PathBuf },

    #[error("invalid JSON on line {line} of {}: {source}", .path.display())]
    Line {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {index} of {} has no string `question` field", .path.display())]
    MissingQuestion { path: PathBuf, index: usize },

    #[error("duplicate question in record {index} of {}: {question:?}", .path.display())]
    DuplicateQuestion {
        path: PathBuf,
        index: usize,
        question: String,
    },
}

impl LoadError {
    /// True when the file simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Read every record from `path`, in file order.
pub fn read_records(path: &Path) -> Result<Vec<Value>, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&content, Encoding::detect(path, &content), path)
}

/// Parse record content in the given encoding. Blank content is an empty
/// list in either encoding. `path` is only used for error messages.
pub fn parse_records(
    content: &str,
    encoding: Encoding,
    path: &Path,
) -> Result<Vec<Value>, LoadError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    match encoding {
        Encoding::Array => {
            let doc: Value = serde_json::from_str(content).map_err(|source| {
                LoadError::Document {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            match doc {
                Value::Array(records) => Ok(records),
                _ => Err(LoadError::NotArray {
                    path: path.to_path_buf(),
                }),
            }
        }
        Encoding::Lines => content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|source| LoadError::Line {
                    path: path.to_path_buf(),
                    line: i + 1,
                    source,
                })
            })
            .collect(),
    }
}
