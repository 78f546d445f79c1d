//! Serialized, crash-safe appends to the output store.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::Encoding;
use crate::record::ResultRecord;

/// Appends result records to one output file.
///
/// Safe to share between tasks: every append runs inside a single critical
/// section, whichever encoding the file uses. Line files are appended to.
/// Array files are read, extended, written to a temp file next to the
/// destination and renamed over it, so a reader only ever sees the old
/// complete document or the new one.
pub struct ResultSink {
    path: PathBuf,
    encoding: Encoding,
    lock: Mutex<()>,
}

impl ResultSink {
    /// Open a sink for `path`, creating missing parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = parent_dir(&path) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Ok(Self {
            encoding: Encoding::for_output(&path),
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Persist one record. An error here means the record is NOT on disk.
    pub fn append(&self, record: &ResultRecord) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("result sink lock poisoned"))?;

        let written = match self.encoding {
            Encoding::Lines => self.append_line(record),
            Encoding::Array => self.replace_array(record),
        };
        written.with_context(|| format!("failed to append result to {}", self.path.display()))
    }

    fn append_line(&self, record: &ResultRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        // A crash can leave the last line unterminated; never glue onto it.
        if ends_mid_line(&mut file)? {
            warn!(path = %self.path.display(), "terminating partial last line");
            line.insert(0, '\n');
        }
        // One write per record keeps lines whole.
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn replace_array(&self, record: &ResultRecord) -> Result<()> {
        let mut records = self.read_existing()?;
        records.push(serde_json::to_value(record)?);

        let staged = self.stage(&records)?;
        staged
            .persist(&self.path)
            .map_err(|e| e.error)
            .context("atomic rename failed")?;
        sync_dir(parent_dir(&self.path).unwrap_or(Path::new(".")));

        debug!(records = records.len(), path = %self.path.display(), "array store replaced");
        Ok(())
    }

    /// Current array contents. Missing, blank or unparsable files count as
    /// empty; other read failures are errors.
    fn read_existing(&self) -> Result<Vec<Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    "existing output is not a JSON array ({e}); starting a new one"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Write the full document to a temp file in the destination directory.
    /// Nothing touches the destination until the returned file is persisted;
    /// dropping it instead removes the temp file.
    fn stage(&self, records: &[Value]) -> Result<NamedTempFile> {
        let dir = parent_dir(&self.path).unwrap_or(Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".quarry-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;

        let mut buf = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        records.serialize(&mut ser)?;

        tmp.write_all(&buf)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}

/// True when the file is non-empty and its last byte is not a newline.
fn ends_mid_line(file: &mut fs::File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Make a rename in `dir` durable. Best effort.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir)
        && let Err(e) = handle.sync_all()
    {
        debug!(dir = %dir.display(), "directory sync failed: {e}");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::WorkItem;
    use crate::store::read_records;
    use serde_json::{Map, json};
    use std::sync::Arc;

    fn record(q: &str) -> ResultRecord {
        let mut output = Map::new();
        output.insert("result".to_string(), json!("ok"));
        ResultRecord::success(&WorkItem::new(q, "A"), output)
    }

    #[test]
    fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("mm").join("out.jsonl");
        let sink = ResultSink::open(&path).unwrap();
        sink.append(&record("Q1")).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn encoding_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            ResultSink::open(dir.path().join("a.json")).unwrap().encoding(),
            Encoding::Array
        );
        assert_eq!(
            ResultSink::open(dir.path().join("a.jsonl")).unwrap().encoding(),
            Encoding::Lines
        );
    }

    #[test]
    fn lines_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let sink = ResultSink::open(&path).unwrap();
        sink.append(&record("Q1")).unwrap();
        sink.append(&record("Q2")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
        let records = read_records(&path).unwrap();
        assert_eq!(records[0]["question"], "Q1");
        assert_eq!(records[1]["question"], "Q2");
    }

    #[test]
    fn lines_never_rewrite_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let prior = "{\"question\":\"old\",\"status\":\"failed\"}\n";
        fs::write(&path, prior).unwrap();

        let sink = ResultSink::open(&path).unwrap();
        sink.append(&record("Q1")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(prior));
    }

    #[test]
    fn unterminated_last_line_is_not_glued() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        fs::write(&path, "{\"question\":\"Q1\",\"status\":\"success\"}").unwrap();

        let sink = ResultSink::open(&path).unwrap();
        sink.append(&record("Q2")).unwrap();
        sink.append(&record("Q3")).unwrap();

        let records = read_records(&path).unwrap();
        let questions: Vec<_> = records.iter().map(|r| r["question"].clone()).collect();
        assert_eq!(questions, vec![json!("Q1"), json!("Q2"), json!("Q3")]);
        assert!(!fs::read_to_string(&path).unwrap().contains("\n\n"));
    }

    #[test]
    fn array_grows_and_stays_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let sink = ResultSink::open(&path).unwrap();

        for q in ["Q1", "Q2", "Q3"] {
            sink.append(&record(q)).unwrap();
            let doc: Vec<Value> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
            assert_eq!(doc.last().unwrap()["question"], q);
        }
        assert_eq!(read_records(&path).unwrap().len(), 3);
    }

    #[test]
    fn array_uses_four_space_indent_and_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let sink = ResultSink::open(&path).unwrap();
        sink.append(&record("天气如何")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n    {"));
        assert!(content.contains("天气如何"));
    }

    #[test]
    fn array_replaces_unparsable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, "[{\"question\": ").unwrap();

        let sink = ResultSink::open(&path).unwrap();
        sink.append(&record("Q1")).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn fault_before_rename_leaves_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let sink = ResultSink::open(&path).unwrap();
        sink.append(&record("Q1")).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        // Stage the next document, then "crash" before persisting it.
        let mut records = sink.read_existing().unwrap();
        records.push(serde_json::to_value(record("Q2")).unwrap());
        let staged = sink.stage(&records).unwrap();
        let staged_path = staged.path().to_path_buf();
        assert!(staged_path.exists());
        drop(staged);

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["question"], "Q1");
        assert!(!staged_path.exists());
    }

    #[test]
    fn staged_file_lives_next_to_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        let sink = ResultSink::open(&path).unwrap();
        let staged = sink.stage(&[]).unwrap();
        assert_eq!(staged.path().parent(), path.parent());
    }

    #[test]
    fn array_replace_syncs_directory_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let path = nested.join("out.json");
        let sink = ResultSink::open(&path).unwrap();
        sink.append(&record("Q1")).unwrap();
        sink.append(&record("Q2")).unwrap();

        let names: Vec<_> = fs::read_dir(&nested)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["out.json"]);
        assert_eq!(read_records(&path).unwrap().len(), 2);

        // A directory that cannot be opened is not an error.
        sync_dir(&dir.path().join("missing"));
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        for name in ["out.jsonl", "out.json"] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(name);
            let sink = Arc::new(ResultSink::open(&path).unwrap());

            let handles: Vec<_> = (0..8)
                .map(|t| {
                    let sink = Arc::clone(&sink);
                    std::thread::spawn(move || {
                        for i in 0..10 {
                            sink.append(&record(&format!("T{t}-{i}"))).unwrap();
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }

            let records = read_records(&path).unwrap();
            assert_eq!(records.len(), 80, "{name}");
            let mut questions: Vec<_> = records
                .iter()
                .map(|r| r["question"].as_str().unwrap().to_string())
                .collect();
            questions.sort();
            questions.dedup();
            assert_eq!(questions.len(), 80, "{name}");
        }
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let sink = ResultSink::open(&path).unwrap();
        sink.append(&record("Q1")).unwrap();
        sink.append(&record("Q2")).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["out.json".to_string()]);
    }
}
