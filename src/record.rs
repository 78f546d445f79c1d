use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::item::WorkItem;

/// Outcome of processing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Failed => "failed",
        }
    }

    /// Read the `status` field of a persisted record.
    pub fn of(record: &Value) -> Option<Self> {
        match record.get("status")?.as_str()? {
            "success" => Some(Status::Success),
            "failed" => Some(Status::Failed),
            _ => None,
        }
    }
}

/// The persisted result of one item. Immutable once built.
///
/// Always carries `question`, `golden_answer` and `status`. A success merges
/// in whatever fields the processor produced; a failure carries `error` and
/// `error_trace` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRecord(Map<String, Value>);

impl ResultRecord {
    /// Merge processor output with the item's identity. The fixed keys
    /// overwrite any processor field of the same name.
    pub fn success(item: &WorkItem, output: Map<String, Value>) -> Self {
        let mut fields = output;
        Self::stamp(&mut fields, item, Status::Success);
        Self(fields)
    }

    pub fn failed(item: &WorkItem, error: impl Into<String>, trace: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }
        let mut trace = trace.into();
        if trace.trim().is_empty() {
            trace = error.clone();
        }

        let mut fields = Map::new();
        Self::stamp(&mut fields, item, Status::Failed);
        fields.insert("error".to_string(), Value::String(error));
        fields.insert("error_trace".to_string(), Value::String(trace));
        Self(fields)
    }

    /// A failed record from an error: the top-level message plus the
    /// debug rendering, which includes the cause chain and any backtrace.
    pub fn from_error(item: &WorkItem, err: &anyhow::Error) -> Self {
        Self::failed(item, err.to_string(), format!("{err:?}"))
    }

    fn stamp(fields: &mut Map<String, Value>, item: &WorkItem, status: Status) {
        fields.insert("question".to_string(), Value::String(item.question.clone()));
        fields.insert("golden_answer".to_string(), item.answer.clone());
        fields.insert(
            "status".to_string(),
            Value::String(status.as_str().to_string()),
        );
    }

    pub fn question(&self) -> &str {
        self.0
            .get("question")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    pub fn status(&self) -> Status {
        match self.0.get("status").and_then(|v| v.as_str()) {
            Some("success") => Status::Success,
            _ => Status::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Success
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> WorkItem {
        WorkItem::new("Q1", "A1")
    }

    #[test]
    fn success_merges_output() {
        let mut output = Map::new();
        output.insert("result".to_string(), json!("ok"));
        let record = ResultRecord::success(&item(), output);

        assert_eq!(record.question(), "Q1");
        assert_eq!(record.get("golden_answer"), Some(&json!("A1")));
        assert_eq!(record.get("status"), Some(&json!("success")));
        assert_eq!(record.get("result"), Some(&json!("ok")));
        assert!(record.is_success());
    }

    #[test]
    fn fixed_keys_override_output() {
        let mut output = Map::new();
        output.insert("question".to_string(), json!("rewritten"));
        output.insert("status".to_string(), json!("weird"));
        let record = ResultRecord::success(&item(), output);

        assert_eq!(record.question(), "Q1");
        assert_eq!(record.status(), Status::Success);
    }

    #[test]
    fn failed_carries_error_and_trace() {
        let record = ResultRecord::failed(&item(), "boom", "boom\n  at somewhere");
        assert_eq!(record.status(), Status::Failed);
        assert_eq!(record.get("error"), Some(&json!("boom")));
        assert!(record.get("error_trace").unwrap().as_str().unwrap().contains("somewhere"));
        assert!(record.get("result").is_none());
    }

    #[test]
    fn failed_never_has_empty_error_fields() {
        let record = ResultRecord::failed(&item(), "", "");
        assert_eq!(record.get("error"), Some(&json!("unknown error")));
        assert_eq!(record.get("error_trace"), Some(&json!("unknown error")));
    }

    #[test]
    fn from_error_includes_cause_chain() {
        let err = anyhow::anyhow!("socket closed").context("model call failed");
        let record = ResultRecord::from_error(&item(), &err);

        assert_eq!(record.get("error"), Some(&json!("model call failed")));
        let trace = record.get("error_trace").unwrap().as_str().unwrap();
        assert!(trace.contains("model call failed"));
        assert!(trace.contains("socket closed"));
    }

    #[test]
    fn serializes_as_flat_object() {
        let record = ResultRecord::failed(&item(), "boom", "trace");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["question"], "Q1");
        assert_eq!(json["status"], "failed");
    }

    #[test]
    fn status_of_reads_persisted_records() {
        assert_eq!(Status::of(&json!({"status": "success"})), Some(Status::Success));
        assert_eq!(Status::of(&json!({"status": "failed"})), Some(Status::Failed));
        assert_eq!(Status::of(&json!({"status": "maybe"})), None);
        assert_eq!(Status::of(&json!({})), None);
    }
}
