use serde_json::Value;

/// One unit of work: a question, its reference answer, and maybe an attachment.
///
/// Only the fields the runner reads are kept. Everything else in the input
/// record is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// The question text. Doubles as the dedup key on resume.
    pub question: String,
    /// Reference answer, carried through to the result untouched.
    pub answer: Value,
    /// Path to an attached file or `.zip` archive.
    pub file_name: Option<String>,
}

impl WorkItem {
    pub fn new(question: impl Into<String>, answer: impl Into<Value>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            file_name: None,
        }
    }

    pub fn with_attachment(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Build an item from a raw JSON record.
    ///
    /// Returns `None` when the record is not an object or has no string
    /// `question`. The reference answer is read from `answer`, falling back to
    /// `golden_answer` so that output files can be fed back in as input. An
    /// empty `file_name` counts as no attachment.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let question = obj.get("question")?.as_str()?.to_string();
        let answer = obj
            .get("answer")
            .or_else(|| obj.get("golden_answer"))
            .cloned()
            .unwrap_or(Value::Null);
        let file_name = obj
            .get("file_name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);

        Some(Self {
            question,
            answer,
            file_name,
        })
    }
}
