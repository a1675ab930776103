use serde::{Deserialize, Serialize};

/// A request to execute a piece of source code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Source text as submitted
    #[serde(rename = "sourceText")]
    pub source: String,

    /// Language ID (a key of the configured languages)
    #[serde(rename = "languageTag")]
    pub language: String,

    /// Text written to the program's standard input, then closed
    #[serde(default)]
    pub stdin: Option<String>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language: language.into(),
            stdin: None,
        }
    }

    /// Attach standard input
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }
}

/// Response returned for every request, whatever happened to the job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    /// Program output with performance markers removed. Empty unless the
    /// program exited with code 0.
    pub output: String,

    /// Human readable failure description, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,

    /// Execution time in seconds
    pub execution_time_seconds: f64,

    /// Memory usage in megabytes (0 when the program did not report it)
    pub memory_megabytes: f64,

    /// Heuristic feedback about the source, computed after the job finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl ExecutionResponse {
    /// Response for a job that failed before or while running
    pub fn failure(errors: impl Into<String>, execution_time_seconds: f64) -> Self {
        Self {
            output: String::new(),
            errors: Some(errors.into()),
            execution_time_seconds,
            memory_megabytes: 0.0,
            feedback: None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_none()
    }
}

/// Feedback produced by a [`FeedbackAnalyzer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Complexity classification (e.g. "O(n)")
    pub complexity: String,

    /// Style notes
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Source analysis that runs beside execution
///
/// Implementations are called once per job, after the job has finished, and
/// must be pure functions of their arguments.
pub trait FeedbackAnalyzer: Send + Sync + std::fmt::Debug {
    fn analyze(&self, source: &str, language: &str) -> Option<Feedback>;
}

/// Analyzer that never produces feedback
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl FeedbackAnalyzer for NoFeedback {
    fn analyze(&self, _source: &str, _language: &str) -> Option<Feedback> {
        None
    }
}
