/// Core types and structures for the judging engine
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Generic message shown to end users in place of infrastructure diagnostics.
pub const PUBLIC_INTERNAL_ERROR_MESSAGE: &str = "judging failed, please retry";

/// A single input/expected-output pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    /// Data written to the program's stdin (may be empty)
    #[serde(default)]
    pub input: String,
    /// Output the program must produce, compared after normalization
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

fn default_fail_fast() -> bool {
    true
}

/// One submission to judge. Immutable once handed to the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JudgingRequest {
    pub source_code: String,
    pub language_id: String,
    /// Executed and reported in this order; diagnostics index from 1
    pub test_cases: Vec<TestCase>,
    /// Per-test wall-clock budget
    pub time_limit_ms: u64,
    /// Advisory unless the engine is configured to enforce it
    pub memory_limit_mb: u64,
    /// Stop at the first failing test case (default) or run all of them
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
}

impl JudgingRequest {
    pub fn new(
        language_id: impl Into<String>,
        source_code: impl Into<String>,
        test_cases: Vec<TestCase>,
    ) -> Self {
        Self {
            source_code: source_code.into(),
            language_id: language_id.into(),
            test_cases,
            time_limit_ms: 2_000,
            memory_limit_mb: 256,
            fail_fast: true,
        }
    }

    pub fn with_time_limit_ms(mut self, time_limit_ms: u64) -> Self {
        self.time_limit_ms = time_limit_ms;
        self
    }

    pub fn with_memory_limit_mb(mut self, memory_limit_mb: u64) -> Self {
        self.memory_limit_mb = memory_limit_mb;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Reject caller bugs before any workspace or process exists.
    pub fn validate(&self) -> Result<()> {
        if self.language_id.trim().is_empty() {
            return Err(JudgeError::InvalidRequest(
                "language_id must not be empty".to_string(),
            ));
        }
        if self.test_cases.is_empty() {
            return Err(JudgeError::InvalidRequest(
                "at least one test case is required".to_string(),
            ));
        }
        if self.time_limit_ms == 0 {
            return Err(JudgeError::InvalidRequest(
                "time_limit_ms must be positive".to_string(),
            ));
        }
        if self.memory_limit_mb == 0 {
            return Err(JudgeError::InvalidRequest(
                "memory_limit_mb must be positive".to_string(),
            ));
        }
        if let Some(position) = self
            .test_cases
            .iter()
            .position(|case| case.expected_output.trim().is_empty())
        {
            return Err(JudgeError::InvalidRequest(format!(
                "test case {} has an empty expected output",
                position + 1
            )));
        }
        Ok(())
    }
}

/// Why a single test case did not pass.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FailureKind {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "wrong_answer")]
    WrongAnswer,
    #[serde(rename = "runtime_error")]
    RuntimeError,
    #[serde(rename = "timeout")]
    Timeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::None => write!(f, "none"),
            FailureKind::WrongAnswer => write!(f, "wrong_answer"),
            FailureKind::RuntimeError => write!(f, "runtime_error"),
            FailureKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// Outcome of running the program against one test case.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCaseResult {
    /// 1-based position in the request
    pub index: usize,
    pub passed: bool,
    /// Program stdout, truncated for storage
    pub actual_output: String,
    pub execution_time_ms: u64,
    pub failure_kind: FailureKind,
    pub exit_code: Option<i32>,
    /// True when stdout was cut by either the capture or the storage bound
    #[serde(default)]
    pub output_truncated: bool,
    /// Truncated stderr, kept for runtime errors only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_output: Option<String>,
}

/// Final classification of a submission - STABLE TAXONOMY
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VerdictStatus {
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "wrong_answer")]
    WrongAnswer,
    #[serde(rename = "time_limit_exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "runtime_error")]
    RuntimeError,
    #[serde(rename = "compile_error")]
    CompileError,
    #[serde(rename = "internal_error")]
    InternalError,
}

impl VerdictStatus {
    /// Only infrastructure failures warrant operator attention.
    pub fn is_alert_worthy(self) -> bool {
        self == VerdictStatus::InternalError
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VerdictStatus::Accepted => "accepted",
            VerdictStatus::WrongAnswer => "wrong_answer",
            VerdictStatus::TimeLimitExceeded => "time_limit_exceeded",
            VerdictStatus::RuntimeError => "runtime_error",
            VerdictStatus::CompileError => "compile_error",
            VerdictStatus::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of judging one request. Owned by the caller after return.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JudgingVerdict {
    pub status: VerdictStatus,
    /// Shorter than the request's test cases when execution stopped early;
    /// empty for compile and internal errors
    pub test_results: Vec<TestCaseResult>,
    /// Maximum across test results
    pub total_execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_message: Option<String>,
}

impl JudgingVerdict {
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::InternalError,
            test_results: Vec::new(),
            total_execution_time_ms: 0,
            diagnostic_message: Some(message.into()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == VerdictStatus::Accepted
    }

    /// Copy safe to show end users: infrastructure details are replaced.
    pub fn public_view(&self) -> JudgingVerdict {
        let mut view = self.clone();
        if view.status == VerdictStatus::InternalError {
            view.diagnostic_message = Some(PUBLIC_INTERNAL_ERROR_MESSAGE.to_string());
        }
        view
    }
}

/// Custom error types for the judging engine
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid judging request: {0}")]
    InvalidRequest(String),

    #[error("Judging cancelled")]
    Cancelled,

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Toolchain program '{program}' for language '{language}' not found")]
    ToolchainMissing { language: String, program: String },

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JudgeError {
    /// Failures of the judging host rather than of the submission or caller.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            JudgeError::Workspace(_)
                | JudgeError::ToolchainMissing { .. }
                | JudgeError::Spawn { .. }
                | JudgeError::Process(_)
                | JudgeError::Io(_)
        )
    }
}

impl From<nix::errno::Errno> for JudgeError {
    fn from(err: nix::errno::Errno) -> Self {
        JudgeError::Process(err.to_string())
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, JudgeError>;
