use std::time::Duration;

use thiserror::Error;

use crate::llm::prompts::TemplateKind;

/// Transport-level faults from the generation service.
///
/// These are recoverable communication failures, distinct from content
/// faults: `ServiceUnavailable` and `RateLimited` are retried transparently
/// inside the client adapter before they ever reach the pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("generation request timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation service unavailable (status {status})")]
    ServiceUnavailable { status: u16 },

    #[error("generation service rate limited")]
    RateLimited,

    #[error("transport failure: {0}")]
    Unknown(String),
}

impl TransportError {
    /// Transient faults are retried by the client adapter; everything else
    /// surfaces immediately and consumes a pipeline attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::ServiceUnavailable { .. } | TransportError::RateLimited
        )
    }
}

/// Failures to locate or parse a JSON payload in a raw response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("no JSON object or array found in response")]
    NoJsonFound,

    #[error("malformed JSON at offset {position}: {detail}")]
    MalformedJson { position: usize, detail: String },
}

/// Classification of a single validation or reconciliation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    MissingField,
    TypeMismatch,
    EnumViolation,
    SumMismatch,
    OutOfRange,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IssueKind::MissingField => "missing field",
            IssueKind::TypeMismatch => "type mismatch",
            IssueKind::EnumViolation => "enum violation",
            IssueKind::SumMismatch => "sum mismatch",
            IssueKind::OutOfRange => "out of range",
        };
        f.write_str(name)
    }
}

/// One structural, typal, or semantic mismatch in a candidate response.
///
/// The `detail` text is written for two audiences: operator logs, and the
/// corrective clause of a repair prompt. It is never shown to end users.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub field_path: String,
    pub kind: IssueKind,
    pub detail: String,
}

impl ValidationIssue {
    pub fn new(field_path: impl Into<String>, kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at `{}`: {}", self.kind, self.field_path, self.detail)
    }
}

/// What went wrong on one pipeline attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptFault {
    Transport(TransportError),
    Decode(DecodeError),
    Validation(Vec<ValidationIssue>),
}

/// One entry in the ordered issue history attached to a terminal failure.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    /// 1-based attempt number this fault occurred on.
    pub attempt: u32,
    pub fault: AttemptFault,
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.fault {
            AttemptFault::Transport(e) => write!(f, "attempt {}: {}", self.attempt, e),
            AttemptFault::Decode(e) => write!(f, "attempt {}: {}", self.attempt, e),
            AttemptFault::Validation(issues) => {
                let summary: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
                write!(f, "attempt {}: {}", self.attempt, summary.join("; "))
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum BudgetAdvisorError {
    #[error("missing template field '{field}' for {template:?} prompt")]
    TemplateFieldMissing {
        template: TemplateKind,
        field: String,
    },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("generation pipeline failed after {attempts} attempt(s)")]
    PipelineFailed {
        attempts: u32,
        failures: Vec<AttemptFailure>,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BudgetAdvisorError>;
