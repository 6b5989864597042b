//! Client error types.
//!
//! Errors are categorized by who has to act on them:
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | **Transport** | `Transport`, `Http`, `MalformedResponse`, `Fault` | Caller decides; nothing retries automatically |
//! | **Liveness** | `NotConnected` | Reconnect |
//! | **Job-level** | `SubmissionRejected`, `UnknownStatus` | Fix input or inspect the job on the server |
//! | **Bounded wait** | `PollBudgetExhausted`, `Timeout`, `Cancelled` | The remote job keeps running; poll again later |
//! | **Input** | `TemplateMismatch`, `InvalidSolverTemplate`, `Unsupported`, `Io` | Fix input |
//! | **Config** | `Configuration` | Fix configuration |

use thiserror::Error;

use crate::job::JobId;

/// Errors that can occur while talking to the NEOS server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NeosError {
    // ── Transport errors ─────────────────────────────────────────────
    /// The endpoint could not be reached or the connection broke.
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP error (status {status}): {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// The response could not be decoded into the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The server returned an XML-RPC fault.
    #[error("Server fault {code}: {message}")]
    Fault {
        /// XML-RPC `faultCode`.
        code: i64,
        /// XML-RPC `faultString`.
        message: String,
    },

    // ── Liveness ─────────────────────────────────────────────────────
    /// The liveness check failed when the connection was opened.
    #[error("Not connected: NEOS server did not report itself alive")]
    NotConnected,

    // ── Job-level errors ─────────────────────────────────────────────
    /// The server refused the submission (job id 0).
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// The server reported a status outside `Waiting`/`Running`/`Done`.
    #[error("Unknown job status: {0:?}")]
    UnknownStatus(String),

    // ── Bounded wait ─────────────────────────────────────────────────
    /// The poll budget ran out before the job finished.
    #[error("Job {job} still pending after {polls} polls")]
    PollBudgetExhausted {
        /// Job that is still running remotely.
        job: JobId,
        /// Number of poll iterations performed.
        polls: u32,
    },

    /// The overall wait deadline passed before the job finished.
    #[error("Timeout waiting for job {job}")]
    Timeout {
        /// Job that is still running remotely.
        job: JobId,
    },

    /// Local polling was cancelled. The remote job is left running.
    #[error("Polling cancelled for job {job}; the job keeps running on the server")]
    Cancelled {
        /// Job that is still running remotely.
        job: JobId,
    },

    // ── Input errors ─────────────────────────────────────────────────
    /// The number of payload parts does not match the template.
    #[error("Template mismatch: need {expected}, got {actual}")]
    TemplateMismatch {
        /// Placeholders found in the template.
        expected: usize,
        /// Parts supplied by the caller.
        actual: usize,
    },

    /// The solver template has no placeholder to fill.
    #[error("Invalid solver template for {0}; check the category:solver:input combination")]
    InvalidSolverTemplate(String),

    /// No payload builder exists for this input format.
    #[error("Unsupported input format: {0}")]
    Unsupported(String),

    /// A local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Config errors ────────────────────────────────────────────────
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl NeosError {
    /// Returns `true` if the operation may succeed when tried again later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } | Self::PollBudgetExhausted { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The job left running on the server when a bounded wait ends early.
    pub fn orphaned_job(&self) -> Option<JobId> {
        match self {
            Self::PollBudgetExhausted { job, .. } | Self::Timeout { job } | Self::Cancelled { job } => {
                Some(*job)
            }
            _ => None,
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}

/// Result type for client operations.
pub type NeosResult<T> = Result<T, NeosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(NeosError::Timeout { job: JobId(7) }.is_transient());
        assert!(
            NeosError::Http {
                status: 503,
                message: "busy".into()
            }
            .is_transient()
        );
        assert!(
            !NeosError::Http {
                status: 404,
                message: "nope".into()
            }
            .is_transient()
        );
        assert!(!NeosError::SubmissionRejected("bad xml".into()).is_transient());
        assert!(!NeosError::NotConnected.is_transient());
    }

    #[test]
    fn test_template_mismatch_display() {
        let err = NeosError::TemplateMismatch {
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "Template mismatch: need 2, got 1");
    }

    #[test]
    fn test_orphaned_job() {
        assert_eq!(
            NeosError::Cancelled { job: JobId(42) }.orphaned_job(),
            Some(JobId(42))
        );
        assert_eq!(NeosError::NotConnected.orphaned_job(), None);
    }
}
