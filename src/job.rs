//! Job lifecycle types.
//!
//! The job state machine, as observed by polling:
//!
//! ```text
//!   submit() ──→ Waiting ──→ Running ──→ Done ──→ getFinalResults
//!                   │           │
//!                   └───────────┴──→ Unknown(raw)  (error, never treated as Done)
//! ```
//!
//! **Invariants:**
//! - A [`Job`] only exists for a submission that returned a non-zero id.
//! - The status is authoritative from the server; the client never advances it.
//! - `result_offset` never decreases.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned job number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Per-job password returned by `submitJob`.
///
/// Required for every later call on the job. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct JobCredential(String);

impl JobCredential {
    /// Wrap a password returned by the server.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw password, for sending back to the server.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for JobCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JobCredential(***)")
    }
}

/// Status of a job as reported by `getJobStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Job is waiting in the server queue.
    Waiting,
    /// Job is running on a solver station.
    Running,
    /// Job finished; final results are available.
    Done,
    /// Anything else the server sent, kept verbatim.
    Unknown(String),
}

impl JobStatus {
    /// Parse the raw status string sent by the server.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Waiting" => Self::Waiting,
            "Running" => Self::Running,
            "Done" => Self::Done,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    /// Check if the job is still pending (waiting or running).
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Waiting | JobStatus::Running)
    }

    /// Check if final results can be fetched.
    pub fn is_done(&self) -> bool {
        matches!(self, JobStatus::Done)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "Waiting"),
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Done => write!(f, "Done"),
            JobStatus::Unknown(raw) => write!(f, "Unknown: {raw}"),
        }
    }
}

/// One submitted unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    /// Server-assigned id, never zero.
    pub id: JobId,
    /// Password for all subsequent calls on this job.
    pub credential: JobCredential,
    /// Last status seen from the server.
    pub status: JobStatus,
    /// Position in the intermediate output stream already delivered.
    pub result_offset: u64,
    /// When the submission was accepted, local clock.
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    /// A freshly accepted job: `Waiting`, nothing delivered yet.
    pub fn submitted(id: JobId, credential: JobCredential) -> Self {
        Self {
            id,
            credential,
            status: JobStatus::Waiting,
            result_offset: 0,
            submitted_at: Utc::now(),
        }
    }

    /// Record a new offset reported by the server.
    ///
    /// Returns `false` (and keeps the current offset) if the server tried to
    /// move it backwards.
    pub fn advance_offset(&mut self, offset: u64) -> bool {
        if offset < self.result_offset {
            return false;
        }
        self.result_offset = offset;
        true
    }

    /// Time since submission as of `now`. Never negative.
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        (now - self.submitted_at).max(TimeDelta::zero())
    }
}

/// Queue selection for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Short queue: quick jobs, strict time limit.
    Short,
    /// Long queue: the server default.
    Long,
}

impl Priority {
    /// Wire name understood by the server.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Short => "short",
            Priority::Long => "long",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(Priority::Short),
            "long" => Ok(Priority::Long),
            other => Err(format!("unknown priority {other:?} (expected short or long)")),
        }
    }
}

/// Recognized submission options. Every field defaults to "let the server decide".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOptions {
    /// Queue to submit to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Address notified by email when the job finishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Submitting user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl SubmitOptions {
    /// True when nothing beyond the payload needs to be sent.
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.email.is_none() && self.user.is_none()
    }

    /// Set the queue priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the notification address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the submitting user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set fields as `(name, value)` pairs, in wire order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(priority) = self.priority {
            fields.push(("priority", priority.as_str().to_string()));
        }
        if let Some(email) = &self.email {
            fields.push(("email", email.clone()));
        }
        if let Some(user) = &self.user {
            fields.push(("user", user.clone()));
        }
        fields
    }
}
