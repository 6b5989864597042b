//! Job output types.
//!
//! NEOS delivers solver output in two ways: an intermediate stream read
//! incrementally by offset while the job runs, and a final result fetched
//! once after the job is `Done`.

use serde::{Deserialize, Serialize};

/// One slice of the intermediate output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultChunk {
    /// Output produced since the requested offset.
    pub text: String,
    /// Offset to request next time.
    pub offset: u64,
}

impl ResultChunk {
    /// Create a chunk.
    pub fn new(text: impl Into<String>, offset: u64) -> Self {
        Self {
            text: text.into(),
            offset,
        }
    }

    /// Check if the chunk carries no output.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Turn raw payload bytes into text, replacing invalid UTF-8.
pub fn payload_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}
