//! Job document construction from solver templates.
//!
//! `getSolverTemplate` returns an XML job document in which every value to
//! fill is marked by [`PLACEHOLDER`]. For AMPL solvers the markers are, in
//! order: model, data, commands, comments.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{NeosError, NeosResult};

/// Marker the server puts where a value goes.
pub const PLACEHOLDER: &str = "...Insert Value Here...";

/// Something to put in place of one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadPart {
    /// Nothing (an unused optional file).
    Empty,
    /// Text used as-is.
    Literal(String),
    /// Contents of a file; failing to read it is an error.
    File(PathBuf),
    /// Contents of the file if this names a readable file, otherwise the text itself.
    Auto(String),
}

impl PayloadPart {
    /// `Auto` for `Some`, `Empty` for `None`.
    pub fn from_option(value: Option<impl Into<String>>) -> Self {
        value.map_or(PayloadPart::Empty, |v| PayloadPart::Auto(v.into()))
    }

    fn resolve(&self) -> NeosResult<Cow<'_, str>> {
        match self {
            PayloadPart::Empty => Ok(Cow::Borrowed("")),
            PayloadPart::Literal(text) => Ok(Cow::Borrowed(text)),
            PayloadPart::File(path) => Ok(Cow::Owned(std::fs::read_to_string(path)?)),
            PayloadPart::Auto(text) => {
                let path = Path::new(text);
                if path.is_file() {
                    if let Ok(contents) = std::fs::read_to_string(path) {
                        return Ok(Cow::Owned(contents));
                    }
                }
                Ok(Cow::Borrowed(text))
            }
        }
    }
}

impl From<&str> for PayloadPart {
    fn from(s: &str) -> Self {
        PayloadPart::Auto(s.to_string())
    }
}

impl From<String> for PayloadPart {
    fn from(s: String) -> Self {
        PayloadPart::Auto(s)
    }
}

/// Number of placeholders in `template`.
pub fn placeholder_count(template: &str) -> usize {
    template.matches(PLACEHOLDER).count()
}

/// Fill the placeholders of `template` with `parts`, in order.
///
/// Fails with [`NeosError::TemplateMismatch`] unless there is exactly one
/// part per placeholder.
pub fn build_submission_payload(template: &str, parts: &[PayloadPart]) -> NeosResult<String> {
    let segments: Vec<&str> = template.split(PLACEHOLDER).collect();
    let expected = segments.len() - 1;
    if parts.len() != expected {
        return Err(NeosError::TemplateMismatch {
            expected,
            actual: parts.len(),
        });
    }

    let mut payload = String::with_capacity(template.len());
    payload.push_str(segments[0]);
    for (part, segment) in parts.iter().zip(&segments[1..]) {
        payload.push_str(&part.resolve()?);
        payload.push_str(segment);
    }
    Ok(payload)
}
