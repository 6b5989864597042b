//! Solver catalog introspection.
//!
//! The server describes its solver registry with colon-separated strings:
//! - `listSolversInCategory` returns `"solver:format"`
//! - `listAllSolvers` returns `"solver:category:format"`
//!
//! This module parses those entries and derives the index
//! `category → [solvers accepting a given input format]`. Nothing here
//! talks to the network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{NeosError, NeosResult};

/// Input format of AMPL-encoded models.
pub const AMPL: &str = "AMPL";

/// A solver category as listed by `listCategories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Short code, e.g. `"nco"`.
    pub code: String,
    /// Human-readable name, e.g. `"Nonlinearly Constrained Optimization"`.
    pub name: String,
}

impl Category {
    /// Label used by the reference client: `"Full Name (code)"`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.code)
    }
}

/// One solver of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverEntry {
    /// Solver name, e.g. `"SNOPT"`.
    pub name: String,
    /// Category code.
    pub category: String,
    /// Accepted input format, e.g. `"AMPL"`.
    pub input_format: String,
}

impl SolverEntry {
    /// Parse a `"solver:category:format"` entry.
    pub fn parse(entry: &str) -> NeosResult<Self> {
        match entry.split(':').collect::<Vec<_>>().as_slice() {
            [name, category, input_format] => Ok(Self {
                name: name.to_string(),
                category: category.to_string(),
                input_format: input_format.to_string(),
            }),
            _ => Err(NeosError::malformed(format!(
                "expected solver:category:format, got {entry:?}"
            ))),
        }
    }

    /// Parse a `"solver:format"` entry from a known category.
    pub fn parse_in_category(category: &str, entry: &str) -> NeosResult<Self> {
        match entry.split(':').collect::<Vec<_>>().as_slice() {
            [name, input_format] => Ok(Self {
                name: name.to_string(),
                category: category.to_string(),
                input_format: input_format.to_string(),
            }),
            _ => Err(NeosError::malformed(format!(
                "expected solver:format, got {entry:?}"
            ))),
        }
    }

    /// Check if the solver accepts `input_format`.
    pub fn accepts(&self, input_format: &str) -> bool {
        self.input_format == input_format
    }
}

/// Category → solver names, both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolverIndex {
    categories: BTreeMap<String, Vec<String>>,
}

impl SolverIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the solvers that accept `input_format`.
    pub fn for_format<'a>(
        solvers: impl IntoIterator<Item = &'a SolverEntry>,
        input_format: &str,
    ) -> Self {
        let mut index = Self::new();
        for solver in solvers {
            if solver.accepts(input_format) {
                index.insert(&solver.category, &solver.name);
            }
        }
        index
    }

    /// Make sure `category` is present, even with no solvers.
    pub fn ensure_category(&mut self, category: impl Into<String>) {
        self.categories.entry(category.into()).or_default();
    }

    /// Add a solver under a category. Duplicates are ignored.
    pub fn insert(&mut self, category: impl Into<String>, solver: impl Into<String>) {
        let solvers = self.categories.entry(category.into()).or_default();
        let solver = solver.into();
        if let Err(pos) = solvers.binary_search(&solver) {
            solvers.insert(pos, solver);
        }
    }

    /// Solvers of one category.
    pub fn solvers(&self, category: &str) -> &[String] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Check if a category lists a solver.
    pub fn contains(&self, category: &str, solver: &str) -> bool {
        self.solvers(category).iter().any(|s| s == solver)
    }

    /// Iterate over (category, solvers) pairs in category order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.categories.iter()
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Check if the index has no categories.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Distinct input formats, in the order they first appear.
pub fn input_formats<'a>(solvers: impl IntoIterator<Item = &'a SolverEntry>) -> Vec<String> {
    let mut formats: Vec<String> = Vec::new();
    for solver in solvers {
        if !formats.contains(&solver.input_format) {
            formats.push(solver.input_format.clone());
        }
    }
    formats
}
