//! Listing output.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use neos_client::SolverIndex;

/// Print method names with their help text, sorted by name.
pub fn print_methods<'a>(
    methods: impl IntoIterator<Item = (&'a String, &'a String)>,
    json: bool,
) -> Result<()> {
    let methods: BTreeMap<_, _> = methods.into_iter().collect();
    let mut out = std::io::stdout().lock();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&methods)?)?;
        return Ok(());
    }
    for (name, help) in methods {
        writeln!(out, "{name}\n{help}\n")?;
    }
    Ok(())
}

/// Print `category → solvers`.
pub fn print_index(index: &SolverIndex, json: bool) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(index)?)?;
        return Ok(());
    }
    for (category, solvers) in index.iter() {
        writeln!(out, "{category}\n  {}\n", solvers.join(" "))?;
    }
    Ok(())
}
