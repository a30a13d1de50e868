use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Requirement lines declared in a requirements file.
///
/// Blank lines and comments are dropped, inline comments (` # ...`) are
/// stripped, and the remaining lines are passed through untouched so the
/// package installer sees exactly what the author wrote.
pub fn parse_requirements(contents: &str) -> Vec<String> {
    let mut specs = Vec::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut spec = trimmed;
        if let Some(idx) = trimmed.find(" #") {
            spec = trimmed[..idx].trim();
        }
        if !spec.is_empty() {
            specs.push(spec.to_string());
        }
    }
    specs
}

/// Read and parse a requirements file.
///
/// # Errors
///
/// Returns an error when the file cannot be read as UTF-8 text.
pub fn read_requirements_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read requirements from {}", path.display()))?;
    Ok(parse_requirements(&contents))
}

/// Merge several requirement lists, keeping the first occurrence of each line.
pub fn merge_requirements<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for list in lists {
        for spec in list {
            if seen.insert(spec.clone()) {
                merged.push(spec);
            }
        }
    }
    merged
}
