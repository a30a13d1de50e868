//! Modification-time manifests over filtered parts of an app folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use anyhow::{anyhow, Result};
use starter_domain::{relative_key, Drift, FileManifest};
use walkdir::WalkDir;
use wax::{CandidatePath, Glob, Pattern};

use crate::tooling::report::Reporter;

/// Files under `folder` whose forward-slash relative path matches any of
/// `filters`, sorted by path. Unreadable entries are reported and skipped.
pub(crate) fn matching_files(
    folder: &Path,
    filters: &[&str],
    reporter: &dyn Reporter,
) -> Result<Vec<(PathBuf, String)>> {
    let globs = filters
        .iter()
        .map(|filter| compile_filter(filter))
        .collect::<Result<Vec<_>>>()?;
    let mut matches = Vec::new();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                reporter.warn(&format!("skipping unreadable entry under {}: {err}", folder.display()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(relative) = relative_key(folder, entry.path()) else {
            continue;
        };
        let candidate = CandidatePath::from(relative.as_str());
        if globs.iter().any(|glob| glob.matched(&candidate).is_some()) {
            matches.push((entry.into_path(), relative));
        }
    }
    Ok(matches)
}

/// Files directly inside `folder` whose name matches `filter`, sorted by
/// name. Subfolders are never entered.
pub(crate) fn root_matching_files(
    folder: &Path,
    filter: &str,
    reporter: &dyn Reporter,
) -> Result<Vec<PathBuf>> {
    let glob = compile_filter(filter)?;
    Ok(root_files(folder, reporter)
        .into_iter()
        .filter(|path| {
            path.file_name().is_some_and(|name| {
                let name = name.to_string_lossy();
                glob.matched(&CandidatePath::from(name.as_ref())).is_some()
            })
        })
        .collect())
}

/// Regular files directly inside `folder`, sorted by name.
pub(crate) fn root_files(folder: &Path, reporter: &dyn Reporter) -> Vec<PathBuf> {
    if !folder.is_dir() {
        return Vec::new();
    }
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| {
            entry
                .map_err(|err| {
                    reporter.warn(&format!("skipping unreadable entry under {}: {err}", folder.display()));
                })
                .ok()
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn compile_filter(filter: &str) -> Result<Glob<'_>> {
    Glob::new(filter).map_err(|err| anyhow!("invalid file filter {filter:?}: {err}"))
}

/// Snapshots and diffs [`FileManifest`]s.
#[derive(Clone)]
pub struct ChangeDetector {
    reporter: Arc<dyn Reporter>,
}

impl ChangeDetector {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }

    /// Modification times of every file under `folder` matching `filters`.
    /// A missing folder gives an empty manifest.
    ///
    /// # Errors
    /// Returns an error only for a malformed filter.
    pub fn snapshot(&self, folder: &Path, filters: &[&str]) -> Result<FileManifest> {
        let mut manifest = FileManifest::new();
        if !folder.is_dir() {
            return Ok(manifest);
        }
        for (path, relative) in matching_files(folder, filters, self.reporter.as_ref())? {
            match modified_nanos(&path) {
                Ok(nanos) => manifest.insert(relative, nanos),
                Err(err) => self
                    .reporter
                    .warn(&format!("cannot read modification time of {}: {err}", path.display())),
            }
        }
        Ok(manifest)
    }

    /// Whether `folder` drifted from `previous`. No previous manifest means
    /// changed whenever the folder exists. Deleted files are not drift.
    ///
    /// # Errors
    /// Returns an error only for a malformed filter.
    pub fn changed(
        &self,
        previous: Option<&FileManifest>,
        folder: &Path,
        filters: &[&str],
    ) -> Result<bool> {
        let Some(previous) = previous else {
            return Ok(folder.is_dir());
        };
        let current = self.snapshot(folder, filters)?;
        let Some(drift) = current.first_drift(previous) else {
            return Ok(false);
        };
        let what = match drift {
            Drift::Modified { .. } => "modified",
            Drift::Added { .. } => "added",
        };
        self.reporter
            .info(&format!("{} was {what} since the last run", drift.path()));
        Ok(true)
    }
}

fn modified_nanos(path: &Path) -> std::io::Result<u64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    Ok(u64::try_from(nanos).unwrap_or(u64::MAX))
}
