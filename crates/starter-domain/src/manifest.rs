use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

/// Snapshot of an app folder: path relative to the folder (forward slashes)
/// mapped to the file's modification time in nanoseconds since the Unix epoch.
///
/// Keys are never absolute, so a stored manifest stays comparable after the
/// environment root moves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileManifest {
    entries: BTreeMap<String, u64>,
}

/// First difference found when comparing a fresh manifest to a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift<'a> {
    Modified { path: &'a str },
    Added { path: &'a str },
}

impl Drift<'_> {
    pub fn path(&self) -> &str {
        match self {
            Drift::Modified { path } | Drift::Added { path } => path,
        }
    }
}

impl FileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, relative: impl Into<String>, modified_nanos: u64) {
        let key = relative.into();
        debug_assert!(
            !Path::new(&key).is_absolute(),
            "manifest keys must be relative: {key}"
        );
        self.entries.insert(key, modified_nanos);
    }

    pub fn get(&self, relative: &str) -> Option<u64> {
        self.entries.get(relative).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Compare `self` (the current state) against `previous`.
    ///
    /// Only timestamp changes and new files count. A key present in
    /// `previous` but missing here is not drift: deleting a file does not
    /// force a reinstall on its own.
    pub fn first_drift<'a>(&'a self, previous: &FileManifest) -> Option<Drift<'a>> {
        for (path, modified) in &self.entries {
            match previous.entries.get(path) {
                Some(stored) if stored == modified => {}
                Some(_) => return Some(Drift::Modified { path: path.as_str() }),
                None => return Some(Drift::Added { path: path.as_str() }),
            }
        }
        None
    }
}

impl FromIterator<(String, u64)> for FileManifest {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Manifest key for `path` under `root`: the relative path joined with `/`.
///
/// Returns `None` when `path` does not live under `root` or is `root` itself.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
