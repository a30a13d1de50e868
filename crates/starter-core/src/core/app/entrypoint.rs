use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use regex::Regex;
use walkdir::WalkDir;

use super::change::matching_files;
use crate::tooling::report::Reporter;

/// The `if __name__ == "__main__":` guard that marks a runnable script.
pub const ENTRY_POINT_MARKER: &str = r#"if\s+__name__\s*==\s*['"]__main__['"]"#;

const SOURCE_FILTER: &str = "**/*.py";

/// Finds the scripts an app can be started from.
#[derive(Clone)]
pub struct EntryPointLocator {
    reporter: Arc<dyn Reporter>,
    marker: Regex,
}

impl EntryPointLocator {
    /// # Errors
    /// Returns an error if the marker pattern fails to compile.
    pub fn new(reporter: Arc<dyn Reporter>) -> Result<Self> {
        Ok(Self {
            reporter,
            marker: Regex::new(ENTRY_POINT_MARKER)?,
        })
    }

    /// Candidate entry points under `folder`.
    ///
    /// With `override_name` every file carrying that name (ignoring ASCII
    /// case) is a candidate and contents are not inspected. Without it,
    /// every source file containing the marker is. An empty set is a normal
    /// result.
    ///
    /// # Errors
    /// Returns an error only when the source filter cannot be compiled.
    pub fn find(&self, folder: &Path, override_name: Option<&str>) -> Result<BTreeSet<PathBuf>> {
        if !folder.is_dir() {
            return Ok(BTreeSet::new());
        }
        match override_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => Ok(self.find_by_name(folder, name)),
            None => self.find_by_marker(folder),
        }
    }

    fn find_by_name(&self, folder: &Path, name: &str) -> BTreeSet<PathBuf> {
        let mut found = BTreeSet::new();
        for entry in WalkDir::new(folder) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file()
                        && entry.file_name().to_string_lossy().eq_ignore_ascii_case(name)
                    {
                        found.insert(entry.into_path());
                    }
                }
                Err(err) => self.reporter.warn(&format!("skipping unreadable entry: {err}")),
            }
        }
        found
    }

    fn find_by_marker(&self, folder: &Path) -> Result<BTreeSet<PathBuf>> {
        let mut found = BTreeSet::new();
        for (path, _) in matching_files(folder, &[SOURCE_FILTER], self.reporter.as_ref())? {
            match std::fs::read(&path) {
                Ok(bytes) => {
                    if self.marker.is_match(&String::from_utf8_lossy(&bytes)) {
                        found.insert(path);
                    }
                }
                Err(err) => self
                    .reporter
                    .error(&format!("cannot scan {} for an entry point: {err}", path.display())),
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tooling::report::MemoryReporter;
    use std::fs;

    fn locator() -> EntryPointLocator {
        EntryPointLocator::new(MemoryReporter::shared()).expect("locator")
    }

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent");
        }
        fs::write(path, contents).expect("write");
    }

    #[test]
    fn finds_scripts_with_the_main_guard() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(&temp.path().join("run.py"), "if __name__ == \"__main__\":\n    main()\n");
        write(&temp.path().join("pkg").join("cli.py"), "if __name__=='__main__': go()\n");
        write(&temp.path().join("pkg").join("lib.py"), "def main():\n    pass\n");
        write(&temp.path().join("notes.txt"), "if __name__ == '__main__':\n");

        let found = locator().find(temp.path(), None).expect("find");
        assert_eq!(
            found,
            BTreeSet::from([temp.path().join("pkg").join("cli.py"), temp.path().join("run.py")])
        );
    }

    #[test]
    fn override_name_is_authoritative() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(&temp.path().join("a").join("Start.py"), "print('no guard')\n");
        write(&temp.path().join("b").join("start.py"), "print('no guard either')\n");
        write(&temp.path().join("main.py"), "if __name__ == '__main__':\n    pass\n");

        let found = locator().find(temp.path(), Some("start.py")).expect("find");
        assert_eq!(
            found,
            BTreeSet::from([
                temp.path().join("a").join("Start.py"),
                temp.path().join("b").join("start.py"),
            ])
        );
    }

    #[test]
    fn blank_override_falls_back_to_marker_scan() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(&temp.path().join("main.py"), "if __name__ == '__main__':\n    pass\n");
        let found = locator().find(temp.path(), Some("  ")).expect("find");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn empty_or_missing_folder_gives_empty_set() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(locator().find(temp.path(), None).expect("find").is_empty());
        assert!(locator()
            .find(&temp.path().join("missing"), None)
            .expect("find")
            .is_empty());
    }

    #[test]
    fn non_utf8_sources_are_still_scanned() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("legacy.py");
        let mut bytes = b"# caf\xe9\n".to_vec();
        bytes.extend_from_slice(b"if __name__ == '__main__':\n    pass\n");
        fs::write(&path, bytes).expect("write");
        assert!(locator().find(temp.path(), None).expect("find").contains(&path));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_logged_and_skipped() {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempfile::tempdir().expect("tempdir");
        let locked = temp.path().join("locked.py");
        write(&locked, "if __name__ == '__main__':\n    pass\n");
        write(&temp.path().join("ok.py"), "if __name__ == '__main__':\n    pass\n");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
        if fs::read(&locked).is_ok() {
            // running as root; permissions are not enforced
            return;
        }

        let reporter = MemoryReporter::shared();
        let found = EntryPointLocator::new(reporter.clone())
            .expect("locator")
            .find(temp.path(), None)
            .expect("find");
        assert_eq!(found, BTreeSet::from([temp.path().join("ok.py")]));
        assert!(reporter.contains(tracing::Level::ERROR, "locked.py"));
    }
}
