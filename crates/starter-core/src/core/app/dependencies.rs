//! Requirement discovery and synthesized `setup.py` handling shared by the
//! strategies.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;
use starter_domain::{merge_requirements, read_requirements_file, SetupScript, SETUP_FILE_NAME};

use super::change::root_matching_files;
use crate::tooling::report::Reporter;

/// Files at the app root that declare requirements.
pub const REQUIREMENT_FILTER: &str = "*requirement*";

/// Requirements declared by every `*requirement*` file at the root of
/// `folder`, de-duplicated in file-name order. Unreadable files are
/// reported and skipped.
///
/// # Errors
/// Returns an error only when the filter cannot be compiled.
pub fn requirement_dependencies(folder: &Path, reporter: &dyn Reporter) -> Result<Vec<String>> {
    let mut lists = Vec::new();
    for path in root_matching_files(folder, REQUIREMENT_FILTER, reporter)? {
        match read_requirements_file(&path) {
            Ok(list) => lists.push(list),
            Err(err) => reporter.error(&format!("skipping {}: {err:#}", path.display())),
        }
    }
    Ok(merge_requirements(lists))
}

/// A `setup.py` that exists for the duration of an install. Synthesized
/// files are removed on drop; pre-existing ones are left alone.
#[derive(Debug)]
pub struct SetupFile {
    path: PathBuf,
    synthesized: bool,
}

impl SetupFile {
    /// Use `folder/setup.py` if present, otherwise write `script` there.
    ///
    /// # Errors
    /// Returns an error when the script cannot be written.
    pub fn ensure(folder: &Path, script: &SetupScript) -> Result<Self> {
        let path = folder.join(SETUP_FILE_NAME);
        if path.is_file() {
            return Ok(Self {
                path,
                synthesized: false,
            });
        }
        let path = script.write_into(folder)?;
        Ok(Self {
            path,
            synthesized: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn synthesized(&self) -> bool {
        self.synthesized
    }
}

impl Drop for SetupFile {
    fn drop(&mut self) {
        if !self.synthesized {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.path.display(),
                %err,
                "cannot remove synthesized setup script"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tooling::report::MemoryReporter;
    use std::fs;

    #[test]
    fn merges_root_requirement_files_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("requirements.txt"), "requests\n# comment\nrich\n")
            .expect("req");
        fs::write(temp.path().join("requirements-dev.txt"), "rich\npytest\n").expect("dev");
        fs::create_dir_all(temp.path().join("nested")).expect("nested");
        fs::write(temp.path().join("nested").join("requirements.txt"), "ignored\n")
            .expect("nested req");

        let deps = requirement_dependencies(temp.path(), &*MemoryReporter::shared())
            .expect("deps");
        assert_eq!(deps, vec!["rich", "pytest", "requests"]);
    }

    #[test]
    fn synthesized_setup_file_is_removed_on_drop() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = {
            let setup = SetupFile::ensure(temp.path(), &SetupScript::default()).expect("ensure");
            assert!(setup.synthesized());
            assert!(setup.exists());
            setup.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn drop_tolerates_a_script_it_cannot_remove() {
        let temp = tempfile::tempdir().expect("tempdir");
        let setup = SetupFile::ensure(temp.path(), &SetupScript::default()).expect("ensure");
        let path = setup.path().to_path_buf();
        fs::remove_file(&path).expect("remove");
        fs::create_dir_all(path.join("blocker")).expect("dir in the way");

        drop(setup);
        assert!(path.join("blocker").is_dir());
    }

    #[test]
    fn existing_setup_file_is_left_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(SETUP_FILE_NAME);
        fs::write(&path, "from setuptools import setup\nsetup()\n").expect("setup");
        {
            let setup = SetupFile::ensure(temp.path(), &SetupScript::default()).expect("ensure");
            assert!(!setup.synthesized());
        }
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "from setuptools import setup\nsetup()\n"
        );
    }
}
