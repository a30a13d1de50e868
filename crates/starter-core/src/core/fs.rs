use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Give the owner write access across `path` so the tree can be deleted;
/// pip leaves read-only files inside venvs. Links are not followed. Failures
/// are left for the removal itself to report.
fn grant_owner_write(path: &Path) {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if meta.file_type().is_symlink() {
        return;
    }
    let granted = with_owner_write(meta.permissions(), meta.is_dir());
    if granted != meta.permissions() {
        if let Err(err) = fs::set_permissions(path, granted) {
            debug!(path = %path.display(), %err, "cannot grant write access");
        }
    }
    if !meta.is_dir() {
        return;
    }
    let Ok(entries) = fs::read_dir(path) else {
        return;
    };
    for entry in entries.flatten() {
        grant_owner_write(&entry.path());
    }
}

#[cfg(unix)]
fn with_owner_write(perms: fs::Permissions, is_dir: bool) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    // directories also need search and list rights to be emptied
    let owner = if is_dir { 0o700 } else { 0o200 };
    fs::Permissions::from_mode(perms.mode() | owner)
}

#[cfg(not(unix))]
fn with_owner_write(mut perms: fs::Permissions, _is_dir: bool) -> fs::Permissions {
    perms.set_readonly(false);
    perms
}

/// Remove a file, symlink or directory tree. Missing paths are fine.
pub(crate) fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err).with_context(|| format!("failed to stat {}", path.display())),
    };
    if meta.is_dir() && !meta.file_type().is_symlink() {
        grant_owner_write(path);
        fs::remove_dir_all(path).with_context(|| format!("failed to remove {}", path.display()))?;
    } else {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Copy `src` into `dst`, merging into an existing directory and replacing
/// existing files.
pub(crate) fn copy_into(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        fs_err::create_dir_all(dst)?;
        for entry in fs_err::read_dir(src)? {
            let entry = entry?;
            copy_into(&entry.path(), &dst.join(entry.file_name()))?;
        }
        return Ok(());
    }
    if dst.exists() {
        remove_path(dst)?;
    }
    fs_err::copy(src, dst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_into_merges_directories_and_replaces_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("data")).expect("src");
        fs::create_dir_all(dst.join("data")).expect("dst");
        fs::write(src.join("data").join("a.txt"), "new").expect("a");
        fs::write(dst.join("data").join("a.txt"), "old").expect("old a");
        fs::write(dst.join("data").join("b.txt"), "keep").expect("b");

        copy_into(&src.join("data"), &dst.join("data")).expect("copy");
        assert_eq!(
            fs::read_to_string(dst.join("data").join("a.txt")).expect("read"),
            "new"
        );
        assert!(dst.join("data").join("b.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn remove_path_handles_read_only_trees() {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempfile::tempdir().expect("tempdir");
        let tree = temp.path().join("venv");
        fs::create_dir_all(tree.join("lib")).expect("tree");
        let file = tree.join("lib").join("locked.py");
        fs::write(&file, "x").expect("file");
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).expect("chmod file");
        fs::set_permissions(tree.join("lib"), fs::Permissions::from_mode(0o555)).expect("chmod");

        remove_path(&tree).expect("remove");
        assert!(!tree.exists());
        remove_path(&tree).expect("missing is fine");
    }

    #[cfg(unix)]
    #[test]
    fn granting_write_keeps_other_mode_bits() {
        use std::os::unix::fs::PermissionsExt;
        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").expect("script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o555)).expect("chmod");

        grant_owner_write(temp.path());
        let mode = fs::metadata(&script).expect("meta").permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }
}
