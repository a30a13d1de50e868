use std::path::Path;

pub const WHEEL_EXTENSION: &str = "whl";

pub fn is_wheel_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(WHEEL_EXTENSION))
}

/// Directory names an installed wheel may have landed under, shortest first.
///
/// Wheel filenames are `name-version(-build)?-python-abi-platform.whl`, and
/// only the leading name is reliable. Candidates grow one dash-delimited
/// part at a time (`mypkg`, `mypkg-1.2.3`, ...) and never include the full
/// stem, which is never a package directory.
pub fn installed_name_candidates(file_name: &str) -> Vec<String> {
    let stem = file_name
        .strip_suffix(".whl")
        .or_else(|| file_name.strip_suffix(".WHL"))
        .unwrap_or(file_name);
    let parts: Vec<&str> = stem.split('-').collect();
    let mut candidates = Vec::new();
    let mut current = String::new();
    for part in parts.iter().take(parts.len().saturating_sub(1).max(1)) {
        if !current.is_empty() {
            current.push('-');
        }
        current.push_str(part);
        candidates.push(current.clone());
    }
    candidates
}
