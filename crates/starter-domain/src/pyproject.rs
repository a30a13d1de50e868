use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use toml_edit::{DocumentMut, Item};

/// Source folders declared for the project's packages, relative to the
/// folder holding `pyproject.toml`.
///
/// Understands poetry's `[tool.poetry] packages = [{ include, from }]`
/// (an entry without `from` lives at the root, reported as `""`), and
/// setuptools' `[tool.setuptools.packages.find] where` and
/// `[tool.setuptools] package-dir = { "" = ... }`.
///
/// # Errors
///
/// Returns an error when `contents` is not valid TOML.
pub fn declared_package_sources(contents: &str) -> Result<BTreeSet<String>> {
    let doc: DocumentMut = contents.parse().context("invalid pyproject.toml")?;
    let mut sources = BTreeSet::new();
    let Some(tool) = doc.get("tool") else {
        return Ok(sources);
    };

    if let Some(packages) = tool.get("poetry").and_then(|poetry| poetry.get("packages")) {
        collect_poetry_sources(packages, &mut sources);
    }

    if let Some(setuptools) = tool.get("setuptools") {
        if let Some(array) = setuptools
            .get("packages")
            .and_then(|packages| packages.get("find"))
            .and_then(|find| find.get("where"))
            .and_then(Item::as_array)
        {
            for value in array.iter() {
                if let Some(path) = value.as_str() {
                    sources.insert(normalize_source(path));
                }
            }
        }
        if let Some(root) = setuptools
            .get("package-dir")
            .and_then(|dirs| dirs.get(""))
            .and_then(Item::as_str)
        {
            sources.insert(normalize_source(root));
        }
    }

    Ok(sources)
}

fn collect_poetry_sources(packages: &Item, sources: &mut BTreeSet<String>) {
    if let Some(array) = packages.as_array() {
        for value in array.iter() {
            let from = value
                .as_inline_table()
                .and_then(|table| table.get("from"))
                .and_then(|from| from.as_str())
                .unwrap_or_default();
            sources.insert(normalize_source(from));
        }
    } else if let Some(tables) = packages.as_array_of_tables() {
        for table in tables {
            let from = table
                .get("from")
                .and_then(Item::as_str)
                .unwrap_or_default();
            sources.insert(normalize_source(from));
        }
    }
}

/// Read `pyproject.toml` from disk and return its declared package sources.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn read_package_sources(path: &Path) -> Result<BTreeSet<String>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    declared_package_sources(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

fn normalize_source(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let parts: Vec<&str> = unified
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    parts.join("/")
}

/// Deepest folder shared by every declared source, relative to the project.
///
/// Each source contributes its own path plus all of its parents. A folder
/// qualifies when it shows up in the chain of every source; the longest
/// qualifying folder wins. Sources may be listed in any order and at any
/// depth. Returns `None` when nothing is shared, meaning the project root
/// itself is the package root.
pub fn common_package_root(sources: &BTreeSet<String>) -> Option<String> {
    if sources.is_empty() {
        return None;
    }
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for source in sources {
        let mut chain = BTreeSet::new();
        let mut current = String::new();
        for part in source.split('/').filter(|part| !part.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            chain.insert(current.clone());
        }
        for folder in chain {
            *counts.entry(folder).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count == sources.len())
        .map(|(folder, _)| folder)
        .max_by_key(String::len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|item| (*item).to_string()).collect()
    }

    #[test]
    fn reads_poetry_package_sources() {
        let sources = declared_package_sources(
            r#"[tool.poetry]
name = "demo"
packages = [
    { include = "demo", from = "src" },
    { include = "helpers", from = "./src/" },
]
"#,
        )
        .expect("parse");
        assert_eq!(sources, set(&["src"]));
    }

    #[test]
    fn poetry_package_without_from_lives_at_root() {
        let sources = declared_package_sources(
            r#"[[tool.poetry.packages]]
include = "demo"
"#,
        )
        .expect("parse");
        assert_eq!(sources, set(&[""]));
    }

    #[test]
    fn reads_setuptools_find_where_and_package_dir() {
        let sources = declared_package_sources(
            r#"[tool.setuptools]
package-dir = { "" = "lib" }

[tool.setuptools.packages.find]
where = ["lib/python"]
"#,
        )
        .expect("parse");
        assert_eq!(sources, set(&["lib", "lib/python"]));
    }

    #[test]
    fn missing_tool_table_yields_nothing() {
        let sources = declared_package_sources("[project]\nname = \"demo\"\n").expect("parse");
        assert!(sources.is_empty());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(declared_package_sources("[tool.poetry\n").is_err());
    }

    #[test]
    fn single_source_is_its_own_root() {
        assert_eq!(common_package_root(&set(&["src"])).as_deref(), Some("src"));
    }

    #[test]
    fn sibling_sources_share_their_parent() {
        let root = common_package_root(&set(&["src/app/core", "src/app", "src/tools"]));
        assert_eq!(root.as_deref(), Some("src"));
    }

    #[test]
    fn deepest_shared_folder_wins() {
        let root = common_package_root(&set(&["pkg/lib/a", "pkg/lib/b/c"]));
        assert_eq!(root.as_deref(), Some("pkg/lib"));
    }

    #[test]
    fn disjoint_sources_fall_back_to_project_root() {
        assert_eq!(common_package_root(&set(&["lib", "src"])), None);
        assert_eq!(common_package_root(&set(&["", "src"])), None);
        assert_eq!(common_package_root(&BTreeSet::new()), None);
    }
}
