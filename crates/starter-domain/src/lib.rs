#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Data model and file formats shared by the launcher: file manifests,
//! requirement files, `pyproject.toml` package sources, wheel filenames and
//! synthesized setup scripts.

pub mod manifest;
pub mod pyproject;
pub mod requirements;
pub mod setup_script;
pub mod wheel;

pub use manifest::{relative_key, Drift, FileManifest};
pub use pyproject::{common_package_root, declared_package_sources, read_package_sources};
pub use requirements::{merge_requirements, parse_requirements, read_requirements_file};
pub use setup_script::{render_setup_script, SetupScript, SETUP_FILE_NAME};
pub use wheel::{installed_name_candidates, is_wheel_file, WHEEL_EXTENSION};
