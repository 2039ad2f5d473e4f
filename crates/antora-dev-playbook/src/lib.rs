//! Antora playbook handling for local previews.
//!
//! Loads a playbook, rewrites its content sources to point at local clones,
//! and manages the lifecycle of the derived `site-local-dev.yml` file.

pub mod local;
pub mod playbook;

pub use local::{PlaybookOptions, PlaybookOrigin, PreparedPlaybook, DERIVED_PLAYBOOK};
pub use playbook::{
    resolve_path, Content, ContentSource, Output, Playbook, PlaybookError, Site, DEFAULT_OUTPUT_DIR,
};
