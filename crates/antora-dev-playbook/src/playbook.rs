//! Playbook model, parsing and content source rewriting.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

/// Output directory Antora uses when the playbook does not set one.
pub const DEFAULT_OUTPUT_DIR: &str = "./build/site";

/// An Antora playbook.
///
/// Only the keys this tool reads or rewrites are typed. Everything else
/// (`ui`, `asciidoc`, `runtime`, ...) is kept in `extra` so a derived
/// playbook carries it through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Playbook {
    #[serde(default, skip_serializing_if = "Site::is_empty")]
    pub site: Site,

    #[serde(default)]
    pub content: Content,

    #[serde(default, skip_serializing_if = "Output::is_empty")]
    pub output: Output,

    #[serde(flatten)]
    pub extra: Mapping,
}

/// The `site` key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Site {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(flatten)]
    pub extra: Mapping,
}

impl Site {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.url.is_none() && self.extra.is_empty()
    }
}

/// The `content` key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Content {
    #[serde(default)]
    pub sources: Vec<ContentSource>,

    #[serde(flatten)]
    pub extra: Mapping,
}

/// A single content source: a repository URL or a local path.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ContentSource {
    pub url: String,

    #[serde(flatten)]
    pub extra: Mapping,
}

impl ContentSource {
    /// Whether the source points at the local file system rather than a
    /// remote git repository.
    pub fn is_local(&self) -> bool {
        !(self.url.contains("://") || self.url.starts_with("git@"))
    }
}

/// The `output` key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Output {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    #[serde(flatten)]
    pub extra: Mapping,
}

impl Output {
    fn is_empty(&self) -> bool {
        self.dir.is_none() && self.extra.is_empty()
    }
}

/// Errors that can occur when working with playbooks.
#[derive(Debug, thiserror::Error)]
pub enum PlaybookError {
    #[error("Failed to read playbook {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Invalid YAML in playbook {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Failed to serialize playbook: {0}")]
    SerializeError(String),

    #[error("Failed to write playbook {path}: {message}")]
    WriteError { path: String, message: String },

    #[error("No local content directories given")]
    MissingLocalDirs,
}

impl Playbook {
    /// Parse a playbook from YAML text.
    pub fn from_yaml(source: &str) -> Result<Self, PlaybookError> {
        serde_yaml::from_str(source).map_err(|e| PlaybookError::ParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Read and parse a playbook file.
    pub fn load(path: &Path) -> Result<Self, PlaybookError> {
        let source = fs::read_to_string(path).map_err(|e| PlaybookError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let playbook = serde_yaml::from_str(&source).map_err(|e| PlaybookError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tracing::debug!("Loaded playbook {}", path.display());
        Ok(playbook)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, PlaybookError> {
        serde_yaml::to_string(self).map_err(|e| PlaybookError::SerializeError(e.to_string()))
    }

    /// Serialize and write to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<(), PlaybookError> {
        let yaml = self.to_yaml()?;
        fs::write(path, yaml).map_err(|e| PlaybookError::WriteError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Point every content source at a local directory.
    ///
    /// Source `i` gets `dirs[i % dirs.len()]`, so a single directory can
    /// stand in for every source.
    pub fn substitute_sources<S: AsRef<str>>(&mut self, dirs: &[S]) -> Result<(), PlaybookError> {
        if dirs.is_empty() {
            return Err(PlaybookError::MissingLocalDirs);
        }

        for (i, source) in self.content.sources.iter_mut().enumerate() {
            let dir = dirs[i % dirs.len()].as_ref();
            tracing::debug!("Content source {} -> {}", source.url, dir);
            source.url = dir.to_string();
        }

        Ok(())
    }

    /// Override the output directory.
    pub fn set_output_dir(&mut self, dir: impl Into<String>) {
        self.output.dir = Some(dir.into());
    }

    /// The output directory the generator will write to.
    pub fn output_dir(&self) -> &str {
        self.output.dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR)
    }

    /// Display name for the preview server.
    pub fn server_name(&self) -> String {
        let title = self.site.title.as_deref().unwrap_or("Antora");
        format!("{} Antora Doc Server", title)
    }

    /// Glob patterns covering the configuration and page files of every
    /// local content source.
    ///
    /// Relative source paths are resolved against `base`, the directory the
    /// playbook lives in, which is how Antora resolves them too. Glob
    /// characters in the resolved path are escaped. Remote sources are
    /// skipped.
    pub fn watch_patterns(&self, base: &Path) -> Vec<String> {
        let mut patterns = Vec::new();

        for source in self.content.sources.iter().filter(|s| s.is_local()) {
            let root = resolve_path(base, &source.url);
            let root = globset::escape(root.to_string_lossy().trim_end_matches('/'));

            for ext in ["yml", "adoc"] {
                let pattern = format!("{}/**/*.{}", root, ext);
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
        }

        patterns
    }
}

/// Resolve `path` against `base`, canonicalizing when it exists so it
/// matches the absolute paths reported by file watchers.
pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let joined = base.join(path);
    joined.canonicalize().unwrap_or(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const SITE_YML: &str = r#"
site:
  title: Couchbase Docs
  url: https://docs.couchbase.com
  start_page: home::index.adoc
content:
  sources:
  - url: https://github.com/couchbase/docs-site
    branches: master
    start_path: home
  - url: https://github.com/couchbase/docs-server
    branches: [release/6.0, release/5.5]
  - url: https://github.com/couchbase/docs-sdk-java
    branches: release/2.6
ui:
  bundle:
    url: ./ui-bundle.zip
output:
  dir: ./public
"#;

    fn urls(playbook: &Playbook) -> Vec<&str> {
        playbook
            .content
            .sources
            .iter()
            .map(|s| s.url.as_str())
            .collect()
    }

    #[test]
    fn parses_typed_keys() {
        let playbook = Playbook::from_yaml(SITE_YML).unwrap();

        assert_eq!(playbook.site.title.as_deref(), Some("Couchbase Docs"));
        assert_eq!(playbook.content.sources.len(), 3);
        assert_eq!(playbook.output_dir(), "./public");
        assert_eq!(playbook.server_name(), "Couchbase Docs Antora Doc Server");
    }

    #[test]
    fn substitutes_sources_round_robin() {
        let mut playbook = Playbook::from_yaml(SITE_YML).unwrap();

        playbook.substitute_sources(&["../a", "../b"]).unwrap();

        assert_eq!(urls(&playbook), vec!["../a", "../b", "../a"]);
    }

    #[test]
    fn single_dir_replaces_every_source() {
        let mut playbook = Playbook::from_yaml(SITE_YML).unwrap();

        playbook.substitute_sources(&["../docs"]).unwrap();

        assert!(urls(&playbook).iter().all(|u| *u == "../docs"));
    }

    #[test]
    fn extra_dirs_are_ignored() {
        let mut playbook = Playbook::from_yaml(SITE_YML).unwrap();

        playbook
            .substitute_sources(&["a", "b", "c", "d", "e"])
            .unwrap();

        assert_eq!(urls(&playbook), vec!["a", "b", "c"]);
    }

    #[test]
    fn substitution_requires_dirs() {
        let mut playbook = Playbook::from_yaml(SITE_YML).unwrap();
        let dirs: [&str; 0] = [];

        let result = playbook.substitute_sources(&dirs);

        assert!(matches!(result, Err(PlaybookError::MissingLocalDirs)));
    }

    #[test]
    fn unknown_keys_survive_rewrite() {
        let mut playbook = Playbook::from_yaml(SITE_YML).unwrap();
        playbook.substitute_sources(&["../a"]).unwrap();
        playbook.set_output_dir("docs-dev");

        let reparsed = Playbook::from_yaml(&playbook.to_yaml().unwrap()).unwrap();

        assert_eq!(reparsed, playbook);
        assert!(reparsed.extra.contains_key("ui"));
        assert!(reparsed.site.extra.contains_key("start_page"));
        assert!(reparsed.content.sources[1].extra.contains_key("branches"));
        assert_eq!(reparsed.output_dir(), "docs-dev");
    }

    #[test]
    fn save_writes_loadable_yaml() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("site-copy.yml");
        let mut playbook = Playbook::from_yaml(SITE_YML).unwrap();
        playbook.set_output_dir("docs-dev");

        playbook.save(&path).unwrap();

        assert_eq!(Playbook::load(&path).unwrap(), playbook);
    }

    #[test]
    fn defaults_output_dir() {
        let playbook = Playbook::from_yaml("content:\n  sources: []\n").unwrap();

        assert_eq!(playbook.output_dir(), DEFAULT_OUTPUT_DIR);
        assert_eq!(playbook.server_name(), "Antora Antora Doc Server");
    }

    #[test]
    fn errors_on_invalid_yaml() {
        let result = Playbook::from_yaml("content: [unclosed\n");

        assert!(matches!(result, Err(PlaybookError::ParseError { .. })));
    }

    #[test]
    fn load_reports_missing_file() {
        let temp = tempdir().unwrap();

        let result = Playbook::load(&temp.path().join("missing.yml"));

        assert!(matches!(result, Err(PlaybookError::ReadError { .. })));
    }

    #[test]
    fn watch_patterns_cover_local_sources_once() {
        let temp = tempdir().unwrap();
        let base = temp.path().canonicalize().unwrap();
        fs::create_dir_all(base.join("docs-server")).unwrap();

        let mut playbook = Playbook::from_yaml(SITE_YML).unwrap();
        playbook.substitute_sources(&["docs-server"]).unwrap();

        let root = base.join("docs-server");
        assert_eq!(
            playbook.watch_patterns(&base),
            vec![
                format!("{}/**/*.yml", root.display()),
                format!("{}/**/*.adoc", root.display()),
            ]
        );
    }

    #[test]
    fn watch_patterns_escape_glob_characters() {
        let temp = tempdir().unwrap();
        let base = temp.path().canonicalize().unwrap();
        let root = base.join("docs[v2]");
        fs::create_dir_all(&root).unwrap();

        let mut playbook = Playbook::from_yaml(SITE_YML).unwrap();
        playbook.substitute_sources(&["docs[v2]"]).unwrap();

        let patterns = playbook.watch_patterns(&base);
        let yml = globset::Glob::new(&patterns[0]).unwrap().compile_matcher();

        assert!(yml.is_match(root.join("antora.yml")));
        assert!(!yml.is_match(base.join("docsv/antora.yml")));
    }

    #[test]
    fn watch_patterns_skip_remote_sources() {
        let playbook = Playbook::from_yaml(SITE_YML).unwrap();

        assert!(playbook.watch_patterns(Path::new(".")).is_empty());
    }
}
