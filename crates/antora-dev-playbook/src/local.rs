//! Local development playbook preparation.
//!
//! Unless an explicit playbook is given, the source playbook is rewritten so
//! its content sources point at local clones, and the result is written to
//! `site-local-dev.yml`. An existing derived file is reused as-is; a freshly
//! written one is removed again when the [`PreparedPlaybook`] is dropped,
//! unless it was asked to be kept.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::playbook::{Playbook, PlaybookError};

/// File name of the derived local development playbook.
pub const DERIVED_PLAYBOOK: &str = "site-local-dev.yml";

/// Inputs for preparing a playbook.
#[derive(Debug, Clone)]
pub struct PlaybookOptions {
    /// Playbook template to derive from
    pub source: PathBuf,

    /// Explicit playbook, used as-is
    pub playbook: Option<PathBuf>,

    /// Local content directories
    pub dirs: Vec<String>,

    /// Output directory for the derived playbook
    pub output: String,

    /// Keep the derived playbook after exit
    pub keep: bool,

    /// Directory the derived playbook is written to
    pub work_dir: PathBuf,
}

impl Default for PlaybookOptions {
    fn default() -> Self {
        Self {
            source: PathBuf::from("site.yml"),
            playbook: None,
            dirs: Vec::new(),
            output: "docs-dev".to_string(),
            keep: false,
            work_dir: PathBuf::from("."),
        }
    }
}

impl PlaybookOptions {
    /// Where the derived playbook lives.
    pub fn derived_path(&self) -> PathBuf {
        self.work_dir.join(DERIVED_PLAYBOOK)
    }
}

/// How the playbook file handed to the generator came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybookOrigin {
    /// Given with `--playbook`
    Explicit,

    /// Written by this process
    Derived,

    /// A derived playbook left over from an earlier run
    Reused,
}

/// Removes the derived playbook when dropped, unless kept.
#[derive(Debug)]
struct DerivedFile {
    path: PathBuf,
    keep: bool,
}

impl DerivedFile {
    fn new(path: PathBuf, keep: bool) -> Self {
        Self { path, keep }
    }
}

impl Drop for DerivedFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }

        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// A loaded playbook plus the file the generator should be pointed at.
#[derive(Debug)]
pub struct PreparedPlaybook {
    playbook: Playbook,
    filename: PathBuf,
    origin: PlaybookOrigin,
    _derived: Option<DerivedFile>,
}

impl PreparedPlaybook {
    /// Resolve the playbook for this run.
    ///
    /// Fails with [`PlaybookError::MissingLocalDirs`] when a local playbook
    /// has to be derived but no directories were given.
    pub fn prepare(options: &PlaybookOptions) -> Result<Self, PlaybookError> {
        if let Some(path) = &options.playbook {
            tracing::info!("Using playbook {}", path.display());
            return Ok(Self {
                playbook: Playbook::load(path)?,
                filename: path.clone(),
                origin: PlaybookOrigin::Explicit,
                _derived: None,
            });
        }

        if options.dirs.is_empty() {
            return Err(PlaybookError::MissingLocalDirs);
        }

        let filename = options.derived_path();
        if filename.exists() {
            return Self::reuse(filename);
        }

        let mut playbook = Playbook::load(&options.source)?;
        playbook.substitute_sources(&options.dirs)?;
        playbook.set_output_dir(options.output.clone());

        match write_new(&filename, &playbook.to_yaml()?) {
            Ok(()) => {}
            // Another invocation created it between the check and the write.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Self::reuse(filename),
            Err(e) => {
                return Err(PlaybookError::WriteError {
                    path: filename.display().to_string(),
                    message: e.to_string(),
                })
            }
        }

        tracing::info!(
            "Wrote {} from {} ({} content sources)",
            filename.display(),
            options.source.display(),
            playbook.content.sources.len()
        );

        Ok(Self {
            playbook,
            _derived: Some(DerivedFile::new(filename.clone(), options.keep)),
            filename,
            origin: PlaybookOrigin::Derived,
        })
    }

    fn reuse(filename: PathBuf) -> Result<Self, PlaybookError> {
        tracing::info!("Reusing existing {}", filename.display());
        Ok(Self {
            playbook: Playbook::load(&filename)?,
            filename,
            origin: PlaybookOrigin::Reused,
            _derived: None,
        })
    }

    /// The playbook contents.
    pub fn playbook(&self) -> &Playbook {
        &self.playbook
    }

    /// The playbook file to hand to the generator.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn origin(&self) -> PlaybookOrigin {
        self.origin
    }

    /// Directory relative paths in the playbook are resolved against.
    pub fn base_dir(&self) -> &Path {
        match self.filename.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

fn write_new(path: &Path, contents: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents.as_bytes())
}
