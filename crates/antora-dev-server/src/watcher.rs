//! File watching for rebuilds.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

const DEBOUNCE: Duration = Duration::from_millis(100);

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Characters `globset::escape` wraps as `[c]`.
const ESCAPED_META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// File was created
    Created(PathBuf),

    /// File was modified
    Modified(PathBuf),

    /// File was deleted
    Deleted(PathBuf),
}

impl WatchEvent {
    /// The path the event is about.
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(path) | WatchEvent::Modified(path) | WatchEvent::Deleted(path) => {
                path
            }
        }
    }
}

/// Errors that can occur while setting up a watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Invalid watch pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("File watch error: {0}")]
    NotifyError(String),
}

/// A directory registered with the OS watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    pub path: PathBuf,
    pub recursive: bool,
}

/// Compiled glob patterns selecting the files that trigger a rebuild.
///
/// Patterns are matched against the paths the OS watcher reports, so they
/// should be absolute (see `resolve_path` in the playbook crate).
#[derive(Clone)]
pub struct WatchPatterns {
    patterns: Vec<String>,
    set: GlobSet,
}

impl fmt::Debug for WatchPatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchPatterns")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl WatchPatterns {
    /// Compile `patterns`. `*` does not cross directory separators; `**`
    /// does.
    pub fn new<I, S>(patterns: I) -> Result<Self, WatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| WatchError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
            builder.add(glob);
        }

        let set = builder.build().map_err(|e| WatchError::InvalidPattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })?;

        Ok(Self { patterns, set })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a change to `path` should trigger a rebuild.
    pub fn matches(&self, path: &Path) -> bool {
        self.set.is_match(path)
    }

    /// Directories to register with the OS watcher.
    ///
    /// A glob pattern is watched recursively from its literal prefix. A
    /// plain file path is watched through its parent directory, since
    /// editors often replace files instead of writing them in place.
    pub fn roots(&self) -> Vec<WatchRoot> {
        let mut roots: Vec<WatchRoot> = Vec::new();

        for root in self.patterns.iter().map(|p| pattern_root(p)) {
            match roots.iter_mut().find(|r| r.path == root.path) {
                Some(existing) => existing.recursive |= root.recursive,
                None => roots.push(root),
            }
        }

        roots
    }
}

/// A pattern matching exactly `path`, with glob characters escaped.
pub fn literal_pattern(path: &Path) -> String {
    globset::escape(&path.to_string_lossy())
}

fn pattern_root(pattern: &str) -> WatchRoot {
    let (prefix, is_glob) = literal_prefix(pattern);

    if is_glob {
        let dir = match prefix.rfind('/') {
            Some(0) => "/",
            Some(i) => &prefix[..i],
            None => ".",
        };
        return WatchRoot {
            path: PathBuf::from(dir),
            recursive: true,
        };
    }

    let parent = Path::new(&prefix)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    WatchRoot {
        path: parent.to_path_buf(),
        recursive: false,
    }
}

/// The unescaped text before the first unescaped glob character, and
/// whether such a character was found.
fn literal_prefix(pattern: &str) -> (String, bool) {
    let chars: Vec<char> = pattern.chars().collect();
    let mut prefix = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let escaped = c == '['
            && chars.get(i + 2) == Some(&']')
            && chars.get(i + 1).is_some_and(|m| ESCAPED_META.contains(m));

        if escaped {
            prefix.push(chars[i + 1]);
            i += 3;
        } else if GLOB_META.contains(&c) {
            return (prefix, true);
        } else {
            prefix.push(c);
            i += 1;
        }
    }

    (prefix, false)
}

/// File watcher for detecting changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for files matching `patterns`.
    ///
    /// Returns the watcher and a channel to receive events. Roots that do
    /// not exist are skipped.
    pub fn new(
        patterns: &WatchPatterns,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), WatchError> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(|e| WatchError::NotifyError(e.to_string()))?;

        for root in patterns.roots() {
            if !root.path.exists() {
                tracing::warn!("Not watching {}: no such directory", root.path.display());
                continue;
            }

            let mode = if root.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };

            watcher
                .watch(&root.path, mode)
                .map_err(|e| WatchError::NotifyError(e.to_string()))?;
            tracing::debug!("Watching {}", root.path.display());
        }

        let patterns = patterns.clone();
        std::thread::spawn(move || forward_events(sync_rx, async_tx, &patterns));

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Forward matching events once no new event has arrived for `DEBOUNCE`.
///
/// A burst is delivered as its last event per path, so the final state of
/// every touched file is always reported.
fn forward_events(
    rx: mpsc::Receiver<notify::Event>,
    tx: async_mpsc::Sender<WatchEvent>,
    patterns: &WatchPatterns,
) {
    let mut pending: Vec<WatchEvent> = Vec::new();

    loop {
        let next = if pending.is_empty() {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            rx.recv_timeout(DEBOUNCE)
        };

        let event = match next {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => {
                if !flush(&mut pending, &tx) {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                flush(&mut pending, &tx);
                return;
            }
        };

        let events = event
            .paths
            .iter()
            .filter(|path| patterns.matches(path))
            .filter_map(|path| classify_event(path, &event.kind));

        for e in events {
            pending.retain(|p| p.path() != e.path());
            pending.push(e);
        }
    }
}

/// Send and clear `pending`. Returns false once the receiver is gone.
fn flush(pending: &mut Vec<WatchEvent>, tx: &async_mpsc::Sender<WatchEvent>) -> bool {
    pending.drain(..).all(|e| tx.blocking_send(e).is_ok())
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path.to_path_buf())),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path.to_path_buf())),
        EventKind::Modify(_) => Some(WatchEvent::Modified(path.to_path_buf())),
        _ => None,
    }
}
