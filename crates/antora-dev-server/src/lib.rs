//! Preview server with live reload for generated Antora sites.
//!
//! Serves the generator's output directory, pushes reload notifications to
//! connected browsers over a WebSocket, and watches source files for changes.

pub mod livereload;
pub mod server;
pub mod watcher;

pub use livereload::{ReloadHub, ReloadMessage};
pub use server::{PreviewServer, PreviewServerConfig, ServerError};
pub use watcher::{literal_pattern, FileWatcher, WatchError, WatchEvent, WatchPatterns, WatchRoot};
