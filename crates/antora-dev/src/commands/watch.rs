//! Watch command.

use anyhow::{Context, Result};
use antora_dev_server::{literal_pattern, FileWatcher, WatchPatterns};

use super::{preview, TaskContext};

/// Patterns that trigger a rebuild: every local content source's `.yml`
/// and `.adoc` files, plus the playbook itself.
pub fn watch_patterns(ctx: &TaskContext) -> Result<WatchPatterns> {
    let base = ctx.playbook.base_dir();
    let mut patterns = ctx.playbook.playbook().watch_patterns(base);

    let filename = ctx.playbook.filename();
    let playbook_file = filename
        .canonicalize()
        .unwrap_or_else(|_| filename.to_path_buf());
    patterns.push(literal_pattern(&playbook_file));

    WatchPatterns::new(patterns).context("Invalid watch pattern")
}

/// Run the watch command. Runs until the process is stopped.
pub async fn run(ctx: &TaskContext) -> Result<()> {
    let patterns = watch_patterns(ctx)?;
    let (watcher, mut rx) = FileWatcher::new(&patterns).context("Failed to start file watcher")?;

    for pattern in patterns.patterns() {
        tracing::debug!("Watching {}", pattern);
    }
    tracing::info!("Watching {} patterns for changes", patterns.patterns().len());

    while let Some(event) = rx.recv().await {
        // Changes queued up during the previous build are covered by this one.
        while rx.try_recv().is_ok() {}

        tracing::info!("Change detected: {}", event.path().display());
        preview::run(ctx).await;
    }

    // Keep watcher alive
    drop(watcher);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context_in;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn watches_local_sources_and_playbook() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("docs-a/modules/ROOT/pages")).unwrap();
        let ctx = context_in(&root);

        let patterns = watch_patterns(&ctx).unwrap();

        assert_eq!(patterns.patterns().len(), 3);
        assert!(patterns.matches(&root.join("site.yml")));
        assert!(patterns.matches(&root.join("docs-a/antora.yml")));
        assert!(patterns.matches(&root.join("docs-a/modules/ROOT/pages/index.adoc")));
        assert!(!patterns.matches(&root.join("public/index.html")));
    }

    #[test]
    fn bracketed_directories_match_literally() {
        let temp = tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap().join("site[v2]");
        fs::create_dir_all(root.join("docs-a")).unwrap();
        let ctx = context_in(&root);

        let patterns = watch_patterns(&ctx).unwrap();

        assert!(patterns.matches(&root.join("site.yml")));
        assert!(patterns.matches(&root.join("docs-a/antora.yml")));
        assert!(!patterns.matches(&root.with_file_name("sitev").join("site.yml")));
    }
}
