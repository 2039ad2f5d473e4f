//! Default command: serve, watch and build together.

use anyhow::Result;

use super::{preview, serve, watch, TaskContext};

/// Run the server and the watcher while the initial build runs.
///
/// The initial build also sends a reload, so a tab opened before the site
/// existed picks it up.
pub async fn run(ctx: &TaskContext) -> Result<()> {
    tracing::info!("Starting preview for {}", ctx.playbook.filename().display());

    tokio::try_join!(serve::run(ctx), watch::run(ctx), async {
        preview::run(ctx).await;
        Ok::<_, anyhow::Error>(())
    })?;

    Ok(())
}
