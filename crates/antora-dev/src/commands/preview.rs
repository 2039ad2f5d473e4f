//! Build and reload command.

use antora_dev_server::ReloadMessage;

use super::{build, TaskContext};

/// Rebuild the site, then tell connected browsers to reload.
pub async fn run(ctx: &TaskContext) {
    build::run(ctx).await;

    let browsers = ctx.hub.send(ReloadMessage::Reload);
    tracing::debug!("Reload sent to {} browsers", browsers);
}
