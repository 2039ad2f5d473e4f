//! Preview server command.

use anyhow::Result;
use antora_dev_playbook::resolve_path;
use antora_dev_server::{PreviewServer, PreviewServerConfig};

use super::TaskContext;

/// Server configuration for the prepared playbook: named after the site and
/// rooted at its output directory.
pub fn server_config(ctx: &TaskContext) -> PreviewServerConfig {
    let playbook = ctx.playbook.playbook();

    PreviewServerConfig {
        name: playbook.server_name(),
        root: resolve_path(ctx.playbook.base_dir(), playbook.output_dir()),
        ..ctx.server.clone()
    }
}

/// Run the serve command.
pub async fn run(ctx: &TaskContext) -> Result<()> {
    PreviewServer::new(server_config(ctx), ctx.hub.clone())
        .start()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context_in;
    use tempfile::tempdir;

    #[test]
    fn serves_playbook_output_dir() {
        let temp = tempdir().unwrap();
        let ctx = context_in(temp.path());

        let config = server_config(&ctx);

        assert_eq!(config.name, "Test Docs Antora Doc Server");
        assert_eq!(config.root, temp.path().join("./public"));
        assert_eq!(config.port, 5353);
        assert!(!config.open);
    }
}
