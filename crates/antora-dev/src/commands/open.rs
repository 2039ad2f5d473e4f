//! Open a generated file without a server.

use std::path::Path;

use anyhow::{Context, Result};

/// Run the open command.
pub async fn run(file: &Path) -> Result<()> {
    if !file.exists() {
        anyhow::bail!(
            "File not found: {}. Run 'antora-dev build' first.",
            file.display()
        );
    }

    tracing::info!("Opening {}", file.display());
    open::that(file).with_context(|| format!("Failed to open {}", file.display()))?;

    Ok(())
}
