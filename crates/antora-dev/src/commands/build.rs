//! Site build command.

use super::TaskContext;

/// Run the generator against the prepared playbook.
///
/// Generator failures are logged and swallowed so that watch-triggered
/// rebuilds keep going.
pub async fn run(ctx: &TaskContext) {
    let playbook = ctx.playbook.filename();
    tracing::info!("Building site from {}...", playbook.display());

    match ctx.generator.generate(playbook).await {
        Ok(result) => {
            tracing::info!(
                "Generated {} in {}ms",
                ctx.playbook.playbook().output_dir(),
                result.duration_ms
            );
        }
        Err(e) => {
            tracing::error!("Site generation failed: {}", e);
        }
    }
}
