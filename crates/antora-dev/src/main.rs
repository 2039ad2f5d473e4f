//! antora-dev CLI - local preview for Antora documentation sites.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use antora_dev_generator::{GeneratorConfig, SiteGenerator};
use antora_dev_playbook::{PlaybookError, PlaybookOptions, PreparedPlaybook};
use antora_dev_server::{PreviewServerConfig, ReloadHub};

use crate::commands::TaskContext;

mod commands;
mod config;
mod signal;

const MISSING_DIRS_MESSAGE: &str = "local clone of the repository is not specified, \
please clone it and point to it using -d or --dir flag";

#[derive(Parser)]
#[command(name = "antora-dev")]
#[command(about = "Local preview for Antora documentation sites")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Playbook template the local playbook is derived from
    #[arg(short, long, default_value = "site.yml", global = true)]
    source: PathBuf,

    /// Use this playbook as-is instead of deriving one
    #[arg(short, long, global = true)]
    playbook: Option<PathBuf>,

    /// Local content directory; repeat for several, assigned to content
    /// sources in turn
    #[arg(short, long, action = ArgAction::Append, global = true)]
    dir: Vec<String>,

    /// Output directory written into the derived playbook
    #[arg(short, long, default_value = "docs-dev", global = true)]
    output: String,

    /// Keep the derived playbook after exit
    #[arg(short, long, global = true)]
    keep: bool,

    /// Path to antora-dev.toml config file
    #[arg(short, long, default_value = "antora-dev.toml", global = true)]
    config: PathBuf,

    /// Port for the preview server (defaults to config or 5353)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Do not open browser
    #[arg(long, global = true)]
    no_open: bool,

    /// Generator command (defaults to config or "antora")
    #[arg(long, global = true)]
    generator: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the site once
    Build,

    /// Generate the site and reload connected browsers
    Preview,

    /// Regenerate whenever the playbook or content files change
    Watch,

    /// Serve the generated site with live reload
    #[command(alias = "connect")]
    Serve,

    /// Open a generated page directly in the browser
    Open {
        /// File to open
        #[arg(default_value = "docs/index.html")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    // Opening a file needs no playbook.
    if let Some(Commands::Open { file }) = &cli.command {
        return commands::open::run(file).await;
    }

    let file_config = config::load_config(&cli.config)?;
    let mut shutdown = signal::Shutdown::install().context("Failed to install signal handlers")?;

    let options = PlaybookOptions {
        source: cli.source.clone(),
        playbook: cli.playbook.clone(),
        dirs: cli.dir.clone(),
        output: cli.output.clone(),
        keep: cli.keep,
        ..Default::default()
    };

    let playbook = match PreparedPlaybook::prepare(&options) {
        Ok(playbook) => playbook,
        Err(PlaybookError::MissingLocalDirs) => {
            tracing::error!("{}", MISSING_DIRS_MESSAGE);
            std::process::exit(-1);
        }
        Err(e) => return Err(e).context("Failed to prepare playbook"),
    };

    let ctx = TaskContext {
        playbook,
        generator: SiteGenerator::new(GeneratorConfig {
            command: cli.generator.unwrap_or(file_config.generator.command),
            ..Default::default()
        }),
        hub: ReloadHub::new(),
        server: PreviewServerConfig {
            host: file_config.server.host,
            port: cli.port.unwrap_or(file_config.server.port),
            open: file_config.server.open && !cli.no_open,
            ..Default::default()
        },
    };

    // Execute command. Returning normally on a shutdown signal lets the
    // derived playbook be cleaned up.
    tokio::select! {
        result = run(cli.command, &ctx) => result?,
        name = shutdown.recv() => tracing::info!("Received {}, shutting down", name),
    }

    Ok(())
}

async fn run(command: Option<Commands>, ctx: &TaskContext) -> Result<()> {
    match command {
        Some(Commands::Build) => commands::build::run(ctx).await,
        Some(Commands::Preview) => commands::preview::run(ctx).await,
        Some(Commands::Watch) => commands::watch::run(ctx).await?,
        Some(Commands::Serve) => commands::serve::run(ctx).await?,
        Some(Commands::Open { file }) => commands::open::run(&file).await?,
        None => commands::dev::run(ctx).await?,
    }

    Ok(())
}
