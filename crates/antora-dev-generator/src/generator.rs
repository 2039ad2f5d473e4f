//! External generator invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Configuration for the site generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Generator command line; split on whitespace into program and leading
    /// arguments, e.g. `npx antora`
    pub command: String,

    /// Working directory for the generator process
    pub working_dir: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: "antora".to_string(),
            working_dir: None,
        }
    }
}

/// Result of a successful generator run.
#[derive(Debug)]
pub struct GenerateResult {
    /// Playbook the site was generated from
    pub playbook: PathBuf,

    /// Total run time in milliseconds
    pub duration_ms: u64,
}

/// Errors that can occur while generating.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Generator command is empty")]
    EmptyCommand,

    #[error("Failed to start generator {program}: {message}")]
    SpawnError { program: String, message: String },

    #[error("Failed to wait for generator: {0}")]
    WaitError(String),

    #[error("Generator exited with code {code}")]
    Failed { code: i32 },
}

/// Runs the external generator.
#[derive(Debug, Clone)]
pub struct SiteGenerator {
    config: GeneratorConfig,
}

impl SiteGenerator {
    /// Create a new generator.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Program and arguments used to generate from `playbook`.
    ///
    /// Equivalent to `antora --playbook <playbook>` with the default command.
    pub fn command_line(&self, playbook: &Path) -> Result<(String, Vec<String>), GenerateError> {
        let mut parts = self.config.command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(GenerateError::EmptyCommand)?;

        let mut args: Vec<String> = parts.collect();
        args.push("--playbook".to_string());
        args.push(playbook.display().to_string());

        Ok((program, args))
    }

    /// Generate the site described by `playbook`.
    ///
    /// The generator inherits this process's environment. Its stdout is
    /// logged at info level and its stderr at warn level.
    pub async fn generate(&self, playbook: &Path) -> Result<GenerateResult, GenerateError> {
        let start = Instant::now();
        let (program, args) = self.command_line(playbook)?;

        tracing::debug!("Running {} {}", program, args.join(" "));

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| GenerateError::SpawnError {
            program: program.clone(),
            message: e.to_string(),
        })?;

        let stdout = child.stdout.take().map(|out| forward_lines(out, false));
        let stderr = child.stderr.take().map(|err| forward_lines(err, true));

        let status = child
            .wait()
            .await
            .map_err(|e| GenerateError::WaitError(e.to_string()))?;

        // Flush remaining output before reporting.
        for handle in [stdout, stderr].into_iter().flatten() {
            let _ = handle.await;
        }

        if !status.success() {
            return Err(GenerateError::Failed {
                code: status.code().unwrap_or(-1),
            });
        }

        Ok(GenerateResult {
            playbook: playbook.to_path_buf(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Forward a child output stream to the log, line by line.
fn forward_lines<R>(reader: R, is_stderr: bool) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                tracing::warn!("antora: {}", line);
            } else {
                tracing::info!("antora: {}", line);
            }
        }
    })
}
