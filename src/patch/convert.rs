use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Converter command is empty")]
    EmptyCommand,

    #[error("Failed to create {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run converter {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to convert patch file {source_file}: converter exited with {status}{stderr}")]
    Failed {
        source_file: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Failed to convert patch file {source_file}: converter did not finish within {}s", .timeout.as_secs())]
    TimedOut { source_file: PathBuf, timeout: Duration },
}

/// Converts between git and composer patch formats.
///
/// Forward reads a git patch and writes a composer patch; reverse goes the
/// other way. On error the destination may be partially written.
#[async_trait]
pub trait PatchConverter: Send + Sync {
    async fn convert(&self, source: &Path, dest: &Path, reverse: bool) -> Result<(), ConvertError>;

    async fn convert_forward(&self, source: &Path, dest: &Path) -> Result<(), ConvertError> {
        self.convert(source, dest, false).await
    }

    async fn convert_reverse(&self, source: &Path, dest: &Path) -> Result<(), ConvertError> {
        self.convert(source, dest, true).await
    }
}

/// Runs an external converter as `<program> [args..] [-r] <source>` and
/// captures its stdout into the destination file.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandConverter {
    /// `command_line` is split on whitespace, e.g. `"php vendor/bin/convert-patch"`.
    pub fn new(command_line: &str, timeout: Duration) -> Result<Self, ConvertError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ConvertError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

#[async_trait]
impl PatchConverter for CommandConverter {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn convert(&self, source: &Path, dest: &Path, reverse: bool) -> Result<(), ConvertError> {
        let output_file = std::fs::File::create(dest).map_err(|source| ConvertError::Output {
            path: dest.to_path_buf(),
            source,
        })?;

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if reverse {
            command.arg("-r");
        }
        command
            .arg(source)
            .stdin(Stdio::null())
            .stdout(output_file)
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| ConvertError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ConvertError::TimedOut {
                source_file: source.to_path_buf(),
                timeout: self.timeout,
            })?
            .map_err(|source| ConvertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ConvertError::Failed {
                source_file: source.to_path_buf(),
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {}", stderr)
                },
            });
        }

        debug!(dest = %dest.display(), "converter finished");
        Ok(())
    }
}
