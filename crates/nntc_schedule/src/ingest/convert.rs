//! Document-to-grid conversion collaborator.
//!
//! Extracting tables from the published PDF is delegated to an external
//! program. It is started with the downloaded file and the path it must
//! write a JSON grid to (see [`Sheet`]), and has to exit with status 0
//! within the configured timeout.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::IngestError;
use crate::config::{INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER};
use crate::normalize::Sheet;

/// Converts a downloaded document into a cell grid.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, document: &Path) -> Result<Sheet, IngestError>;
}

/// Runs an external command and reads the grid it writes.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    argv: Vec<String>,
    output_path: PathBuf,
    timeout: Duration,
}

impl CommandConverter {
    /// `argv` may contain `{input}` and `{output}` placeholders.
    pub fn new(argv: Vec<String>, output_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            argv,
            output_path: output_path.into(),
            timeout,
        }
    }

    fn expand_args(&self, document: &Path) -> Vec<String> {
        let input = document.to_string_lossy();
        let output = self.output_path.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

#[async_trait]
impl Converter for CommandConverter {
    async fn convert(&self, document: &Path) -> Result<Sheet, IngestError> {
        let args = self.expand_args(document);
        let (program, rest) = args.split_first().ok_or_else(|| IngestError::Conversion {
            message: "conversion command is empty".to_string(),
        })?;

        // Only a grid written by this run may be ingested.
        match tokio::fs::remove_file(&self.output_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!(program = %program, args = ?rest, "Starting conversion");
        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| IngestError::Conversion {
                message: format!("failed to start {program}: {e}"),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| IngestError::Conversion {
                message: format!("timed out after {:.1}s", self.timeout.as_secs_f64()),
            })?
            .map_err(|e| IngestError::Conversion {
                message: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(IngestError::Conversion {
                message: format!("{program} exited with {}: {}", output.status, stderr.trim()),
            });
        }
        if !stderr.trim().is_empty() {
            warn!(stderr = %stderr.trim(), "Conversion wrote to stderr");
        }

        let bytes = tokio::fs::read(&self.output_path)
            .await
            .map_err(|e| IngestError::Conversion {
                message: format!("no grid at {}: {e}", self.output_path.display()),
            })?;

        Sheet::from_json_slice(&bytes).map_err(|e| IngestError::Conversion {
            message: format!("malformed grid: {e}"),
        })
    }
}
