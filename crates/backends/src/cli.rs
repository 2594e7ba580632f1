//! Local CLI-driven model backend.
//!
//! Drives an image model through a local command-line tool: spawn the
//! configured command with prompt/size/output arguments, wait for it,
//! and read back the output file. The overall deadline is enforced by
//! the [`ImageClient`](crate::image::ImageClient) wrapper like every
//! other backend.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use flyerforge_core::error::EngineError;

use crate::image::{ImageBackend, ImagePayload, ImageRequest, ImageResult};

/// Backend name used for error tags and run records.
pub const BACKEND_NAME: &str = "local-cli";

/// Settings for a CLI-driven local model.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Executable to invoke.
    pub command: String,
    /// Arguments inserted before the generated ones.
    pub extra_args: Vec<String>,
    /// Model name passed via `--model`.
    pub model: String,
    /// Directory for temporary output files.
    pub work_dir: PathBuf,
}

pub struct CliModelBackend {
    config: CliConfig,
}

impl CliModelBackend {
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ImageBackend for CliModelBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn generate(&self, request: &ImageRequest) -> Result<ImageResult, EngineError> {
        let (width, height) = request.size.dimensions();
        let output_path = self
            .config
            .work_dir
            .join(format!("cli-{}.png", uuid::Uuid::new_v4()));

        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| EngineError::generation(BACKEND_NAME, e.to_string()))?;

        let output = Command::new(&self.config.command)
            .args(&self.config.extra_args)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--prompt")
            .arg(&request.prompt)
            .arg("--negative-prompt")
            .arg(&request.negative_prompt)
            .arg("--width")
            .arg(width.to_string())
            .arg("--height")
            .arg(height.to_string())
            .arg("--output")
            .arg(&output_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                EngineError::generation(
                    BACKEND_NAME,
                    format!("failed to spawn '{}': {e}", self.config.command),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::generation(
                BACKEND_NAME,
                format!(
                    "'{}' exited with {}: {}",
                    self.config.command,
                    output.status,
                    stderr.chars().take(400).collect::<String>(),
                ),
            ));
        }

        let bytes = tokio::fs::read(&output_path).await.map_err(|e| {
            EngineError::generation(
                BACKEND_NAME,
                format!("output file {} unreadable: {e}", output_path.display()),
            )
        })?;
        // Best-effort cleanup; the buffer is what matters.
        let _ = tokio::fs::remove_file(&output_path).await;

        Ok(ImageResult {
            payload: ImagePayload::Bytes(bytes),
            backend: BACKEND_NAME,
        })
    }
}
