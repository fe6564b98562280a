//! Image prefetch
//!
//! The engine ensures every image a run needs is present before any job
//! starts. The puller pulls one image at a time, streaming status output
//! as it goes; the first failure aborts the whole run.

use std::process::Stdio;

use async_trait::async_trait;
use strake_core::error::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::info;

/// Pulls one container image, streaming progress
#[async_trait]
pub trait ImagePuller: Send + Sync {
    async fn pull(&self, image: &str) -> Result<()>;
}

/// Pulls images through the podman CLI
pub struct PodmanImagePuller;

impl PodmanImagePuller {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PodmanImagePuller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImagePuller for PodmanImagePuller {
    async fn pull(&self, image: &str) -> Result<()> {
        let mut child = Command::new("podman")
            .arg("pull")
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ImagePull {
                image: image.to_string(),
                message: format!("failed to execute podman pull: {e}"),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let status_stream = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !line.trim().is_empty() {
                        info!(image, "{}", line.trim());
                    }
                }
            }
        };
        let capture_stderr = async {
            let mut captured = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut captured).await;
            }
            captured
        };
        let ((), captured) = tokio::join!(status_stream, capture_stderr);

        let status = child.wait().await.map_err(|e| Error::ImagePull {
            image: image.to_string(),
            message: format!("failed to wait for podman pull: {e}"),
        })?;

        if !status.success() {
            return Err(Error::ImagePull {
                image: image.to_string(),
                message: captured.trim().to_string(),
            });
        }
        Ok(())
    }
}
