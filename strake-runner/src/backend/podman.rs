//! Podman orchestrator backend
//!
//! Runs a job's containers through the local podman CLI in declaration
//! order: every container but the last is started detached as a sidecar,
//! the last (primary) runs in the foreground, and its exit status decides
//! the job's outcome. All started containers are removed afterwards.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use strake_core::error::{Error, Result};
use strake_core::{Container, Job};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::backend::OrchestratorBackend;
use crate::cancel::CancellationToken;

const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Local orchestrator backend over the podman CLI
pub struct PodmanBackend;

impl PodmanBackend {
    pub fn new() -> Self {
        Self
    }

    /// Starts a sidecar container detached
    async fn start_sidecar(
        &self,
        container: &Container,
        container_name: &str,
        secrets: &[String],
        source_path: &Path,
    ) -> Result<()> {
        let args = run_args(container, container_name, secrets, source_path, true);
        debug!(container = container_name, "starting sidecar");
        let output = Command::new("podman")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Runtime(format!("failed to execute podman run: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Runtime(format!(
                "failed to start container \"{}\": {}",
                container_name,
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Stops and removes every container this job started
    async fn cleanup(&self, container_names: &[String]) {
        for name in container_names {
            debug!(container = %name, "removing container");
            let removed = Command::new("podman")
                .args(["rm", "-f", name])
                .stdin(Stdio::null())
                .output()
                .await;
            match removed {
                Ok(output) if output.status.success() => {}
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(container = %name, "failed to remove container: {}", stderr.trim());
                }
                Err(e) => {
                    warn!(container = %name, "failed to remove container: {e}");
                }
            }
        }
    }
}

impl Default for PodmanBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrchestratorBackend for PodmanBackend {
    async fn execute_job(
        &self,
        cancel: CancellationToken,
        secrets: &[String],
        execution_name: &str,
        source_path: &Path,
        job: &Job,
    ) -> Result<()> {
        let (primary, sidecars) = job
            .containers()
            .split_last()
            .ok_or_else(|| Error::Runtime(format!("job \"{}\" has no containers", job.name())))?;

        let mut started: Vec<String> = Vec::new();
        for container in sidecars {
            let container_name = format!("{execution_name}-{}", container.name);
            if let Err(e) = self
                .start_sidecar(container, &container_name, secrets, source_path)
                .await
            {
                self.cleanup(&started).await;
                return Err(e);
            }
            started.push(container_name);
        }

        let primary_name = format!("{execution_name}-{}", primary.name);
        started.push(primary_name.clone());
        info!(job = job.name(), container = %primary_name, "running primary container");

        let args = run_args(primary, &primary_name, secrets, source_path, false);
        let mut command = Command::new("podman");
        command.args(&args);
        if primary.tty {
            command.stdin(Stdio::inherit());
        } else {
            command.stdin(Stdio::null());
        }
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());

        let mut child = command
            .spawn()
            .map_err(|e| Error::Runtime(format!("failed to execute podman run: {e}")))?;

        let status = tokio::select! {
            status = child.wait() => {
                status.map_err(|e| Error::Runtime(format!("failed to wait for container \"{primary_name}\": {e}")))
            }
            () = cancel.cancelled() => {
                debug!(job = job.name(), "cancelled; tearing down containers");
                self.cleanup(&started).await;
                return Ok(());
            }
        };

        self.cleanup(&started).await;

        match status?.code() {
            Some(0) => Ok(()),
            Some(code) => Err(Error::JobExitedNonZero {
                job: job.name().to_string(),
                code,
            }),
            None => Err(Error::Runtime(format!(
                "container \"{primary_name}\" was terminated by a signal"
            ))),
        }
    }
}

/// Builds the podman run argument list for one container
fn run_args(
    container: &Container,
    container_name: &str,
    secrets: &[String],
    source_path: &Path,
    detached: bool,
) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--name".to_string(), container_name.to_string()];
    if detached {
        args.push("-d".to_string());
    }
    for entry in secrets.iter().chain(container.environment.iter()) {
        args.push("-e".to_string());
        args.push(entry.clone());
    }
    if let Some(mount) = &container.source_mount_path {
        args.push("-v".to_string());
        args.push(format!("{}:{}", source_path.display(), mount));
    }
    if container.mount_docker_socket {
        args.push("-v".to_string());
        args.push(format!("{DOCKER_SOCKET}:{DOCKER_SOCKET}"));
    }
    if let Some(dir) = &container.working_directory {
        args.push("-w".to_string());
        args.push(dir.clone());
    }
    if container.privileged {
        args.push("--privileged".to_string());
    }
    if container.tty && !detached {
        args.push("-it".to_string());
    }
    args.push(container.image.clone());
    args.extend(container.command.iter().cloned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_full_container() {
        let container = Container {
            name: "builder".to_string(),
            image: "docker.io/library/rust:1.79".to_string(),
            command: vec!["cargo".to_string(), "build".to_string()],
            environment: vec!["PROFILE=release".to_string()],
            working_directory: Some("/src".to_string()),
            source_mount_path: Some("/src".to_string()),
            privileged: false,
            mount_docker_socket: false,
            tty: false,
        };
        let args = run_args(
            &container,
            "run-build-builder",
            &["TOKEN=abc".to_string()],
            Path::new("/home/dev/project"),
            false,
        );
        assert_eq!(
            args,
            vec![
                "run",
                "--name",
                "run-build-builder",
                "-e",
                "TOKEN=abc",
                "-e",
                "PROFILE=release",
                "-v",
                "/home/dev/project:/src",
                "-w",
                "/src",
                "docker.io/library/rust:1.79",
                "cargo",
                "build",
            ]
        );
    }

    #[test]
    fn test_run_args_detached_sidecar_never_gets_tty() {
        let mut container = Container::new("svc", "docker.io/library/redis:7");
        container.tty = true;
        let args = run_args(&container, "run-test-svc", &[], Path::new("/src"), true);
        assert!(args.contains(&"-d".to_string()));
        assert!(!args.contains(&"-it".to_string()));
    }

    #[test]
    fn test_run_args_docker_socket_mount() {
        let mut container = Container::new("dind", "docker.io/library/docker:26");
        container.mount_docker_socket = true;
        container.privileged = true;
        let args = run_args(&container, "run-dind", &[], Path::new("/src"), false);
        assert!(args.contains(&format!("{DOCKER_SOCKET}:{DOCKER_SOCKET}")));
        assert!(args.contains(&"--privileged".to_string()));
    }
}
