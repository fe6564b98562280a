//! Execution unit materialization
//!
//! Turns one job into one unit spec: policy gates run per container
//! before anything is created, environments are composed from project
//! secrets, the invocation's shared entries, and the container's own
//! declarations, and the last declared container is re-indexed to
//! position zero so the scheduler reports its exit status.

use std::collections::BTreeMap;

use strake_core::error::{Error, PolicyBreach, Result};
use strake_core::{Container, Job, Project, TriggerEvent};

use crate::cluster::api::{ContainerSpec, EnvValue, EnvVar, UnitSpec};

/// The deterministic, run-unique name of the unit a job materializes into
pub(crate) fn unit_name(execution_name: &str, build_id: &str) -> String {
    format!("{execution_name}-{build_id}")
}

pub(crate) fn build_unit_spec(
    project: &Project,
    event: &TriggerEvent,
    shared_environment: &[String],
    source_volume_claim: &str,
    execution_name: &str,
    job: &Job,
) -> Result<UnitSpec> {
    let mut containers = Vec::with_capacity(job.containers().len());
    for container in job.containers() {
        containers.push(build_container_spec(
            project,
            event,
            shared_environment,
            container,
        )?);
    }
    // All but the last container are sidecars: the primary moves to
    // position zero and everything before it shifts down one.
    let primary = containers
        .pop()
        .ok_or_else(|| Error::Runtime(format!("job \"{}\" has no containers", job.name())))?;
    containers.insert(0, primary);

    let mut labels = BTreeMap::new();
    labels.insert("heritage".to_string(), "strake".to_string());
    labels.insert("component".to_string(), "job".to_string());
    labels.insert("execution".to_string(), execution_name.to_string());
    labels.insert("job".to_string(), job.name().to_string());
    labels.insert("project".to_string(), project.id.clone());
    labels.insert("build".to_string(), event.build_id.clone());
    labels.insert("worker".to_string(), event.worker_id.clone());

    Ok(UnitSpec {
        name: unit_name(execution_name, &event.build_id),
        namespace: project.namespace.clone(),
        labels,
        image_pull_secrets: project.image_pull_secrets.clone(),
        source_volume_claim: source_volume_claim.to_string(),
        containers,
    })
}

fn build_container_spec(
    project: &Project,
    event: &TriggerEvent,
    shared_environment: &[String],
    container: &Container,
) -> Result<ContainerSpec> {
    if container.privileged && !project.allow_privileged_jobs {
        return Err(Error::PolicyViolation {
            container: container.name.clone(),
            breach: PolicyBreach::Privileged,
        });
    }
    if container.mount_docker_socket && !project.allow_host_mounts {
        return Err(Error::PolicyViolation {
            container: container.name.clone(),
            breach: PolicyBreach::DockerSocketMount,
        });
    }

    let mut env = Vec::new();
    for key in &project.secrets {
        env.push(EnvVar {
            name: key.clone(),
            value: EnvValue::SecretKeyRef {
                secret: event.build_id.to_lowercase(),
                key: key.clone(),
            },
        });
    }
    for entry in shared_environment.iter().chain(container.environment.iter()) {
        env.push(parse_env_entry(entry));
    }

    Ok(ContainerSpec {
        name: container.name.clone(),
        image: container.image.clone(),
        command: container.command.clone(),
        env,
        working_dir: container.working_directory.clone(),
        source_mount_path: container.source_mount_path.clone(),
        mount_docker_socket: container.mount_docker_socket,
        privileged: container.privileged,
        stdin: container.tty,
        tty: container.tty,
    })
}

fn parse_env_entry(entry: &str) -> EnvVar {
    match entry.split_once('=') {
        Some((name, value)) => EnvVar {
            name: name.to_string(),
            value: EnvValue::Literal(value.to_string()),
        },
        None => EnvVar {
            name: entry.to_string(),
            value: EnvValue::Literal(String::new()),
        },
    }
}
