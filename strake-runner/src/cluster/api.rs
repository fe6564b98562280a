//! Cluster substrate seam
//!
//! The cluster backend talks to its scheduler through this narrow
//! surface: create one execution unit, watch one execution unit. The
//! concrete client (and its wire protocol) lives behind the trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

/// Canonical reason the scheduler reports for a cleanly-completed container
pub const CLEAN_EXIT_REASON: &str = "Completed";

/// A scheduled group of containers materialized from one job
///
/// Created once per job invocation and never mutated afterwards except by
/// the scheduler itself. The container at position zero is the primary;
/// the scheduler is assumed to report exit status only for it.
#[derive(Debug, Clone, Serialize)]
pub struct UnitSpec {
    /// Deterministic, run-unique name
    pub name: String,
    pub namespace: String,
    /// Traceability labels (execution, job, build, worker, project)
    pub labels: BTreeMap<String, String>,
    pub image_pull_secrets: Vec<String>,
    /// Claim holding the project source, mounted per container spec
    pub source_volume_claim: String,
    pub containers: Vec<ContainerSpec>,
}

/// One container of an execution unit
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<EnvVar>,
    pub working_dir: Option<String>,
    pub source_mount_path: Option<String>,
    pub mount_docker_socket: bool,
    pub privileged: bool,
    pub stdin: bool,
    pub tty: bool,
}

/// An environment variable handed to the scheduler
///
/// Secret values are passed by reference, never inlined. Entries are not
/// deduplicated; last-one-wins is a property of the consuming runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: EnvValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EnvValue {
    Literal(String),
    SecretKeyRef { secret: String, key: String },
}

/// A status snapshot of one execution unit
#[derive(Debug, Clone)]
pub struct UnitStatus {
    pub containers: Vec<ContainerStatus>,
}

/// Status of one container within a unit
#[derive(Debug, Clone)]
pub struct ContainerStatus {
    pub name: String,
    pub terminated: Option<Termination>,
}

/// Terminal state of a container as reported by the scheduler
#[derive(Debug, Clone)]
pub struct Termination {
    pub reason: String,
}

/// A live subscription to one unit's status feed
///
/// Dropping the watch tears the subscription down; no further events are
/// consumed after the watcher decides an outcome.
pub struct UnitWatch {
    events: mpsc::Receiver<UnitStatus>,
}

impl UnitWatch {
    pub fn new(events: mpsc::Receiver<UnitStatus>) -> Self {
        Self { events }
    }

    /// Next status event, or `None` once the feed has closed
    pub async fn next(&mut self) -> Option<UnitStatus> {
        self.events.recv().await
    }
}

/// The cluster scheduler as seen by the backend
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Submits a unit for scheduling
    async fn create_unit(&self, spec: &UnitSpec) -> anyhow::Result<()>;

    /// Subscribes to status events scoped to one unit name
    async fn watch_unit(&self, unit_name: &str) -> anyhow::Result<UnitWatch>;
}
