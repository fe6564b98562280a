//! Cluster orchestrator backend
//!
//! Materializes each job as one execution unit and watches it to a
//! terminal state. The scheduler itself sits behind the [`ClusterApi`]
//! seam; policy gates, environment composition, and the watch state
//! machine live here.

pub mod api;
mod lifecycle;
pub mod notify;
mod unit;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use strake_core::error::{Error, Result};
use strake_core::{Job, Project, TriggerEvent};
use tracing::{info, warn};

use crate::backend::OrchestratorBackend;
use crate::cancel::CancellationToken;
use crate::cluster::api::ClusterApi;
pub use crate::cluster::lifecycle::UnitOutcome;
use crate::cluster::notify::{CheckConclusion, CheckNotifier, recognizes_check_payload};
use crate::cluster::unit::{build_unit_spec, unit_name};

/// How long a unit may take to reach a terminal state before the watch
/// gives up on it
pub const DEFAULT_UNIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Orchestrator backend that schedules jobs as cluster execution units
///
/// Constructed once per build: the project policy, the triggering event,
/// and the source volume claim are fixed for every job of that build.
pub struct ClusterBackend {
    api: Arc<dyn ClusterApi>,
    project: Project,
    event: TriggerEvent,
    source_volume_claim: String,
    notifier: Option<Arc<dyn CheckNotifier>>,
    unit_timeout: Duration,
}

impl ClusterBackend {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        project: Project,
        event: TriggerEvent,
        source_volume_claim: impl Into<String>,
    ) -> Self {
        Self {
            api,
            project,
            event,
            source_volume_claim: source_volume_claim.into(),
            notifier: None,
            unit_timeout: DEFAULT_UNIT_TIMEOUT,
        }
    }

    /// Attaches a notifier for review-system check updates
    pub fn with_notifier(mut self, notifier: Arc<dyn CheckNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Overrides the unit watch deadline
    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = timeout;
        self
    }

    async fn run_unit(
        &self,
        cancel: &CancellationToken,
        shared_environment: &[String],
        execution_name: &str,
        job: &Job,
    ) -> Result<UnitOutcome> {
        let spec = build_unit_spec(
            &self.project,
            &self.event,
            shared_environment,
            &self.source_volume_claim,
            execution_name,
            job,
        )?;
        let primary_name = spec
            .containers
            .first()
            .map(|c| c.name.clone())
            .ok_or_else(|| Error::Runtime(format!("job \"{}\" has no containers", job.name())))?;

        info!(unit = %spec.name, job = job.name(), "creating execution unit");
        self.api
            .create_unit(&spec)
            .await
            .map_err(|e| Error::UnitCreation {
                unit: spec.name.clone(),
                message: format!("{e:#}"),
            })?;

        let watch = self
            .api
            .watch_unit(&spec.name)
            .await
            .map_err(|e| Error::WatchSubscription {
                unit: spec.name.clone(),
                message: format!("{e:#}"),
            })?;

        lifecycle::watch_to_completion(watch, cancel, &spec.name, &primary_name, self.unit_timeout)
            .await
    }
}

#[async_trait]
impl OrchestratorBackend for ClusterBackend {
    async fn execute_job(
        &self,
        cancel: CancellationToken,
        secrets: &[String],
        execution_name: &str,
        _source_path: &Path,
        job: &Job,
    ) -> Result<()> {
        // Cluster jobs read source from the build's volume claim; the
        // local source path plays no role here.
        let notifier = self
            .notifier
            .as_ref()
            .filter(|_| recognizes_check_payload(&self.event.payload));

        if let Some(notifier) = notifier {
            if let Err(e) = notifier.check_started(&self.event.payload, job.name()).await {
                warn!(job = job.name(), "failed to deliver start notification: {e:#}");
            }
        }

        let outcome = self
            .run_unit(&cancel, secrets, execution_name, job)
            .await;

        if let Some(notifier) = notifier {
            let conclusion = match &outcome {
                Ok(UnitOutcome::Succeeded) => CheckConclusion::Success,
                Ok(UnitOutcome::Cancelled) => CheckConclusion::Cancelled,
                Ok(UnitOutcome::TimedOut) => CheckConclusion::TimedOut,
                Ok(UnitOutcome::Failed) | Err(_) => CheckConclusion::Failure,
            };
            if let Err(e) = notifier
                .check_completed(&self.event.payload, job.name(), conclusion)
                .await
            {
                warn!(job = job.name(), "failed to deliver completion notification: {e:#}");
            }
        }

        let unit = unit_name(execution_name, &self.event.build_id);
        match outcome? {
            UnitOutcome::Succeeded | UnitOutcome::Cancelled => Ok(()),
            UnitOutcome::Failed => Err(Error::UnitFailed { unit }),
            UnitOutcome::TimedOut => Err(Error::TimedOut { unit }),
        }
    }
}
