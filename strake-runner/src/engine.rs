//! Pipeline and job execution engine
//!
//! The engine turns a resolved configuration plus a set of job or
//! pipeline names into dispatched work:
//! - Every image a run needs is pulled up front, deduplicated, before
//!   any job starts
//! - One random run identifier per invocation prefixes every execution
//!   name, so all units of a run are discoverable together
//! - Flat job lists and pipeline stages share one dispatch path; the
//!   concurrency flag decides whether it blocks per job or fans out and
//!   joins by counting results
//! - A stage never begins until every job of the previous stage reached
//!   a terminal state; any failure aborts everything that follows

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use strake_core::error::{self, Error, Result};
use strake_core::{Config, Job, TriggerEvent, matching_pipelines};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::backend::OrchestratorBackend;
use crate::cancel::CancellationToken;
use crate::namer;
use crate::pull::ImagePuller;

/// Per-invocation execution options
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Report the resolved execution plan without dispatching anything
    pub dry_run: bool,
    /// Fan out jobs within a batch instead of running them one at a time
    pub concurrent: bool,
}

/// The stage-grouped job names one pipeline run would execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    pub pipeline: String,
    pub stages: Vec<Vec<String>>,
}

/// Computes the execution plan for the named pipelines, in caller order
pub fn pipeline_plan<S: AsRef<str>>(config: &Config, names: &[S]) -> Result<Vec<PipelinePlan>> {
    let pipelines = config.pipelines(names)?;
    Ok(pipelines
        .iter()
        .map(|pipeline| PipelinePlan {
            pipeline: pipeline.name().to_string(),
            stages: pipeline
                .jobs()
                .iter()
                .map(|stage| stage.iter().map(|job| job.name().to_string()).collect())
                .collect(),
        })
        .collect())
}

/// The stage sequencer, concurrency controller, and fan-out/fan-in driver
pub struct Engine {
    backend: Arc<dyn OrchestratorBackend>,
    puller: Arc<dyn ImagePuller>,
}

impl Engine {
    pub fn new(backend: Arc<dyn OrchestratorBackend>, puller: Arc<dyn ImagePuller>) -> Self {
        Self { backend, puller }
    }

    /// Executes the named jobs as a flat list.
    ///
    /// No ordering dependency exists between the jobs; the concurrency
    /// flag alone decides whether they run one at a time or all at once.
    pub async fn execute_jobs<S: AsRef<str>>(
        &self,
        cancel: CancellationToken,
        config: &Config,
        secrets: &[String],
        source_path: &Path,
        job_names: &[S],
        options: RunOptions,
    ) -> Result<()> {
        let jobs = config.jobs(job_names)?;
        if options.dry_run {
            let names: Vec<&str> = jobs.iter().map(Job::name).collect();
            println!("would execute jobs: {names:?}");
            return Ok(());
        }

        self.prefetch_images(jobs.iter()).await?;

        let run_name = namer::random_name();
        info!(run = %run_name, "executing {} job(s)", jobs.len());
        let batch = jobs
            .into_iter()
            .map(|job| {
                let execution_name = format!("{}-{}", run_name, job.name());
                (execution_name, job)
            })
            .collect();
        self.run_batch(&cancel, secrets, source_path, batch, options.concurrent)
            .await
    }

    /// Executes the named pipelines, stage by stage, in caller order.
    ///
    /// A stage never begins until every job of the previous stage has
    /// reached a terminal state; any failure aborts all subsequent stages
    /// and all subsequent pipelines of this invocation.
    pub async fn execute_pipelines<S: AsRef<str>>(
        &self,
        cancel: CancellationToken,
        config: &Config,
        secrets: &[String],
        source_path: &Path,
        pipeline_names: &[S],
        options: RunOptions,
    ) -> Result<()> {
        let pipelines = config.pipelines(pipeline_names)?;
        if options.dry_run {
            println!("would execute:");
            for plan in pipeline_plan(config, pipeline_names)? {
                println!("  {} jobs: {:?}", plan.pipeline, plan.stages);
            }
            return Ok(());
        }

        self.prefetch_images(pipelines.iter().flat_map(|p| p.jobs().iter().flatten()))
            .await?;

        let run_name = namer::random_name();
        for pipeline in pipelines {
            println!("====> executing pipeline \"{}\" <====", pipeline.name());
            let pipeline_execution = format!("{}-{}", run_name, pipeline.name());
            for (stage_index, stage_jobs) in pipeline.jobs().iter().enumerate() {
                println!("====> executing stage {stage_index} <====");
                let stage_execution = format!("{pipeline_execution}-stage{stage_index}");
                let batch = stage_jobs
                    .iter()
                    .map(|job| {
                        let execution_name = format!("{}-{}", stage_execution, job.name());
                        (execution_name, job.clone())
                    })
                    .collect();
                self.run_batch(&cancel, secrets, source_path, batch, options.concurrent)
                    .await?;
            }
        }
        Ok(())
    }

    /// Executes every pipeline whose criteria match the given event.
    ///
    /// Events that resolve to neither a branch nor a tag, and events no
    /// pipeline selects, are a no-op. A selector evaluation error aborts
    /// the invocation before anything is dispatched.
    pub async fn execute_triggered(
        &self,
        cancel: CancellationToken,
        config: &Config,
        secrets: &[String],
        source_path: &Path,
        event: &TriggerEvent,
        options: RunOptions,
    ) -> Result<()> {
        let matched = matching_pipelines(config, event)?;
        if matched.is_empty() {
            info!(kind = %event.kind, "no pipelines matched the event; nothing to execute");
            return Ok(());
        }
        let names: Vec<String> = matched.iter().map(|p| p.name().to_string()).collect();
        self.execute_pipelines(cancel, config, secrets, source_path, &names, options)
            .await
    }

    /// Ensures every image the given jobs reference is present.
    ///
    /// Images are deduplicated across jobs so nothing is pulled twice;
    /// the first pull failure aborts the run before any job starts.
    async fn prefetch_images<'a>(&self, jobs: impl Iterator<Item = &'a Job>) -> Result<()> {
        let images: BTreeSet<&str> = jobs
            .flat_map(|job| job.containers().iter().map(|c| c.image.as_str()))
            .collect();
        for image in images {
            println!("~~~~> pulling image \"{image}\" <~~~~");
            self.puller.pull(image).await?;
        }
        Ok(())
    }

    /// Dispatches one batch of jobs and waits for their results.
    ///
    /// Both concurrency modes share this path. Sequential mode blocks on
    /// each job's single result before dispatching the next, so the first
    /// failure leaves later jobs undispatched. Concurrent mode dispatches
    /// everything, then joins by counting received results rather than
    /// by time, collecting every failure for the aggregator.
    async fn run_batch(
        &self,
        cancel: &CancellationToken,
        secrets: &[String],
        source_path: &Path,
        batch: Vec<(String, Job)>,
        concurrent: bool,
    ) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<Result<()>>(batch.len().max(1));
        let mut in_flight = 0usize;

        for (execution_name, job) in batch {
            debug!(execution = %execution_name, "dispatching job");
            let backend = Arc::clone(&self.backend);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let secrets = secrets.to_vec();
            let source_path = source_path.to_path_buf();
            in_flight += 1;
            tokio::spawn(async move {
                let result = backend
                    .execute_job(cancel, &secrets, &execution_name, &source_path, &job)
                    .await;
                let _ = tx.send(result).await;
            });

            if !concurrent {
                match rx.recv().await {
                    Some(Ok(())) => in_flight -= 1,
                    Some(Err(e)) => return Err(e),
                    None => {
                        return Err(Error::Runtime(
                            "completion channel closed before all results arrived".to_string(),
                        ));
                    }
                }
            }
        }
        drop(tx);

        if !concurrent {
            return Ok(());
        }

        let mut errors = Vec::new();
        while in_flight > 0 {
            match rx.recv().await {
                Some(result) => {
                    if let Err(e) = result {
                        errors.push(e);
                    }
                    in_flight -= 1;
                }
                None => break,
            }
        }
        error::merge(errors)
    }
}
