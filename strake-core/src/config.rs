//! Configuration model and pipeline resolver
//!
//! Parses the declarative pipeline document into typed jobs and pipelines:
//! - Job and pipeline names are inferred from their mapping keys
//! - Stage job references are resolved to job definitions at load time
//! - The tree is read-only once loaded; accessors hand out copies

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::selector::Selector;

/// A single container of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    /// Command line in exec form
    #[serde(default)]
    pub command: Vec<String>,
    /// Declared environment as KEY=VALUE pairs
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
    /// Where to mount the project source inside the container
    #[serde(default)]
    pub source_mount_path: Option<String>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub mount_docker_socket: bool,
    #[serde(default)]
    pub tty: bool,
}

impl Container {
    /// Creates a minimal container spec; remaining fields take defaults
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            environment: Vec::new(),
            working_directory: None,
            source_mount_path: None,
            privileged: false,
            mount_docker_socket: false,
            tty: false,
        }
    }
}

/// A named, ordered set of containers executed as one unit of work
///
/// The last container is the primary: its exit status decides the job's
/// outcome. All preceding containers are sidecars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Inferred from the job's key in the config document
    #[serde(skip)]
    name: String,
    containers: Vec<Container>,
}

impl Job {
    /// Creates a job directly, bypassing document loading
    pub fn new(name: impl Into<String>, containers: Vec<Container>) -> Self {
        Self {
            name: name.into(),
            containers,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }
}

/// A set of jobs that must all complete before the next stage starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(default)]
    pub jobs: Vec<String>,
}

/// A named, ordered sequence of stages gated by selection criteria
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Inferred from the pipeline's key in the config document
    #[serde(skip)]
    name: String,
    #[serde(default)]
    criteria: Option<Selector>,
    #[serde(default)]
    stages: Vec<Stage>,
    /// Stage job references resolved to definitions at load time
    #[serde(skip)]
    jobs: Vec<Vec<Job>>,
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared stages, as lists of job names
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The resolved jobs of each stage, in stage order
    pub fn jobs(&self) -> &[Vec<Job>] {
        &self.jobs
    }

    /// Decides whether this pipeline should run for a (branch, tag) pair.
    ///
    /// A pipeline without criteria never matches.
    pub fn matches(&self, branch: &str, tag: &str) -> Result<bool> {
        match &self.criteria {
            Some(selector) => selector.matches(branch, tag),
            None => Ok(false),
        }
    }

    fn resolve_jobs(&mut self, jobs: &BTreeMap<String, Job>) -> Result<()> {
        self.jobs = Vec::with_capacity(self.stages.len());
        for (stage_index, stage) in self.stages.iter().enumerate() {
            let mut stage_jobs = Vec::with_capacity(stage.jobs.len());
            for job_name in &stage.jobs {
                let job = jobs.get(job_name).ok_or_else(|| Error::UnresolvedJobReference {
                    pipeline: self.name.clone(),
                    stage_index,
                    job: job_name.clone(),
                })?;
                stage_jobs.push(job.clone());
            }
            self.jobs.push(stage_jobs);
        }
        Ok(())
    }
}

/// The root of the configuration tree
///
/// Read-only after loading; the job and pipeline maps never change and
/// all accessors return independent copies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    jobs: BTreeMap<String, Job>,
    #[serde(default)]
    pipelines: BTreeMap<String, Pipeline>,
}

impl Config {
    /// Loads and resolves configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&document)
    }

    /// Parses and resolves configuration from a YAML document
    pub fn from_yaml(document: &str) -> Result<Self> {
        let mut config: Config = serde_yml::from_str(document)?;
        config.resolve()?;
        Ok(config)
    }

    /// Assigns inferred names and resolves stage job references.
    ///
    /// Violations here are load-time failures; nothing downstream ever
    /// sees a half-resolved tree.
    fn resolve(&mut self) -> Result<()> {
        for (name, job) in &mut self.jobs {
            job.name = name.clone();
            if job.containers.is_empty() {
                return Err(Error::EmptyJob(name.clone()));
            }
        }
        let jobs = &self.jobs;
        for (name, pipeline) in &mut self.pipelines {
            pipeline.name = name.clone();
            pipeline.resolve_jobs(jobs)?;
        }
        Ok(())
    }

    /// All jobs, lexicographically sorted by name
    pub fn all_jobs(&self) -> Vec<Job> {
        self.jobs.values().cloned().collect()
    }

    /// The named jobs, in the caller-requested order.
    ///
    /// The first unknown name is fatal; unresolved requests are never
    /// silently skipped.
    pub fn jobs<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Job>> {
        let mut jobs = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let job = self
                .jobs
                .get(name)
                .ok_or_else(|| Error::JobNotFound(name.to_string()))?;
            jobs.push(job.clone());
        }
        Ok(jobs)
    }

    /// All pipelines, lexicographically sorted by name
    pub fn all_pipelines(&self) -> Vec<Pipeline> {
        self.pipelines.values().cloned().collect()
    }

    /// The named pipelines, in the caller-requested order
    pub fn pipelines<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Pipeline>> {
        let mut pipelines = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let pipeline = self
                .pipelines
                .get(name)
                .ok_or_else(|| Error::PipelineNotFound(name.to_string()))?;
            pipelines.push(pipeline.clone());
        }
        Ok(pipelines)
    }
}
