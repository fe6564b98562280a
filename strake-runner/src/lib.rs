//! Strake Runner
//!
//! The pipeline/job execution engine and its orchestrator backends.
//!
//! Architecture:
//! - Engine: stage-sequenced, concurrency-controlled dispatch with image
//!   prefetch and error aggregation
//! - Backends: one capability trait with two variants, the podman
//!   backend for local runs and the cluster backend for scheduled units
//! - Cluster lifecycle: unit materialization, policy gates, and the
//!   watch/timeout/cancellation state machine
//!
//! The engine treats backends as opaque: it dispatches jobs and waits for
//! exactly one terminal result per job, nothing more.

pub mod backend;
pub mod cancel;
pub mod cluster;
pub mod engine;
pub mod namer;
pub mod pull;

pub use backend::OrchestratorBackend;
pub use backend::podman::PodmanBackend;
pub use cancel::CancellationToken;
pub use cluster::{ClusterBackend, DEFAULT_UNIT_TIMEOUT};
pub use engine::{Engine, PipelinePlan, RunOptions, pipeline_plan};
pub use pull::{ImagePuller, PodmanImagePuller};
