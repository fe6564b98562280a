//! Orchestrator backends
//!
//! The engine's sole point of contact with any execution substrate is the
//! single-method [`OrchestratorBackend`] trait. The two variants (podman
//! for local runs, cluster for scheduled units) are selected at
//! construction time; the engine never inspects which one it holds.

pub mod podman;

use std::path::Path;

use async_trait::async_trait;
use strake_core::Job;
use strake_core::error::Result;

use crate::cancel::CancellationToken;

/// Executes one job to exactly one terminal result
///
/// Contract: every invocation produces precisely one result; cancellation
/// must be honored by resolving (reporting a result), never by hanging;
/// cancellation itself is reported as success, not as an error.
#[async_trait]
pub trait OrchestratorBackend: Send + Sync {
    async fn execute_job(
        &self,
        cancel: CancellationToken,
        secrets: &[String],
        execution_name: &str,
        source_path: &Path,
        job: &Job,
    ) -> Result<()>;
}
