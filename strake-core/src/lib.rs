//! Core types for Strake
//!
//! This crate contains:
//! - The configuration model and pipeline resolver (jobs, containers,
//!   pipelines, stages, selectors)
//! - Trigger events and pipeline matching
//! - Project policy records and secrets loading
//! - The shared error taxonomy
//!
//! Execution lives in the runner crate; this crate is pure data and
//! resolution logic.

pub mod config;
pub mod error;
pub mod event;
pub mod project;
pub mod secrets;
pub mod selector;

pub use config::{Config, Container, Job, Pipeline, Stage};
pub use error::{AggregateError, Error, PolicyBreach, Result};
pub use event::{ResolvedRefs, TriggerEvent, matching_pipelines};
pub use project::Project;
pub use selector::{RefRules, Selector};
