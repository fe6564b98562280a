//! Trigger events and pipeline matching
//!
//! An inbound source control event either resolves to a branch (check
//! suite) or a tag (tag push) and is matched against every pipeline's
//! selection criteria. All other event kinds are a no-op.

use serde::Deserialize;
use tracing::debug;

use crate::config::{Config, Pipeline};
use crate::error::Result;

/// Event kind sent when a check suite is requested
pub const CHECK_SUITE_REQUESTED: &str = "check_suite:requested";
/// Event kind sent when a check suite is re-requested
pub const CHECK_SUITE_REREQUESTED: &str = "check_suite:rerequested";
/// Event kind sent on any ref push
pub const PUSH: &str = "push";

const TAG_REF_PREFIX: &str = "refs/tags/";

/// An inbound source control event envelope
///
/// The payload encoding is owned by the gateway that delivered the event;
/// only the few fields the matcher needs are ever decoded.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    /// Event kind, e.g. "check_suite:requested" or "push"
    pub kind: String,
    /// Raw event payload
    pub payload: serde_json::Value,
    /// Build this event belongs to
    pub build_id: String,
    /// Worker handling this event
    pub worker_id: String,
}

/// The (branch, tag) pair an event resolved to
///
/// Exactly one of the two is ever populated; an empty branch on a
/// check-suite event is valid (the head branch could not be resolved).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRefs {
    pub branch: String,
    pub tag: String,
}

#[derive(Deserialize)]
struct CheckSuitePayload {
    #[serde(default)]
    body: CheckSuiteBody,
}

#[derive(Deserialize, Default)]
struct CheckSuiteBody {
    #[serde(default)]
    check_suite: CheckSuiteRef,
}

#[derive(Deserialize, Default)]
struct CheckSuiteRef {
    #[serde(default)]
    head_branch: Option<String>,
}

#[derive(Deserialize)]
struct PushPayload {
    #[serde(rename = "ref", default)]
    git_ref: String,
}

impl TriggerEvent {
    /// Resolves this event to a branch or tag.
    ///
    /// Returns `None` for event kinds that never trigger anything: pushes
    /// that are not tag pushes, and everything that is not a check suite
    /// request. That is a no-op for the caller, not an error.
    pub fn resolve_refs(&self) -> Result<Option<ResolvedRefs>> {
        match self.kind.as_str() {
            CHECK_SUITE_REQUESTED | CHECK_SUITE_REREQUESTED => {
                let payload: CheckSuitePayload = serde_json::from_value(self.payload.clone())
                    .unwrap_or(CheckSuitePayload {
                        body: CheckSuiteBody::default(),
                    });
                let branch = payload.body.check_suite.head_branch.unwrap_or_default();
                Ok(Some(ResolvedRefs {
                    branch,
                    tag: String::new(),
                }))
            }
            PUSH => {
                let payload: PushPayload = serde_json::from_value(self.payload.clone())
                    .unwrap_or(PushPayload {
                        git_ref: String::new(),
                    });
                match payload.git_ref.strip_prefix(TAG_REF_PREFIX) {
                    Some(tag) if !tag.is_empty() => Ok(Some(ResolvedRefs {
                        branch: String::new(),
                        tag: tag.to_string(),
                    })),
                    _ => {
                        debug!("received push event that wasn't for a new tag; nothing to execute");
                        Ok(None)
                    }
                }
            }
            other => {
                debug!(kind = other, "received event kind with nothing to execute");
                Ok(None)
            }
        }
    }
}

/// Selects the pipelines whose criteria match the given event.
///
/// A selector evaluation error aborts the whole pass; a partially-matched
/// pipeline set is never returned.
pub fn matching_pipelines(config: &Config, event: &TriggerEvent) -> Result<Vec<Pipeline>> {
    let refs = match event.resolve_refs()? {
        Some(refs) => refs,
        None => return Ok(Vec::new()),
    };
    debug!(branch = %refs.branch, tag = %refs.tag, "matching pipelines against event refs");
    let mut matched = Vec::new();
    for pipeline in config.all_pipelines() {
        if pipeline.matches(&refs.branch, &refs.tag)? {
            matched.push(pipeline);
        }
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: &str, payload: serde_json::Value) -> TriggerEvent {
        TriggerEvent {
            kind: kind.to_string(),
            payload,
            build_id: "01234567".to_string(),
            worker_id: "01234567-master".to_string(),
        }
    }

    const DOCUMENT: &str = r#"
jobs:
  build:
    containers:
      - name: builder
        image: docker.io/library/alpine:3.20
pipelines:
  ci:
    criteria:
      branches:
        only: ["master"]
    stages:
      - jobs: [build]
  release:
    criteria:
      tags:
        only: ["v*"]
    stages:
      - jobs: [build]
  manual:
    stages:
      - jobs: [build]
"#;

    #[test]
    fn test_check_suite_resolves_branch() {
        let e = event(
            CHECK_SUITE_REQUESTED,
            json!({"body": {"check_suite": {"head_branch": "master"}}}),
        );
        let refs = e.resolve_refs().unwrap().unwrap();
        assert_eq!(refs.branch, "master");
        assert_eq!(refs.tag, "");
    }

    #[test]
    fn test_check_suite_without_branch_is_still_eligible() {
        let e = event(
            CHECK_SUITE_REREQUESTED,
            json!({"body": {"check_suite": {"head_branch": null}}}),
        );
        let refs = e.resolve_refs().unwrap().unwrap();
        assert_eq!(refs.branch, "");
    }

    #[test]
    fn test_tag_push_resolves_tag() {
        let e = event(PUSH, json!({"ref": "refs/tags/v1.2.3"}));
        let refs = e.resolve_refs().unwrap().unwrap();
        assert_eq!(refs.tag, "v1.2.3");
        assert_eq!(refs.branch, "");
    }

    #[test]
    fn test_branch_push_is_a_no_op() {
        let e = event(PUSH, json!({"ref": "refs/heads/master"}));
        assert!(e.resolve_refs().unwrap().is_none());
    }

    #[test]
    fn test_unknown_kind_is_a_no_op() {
        let e = event("issue_comment:created", json!({}));
        assert!(e.resolve_refs().unwrap().is_none());
    }

    #[test]
    fn test_matching_selects_branch_pipelines() {
        let config = Config::from_yaml(DOCUMENT).unwrap();
        let e = event(
            CHECK_SUITE_REQUESTED,
            json!({"body": {"check_suite": {"head_branch": "master"}}}),
        );
        let matched = matching_pipelines(&config, &e).unwrap();
        let names: Vec<&str> = matched.iter().map(Pipeline::name).collect();
        assert_eq!(names, vec!["ci"]);
    }

    #[test]
    fn test_matching_selects_tag_pipelines() {
        let config = Config::from_yaml(DOCUMENT).unwrap();
        let e = event(PUSH, json!({"ref": "refs/tags/v2.0.0"}));
        let matched = matching_pipelines(&config, &e).unwrap();
        let names: Vec<&str> = matched.iter().map(Pipeline::name).collect();
        assert_eq!(names, vec!["release"]);
    }

    #[test]
    fn test_no_op_event_selects_nothing() {
        let config = Config::from_yaml(DOCUMENT).unwrap();
        let e = event("deployment:created", json!({}));
        assert!(matching_pipelines(&config, &e).unwrap().is_empty());
    }

    #[test]
    fn test_selector_error_aborts_the_pass() {
        let document = r#"
jobs:
  build:
    containers:
      - name: builder
        image: docker.io/library/alpine:3.20
pipelines:
  broken:
    criteria:
      branches:
        only: ["release/[oops"]
    stages:
      - jobs: [build]
"#;
        let config = Config::from_yaml(document).unwrap();
        let e = event(
            CHECK_SUITE_REQUESTED,
            json!({"body": {"check_suite": {"head_branch": "release/v1"}}}),
        );
        assert!(matching_pipelines(&config, &e).is_err());
    }
}
