//! Review system notifications
//!
//! When the triggering event carries a recognized check payload, the
//! backend reports a started notification before unit creation and a
//! completed notification once the terminal state is known. Delivery
//! failures are logged and never change the job's reported result.

use async_trait::async_trait;
use serde::Deserialize;

/// Conclusion reported to the review system for one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckConclusion {
    Success,
    Failure,
    TimedOut,
    Cancelled,
}

impl CheckConclusion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Delivers check notifications to the external review system
///
/// The payload handed back is the triggering event's own payload; its
/// encoding belongs to the review system gateway.
#[async_trait]
pub trait CheckNotifier: Send + Sync {
    async fn check_started(
        &self,
        payload: &serde_json::Value,
        check_name: &str,
    ) -> anyhow::Result<()>;

    async fn check_completed(
        &self,
        payload: &serde_json::Value,
        check_name: &str,
        conclusion: CheckConclusion,
    ) -> anyhow::Result<()>;
}

#[derive(Deserialize, Default)]
struct PayloadKind {
    #[serde(default, rename = "type")]
    kind: String,
}

/// Whether an event payload is one the review system tracks checks for
pub(crate) fn recognizes_check_payload(payload: &serde_json::Value) -> bool {
    let kind = serde_json::from_value::<PayloadKind>(payload.clone())
        .unwrap_or_default()
        .kind;
    kind == "check_run" || kind == "check_suite"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recognizes_check_payloads() {
        assert!(recognizes_check_payload(&json!({"type": "check_suite"})));
        assert!(recognizes_check_payload(&json!({"type": "check_run"})));
        assert!(!recognizes_check_payload(&json!({"type": "push"})));
        assert!(!recognizes_check_payload(&json!({})));
        assert!(!recognizes_check_payload(&json!("not an object")));
    }

    #[test]
    fn test_conclusion_wire_names() {
        assert_eq!(CheckConclusion::Success.as_str(), "success");
        assert_eq!(CheckConclusion::Failure.as_str(), "failure");
        assert_eq!(CheckConclusion::TimedOut.as_str(), "timed_out");
        assert_eq!(CheckConclusion::Cancelled.as_str(), "cancelled");
    }
}
