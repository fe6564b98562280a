//! Unit lifecycle watching
//!
//! A created unit is watched to exactly one of four terminal outcomes.
//! The wait is a single select over three event sources: the unit's
//! status feed, the deadline timer, and the caller's cancellation signal;
//! whichever fires first decides the transition. The feed subscription is
//! released on every exit path.

use std::time::Duration;

use strake_core::error::{Error, Result};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::cluster::api::{CLEAN_EXIT_REASON, UnitWatch};

/// Terminal outcome of one execution unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

/// Watches one unit until its primary container reaches a terminal state.
///
/// Only the primary (position-zero) container's status is consulted;
/// sidecar terminations never decide the outcome. Returns an error only
/// when the status feed closes before any terminal state was observed.
pub(crate) async fn watch_to_completion(
    mut watch: UnitWatch,
    cancel: &CancellationToken,
    unit_name: &str,
    primary_name: &str,
    timeout: Duration,
) -> Result<UnitOutcome> {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            status = watch.next() => {
                let status = match status {
                    Some(status) => status,
                    None => {
                        return Err(Error::WatchSubscription {
                            unit: unit_name.to_string(),
                            message: "status feed closed before a terminal state was observed"
                                .to_string(),
                        });
                    }
                };
                if let Some(primary) = status.containers.iter().find(|c| c.name == primary_name) {
                    if let Some(terminated) = &primary.terminated {
                        if terminated.reason == CLEAN_EXIT_REASON {
                            debug!(unit = unit_name, "primary container completed");
                            return Ok(UnitOutcome::Succeeded);
                        }
                        debug!(
                            unit = unit_name,
                            reason = %terminated.reason,
                            "primary container terminated uncleanly"
                        );
                        return Ok(UnitOutcome::Failed);
                    }
                }
            }
            _ = &mut deadline => {
                debug!(unit = unit_name, "no terminal state before the deadline");
                return Ok(UnitOutcome::TimedOut);
            }
            () = cancel.cancelled() => {
                debug!(unit = unit_name, "cancelled while watching");
                return Ok(UnitOutcome::Cancelled);
            }
        }
    }
}
