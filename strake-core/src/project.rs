//! Project policy and permissions
//!
//! The project record travels with every cluster-backed build and gates
//! what a job's containers are allowed to request.

use serde::{Deserialize, Serialize};

/// Per-project execution policy and cluster settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    /// Whether containers may request privileged execution
    #[serde(default)]
    pub allow_privileged_jobs: bool,
    /// Whether containers may mount shared host resources such as the
    /// host's docker socket
    #[serde(default)]
    pub allow_host_mounts: bool,
    /// Ordered keys of the project's secrets; each becomes one
    /// secret-backed environment variable on every container
    #[serde(default)]
    pub secrets: Vec<String>,
    /// Cluster namespace execution units are created in
    #[serde(default)]
    pub namespace: String,
    /// Image pull secret names handed to the scheduler
    #[serde(default)]
    pub image_pull_secrets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults_deny() {
        let project: Project = serde_yml::from_str("id: demo").unwrap();
        assert_eq!(project.id, "demo");
        assert!(!project.allow_privileged_jobs);
        assert!(!project.allow_host_mounts);
        assert!(project.secrets.is_empty());
    }
}
