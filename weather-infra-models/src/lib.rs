use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Environment variable names injected into the weather service container
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const WEATHER_API_KEY: &str = "WEATHER_API_KEY";
    pub const REDIS_URL: &str = "REDIS_URL";
}

/// Names of the values exported by a successful deployment
pub mod exports {
    pub const HOSTNAME: &str = "hostname";
    pub const IP: &str = "ip";
    pub const URL: &str = "url";
}

/// Kind of cloud resource a declaration asks for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ResourceGroup,
    Registry,
    Image,
    Redis,
    ContainerGroup,
}

impl ResourceKind {
    /// Provider type token understood by the orchestrator
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::ResourceGroup => "azure-native:resources:ResourceGroup",
            ResourceKind::Registry => "azure-native:containerregistry:Registry",
            ResourceKind::Image => "docker:index/image:Image",
            ResourceKind::Redis => "azure-native:cache:Redis",
            ResourceKind::ContainerGroup => "azure-native:containerinstance:ContainerGroup",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::ResourceGroup => "resource-group",
            ResourceKind::Registry => "registry",
            ResourceKind::Image => "image",
            ResourceKind::Redis => "redis",
            ResourceKind::ContainerGroup => "container-group",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a whole deployment run
///
/// Declaration code only ever produces `Declared`; the remaining phases are
/// driven by the orchestrator's answers during submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentPhase {
    Declared,
    Diffed,
    Applying,
    Applied,
    Failed,
}

/// What the orchestrator did with one registered resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Same,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Create => f.write_str("create"),
            ChangeKind::Update => f.write_str("update"),
            ChangeKind::Same => f.write_str("same"),
        }
    }
}

/// Admin credentials of a container registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

/// Result of registering one resource with the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceChange {
    pub logical_name: String,
    pub kind: ResourceKind,
    pub change: ChangeKind,
}

/// Summary of one submission of the deployment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentReport {
    pub phase: DeploymentPhase,
    pub changes: Vec<ResourceChange>,
    /// Resolved exports; empty unless the run was applied
    pub exports: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentReport {
    /// True if no registered resource was created or updated
    pub fn is_unchanged(&self) -> bool {
        self.changes.iter().all(|c| c.change == ChangeKind::Same)
    }

    pub fn count(&self, change: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.change == change).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(name: &str, change: ChangeKind) -> ResourceChange {
        ResourceChange {
            logical_name: name.to_string(),
            kind: ResourceKind::Registry,
            change,
        }
    }

    #[test]
    fn test_report_unchanged_only_when_all_same() {
        let now = Utc::now();
        let mut report = DeploymentReport {
            phase: DeploymentPhase::Applied,
            changes: vec![change("a", ChangeKind::Same), change("b", ChangeKind::Same)],
            exports: BTreeMap::new(),
            started_at: now,
            finished_at: now,
        };
        assert!(report.is_unchanged());

        report.changes.push(change("c", ChangeKind::Create));
        assert!(!report.is_unchanged());
        assert_eq!(report.count(ChangeKind::Create), 1);
        assert_eq!(report.count(ChangeKind::Same), 2);
    }

    #[test]
    fn test_phase_serializes_lowercase() {
        let json = serde_json::to_string(&DeploymentPhase::Applied).unwrap();
        assert_eq!(json, "\"applied\"");
    }

    #[test]
    fn test_type_tokens_are_distinct() {
        let kinds = [
            ResourceKind::ResourceGroup,
            ResourceKind::Registry,
            ResourceKind::Image,
            ResourceKind::Redis,
            ResourceKind::ContainerGroup,
        ];
        let tokens: std::collections::HashSet<_> = kinds.iter().map(|k| k.type_token()).collect();
        assert_eq!(tokens.len(), kinds.len());
    }
}
