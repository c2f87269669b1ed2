use crate::output::OutputError;
use weather_infra_models::DeploymentReport;

/// Failure reported by an orchestrator for a resource or query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Failure while declaring or submitting the deployment
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("resource '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("export '{0}' is declared more than once")]
    DuplicateExport(String),

    #[error("inputs of '{logical_name}' could not be resolved: {source}")]
    Inputs {
        logical_name: String,
        #[source]
        source: OutputError,
    },

    #[error("orchestrator failed to apply '{logical_name}': {source}")]
    Resource {
        logical_name: String,
        #[source]
        source: ProviderError,
    },

    #[error("query {token} for '{origin}' failed: {source}")]
    Query {
        token: String,
        origin: String,
        #[source]
        source: ProviderError,
    },

    #[error("export '{name}' could not be resolved: {source}")]
    Export {
        name: String,
        #[source]
        source: OutputError,
    },
}

/// A submission that stopped before every declaration was applied
///
/// `report` lists the resources the orchestrator handled before the failure
/// and never carries exports.
#[derive(Debug, thiserror::Error)]
#[error("deployment failed: {error}")]
pub struct DeploymentFailure {
    pub report: DeploymentReport,
    #[source]
    pub error: DeployError,
}
