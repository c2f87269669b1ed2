//! Seam to the external provisioning orchestrator
//!
//! The orchestrator owns diffing, creation and convergence against live
//! cloud state. Declarations reach it one at a time with fully resolved
//! properties, in an order that respects their references.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use weather_infra_models::{ChangeKind, ResourceKind};

/// Provider-assigned properties of a registered resource
pub type ResourceOutputs = Map<String, Value>;

/// A declaration with every deferred property resolved
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRequest {
    pub kind: ResourceKind,
    pub logical_name: String,
    pub properties: Value,
}

/// Orchestrator's answer to a [`RegisterRequest`]
#[derive(Debug, Clone, PartialEq)]
pub struct Registered {
    pub change: ChangeKind,
    pub outputs: ResourceOutputs,
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Converge one resource to its declared properties
    async fn register_resource(&self, request: RegisterRequest) -> Result<Registered, ProviderError>;

    /// Run a provider query such as listing credentials
    async fn invoke(&self, token: &str, args: Value) -> Result<Value, ProviderError>;
}
