//! Declaration collection and submission
//!
//! A [`Stack`] records resource declarations, provider queries and exports
//! in the order they are made. Because a declaration can only reference the
//! handle of one made before it, that order is always a valid dependency
//! order and [`Stack::submit`] can walk it front to back.

use crate::error::{DeployError, DeploymentFailure};
use crate::orchestrator::{Orchestrator, RegisterRequest, ResourceOutputs};
use crate::output::{Output, OutputError, Resolver};
use crate::property::PropertyValue;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};
use weather_infra_models::{DeploymentPhase, DeploymentReport, ResourceChange, ResourceKind};

/// A desired resource, not yet realized
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: ResourceKind,
    pub logical_name: String,
    pub properties: PropertyValue,
}

/// Reference to a declared resource, used to wire its outputs into others
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    kind: ResourceKind,
    logical_name: String,
    outputs: Output<ResourceOutputs>,
    /// Dotted paths of the declared properties that held secrets
    secret_paths: Vec<String>,
}

impl ResourceHandle {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Deferred provider-assigned property, addressed by a dotted path
    /// such as `ipAddress.fqdn`
    ///
    /// Fails if the property is absent or null once the resource is applied.
    /// Secret if the path overlaps a property that was secret on input.
    pub fn output<T>(&self, path: &str) -> Output<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let secret = self.secret_paths.iter().any(|secret| overlaps(secret, path));
        let origin = self.logical_name.clone();
        let path = path.to_string();
        let output = self
            .outputs
            .try_map(move |outputs| lookup(&origin, &outputs, &path));
        if secret {
            output.into_secret()
        } else {
            output
        }
    }
}

/// True if one path is the other or lies beneath it
fn overlaps(a: &str, b: &str) -> bool {
    let within = |inner: &str, outer: &str| {
        outer.is_empty() || inner == outer || (inner.starts_with(outer) && inner[outer.len()..].starts_with('.'))
    };
    within(a, b) || within(b, a)
}

fn lookup<T: DeserializeOwned>(
    origin: &str,
    outputs: &ResourceOutputs,
    path: &str,
) -> Result<T, OutputError> {
    let mut segments = path.split('.');
    let mut current = segments.next().and_then(|first| outputs.get(first));
    for segment in segments {
        current = current.and_then(|value| value.get(segment));
    }

    match current {
        None | Some(Value::Null) => Err(OutputError::MissingProperty {
            origin: origin.to_string(),
            property: path.to_string(),
        }),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| OutputError::TypeMismatch {
            origin: origin.to_string(),
            property: path.to_string(),
            expected: std::any::type_name::<T>(),
            message: e.to_string(),
        }),
    }
}

/// Preview of one declaration, as shown by `plan`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlannedResource {
    pub kind: ResourceKind,
    pub type_token: String,
    pub logical_name: String,
    pub properties: Value,
}

enum Entry {
    Resource {
        declaration: Declaration,
        resolver: Resolver<ResourceOutputs>,
    },
    Query {
        token: &'static str,
        origin: String,
        args: PropertyValue,
        resolver: Resolver<Value>,
    },
}

impl Entry {
    fn describe(&self) -> String {
        match self {
            Entry::Resource { declaration, .. } => declaration.logical_name.clone(),
            Entry::Query { token, origin, .. } => format!("{} ({})", token, origin),
        }
    }

    fn abandon(self, reason: &str) {
        let origin = self.describe();
        let error = OutputError::Failed {
            origin,
            message: reason.to_string(),
        };
        match self {
            Entry::Resource { resolver, .. } => resolver.fail(error),
            Entry::Query { resolver, .. } => resolver.fail(error),
        }
    }
}

pub struct Stack {
    project: String,
    name: String,
    entries: Vec<Entry>,
    exports: Vec<(String, Output<String>)>,
}

impl Stack {
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            entries: Vec::new(),
            exports: Vec::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A stack that has not been submitted only ever holds declarations
    pub fn phase(&self) -> DeploymentPhase {
        DeploymentPhase::Declared
    }

    pub fn declare(
        &mut self,
        kind: ResourceKind,
        logical_name: impl Into<String>,
        properties: PropertyValue,
    ) -> Result<ResourceHandle, DeployError> {
        let logical_name = logical_name.into();
        if self.declarations().any(|d| d.logical_name == logical_name) {
            return Err(DeployError::DuplicateName(logical_name));
        }

        let (outputs, resolver) = Output::pending(logical_name.clone());
        let secret_paths = properties.secret_paths();
        debug!(%kind, logical_name = %logical_name, secrets = secret_paths.len(), "Declared resource");

        self.entries.push(Entry::Resource {
            declaration: Declaration {
                kind,
                logical_name: logical_name.clone(),
                properties,
            },
            resolver,
        });

        Ok(ResourceHandle {
            kind,
            logical_name,
            outputs,
            secret_paths,
        })
    }

    /// Deferred provider query; `origin` names the resource it is about
    pub fn invoke(
        &mut self,
        token: &'static str,
        origin: impl Into<String>,
        args: PropertyValue,
    ) -> Output<Value> {
        let origin = origin.into();
        let (result, resolver) = Output::pending(format!("{} ({})", token, origin));
        debug!(token, origin = %origin, "Declared query");

        self.entries.push(Entry::Query {
            token,
            origin,
            args,
            resolver,
        });
        result
    }

    pub fn export(&mut self, name: impl Into<String>, value: Output<String>) -> Result<(), DeployError> {
        let name = name.into();
        if self.exports.iter().any(|(existing, _)| *existing == name) {
            return Err(DeployError::DuplicateExport(name));
        }
        self.exports.push((name, value));
        Ok(())
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Resource { declaration, .. } => Some(declaration),
            Entry::Query { .. } => None,
        })
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(|(name, _)| name.as_str())
    }

    pub fn plan(&self) -> Vec<PlannedResource> {
        self.declarations()
            .map(|d| PlannedResource {
                kind: d.kind,
                type_token: d.kind.type_token().to_string(),
                logical_name: d.logical_name.clone(),
                properties: d.properties.preview(),
            })
            .collect()
    }

    /// Hand every declaration to `orchestrator` in declaration order
    ///
    /// Stops at the first failure; every value still pending at that point
    /// fails too, and no exports are reported.
    pub async fn submit(
        self,
        orchestrator: &dyn Orchestrator,
    ) -> Result<DeploymentReport, DeploymentFailure> {
        let started_at = Utc::now();
        let mut changes = Vec::new();

        info!(
            project = %self.project,
            stack = %self.name,
            entries = self.entries.len(),
            phase = ?DeploymentPhase::Applying,
            "Submitting deployment"
        );

        let mut entries = self.entries.into_iter();
        while let Some(entry) = entries.next() {
            if let Err(err) = submit_entry(entry, orchestrator, &mut changes).await {
                error!(error = %err, phase = ?DeploymentPhase::Failed, "Deployment failed");
                for rest in entries {
                    rest.abandon("deployment stopped before this was applied");
                }
                return Err(DeploymentFailure {
                    report: DeploymentReport {
                        phase: DeploymentPhase::Failed,
                        changes,
                        exports: BTreeMap::new(),
                        started_at,
                        finished_at: Utc::now(),
                    },
                    error: err,
                });
            }
        }

        let mut exports = BTreeMap::new();
        for (name, value) in self.exports {
            match value.resolve().await {
                Ok(resolved) => {
                    exports.insert(name, resolved);
                }
                Err(source) => {
                    error!(export = %name, error = %source, "Export did not resolve");
                    return Err(DeploymentFailure {
                        report: DeploymentReport {
                            phase: DeploymentPhase::Failed,
                            changes,
                            exports: BTreeMap::new(),
                            started_at,
                            finished_at: Utc::now(),
                        },
                        error: DeployError::Export { name, source },
                    });
                }
            }
        }

        info!(
            resources = changes.len(),
            exports = exports.len(),
            phase = ?DeploymentPhase::Applied,
            "Deployment applied"
        );

        Ok(DeploymentReport {
            phase: DeploymentPhase::Applied,
            changes,
            exports,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

async fn submit_entry(
    entry: Entry,
    orchestrator: &dyn Orchestrator,
    changes: &mut Vec<ResourceChange>,
) -> Result<(), DeployError> {
    match entry {
        Entry::Resource {
            declaration,
            resolver,
        } => {
            let Declaration {
                kind,
                logical_name,
                properties,
            } = declaration;

            let properties = match properties.resolve().await {
                Ok(resolved) => resolved,
                Err(source) => {
                    resolver.fail(source.clone());
                    return Err(DeployError::Inputs {
                        logical_name,
                        source,
                    });
                }
            };

            let request = RegisterRequest {
                kind,
                logical_name: logical_name.clone(),
                properties,
            };

            match orchestrator.register_resource(request).await {
                Ok(registered) => {
                    info!(%kind, logical_name = %logical_name, change = %registered.change, "Resource registered");
                    changes.push(ResourceChange {
                        logical_name,
                        kind,
                        change: registered.change,
                    });
                    resolver.resolve(registered.outputs);
                    Ok(())
                }
                Err(source) => {
                    warn!(%kind, logical_name = %logical_name, error = %source, "Resource registration failed");
                    resolver.fail(OutputError::Failed {
                        origin: logical_name.clone(),
                        message: source.to_string(),
                    });
                    Err(DeployError::Resource {
                        logical_name,
                        source,
                    })
                }
            }
        }
        Entry::Query {
            token,
            origin,
            args,
            resolver,
        } => {
            let args = match args.resolve().await {
                Ok(resolved) => resolved,
                Err(source) => {
                    resolver.fail(source.clone());
                    return Err(DeployError::Inputs {
                        logical_name: origin,
                        source,
                    });
                }
            };

            match orchestrator.invoke(token, args).await {
                Ok(result) => {
                    debug!(token, origin = %origin, "Query resolved");
                    resolver.resolve(result);
                    Ok(())
                }
                Err(source) => {
                    warn!(token, origin = %origin, error = %source, "Query failed");
                    resolver.fail(OutputError::Failed {
                        origin: format!("{} ({})", token, origin),
                        message: source.to_string(),
                    });
                    Err(DeployError::Query {
                        token: token.to_string(),
                        origin,
                        source,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::orchestrator::Registered;
    use crate::output::OutputState;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use weather_infra_models::ChangeKind;

    /// Echoes properties back as outputs and records the order of requests
    #[derive(Default)]
    struct EchoOrchestrator {
        seen: Mutex<Vec<String>>,
        reject: Option<String>,
    }

    #[async_trait]
    impl Orchestrator for EchoOrchestrator {
        async fn register_resource(&self, request: RegisterRequest) -> Result<Registered, ProviderError> {
            self.seen.lock().unwrap().push(request.logical_name.clone());
            if self.reject.as_deref() == Some(request.logical_name.as_str()) {
                return Err(ProviderError::Rejected("quota exceeded".to_string()));
            }
            let outputs = request.properties.as_object().cloned().unwrap_or_default();
            Ok(Registered {
                change: ChangeKind::Create,
                outputs,
            })
        }

        async fn invoke(&self, token: &str, args: Value) -> Result<Value, ProviderError> {
            self.seen.lock().unwrap().push(token.to_string());
            Ok(json!({ "echo": args }))
        }
    }

    fn two_resources(stack: &mut Stack) -> (ResourceHandle, ResourceHandle) {
        let first = stack
            .declare(
                ResourceKind::ResourceGroup,
                "a",
                PropertyValue::object([("name", "group-a".into())]),
            )
            .unwrap();
        let second = stack
            .declare(
                ResourceKind::Registry,
                "b",
                PropertyValue::object([("group", first.output::<String>("name").into())]),
            )
            .unwrap();
        (first, second)
    }

    #[test]
    fn test_duplicate_logical_name_rejected() {
        let mut stack = Stack::new("p", "dev");
        stack
            .declare(ResourceKind::ResourceGroup, "x", PropertyValue::Literal(json!({})))
            .unwrap();
        let err = stack
            .declare(ResourceKind::Registry, "x", PropertyValue::Literal(Value::Null))
            .unwrap_err();
        assert!(matches!(err, DeployError::DuplicateName(name) if name == "x"));
    }

    #[test]
    fn test_plan_previews_pending_references() {
        let mut stack = Stack::new("p", "dev");
        two_resources(&mut stack);

        let plan = stack.plan();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].properties, json!({ "name": "group-a" }));
        assert_eq!(plan[1].properties, json!({ "group": crate::property::COMPUTED }));
        assert_eq!(plan[1].type_token, ResourceKind::Registry.type_token());
        assert_eq!(stack.phase(), DeploymentPhase::Declared);
    }

    #[tokio::test]
    async fn test_submit_resolves_references_in_order() {
        let mut stack = Stack::new("p", "dev");
        let (_, second) = two_resources(&mut stack);
        let group = second.output::<String>("group");
        let query = stack.invoke("test:query", "b", PropertyValue::from(&group));
        stack.export("group", group.clone()).unwrap();

        let orchestrator = EchoOrchestrator::default();
        let report = stack.submit(&orchestrator).await.unwrap();

        assert_eq!(report.phase, DeploymentPhase::Applied);
        assert_eq!(report.exports["group"], "group-a");
        assert_eq!(
            *orchestrator.seen.lock().unwrap(),
            vec!["a".to_string(), "b".to_string(), "test:query".to_string()]
        );
        assert_eq!(query.resolve().await.unwrap(), json!({ "echo": "group-a" }));
    }

    #[tokio::test]
    async fn test_failure_stops_submission_and_fails_dependents() {
        let mut stack = Stack::new("p", "dev");
        let (first, second) = two_resources(&mut stack);
        stack.export("group", second.output::<String>("group")).unwrap();

        let orchestrator = EchoOrchestrator {
            reject: Some("a".to_string()),
            ..Default::default()
        };
        let failure = stack.submit(&orchestrator).await.unwrap_err();

        assert!(matches!(failure.error, DeployError::Resource { ref logical_name, .. } if logical_name == "a"));
        assert_eq!(failure.report.phase, DeploymentPhase::Failed);
        assert!(failure.report.exports.is_empty());
        assert_eq!(*orchestrator.seen.lock().unwrap(), vec!["a".to_string()]);
        assert!(matches!(first.output::<String>("name").state(), OutputState::Failed(_)));
        assert!(second.output::<String>("group").resolve().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_output_property_fails_export() {
        let mut stack = Stack::new("p", "dev");
        let (first, _) = two_resources(&mut stack);
        stack.export("fqdn", first.output::<String>("ipAddress.fqdn")).unwrap();

        let failure = stack.submit(&EchoOrchestrator::default()).await.unwrap_err();
        match failure.error {
            DeployError::Export { name, source } => {
                assert_eq!(name, "fqdn");
                assert!(matches!(source, OutputError::MissingProperty { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(failure.report.changes.len(), 2);
    }

    #[tokio::test]
    async fn test_outputs_echoing_secret_inputs_stay_secret() {
        let mut stack = Stack::new("p", "dev");
        let group = stack
            .declare(
                ResourceKind::ContainerGroup,
                "cg",
                PropertyValue::object([
                    ("dnsNameLabel", "demo".into()),
                    (
                        "containers",
                        PropertyValue::array([PropertyValue::object([
                            ("name", "app".into()),
                            ("apiKey", Output::secret("topsecretkey".to_string()).into()),
                        ])]),
                    ),
                ]),
            )
            .unwrap();

        let containers = group.output::<Value>("containers");
        let key = group.output::<String>("containers.0.apiKey");
        let label = group.output::<String>("dnsNameLabel");
        assert!(containers.is_secret());
        assert!(key.is_secret());
        assert!(!label.is_secret());

        stack.export("containers", containers.map(|v| v.to_string())).unwrap();
        stack.submit(&EchoOrchestrator::default()).await.unwrap();
        assert!(containers.resolve().await.unwrap().to_string().contains("topsecretkey"));
        assert_eq!(label.resolve().await.unwrap(), "demo");
    }

    #[test]
    fn test_overlapping_paths() {
        assert!(overlaps("containers.0.env", "containers"));
        assert!(overlaps("registry", "registry.password"));
        assert!(overlaps("registry", "registry"));
        assert!(overlaps("", "anything"));
        assert!(!overlaps("registry", "registryServer"));
        assert!(!overlaps("ipAddress.fqdn", "ipAddress.ip"));
    }

    #[test]
    fn test_lookup_follows_dotted_paths() {
        let outputs = json!({ "ipAddress": { "ip": "1.2.3.4", "fqdn": null } });
        let outputs = outputs.as_object().unwrap();
        assert_eq!(lookup::<String>("cg", outputs, "ipAddress.ip").unwrap(), "1.2.3.4");
        assert!(matches!(
            lookup::<String>("cg", outputs, "ipAddress.fqdn"),
            Err(OutputError::MissingProperty { .. })
        ));
        assert!(matches!(
            lookup::<u16>("cg", outputs, "ipAddress.ip"),
            Err(OutputError::TypeMismatch { .. })
        ));
    }
}
