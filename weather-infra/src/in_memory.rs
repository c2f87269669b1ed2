//! Deterministic in-process orchestrator
//!
//! Stands in for the real provisioning engine in tests and in the CLI's
//! `simulate` command. State is kept by logical name, so registering the
//! same declaration twice reports [`ChangeKind::Same`] the second time.
//! Provider-assigned values (login servers, keys, addresses) are derived
//! from resource names and are stable across runs.

use crate::config::DEFAULT_CACHE_LOCATION;
use crate::error::ProviderError;
use crate::names::queries;
use crate::orchestrator::{Orchestrator, RegisterRequest, Registered, ResourceOutputs};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use tracing::debug;
use weather_infra_models::{ChangeKind, ResourceKind};

pub const REDIS_PORT: u16 = 6379;
pub const REDIS_SSL_PORT: u16 = 6380;

#[derive(Debug, Clone)]
struct StoredResource {
    kind: ResourceKind,
    properties: Value,
    outputs: ResourceOutputs,
}

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<String, StoredResource>,
    fail_resources: HashSet<String>,
    fail_queries: HashSet<String>,
    withheld: HashSet<(String, String)>,
    registrations: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryOrchestrator {
    state: Mutex<State>,
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make registration of `logical_name` fail
    pub fn fail_resource(&self, logical_name: &str) {
        self.lock().fail_resources.insert(logical_name.to_string());
    }

    /// Make every call of query `token` fail as unauthorized
    pub fn fail_query(&self, token: &str) {
        self.lock().fail_queries.insert(token.to_string());
    }

    /// Leave `property` out of the outputs of `logical_name`, as if the
    /// provider never assigned it
    pub fn withhold_output(&self, logical_name: &str, property: &str) {
        self.lock()
            .withheld
            .insert((logical_name.to_string(), property.to_string()));
    }

    pub fn resource_count(&self) -> usize {
        self.lock().resources.len()
    }

    /// Properties last registered for `logical_name`
    pub fn properties(&self, logical_name: &str) -> Option<Value> {
        self.lock()
            .resources
            .get(logical_name)
            .map(|r| r.properties.clone())
    }

    /// Total registrations handled, across all runs
    pub fn registrations(&self) -> usize {
        self.lock().registrations
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Orchestrator for InMemoryOrchestrator {
    async fn register_resource(&self, request: RegisterRequest) -> Result<Registered, ProviderError> {
        let mut state = self.lock();
        state.registrations += 1;

        if state.fail_resources.contains(&request.logical_name) {
            return Err(ProviderError::Rejected(format!(
                "provisioning {} failed",
                request.logical_name
            )));
        }

        if let Some(group) = request.properties.get("resourceGroupName").and_then(Value::as_str) {
            let exists = state
                .resources
                .values()
                .any(|r| r.kind == ResourceKind::ResourceGroup && output_str(&r.outputs, "name") == Some(group));
            if !exists {
                return Err(ProviderError::NotFound(format!("resource group {}", group)));
            }
        }

        let change = match state.resources.get(&request.logical_name) {
            None => ChangeKind::Create,
            Some(existing) if existing.kind == request.kind && existing.properties == request.properties => {
                ChangeKind::Same
            }
            Some(_) => ChangeKind::Update,
        };

        let mut outputs = synthesize_outputs(&request);
        for (name, property) in &state.withheld {
            if *name == request.logical_name {
                outputs.remove(property);
            }
        }
        debug!(logical_name = %request.logical_name, %change, "In-memory registration");

        state.resources.insert(
            request.logical_name,
            StoredResource {
                kind: request.kind,
                properties: request.properties,
                outputs: outputs.clone(),
            },
        );

        Ok(Registered { change, outputs })
    }

    async fn invoke(&self, token: &str, args: Value) -> Result<Value, ProviderError> {
        let state = self.lock();
        if state.fail_queries.contains(token) {
            return Err(ProviderError::Unauthorized(token.to_string()));
        }

        let group = arg(&args, "resourceGroupName")?;
        match token {
            queries::LIST_REGISTRY_CREDENTIALS => {
                let name = arg(&args, "registryName")?;
                find(&state, ResourceKind::Registry, group, name)?;
                Ok(json!({
                    "username": name,
                    "passwords": [
                        { "name": "password", "value": fake_secret("password", name) },
                        { "name": "password2", "value": fake_secret("password2", name) },
                    ],
                }))
            }
            queries::LIST_REDIS_KEYS => {
                let name = arg(&args, "name")?;
                find(&state, ResourceKind::Redis, group, name)?;
                Ok(json!({
                    "primaryKey": fake_secret("primary", name),
                    "secondaryKey": fake_secret("secondary", name),
                }))
            }
            other => Err(ProviderError::Rejected(format!("unknown query {}", other))),
        }
    }
}

fn arg<'a>(args: &'a Value, name: &str) -> Result<&'a str, ProviderError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Rejected(format!("missing argument {}", name)))
}

fn output_str<'a>(outputs: &'a ResourceOutputs, name: &str) -> Option<&'a str> {
    outputs.get(name).and_then(Value::as_str)
}

fn find<'a>(
    state: &'a State,
    kind: ResourceKind,
    group: &str,
    name: &str,
) -> Result<&'a StoredResource, ProviderError> {
    state
        .resources
        .values()
        .find(|r| {
            r.kind == kind
                && output_str(&r.outputs, "name") == Some(name)
                && r.properties.get("resourceGroupName").and_then(Value::as_str) == Some(group)
        })
        .ok_or_else(|| ProviderError::NotFound(format!("{} {} in {}", kind, name, group)))
}

/// BLAKE3 over the parts, each terminated by a zero byte
fn stable_digest(parts: &[&str]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}

fn stable_hash(parts: &[&str]) -> u64 {
    let bytes = stable_digest(parts);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&bytes.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

fn fake_secret(purpose: &str, name: &str) -> String {
    stable_digest(&[purpose, name]).to_hex().as_str()[..32].to_string()
}

fn synthesize_outputs(request: &RegisterRequest) -> ResourceOutputs {
    let name = request.logical_name.as_str();
    let mut outputs = request.properties.as_object().cloned().unwrap_or_default();
    outputs.insert("id".to_string(), json!(format!("/weather-infra/{}/{}", request.kind, name)));

    match request.kind {
        ResourceKind::ResourceGroup => {
            outputs.insert("name".to_string(), json!(name));
            outputs
                .entry("location".to_string())
                .or_insert_with(|| json!(DEFAULT_CACHE_LOCATION));
        }
        ResourceKind::Registry => {
            let registry_name: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
            outputs.insert(
                "loginServer".to_string(),
                json!(format!("{}.azurecr.io", registry_name.to_lowercase())),
            );
            outputs.insert("name".to_string(), json!(registry_name));
        }
        ResourceKind::Image => {
            let image = request.properties.get("imageName").and_then(Value::as_str).unwrap_or(name);
            outputs.insert("repoDigest".to_string(), json!(format!("sha256:{}", fake_secret("digest", image))));
        }
        ResourceKind::Redis => {
            let cache = request.properties.get("name").and_then(Value::as_str).unwrap_or(name).to_string();
            outputs.insert("hostName".to_string(), json!(format!("{}.redis.cache.windows.net", cache)));
            outputs.insert("port".to_string(), json!(REDIS_PORT));
            outputs.insert("sslPort".to_string(), json!(REDIS_SSL_PORT));
            outputs.insert("name".to_string(), json!(cache));
        }
        ResourceKind::ContainerGroup => {
            outputs.insert("name".to_string(), json!(name));
            let label = request
                .properties
                .pointer("/ipAddress/dnsNameLabel")
                .and_then(Value::as_str)
                .unwrap_or(name);
            let hash = stable_hash(&[name]);
            let mut address = request
                .properties
                .get("ipAddress")
                .cloned()
                .unwrap_or_else(|| json!({}));
            if let Some(address) = address.as_object_mut() {
                address.insert(
                    "fqdn".to_string(),
                    json!(format!("{}.{}.azurecontainer.io", label, DEFAULT_CACHE_LOCATION)),
                );
                address.insert(
                    "ip".to_string(),
                    json!(format!("20.{}.{}.{}", (hash >> 16) as u8, (hash >> 8) as u8, hash as u8)),
                );
            }
            outputs.insert("ipAddress".to_string(), address);
        }
    }

    outputs
}
