//! Deferred credential and key lookups
//!
//! Both lookups are keyed by an already declared resource and produce
//! secret outputs. A lookup that fails, or answers without the expected
//! fields, fails every value derived from it.

use crate::names::queries;
use crate::output::{Output, OutputError};
use crate::property::PropertyValue;
use crate::stack::Stack;
use serde::Deserialize;
use serde_json::Value;
use weather_infra_models::RegistryCredentials;

#[derive(Debug, Deserialize)]
struct RegistryPassword {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListRegistryCredentialsResult {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    passwords: Vec<RegistryPassword>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRedisKeysResult {
    #[serde(default)]
    primary_key: Option<String>,
}

/// Admin username and first password of a registry
pub fn list_registry_credentials(
    stack: &mut Stack,
    resource_group_name: &Output<String>,
    registry_name: &Output<String>,
    origin: &str,
) -> Output<RegistryCredentials> {
    let args = PropertyValue::object([
        ("resourceGroupName", resource_group_name.into()),
        ("registryName", registry_name.into()),
    ]);
    let origin = origin.to_string();

    stack
        .invoke(queries::LIST_REGISTRY_CREDENTIALS, origin.clone(), args)
        .try_map(move |raw| parse_registry_credentials(&origin, raw))
        .into_secret()
}

fn parse_registry_credentials(origin: &str, raw: Value) -> Result<RegistryCredentials, OutputError> {
    let result: ListRegistryCredentialsResult = decode(origin, queries::LIST_REGISTRY_CREDENTIALS, raw)?;

    let username = result.username.ok_or_else(|| missing(origin, "username"))?;
    let password = result
        .passwords
        .into_iter()
        .next()
        .and_then(|p| p.value)
        .ok_or_else(|| missing(origin, "passwords[0].value"))?;

    Ok(RegistryCredentials { username, password })
}

/// Primary access key of a Redis cache
pub fn list_redis_keys(
    stack: &mut Stack,
    resource_group_name: &Output<String>,
    cache_name: &Output<String>,
    origin: &str,
) -> Output<String> {
    let args = PropertyValue::object([
        ("name", cache_name.into()),
        ("resourceGroupName", resource_group_name.into()),
    ]);
    let origin = origin.to_string();

    stack
        .invoke(queries::LIST_REDIS_KEYS, origin.clone(), args)
        .try_map(move |raw| {
            let keys: ListRedisKeysResult = decode(&origin, queries::LIST_REDIS_KEYS, raw)?;
            keys.primary_key.ok_or_else(|| missing(&origin, "primaryKey"))
        })
        .into_secret()
}

fn decode<T: serde::de::DeserializeOwned>(origin: &str, token: &str, raw: Value) -> Result<T, OutputError> {
    serde_json::from_value(raw).map_err(|e| OutputError::TypeMismatch {
        origin: origin.to_string(),
        property: token.to_string(),
        expected: std::any::type_name::<T>(),
        message: e.to_string(),
    })
}

fn missing(origin: &str, property: &str) -> OutputError {
    OutputError::MissingProperty {
        origin: origin.to_string(),
        property: property.to_string(),
    }
}
