//! Property trees of resource declarations
//!
//! A declaration's properties mix literal values with deferred values owned
//! by other declarations. [`PropertyValue::preview`] renders what is known
//! now; [`PropertyValue::resolve`] waits for everything.

use crate::output::{Output, OutputError, OutputState};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Placeholder shown for values that are not known yet
pub const COMPUTED: &str = "<computed>";
/// Placeholder shown instead of secret values
pub const REDACTED: &str = "[secret]";
/// Placeholder shown for values whose producer failed
pub const FAILED: &str = "<failed>";

#[derive(Debug, Clone)]
pub enum PropertyValue {
    Literal(Value),
    Deferred(Output<Value>),
    Object(BTreeMap<String, PropertyValue>),
    Array(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, PropertyValue)>,
        K: Into<String>,
    {
        PropertyValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = PropertyValue>,
    {
        PropertyValue::Array(items.into_iter().collect())
    }

    /// True if any deferred value in the tree is secret
    pub fn is_secret(&self) -> bool {
        match self {
            PropertyValue::Literal(_) => false,
            PropertyValue::Deferred(output) => output.is_secret(),
            PropertyValue::Object(map) => map.values().any(PropertyValue::is_secret),
            PropertyValue::Array(items) => items.iter().any(PropertyValue::is_secret),
        }
    }

    /// Dotted paths of every secret deferred value; array items are
    /// addressed by index, the root as ""
    pub fn secret_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_secret_paths("", &mut paths);
        paths
    }

    fn collect_secret_paths(&self, prefix: &str, paths: &mut Vec<String>) {
        let child = |segment: &str| {
            if prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{}.{}", prefix, segment)
            }
        };
        match self {
            PropertyValue::Literal(_) => {}
            PropertyValue::Deferred(output) => {
                if output.is_secret() {
                    paths.push(prefix.to_string());
                }
            }
            PropertyValue::Object(map) => {
                for (key, value) in map {
                    value.collect_secret_paths(&child(key), paths);
                }
            }
            PropertyValue::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.collect_secret_paths(&child(&i.to_string()), paths);
                }
            }
        }
    }

    /// Render the tree with pending values as [`COMPUTED`] and secrets as [`REDACTED`]
    pub fn preview(&self) -> Value {
        match self {
            PropertyValue::Literal(value) => value.clone(),
            PropertyValue::Deferred(output) if output.is_secret() => Value::from(REDACTED),
            PropertyValue::Deferred(output) => match output.state() {
                OutputState::Resolved(value) => value,
                OutputState::Pending => Value::from(COMPUTED),
                OutputState::Failed(_) => Value::from(FAILED),
            },
            PropertyValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.preview()))
                    .collect::<Map<String, Value>>(),
            ),
            PropertyValue::Array(items) => {
                Value::Array(items.iter().map(PropertyValue::preview).collect())
            }
        }
    }

    /// Wait for every deferred value and produce the plain JSON tree
    pub fn resolve(&self) -> BoxFuture<'static, Result<Value, OutputError>> {
        match self {
            PropertyValue::Literal(value) => futures::future::ready(Ok(value.clone())).boxed(),
            PropertyValue::Deferred(output) => {
                let output = output.clone();
                async move { output.resolve().await }.boxed()
            }
            PropertyValue::Object(map) => {
                let entries: Vec<_> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.resolve()))
                    .collect();
                async move {
                    let mut resolved = Map::new();
                    for (key, pending) in entries {
                        resolved.insert(key, pending.await?);
                    }
                    Ok(Value::Object(resolved))
                }
                .boxed()
            }
            PropertyValue::Array(items) => {
                let pending: Vec<_> = items.iter().map(PropertyValue::resolve).collect();
                async move {
                    let values = futures::future::try_join_all(pending).await?;
                    Ok(Value::Array(values))
                }
                .boxed()
            }
        }
    }
}

impl<T> From<Output<T>> for PropertyValue
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    fn from(output: Output<T>) -> Self {
        PropertyValue::from(&output)
    }
}

impl<T> From<&Output<T>> for PropertyValue
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    fn from(output: &Output<T>) -> Self {
        PropertyValue::Deferred(output.try_map(|value| {
            serde_json::to_value(value).map_err(|e| OutputError::Failed {
                origin: "property serialization".to_string(),
                message: e.to_string(),
            })
        }))
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_from!(&str, String, bool, u16, u32, i64, f64);
