//! Typed arguments for each declared resource
//!
//! Each `*Args` struct turns into the property tree the orchestrator
//! receives. Field names in the tree follow the provider's camelCase schema.

use crate::output::Output;
use crate::property::PropertyValue;
use weather_infra_models::RegistryCredentials;

pub const TCP: &str = "tcp";

// ============================================================================
// Resource Group
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ResourceGroupArgs {
    /// Provider default location when unset
    pub location: Option<String>,
}

impl ResourceGroupArgs {
    pub fn into_properties(self) -> PropertyValue {
        match self.location {
            Some(location) => PropertyValue::object([("location", location.into())]),
            None => PropertyValue::object(Vec::<(String, PropertyValue)>::new()),
        }
    }
}

// ============================================================================
// Container Registry
// ============================================================================

#[derive(Debug, Clone)]
pub struct RegistryArgs {
    pub resource_group_name: Output<String>,
    pub admin_user_enabled: bool,
    /// SKU name, e.g. "Basic"
    pub sku: String,
}

impl RegistryArgs {
    pub fn into_properties(self) -> PropertyValue {
        PropertyValue::object([
            ("resourceGroupName", self.resource_group_name.into()),
            ("adminUserEnabled", self.admin_user_enabled.into()),
            ("sku", PropertyValue::object([("name", self.sku.into())])),
        ])
    }
}

// ============================================================================
// Container Image
// ============================================================================

#[derive(Debug, Clone)]
pub struct ImageArgs {
    /// Full reference `<login server>/<name>:<tag>`
    pub image_name: Output<String>,
    /// Local build context
    pub context: String,
    pub platform: String,
    pub registry_server: Output<String>,
    pub registry_credentials: Output<RegistryCredentials>,
}

impl ImageArgs {
    pub fn into_properties(self) -> PropertyValue {
        PropertyValue::object([
            ("imageName", self.image_name.into()),
            (
                "build",
                PropertyValue::object([
                    ("context", self.context.into()),
                    ("platform", self.platform.into()),
                ]),
            ),
            (
                "registry",
                registry_login(&self.registry_server, &self.registry_credentials),
            ),
        ])
    }
}

fn registry_login(server: &Output<String>, credentials: &Output<RegistryCredentials>) -> PropertyValue {
    PropertyValue::object([
        ("server", server.into()),
        ("username", credentials.map(|c| c.username).into()),
        ("password", credentials.map(|c| c.password).into()),
    ])
}

// ============================================================================
// Redis Cache
// ============================================================================

#[derive(Debug, Clone)]
pub struct RedisSku {
    pub name: String,
    pub family: String,
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub struct RedisArgs {
    /// Physical cache name
    pub name: String,
    pub location: String,
    pub resource_group_name: Output<String>,
    pub enable_non_ssl_port: bool,
    pub redis_version: String,
    pub minimum_tls_version: String,
    pub maxmemory_policy: String,
    pub sku: RedisSku,
}

impl RedisArgs {
    pub fn into_properties(self) -> PropertyValue {
        PropertyValue::object([
            ("name", self.name.into()),
            ("location", self.location.into()),
            ("resourceGroupName", self.resource_group_name.into()),
            ("enableNonSslPort", self.enable_non_ssl_port.into()),
            ("redisVersion", self.redis_version.into()),
            ("minimumTlsVersion", self.minimum_tls_version.into()),
            (
                "redisConfiguration",
                PropertyValue::object([("maxmemoryPolicy", self.maxmemory_policy.into())]),
            ),
            (
                "sku",
                PropertyValue::object([
                    ("name", self.sku.name.into()),
                    ("family", self.sku.family.into()),
                    ("capacity", self.sku.capacity.into()),
                ]),
            ),
        ])
    }
}

// ============================================================================
// Container Group
// ============================================================================

#[derive(Debug, Clone)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: Output<String>,
}

impl EnvironmentVariable {
    pub fn new(name: &str, value: Output<String>) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContainerArgs {
    pub name: String,
    pub image: Output<String>,
    pub port: u16,
    pub environment: Vec<EnvironmentVariable>,
    pub cpu: f64,
    pub memory_gb: f64,
}

impl ContainerArgs {
    fn into_properties(self) -> PropertyValue {
        PropertyValue::object([
            ("name", self.name.into()),
            ("image", self.image.into()),
            ("ports", PropertyValue::array([port(self.port)])),
            (
                "environmentVariables",
                PropertyValue::array(self.environment.into_iter().map(|var| {
                    PropertyValue::object([("name", var.name.into()), ("value", var.value.into())])
                })),
            ),
            (
                "resources",
                PropertyValue::object([(
                    "requests",
                    PropertyValue::object([
                        ("cpu", self.cpu.into()),
                        ("memoryInGB", self.memory_gb.into()),
                    ]),
                )]),
            ),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct ContainerGroupArgs {
    pub resource_group_name: Output<String>,
    pub os_type: String,
    pub restart_policy: String,
    pub registry_server: Output<String>,
    pub registry_credentials: Output<RegistryCredentials>,
    pub containers: Vec<ContainerArgs>,
    pub dns_name_label: String,
    pub public_port: u16,
}

impl ContainerGroupArgs {
    pub fn into_properties(self) -> PropertyValue {
        PropertyValue::object([
            ("resourceGroupName", self.resource_group_name.into()),
            ("osType", self.os_type.into()),
            ("restartPolicy", self.restart_policy.into()),
            (
                "imageRegistryCredentials",
                PropertyValue::array([registry_login(
                    &self.registry_server,
                    &self.registry_credentials,
                )]),
            ),
            (
                "containers",
                PropertyValue::array(self.containers.into_iter().map(ContainerArgs::into_properties)),
            ),
            (
                "ipAddress",
                PropertyValue::object([
                    ("type", "Public".into()),
                    ("dnsNameLabel", self.dns_name_label.into()),
                    ("ports", PropertyValue::array([port(self.public_port)])),
                ]),
            ),
        ])
    }
}

fn port(number: u16) -> PropertyValue {
    PropertyValue::object([("port", number.into()), ("protocol", TCP.into())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{COMPUTED, REDACTED};
    use serde_json::json;

    fn credentials() -> Output<RegistryCredentials> {
        Output::secret(RegistryCredentials {
            username: "demoACR".to_string(),
            password: "pw".to_string(),
        })
    }

    #[test]
    fn test_redis_properties() {
        let (rg, _resolver) = Output::<String>::pending("demo-rg");
        let args = RedisArgs {
            name: "demo-weather-cache".to_string(),
            location: "westus3".to_string(),
            resource_group_name: rg,
            enable_non_ssl_port: true,
            redis_version: "Latest".to_string(),
            minimum_tls_version: "1.2".to_string(),
            maxmemory_policy: "allkeys-lru".to_string(),
            sku: RedisSku {
                name: "Basic".to_string(),
                family: "C".to_string(),
                capacity: 0,
            },
        };

        assert_eq!(
            args.into_properties().preview(),
            json!({
                "name": "demo-weather-cache",
                "location": "westus3",
                "resourceGroupName": COMPUTED,
                "enableNonSslPort": true,
                "redisVersion": "Latest",
                "minimumTlsVersion": "1.2",
                "redisConfiguration": { "maxmemoryPolicy": "allkeys-lru" },
                "sku": { "name": "Basic", "family": "C", "capacity": 0 },
            })
        );
    }

    #[test]
    fn test_container_group_properties_hide_secrets() {
        let args = ContainerGroupArgs {
            resource_group_name: Output::known("demo-rg".to_string()),
            os_type: "linux".to_string(),
            restart_policy: "always".to_string(),
            registry_server: Output::known("demoacr.azurecr.io".to_string()),
            registry_credentials: credentials(),
            containers: vec![ContainerArgs {
                name: "demo".to_string(),
                image: Output::known("demoacr.azurecr.io/demo:v1".to_string()),
                port: 8080,
                environment: vec![
                    EnvironmentVariable::new("PORT", Output::known("8080".to_string())),
                    EnvironmentVariable::new("WEATHER_API_KEY", Output::secret("k".to_string())),
                ],
                cpu: 1.0,
                memory_gb: 1.5,
            }],
            dns_name_label: "demo".to_string(),
            public_port: 80,
        };

        let preview = args.into_properties().preview();
        assert_eq!(preview["imageRegistryCredentials"][0]["username"], json!(REDACTED));
        assert_eq!(preview["imageRegistryCredentials"][0]["server"], json!("demoacr.azurecr.io"));
        assert_eq!(
            preview["containers"][0]["environmentVariables"],
            json!([
                { "name": "PORT", "value": "8080" },
                { "name": "WEATHER_API_KEY", "value": REDACTED },
            ])
        );
        assert_eq!(preview["containers"][0]["ports"], json!([{ "port": 8080, "protocol": "tcp" }]));
        assert_eq!(
            preview["containers"][0]["resources"]["requests"],
            json!({ "cpu": 1.0, "memoryInGB": 1.5 })
        );
        assert_eq!(
            preview["ipAddress"],
            json!({ "type": "Public", "dnsNameLabel": "demo", "ports": [{ "port": 80, "protocol": "tcp" }] })
        );
    }

    #[test]
    fn test_resource_group_location_is_optional() {
        assert_eq!(ResourceGroupArgs::default().into_properties().preview(), json!({}));
        let args = ResourceGroupArgs {
            location: Some("westus3".to_string()),
        };
        assert_eq!(args.into_properties().preview(), json!({ "location": "westus3" }));
    }
}
