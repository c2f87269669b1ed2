//! The weather service deployment
//!
//! Declares, in dependency order: resource group, container registry and its
//! admin credentials, the service image, the Redis cache and its access key,
//! the cache connection string, and the public container group. Exports the
//! container group's hostname, IP address and URL.

use crate::config::DeploymentConfig;
use crate::connection_strings::{redis_url, service_url};
use crate::error::DeployError;
use crate::names::ResourceNames;
use crate::output::Output;
use crate::queries::{list_redis_keys, list_registry_credentials};
use crate::stack::{ResourceHandle, Stack};
use crate::types::{
    ContainerArgs, ContainerGroupArgs, EnvironmentVariable, ImageArgs, RedisArgs, RedisSku,
    RegistryArgs, ResourceGroupArgs,
};
use secrecy::ExposeSecret;
use tracing::{info, warn};
use weather_infra_models::{env_vars, exports, RegistryCredentials, ResourceKind};

pub const REGISTRY_SKU: &str = "Basic";
pub const REDIS_VERSION: &str = "Latest";
pub const REDIS_MINIMUM_TLS_VERSION: &str = "1.2";
pub const REDIS_MAXMEMORY_POLICY: &str = "allkeys-lru";
pub const REDIS_SKU_NAME: &str = "Basic";
pub const REDIS_SKU_FAMILY: &str = "C";
pub const REDIS_SKU_CAPACITY: u32 = 0;
pub const OS_TYPE: &str = "linux";
pub const RESTART_POLICY: &str = "always";

/// Values exported by a successful run
#[derive(Debug, Clone)]
pub struct Exports {
    pub hostname: Output<String>,
    pub ip: Output<String>,
    pub url: Output<String>,
}

/// Handles to everything the deployment declares
#[derive(Debug, Clone)]
pub struct WeatherDeployment {
    pub names: ResourceNames,
    pub resource_group: ResourceHandle,
    pub registry: ResourceHandle,
    pub registry_credentials: Output<RegistryCredentials>,
    pub image: ResourceHandle,
    pub redis: ResourceHandle,
    pub redis_access_key: Output<String>,
    pub redis_connection_string: Output<String>,
    pub container_group: ResourceHandle,
    pub exports: Exports,
}

/// Declare the whole deployment on `stack`
///
/// Performs no I/O; the declarations resolve once the stack is submitted.
pub fn declare(config: &DeploymentConfig, stack: &mut Stack) -> Result<WeatherDeployment, DeployError> {
    let names = ResourceNames::derive(&config.prefix_name);
    info!(prefix = %names.prefix, stack = %stack.name(), "Declaring weather service deployment");

    // Resource group
    let resource_group = stack.declare(
        ResourceKind::ResourceGroup,
        &names.resource_group,
        ResourceGroupArgs::default().into_properties(),
    )?;
    let resource_group_name = resource_group.output::<String>("name");

    // Container registry and its admin credentials
    let registry = stack.declare(
        ResourceKind::Registry,
        &names.registry,
        RegistryArgs {
            resource_group_name: resource_group_name.clone(),
            admin_user_enabled: true,
            sku: REGISTRY_SKU.to_string(),
        }
        .into_properties(),
    )?;
    let registry_name = registry.output::<String>("name");
    let login_server = registry.output::<String>("loginServer");
    let registry_credentials = list_registry_credentials(
        stack,
        &resource_group_name,
        &registry_name,
        &names.registry,
    );

    // Service image
    let image_name = config.image_name().to_string();
    let image_tag = config.image_tag.clone();
    let image = stack.declare(
        ResourceKind::Image,
        &names.image,
        ImageArgs {
            image_name: login_server
                .map(move |server| ResourceNames::image_reference(&server, &image_name, &image_tag)),
            context: config.app_path.clone(),
            platform: config.image_platform.clone(),
            registry_server: login_server.clone(),
            registry_credentials: registry_credentials.clone(),
        }
        .into_properties(),
    )?;

    // Redis cache, its access key and the connection string built from them
    if config.enable_non_ssl_port {
        warn!(cache = %names.cache, "Cache is declared with the non-TLS port enabled");
    }
    let redis = stack.declare(
        ResourceKind::Redis,
        &names.redis,
        RedisArgs {
            name: names.cache.clone(),
            location: config.cache_location.clone(),
            resource_group_name: resource_group_name.clone(),
            enable_non_ssl_port: config.enable_non_ssl_port,
            redis_version: REDIS_VERSION.to_string(),
            minimum_tls_version: REDIS_MINIMUM_TLS_VERSION.to_string(),
            maxmemory_policy: REDIS_MAXMEMORY_POLICY.to_string(),
            sku: RedisSku {
                name: REDIS_SKU_NAME.to_string(),
                family: REDIS_SKU_FAMILY.to_string(),
                capacity: REDIS_SKU_CAPACITY,
            },
        }
        .into_properties(),
    )?;
    let redis_access_key = list_redis_keys(
        stack,
        &resource_group_name,
        &redis.output::<String>("name"),
        &names.redis,
    );
    let redis_connection_string = redis_url(
        &redis_access_key,
        &redis.output::<String>("hostName"),
        &redis.output::<u16>("sslPort"),
    );

    // Public container group running the image
    let container = ContainerArgs {
        name: names.image_name.clone(),
        image: image.output::<String>("imageName"),
        port: config.container_port,
        environment: vec![
            EnvironmentVariable::new(env_vars::PORT, Output::known(config.container_port.to_string())),
            EnvironmentVariable::new(
                env_vars::WEATHER_API_KEY,
                Output::secret(config.weather_api_key.expose_secret().to_string()),
            ),
            EnvironmentVariable::new(env_vars::REDIS_URL, redis_connection_string.clone()),
        ],
        cpu: config.cpu,
        memory_gb: config.memory_gb,
    };
    let container_group = stack.declare(
        ResourceKind::ContainerGroup,
        &names.container_group,
        ContainerGroupArgs {
            resource_group_name,
            os_type: OS_TYPE.to_string(),
            restart_policy: RESTART_POLICY.to_string(),
            registry_server: login_server,
            registry_credentials: registry_credentials.clone(),
            containers: vec![container],
            dns_name_label: names.dns_label.clone(),
            public_port: config.public_port,
        }
        .into_properties(),
    )?;

    // Exports
    let hostname = container_group.output::<String>("ipAddress.fqdn");
    let exports = Exports {
        url: service_url(&hostname, config.container_port),
        ip: container_group.output::<String>("ipAddress.ip"),
        hostname,
    };
    stack.export(exports::HOSTNAME, exports.hostname.clone())?;
    stack.export(exports::IP, exports.ip.clone())?;
    stack.export(exports::URL, exports.url.clone())?;

    Ok(WeatherDeployment {
        names,
        resource_group,
        registry,
        registry_credentials,
        image,
        redis,
        redis_access_key,
        redis_connection_string,
        container_group,
        exports,
    })
}
