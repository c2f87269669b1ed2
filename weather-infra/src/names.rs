//! Name derivation for declared resources and provider query tokens
//!
//! Every logical name is a pure function of the configured prefix, so
//! re-running with the same prefix targets the same resources.

use serde::{Deserialize, Serialize};

/// Provider query tokens
pub mod queries {
    /// List the admin credentials of a container registry
    ///
    /// **Args:** `{ resourceGroupName, registryName }`
    /// **Result:** `{ username, passwords: [{ name, value }] }`
    pub const LIST_REGISTRY_CREDENTIALS: &str =
        "azure-native:containerregistry:listRegistryCredentials";

    /// List the access keys of a Redis cache
    ///
    /// **Args:** `{ name, resourceGroupName }`
    /// **Result:** `{ primaryKey, secondaryKey }`
    pub const LIST_REDIS_KEYS: &str = "azure-native:cache:listRedisKeys";
}

/// Names of every resource in the weather service deployment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceNames {
    /// Naming prefix everything below is derived from
    pub prefix: String,
    pub resource_group: String,
    pub registry: String,
    pub image: String,
    /// Logical name of the Redis declaration
    pub redis: String,
    /// Physical cache name requested from the provider
    pub cache: String,
    pub container_group: String,
    /// Repository name inside the registry, also used as the container name
    pub image_name: String,
    /// DNS label of the public endpoint
    pub dns_label: String,
}

impl ResourceNames {
    pub fn derive(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            resource_group: format!("{}-rg", prefix),
            registry: format!("{}ACR", prefix),
            image: format!("{}-image", prefix),
            redis: format!("{}-redis", prefix),
            cache: format!("{}-weather-cache", prefix),
            container_group: format!("{}-container-group", prefix),
            image_name: prefix.to_string(),
            dns_label: prefix.to_string(),
        }
    }

    /// Full image reference pushed to the registry
    pub fn image_reference(login_server: &str, image_name: &str, tag: &str) -> String {
        format!("{}/{}:{}", login_server, image_name, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_for_demo_prefix() {
        let names = ResourceNames::derive("demo");
        assert_eq!(names.resource_group, "demo-rg");
        assert_eq!(names.registry, "demoACR");
        assert_eq!(names.image, "demo-image");
        assert_eq!(names.redis, "demo-redis");
        assert_eq!(names.cache, "demo-weather-cache");
        assert_eq!(names.container_group, "demo-container-group");
        assert_eq!(names.image_name, "demo");
        assert_eq!(names.dns_label, "demo");
    }

    #[test]
    fn test_names_are_deterministic() {
        for prefix in ["demo", "weather-prod", "x"] {
            assert_eq!(ResourceNames::derive(prefix), ResourceNames::derive(prefix));
        }
        assert_ne!(ResourceNames::derive("a"), ResourceNames::derive("b"));
    }

    #[test]
    fn test_image_reference() {
        assert_eq!(
            ResourceNames::image_reference("demoacr.azurecr.io", "demo", "v1"),
            "demoacr.azurecr.io/demo:v1"
        );
    }
}
