use secrecy::ExposeSecret;
use weather_infra::config::{keys, ConfigError, DeploymentConfig, Settings, PROJECT};
use weather_infra::deployment::{self, WeatherDeployment};
use weather_infra::in_memory::{InMemoryOrchestrator, REDIS_SSL_PORT};
use weather_infra::names::queries;
use weather_infra::{DeployError, OutputError, OutputState, Stack};
use weather_infra_models::{ChangeKind, DeploymentPhase};

fn demo_settings() -> Settings {
    let mut settings = Settings::new();
    settings.set(keys::PREFIX_NAME, "demo");
    settings.set(keys::CONTAINER_PORT, "8080");
    settings.set(keys::PUBLIC_PORT, "80");
    settings.set(keys::CPU, "1");
    settings.set(keys::MEMORY, "1.5");
    settings.set(keys::IMAGE_TAG, "v1");
    settings.set(keys::APP_PATH, "./app");
    settings.set_secret(keys::WEATHER_API_KEY, "secret");
    settings
}

fn declare_demo() -> (Stack, WeatherDeployment, DeploymentConfig) {
    let config = DeploymentConfig::from_settings(&demo_settings()).unwrap();
    let mut stack = Stack::new(PROJECT, "dev");
    let declared = deployment::declare(&config, &mut stack).unwrap();
    (stack, declared, config)
}

#[tokio::test]
async fn test_demo_bundle_end_to_end() {
    let orchestrator = InMemoryOrchestrator::new();
    let (stack, declared, config) = declare_demo();

    assert_eq!(declared.names.resource_group, "demo-rg");
    assert_eq!(declared.names.registry, "demoACR");
    assert_eq!(declared.names.cache, "demo-weather-cache");
    assert_eq!(declared.names.container_group, "demo-container-group");

    let report = stack.submit(&orchestrator).await.unwrap();
    assert_eq!(report.phase, DeploymentPhase::Applied);
    assert_eq!(report.count(ChangeKind::Create), 5);

    let hostname = declared.exports.hostname.resolve().await.unwrap();
    assert_eq!(hostname, "demo.westus3.azurecontainer.io");
    assert_eq!(report.exports["hostname"], hostname);
    assert_eq!(report.exports["url"], format!("http://{}:{}", hostname, config.container_port));
    assert_eq!(report.exports["url"], "http://demo.westus3.azurecontainer.io:8080");
    assert_eq!(report.exports["ip"], declared.exports.ip.resolve().await.unwrap());
}

#[tokio::test]
async fn test_connection_string_uses_key_host_and_ssl_port() {
    let orchestrator = InMemoryOrchestrator::new();
    let (stack, declared, _) = declare_demo();
    stack.submit(&orchestrator).await.unwrap();

    let key = declared.redis_access_key.resolve().await.unwrap();
    let url = declared.redis_connection_string.resolve().await.unwrap();
    assert_eq!(
        url,
        format!(
            "rediss://:{}@demo-weather-cache.redis.cache.windows.net:{}",
            key, REDIS_SSL_PORT
        )
    );

    let group = orchestrator.properties("demo-container-group").unwrap();
    let env = group["containers"][0]["environmentVariables"].as_array().unwrap().clone();
    let value = |name: &str| {
        env.iter()
            .find(|var| var["name"] == name)
            .and_then(|var| var["value"].as_str())
            .map(str::to_string)
    };
    assert_eq!(value("PORT").as_deref(), Some("8080"));
    assert_eq!(value("WEATHER_API_KEY").as_deref(), Some("secret"));
    assert_eq!(value("REDIS_URL"), Some(url));

    let creds = declared.registry_credentials.resolve().await.unwrap();
    assert_eq!(group["imageRegistryCredentials"][0]["username"], creds.username.as_str());
    assert_eq!(
        group["containers"][0]["image"],
        "demoacr.azurecr.io/demo:v1"
    );
}

#[tokio::test]
async fn test_rerun_with_same_config_changes_nothing() {
    let orchestrator = InMemoryOrchestrator::new();

    let (first, _, _) = declare_demo();
    let first = first.submit(&orchestrator).await.unwrap();
    assert!(!first.is_unchanged());

    let (second, _, _) = declare_demo();
    let second = second.submit(&orchestrator).await.unwrap();
    assert!(second.is_unchanged());
    assert_eq!(second.count(ChangeKind::Same), 5);
    assert_eq!(first.exports, second.exports);
    assert_eq!(orchestrator.resource_count(), 5);
}

#[tokio::test]
async fn test_changed_tag_updates_image_and_container_group() {
    let orchestrator = InMemoryOrchestrator::new();
    let (stack, _, _) = declare_demo();
    stack.submit(&orchestrator).await.unwrap();

    let mut settings = demo_settings();
    settings.set(keys::IMAGE_TAG, "v2");
    let config = DeploymentConfig::from_settings(&settings).unwrap();
    let mut stack = Stack::new(PROJECT, "dev");
    deployment::declare(&config, &mut stack).unwrap();
    let report = stack.submit(&orchestrator).await.unwrap();

    let updated: Vec<_> = report
        .changes
        .iter()
        .filter(|c| c.change == ChangeKind::Update)
        .map(|c| c.logical_name.as_str())
        .collect();
    assert_eq!(updated, vec!["demo-image", "demo-container-group"]);
}

#[tokio::test]
async fn test_key_lookup_failure_blocks_dependents() {
    let orchestrator = InMemoryOrchestrator::new();
    orchestrator.fail_query(queries::LIST_REDIS_KEYS);
    let (stack, declared, _) = declare_demo();

    let failure = stack.submit(&orchestrator).await.unwrap_err();
    assert!(matches!(
        failure.error,
        DeployError::Query { ref token, .. } if token == queries::LIST_REDIS_KEYS
    ));
    assert_eq!(failure.report.phase, DeploymentPhase::Failed);
    assert!(failure.report.exports.is_empty());
    assert!(orchestrator.properties("demo-container-group").is_none());
    assert!(matches!(
        declared.redis_connection_string.state(),
        OutputState::Failed(_)
    ));
    assert!(declared.exports.url.resolve().await.is_err());
}

#[tokio::test]
async fn test_resource_failure_is_fatal() {
    let orchestrator = InMemoryOrchestrator::new();
    orchestrator.fail_resource("demoACR");
    let (stack, declared, _) = declare_demo();

    let failure = stack.submit(&orchestrator).await.unwrap_err();
    assert!(matches!(
        failure.error,
        DeployError::Resource { ref logical_name, .. } if logical_name == "demoACR"
    ));
    assert_eq!(failure.report.changes.len(), 1);
    assert!(declared.registry_credentials.resolve().await.is_err());
}

#[tokio::test]
async fn test_unassigned_address_fails_outputs() {
    let orchestrator = InMemoryOrchestrator::new();
    orchestrator.withhold_output("demo-container-group", "ipAddress");
    let (stack, declared, _) = declare_demo();

    let failure = stack.submit(&orchestrator).await.unwrap_err();
    match failure.error {
        DeployError::Export { name, source } => {
            assert_eq!(name, "hostname");
            assert!(matches!(source, OutputError::MissingProperty { .. }));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(failure.report.exports.is_empty());
    assert!(declared.exports.ip.resolve().await.is_err());
}

#[test]
fn test_missing_key_fails_before_any_declaration() {
    let mut settings = Settings::new();
    settings.set(keys::PREFIX_NAME, "demo");
    settings.set_secret(keys::WEATHER_API_KEY, "secret");

    match DeploymentConfig::from_settings(&settings) {
        Err(ConfigError::Missing(key)) => assert_eq!(key, keys::APP_PATH),
        other => panic!("expected missing key, got {:?}", other),
    }
}

#[test]
fn test_api_key_stays_wrapped() {
    let config = DeploymentConfig::from_settings(&demo_settings()).unwrap();
    assert_eq!(config.weather_api_key.expose_secret(), "secret");
    assert!(!format!("{:?}", config.weather_api_key).contains("secret\""));
}

#[tokio::test]
async fn test_outputs_carrying_secret_inputs_are_secret() {
    let orchestrator = InMemoryOrchestrator::new();
    let (stack, declared, _) = declare_demo();

    let containers = declared.container_group.output::<serde_json::Value>("containers");
    let registry_login = declared.image.output::<serde_json::Value>("registry");
    let image_name = declared.image.output::<String>("imageName");
    stack.submit(&orchestrator).await.unwrap();

    assert!(containers.is_secret());
    assert!(registry_login.is_secret());
    assert!(!image_name.is_secret());
    assert!(!declared.exports.hostname.is_secret());
    assert!(!declared.exports.url.is_secret());

    let env = containers.resolve().await.unwrap();
    assert_eq!(env[0]["environmentVariables"][1]["value"], "secret");
}
