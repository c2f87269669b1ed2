use anyhow::Result;
use secrecy::ExposeSecret;
use std::path::Path;
use weather_infra::config::{env_var_name, keys};
use weather_infra::names::ResourceNames;

use super::load_config;

/// Names exactly as `declare` will use them
fn resource_names(stack: &str, config_file: Option<&Path>) -> Result<ResourceNames> {
    let config = load_config(stack, config_file)?;
    Ok(ResourceNames::derive(&config.prefix_name))
}

pub fn names(stack: &str, config_file: Option<&Path>) -> Result<()> {
    let names = resource_names(stack, config_file)?;

    println!("Resource Names (prefix: {})", names.prefix);
    println!("{}", "=".repeat(60));
    println!();
    println!("  Resource Group:    {}", names.resource_group);
    println!("  Registry:          {}", names.registry);
    println!("  Image:             {}", names.image);
    println!("  Redis (logical):   {}", names.redis);
    println!("  Cache:             {}", names.cache);
    println!("  Container Group:   {}", names.container_group);
    println!("  Container:         {}", names.image_name);
    println!("  DNS Label:         {}", names.dns_label);

    Ok(())
}

pub fn config(stack: &str, config_file: Option<&Path>, show_secrets: bool) -> Result<()> {
    let config = load_config(stack, config_file)?;

    println!("Deployment Configuration (stack: {})", stack);
    println!("{}", "=".repeat(60));
    println!();

    println!("Required:");
    println!("  appPath            {}", config.app_path);
    println!("  prefixName         {}", config.prefix_name);
    println!("  imageTag           {}", config.image_tag);
    println!("  containerPort      {}", config.container_port);
    println!("  publicPort         {}", config.public_port);
    println!("  cpu                {}", config.cpu);
    println!("  memory             {} GB", config.memory_gb);
    if show_secrets {
        println!("  weatherApiKey      {}", config.weather_api_key.expose_secret());
    } else {
        println!("  weatherApiKey      ***hidden***");
    }
    println!();

    println!("Optional:");
    println!("  cacheLocation      {}", config.cache_location);
    println!("  enableNonSslPort   {}", config.enable_non_ssl_port);
    println!("  imagePlatform      {}", config.image_platform);
    println!();

    println!("Environment Overrides:");
    for key in keys::REQUIRED.iter().chain(keys::OPTIONAL.iter()) {
        let var = env_var_name(key);
        let status = if std::env::var(&var).is_ok() { "✓ Set" } else { "✗ Not set" };
        println!("  {:<36} {}", var, status);
    }

    if !show_secrets {
        println!();
        println!("Use --show-secrets to reveal hidden values (not recommended)");
    }

    Ok(())
}
