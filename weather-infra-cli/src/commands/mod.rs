pub mod deploy;
pub mod system;

use anyhow::{Context, Result};
use std::path::Path;
use weather_infra::config::{DeploymentConfig, Settings};

fn load_settings(stack: &str, config_file: Option<&Path>) -> Result<Settings> {
    Settings::load(stack, config_file).with_context(|| format!("Failed to load settings for stack '{}'", stack))
}

pub fn load_config(stack: &str, config_file: Option<&Path>) -> Result<DeploymentConfig> {
    let settings = load_settings(stack, config_file)?;
    DeploymentConfig::from_settings(&settings).context("Invalid deployment configuration")
}
