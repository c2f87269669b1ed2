//! Weather Infra - deployment declaration for the weather service
//!
//! This crate declares the cloud resources the weather service runs on
//! (resource group, container registry, service image, Redis cache and a
//! public container group) and wires them together with deferred values.
//! Creating the resources is the job of an external [`Orchestrator`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use weather_infra::config::{DeploymentConfig, Settings, PROJECT};
//! use weather_infra::in_memory::InMemoryOrchestrator;
//! use weather_infra::{deployment, Stack};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load("dev", None)?;
//! let config = DeploymentConfig::from_settings(&settings)?;
//!
//! let mut stack = Stack::new(PROJECT, "dev");
//! let declared = deployment::declare(&config, &mut stack)?;
//!
//! let report = stack.submit(&InMemoryOrchestrator::new()).await?;
//! println!("{}", report.exports["url"]);
//! # let _ = declared;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection_strings;
pub mod deployment;
pub mod error;
pub mod in_memory;
pub mod names;
pub mod orchestrator;
pub mod output;
pub mod property;
pub mod queries;
pub mod stack;
pub mod types;

// Re-export key types for convenience
pub use error::{DeployError, DeploymentFailure, ProviderError};
pub use orchestrator::Orchestrator;
pub use output::{Output, OutputError, OutputState};
pub use stack::{ResourceHandle, Stack};
