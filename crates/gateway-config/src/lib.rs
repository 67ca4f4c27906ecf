//! # Gateway Config
//!
//! Target configuration for the LLM gateway, loaded from YAML or TOML with `${ENV}`
//! expansion.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;

pub use config::{GatewayConfig, TargetConfig};
pub use error::ConfigError;
pub use loader::{load_config, parse_config, resolve_config_path, ConfigFormat};
