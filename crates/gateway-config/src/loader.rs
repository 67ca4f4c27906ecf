//! Configuration file loading with environment variable expansion.
//!
//! `${VAR}` is replaced with the value of `VAR`; `${VAR:-fallback}` uses `fallback` when
//! `VAR` is unset. Expansion happens on the raw text before parsing.

use crate::config::GatewayConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "GATEWAY_CONFIG";

/// File used when neither a path nor `GATEWAY_CONFIG` is given
pub const DEFAULT_CONFIG_FILE: &str = "gateway.yaml";

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    ///
    /// # Errors
    /// Returns error for unknown extensions
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Resolve the config path: explicit path, else `GATEWAY_CONFIG`, else `gateway.yaml`
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load, expand, parse and validate a configuration file
///
/// # Errors
/// Returns error if the file cannot be read, an environment variable is missing, the
/// content does not parse, or validation fails
pub async fn load_config(explicit: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let path = resolve_config_path(explicit);
    debug!(path = %path.display(), "Loading configuration");

    let format = ConfigFormat::from_path(&path)?;
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

    let config = parse_config(&content, format)?;
    info!(
        path = %path.display(),
        targets = config.targets.len(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Expand, parse and validate configuration text
///
/// # Errors
/// Returns error if an environment variable is missing, the content does not parse, or
/// validation fails
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<GatewayConfig, ConfigError> {
    let expanded = expand_env(content, |name| std::env::var(name).ok())?;

    let config: GatewayConfig = match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::Parse(e.to_string()))?
        }
        ConfigFormat::Toml => {
            toml::from_str(&expanded).map_err(|e| ConfigError::Parse(e.to_string()))?
        }
    };

    config.validate()?;
    Ok(config)
}

// Literal pattern, always valid
#[allow(clippy::unwrap_used)]
fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap())
}

/// Replace `${VAR}` and `${VAR:-fallback}` references using `lookup`
///
/// # Errors
/// Returns `MissingEnv` for an unset variable without a fallback
pub fn expand_env<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(content.len());
    let mut last = 0;

    for caps in env_pattern().captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps[1];

        let value = match (lookup(name), caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(fallback)) => fallback.as_str().to_string(),
            (None, None) => return Err(ConfigError::MissingEnv(name.to_string())),
        };

        out.push_str(&content[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }

    out.push_str(&content[last..]);
    Ok(out)
}
