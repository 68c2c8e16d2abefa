//! Server configuration.
//!
//! ```yaml
//! server:
//!   port: 6002
//!   transport: stdio          # or tcp
//! path_to_metadata: datasets.yaml
//! path_to_ee_auth: ee_auth.json
//! base_assets_path: projects/unicef-ccri/assets   # optional
//! gateway:                    # optional
//!   base_url: https://earthengine.googleapis.com
//!   project: unicef-ccri
//!   timeout_secs: 120
//! pipeline:                   # optional
//!   default_scale: 100
//!   max_pixels: 10000000000
//!   max_error: 1
//! ```
//!
//! Relative paths are resolved against the directory holding the config file.

use crate::error::ConfigError;
use geohaz_catalog::DEFAULT_BASE_ASSETS_PATH;
use geohaz_gateway::{RestGatewayConfig, DEFAULT_BASE_URL};
use geohaz_ops::PipelineSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default listening port for the TCP transport.
pub const DEFAULT_PORT: u16 = 6002;

/// How requests reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// One JSON request per line on stdin, responses on stdout.
    #[default]
    Stdio,
    /// The same line protocol over TCP connections.
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => f.write_str("stdio"),
            Transport::Tcp => f.write_str("tcp"),
        }
    }
}

/// `server:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    /// TCP port.
    pub port: u16,
    /// Address the TCP transport binds to.
    pub host: String,
    /// Transport to serve on.
    pub transport: Transport,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            host: "127.0.0.1".to_string(),
            transport: Transport::Stdio,
        }
    }
}

/// `gateway:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GatewaySection {
    /// API root.
    pub base_url: String,
    /// Cloud project billed for computations.
    pub project: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        GatewaySection {
            base_url: DEFAULT_BASE_URL.to_string(),
            project: "unicef-ccri".to_string(),
            timeout_secs: 120,
        }
    }
}

impl GatewaySection {
    /// Client settings for the REST gateway.
    pub fn rest_config(&self) -> RestGatewayConfig {
        RestGatewayConfig {
            base_url: self.base_url.clone(),
            project: self.project.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_base_assets_path() -> String {
    DEFAULT_BASE_ASSETS_PATH.to_string()
}

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Transport settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Dataset catalog file.
    pub path_to_metadata: PathBuf,
    /// Access token file.
    pub path_to_ee_auth: PathBuf,
    /// Prefix for asset ids that are not fully qualified.
    #[serde(default = "default_base_assets_path")]
    pub base_assets_path: String,
    /// Remote compute service settings.
    #[serde(default)]
    pub gateway: GatewaySection,
    /// Operation tunables.
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::from_yaml_str(&text, base_dir)?;
        debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Parse a config document, resolving relative paths against `base_dir`.
    pub fn from_yaml_str(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(text)?;
        config.path_to_metadata = resolve(base_dir, &config.path_to_metadata);
        config.path_to_ee_auth = resolve(base_dir, &config.path_to_ee_auth);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if !(p.default_scale.is_finite() && p.default_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.default_scale must be positive, got {}",
                p.default_scale
            )));
        }
        if !(p.max_error.is_finite() && p.max_error > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.max_error must be positive, got {}",
                p.max_error
            )));
        }
        if p.max_pixels == 0 {
            return Err(ConfigError::Invalid("pipeline.max_pixels must be positive".to_string()));
        }
        if self.gateway.project.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway.project is empty".to_string()));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::Invalid("gateway.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "path_to_metadata: datasets.yaml\npath_to_ee_auth: /secrets/token.json\n";

    #[test]
    fn test_defaults_and_path_resolution() {
        let config = Config::from_yaml_str(MINIMAL, Path::new("/etc/geohaz")).unwrap();
        assert_eq!(config.path_to_metadata, PathBuf::from("/etc/geohaz/datasets.yaml"));
        assert_eq!(config.path_to_ee_auth, PathBuf::from("/secrets/token.json"));
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.base_assets_path, DEFAULT_BASE_ASSETS_PATH);
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert_eq!(config.gateway.rest_config().timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_transport_literals() {
        let text = format!("{}server:\n  transport: tcp\n  port: 7000\n", MINIMAL);
        let config = Config::from_yaml_str(&text, Path::new(".")).unwrap();
        assert_eq!(config.server.transport, Transport::Tcp);
        assert_eq!(config.server.port, 7000);

        let text = format!("{}server:\n  transport: sse\n", MINIMAL);
        assert!(matches!(
            Config::from_yaml_str(&text, Path::new(".")),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_fields_and_bad_values() {
        let text = format!("{}verbose: true\n", MINIMAL);
        assert!(Config::from_yaml_str(&text, Path::new(".")).is_err());

        let text = format!("{}pipeline:\n  default_scale: 0\n", MINIMAL);
        assert!(matches!(
            Config::from_yaml_str(&text, Path::new(".")),
            Err(ConfigError::Invalid(_))
        ));
    }
}
