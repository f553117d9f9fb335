//! Configuration file handling.
//!
//! The console reads an optional YAML file from `~/.volcano-pilot/config`:
//!
//! ```yaml
//! gateway: http://10.0.0.2:8500
//! default_agent_port: "30081"
//! port_corrections:
//!   3008: 30082
//! request_timeout_secs: 10
//! download_dir: /data/downloads
//! ```
//!
//! Every field has a sensible default, so a missing file is not an error and
//! the console comes up pointed at a local gateway.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Gateway assumed when nothing is configured.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8500";

/// Agent port assumed for nodes that have no saved mapping.
pub const DEFAULT_AGENT_PORT: &str = "30081";

/// Settings for one console instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the console gateway.
    pub gateway: String,
    /// Port assumed for node agents when none has been saved.
    pub default_agent_port: String,
    /// Ports known to arrive mangled from operator input, mapped to what the
    /// operator actually meant. Applied whenever a raw port is resolved.
    pub port_corrections: BTreeMap<u16, u16>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Where folder downloads land. Defaults to the platform download dir.
    pub download_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut port_corrections = BTreeMap::new();
        // A widespread frontend truncated "30082" to "3008" when saving.
        port_corrections.insert(3008, 30082);
        Self {
            gateway: DEFAULT_GATEWAY_URL.to_string(),
            default_agent_port: DEFAULT_AGENT_PORT.to_string(),
            port_corrections,
            request_timeout_secs: 10,
            download_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Default config location: `~/.volcano-pilot/config`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().ok_or(GatewayError::NoHomeDirectory)?;
        Ok(home.join(".volcano-pilot").join("config"))
    }

    /// Loads the config from the default location, falling back to built-in
    /// defaults when no file exists yet.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads the config from an explicit path. Unlike [`Self::load_default`],
    /// a missing file is an error here: the operator asked for it by name.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GatewayError::ConfigNotFound(path.display().to_string()));
        }
        let text = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        Ok(config)
    }

    /// Base URL with a scheme and no trailing slash, ready for path joins.
    pub fn gateway_url(&self) -> String {
        let raw = self.gateway.trim().trim_end_matches('/');
        if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("http://{raw}")
        }
    }

    /// Directory folder downloads are written to.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs_next::download_dir)
            .or_else(|| dirs_next::home_dir().map(|home| home.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let yaml = r#"
gateway: http://10.0.0.2:8500
default_agent_port: "31000"
port_corrections:
  3008: 30082
  8080: 8081
request_timeout_secs: 5
download_dir: /data/downloads
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.gateway, "http://10.0.0.2:8500");
        assert_eq!(config.default_agent_port, "31000");
        assert_eq!(config.port_corrections.get(&3008), Some(&30082));
        assert_eq!(config.port_corrections.get(&8080), Some(&8081));
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(
            config.download_dir,
            Some(PathBuf::from("/data/downloads"))
        );
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let yaml = "gateway: gw.internal:8500\n";
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.default_agent_port, DEFAULT_AGENT_PORT);
        assert_eq!(config.port_corrections.get(&3008), Some(&30082));
        assert_eq!(config.request_timeout_secs, 10);
        assert!(config.download_dir.is_none());
    }

    #[test]
    fn default_carries_truncation_correction() {
        let config = GatewayConfig::default();
        assert_eq!(config.port_corrections.get(&3008), Some(&30082));
        assert_eq!(config.gateway, DEFAULT_GATEWAY_URL);
    }

    #[test]
    fn gateway_url_gains_scheme_and_loses_trailing_slash() {
        let mut config = GatewayConfig::default();

        config.gateway = "10.0.0.2:8500".to_string();
        assert_eq!(config.gateway_url(), "http://10.0.0.2:8500");

        config.gateway = "http://10.0.0.2:8500/".to_string();
        assert_eq!(config.gateway_url(), "http://10.0.0.2:8500");

        config.gateway = "https://console.example.com".to_string();
        assert_eq!(config.gateway_url(), "https://console.example.com");
    }

    #[test]
    fn load_from_missing_file_is_an_error() {
        let err = GatewayConfig::load_from(Path::new("/nonexistent/volcano/config"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::ConfigNotFound(_)));
    }

    #[test]
    fn malformed_yaml_is_config_invalid() {
        let err = serde_yaml::from_str::<GatewayConfig>("gateway: [unclosed")
            .map_err(GatewayError::from)
            .unwrap_err();
        assert!(matches!(err, GatewayError::ConfigInvalid(_)));
    }
}
