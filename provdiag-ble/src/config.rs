use std::path::{Path, PathBuf};
use std::time::Duration;

use provdiag_ble_controller::ValidatorSettings;
use provdiag_proto::BleConfig;
use provdiag_proto::ble::REQUESTED_MTU;

const CONFIG_FILE: &str = "config.toml";

/// Contents of `config.toml`. Every field is optional.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub ble: BleConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub state_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub requested_mtu: u16,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            state_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            requested_mtu: REQUESTED_MTU,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// `$PROVDIAG_HOME`, or `~/.provdiag`.
pub fn provdiag_home() -> Option<PathBuf> {
    std::env::var_os("PROVDIAG_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".provdiag")))
}

impl Config {
    /// Loads `path` if given (it must exist), else `config.toml` under
    /// [`provdiag_home`] if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match provdiag_home().map(|h| h.join(CONFIG_FILE)) {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };
        log::debug!("loading config from {}", path.display());

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn settings(&self) -> ValidatorSettings {
        ValidatorSettings {
            state_timeout: Duration::from_millis(self.diagnostics.state_timeout_ms),
            connect_timeout: Duration::from_millis(self.diagnostics.connect_timeout_ms),
            requested_mtu: self.diagnostics.requested_mtu,
            ..ValidatorSettings::from_config(&self.ble)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.settings(), ValidatorSettings::default());
    }

    #[test]
    fn overrides() {
        let config = Config::parse(
            r#"
[ble]
device_name_prefix = "Lab-"
scan_timeout_ms = 4000

[diagnostics]
connect_timeout_ms = 15000
"#,
        )
        .unwrap();
        let settings = config.settings();
        assert_eq!(settings.device_name_prefix, "Lab-");
        assert_eq!(settings.scan_window, Duration::from_secs(4));
        assert_eq!(settings.connect_timeout, Duration::from_secs(15));
        assert_eq!(settings.state_timeout, Duration::from_secs(10));
        assert_eq!(settings.requested_mtu, 517);
    }

    #[test]
    fn bad_value_is_an_error() {
        assert!(Config::parse("[diagnostics]\nrequested_mtu = \"big\"\n").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/provdiag.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
