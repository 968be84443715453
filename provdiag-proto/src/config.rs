//! Options accepted by the provisioning navigator
//!
//! Only the BLE part of the navigator's `config` prop is modelled. Field names
//! accept both the snake_case used in TOML files and the camelCase used by the
//! navigator itself.

use std::time::Duration;

use crate::ble::DEVICE_NAME_PREFIX;

pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 10_000;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub ble: BleConfig,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BleConfig {
    #[serde(alias = "deviceNamePrefix")]
    pub device_name_prefix: String,
    #[serde(alias = "scanTimeout", alias = "scanTimeoutMs")]
    pub scan_timeout_ms: u64,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            device_name_prefix: DEVICE_NAME_PREFIX.to_string(),
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT_MS,
        }
    }
}

impl BleConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}
