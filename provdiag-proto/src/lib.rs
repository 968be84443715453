//! Provisioning contract shared by the diagnostics crates
//!
//! The ESP32 firmware exposes one fixed GATT service for WiFi provisioning.
//! [`ble`] holds its UUIDs and naming rules; [`config`] holds the option
//! shape the provisioning navigator accepts, so tools reading the same
//! settings agree on names and defaults.

pub mod ble;
pub mod config;

pub use config::{BleConfig, ProvisioningConfig};
