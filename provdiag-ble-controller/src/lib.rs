//! provdiag BLE Controller
//!
//! Step-by-step BLE diagnostics for ESP32 WiFi provisioning devices: create
//! the adapter, wait for it to power on, scan with and without the
//! provisioning service filter, connect, discover, and check the GATT layout
//! against the firmware contract.
//!
//! # Example
//!
//! ```ignore
//! use provdiag_ble_controller::{BtleplugCentral, StepId, Validator, ValidatorSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut v = Validator::new(BtleplugCentral, ValidatorSettings::default());
//!     v.create_adapter().await;
//!     v.check_adapter_state().await;
//!     v.scan_filtered().await;
//!
//!     if let Some(device) = v.filtered_devices().iter().next().cloned() {
//!         v.connect(&device).await;
//!         v.discover().await;
//!         v.validate();
//!     }
//!
//!     for result in v.board().iter() {
//!         println!("{}. {:?}", result.step.number(), result.status);
//!     }
//!     v.shutdown().await;
//! }
//! ```

pub mod central;
mod error;
pub mod gatt;
pub mod lease;
#[cfg(test)]
mod mock;
mod platform;
mod scan;
mod step;
mod validator;

pub use central::{AdapterState, BleAdapter, BleCentral, ScanFilter, ScanResult};
pub use error::BleError;
pub use gatt::{
    CharacteristicFlags, GattCharacteristic, GattService, ServiceReport, evaluate_service,
};
pub use lease::{AdapterLease, AdapterSlot};
pub use platform::{BtleplugAdapter, BtleplugCentral};
pub use scan::DeviceList;
pub use step::{LogEntry, StepBoard, StepId, StepResult, StepStatus};
pub use validator::{Connection, Validator, ValidatorSettings};
