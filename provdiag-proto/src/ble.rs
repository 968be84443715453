//! BLE GATT Service Protocol Constants for ESP32 WiFi Provisioning
//!
//! These must match the device firmware exactly. UUIDs are kept in their
//! canonical upper-case text form; platforms report them in either case, so
//! always compare through [`uuid_eq`].

/// Provisioning Service UUID
pub const SERVICE_UUID: &str = "0000FFE0-0000-1000-8000-00805F9B34FB";

/// Status Characteristic UUID (read/notify)
pub const STATUS_UUID: &str = "0000FFE1-0000-1000-8000-00805F9B34FB";

/// Command Characteristic UUID (write)
pub const COMMAND_UUID: &str = "0000FFE2-0000-1000-8000-00805F9B34FB";

/// Response Characteristic UUID (notify)
pub const RESPONSE_UUID: &str = "0000FFE3-0000-1000-8000-00805F9B34FB";

/// Advertised-name prefix of provisionable devices, e.g. `ESP32-WiFi-A1B2`
pub const DEVICE_NAME_PREFIX: &str = "ESP32-WiFi-";

/// MTU requested when connecting; the firmware accepts the BLE maximum.
pub const REQUESTED_MTU: u16 = 517;

/// The characteristics a provisioning service must carry, in display order.
pub const EXPECTED_CHARACTERISTICS: [(&str, &str); 3] = [
    ("Status", STATUS_UUID),
    ("Command", COMMAND_UUID),
    ("Response", RESPONSE_UUID),
];

/// Case-insensitive UUID comparison.
pub fn uuid_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// True if `name` looks like a provisionable device.
pub fn is_provisioning_device(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix)
}
