//! The platform BLE central, as seen by the validator
//!
//! A [`BleCentral`] creates adapter sessions; a [`BleAdapter`] is one live
//! session with the platform's Bluetooth controller. Both are implemented for
//! real hardware by [`crate::platform`].

use std::future::Future;
use std::time::Duration;

use futures::stream::BoxStream;

use crate::gatt::GattService;
use crate::lease::AdapterLease;
use crate::BleError;

/// Power/authorization state of the Bluetooth controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AdapterState {
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AdapterState::Unknown => "Unknown",
            AdapterState::Resetting => "Resetting",
            AdapterState::Unsupported => "Unsupported",
            AdapterState::Unauthorized => "Unauthorized",
            AdapterState::PoweredOff => "PoweredOff",
            AdapterState::PoweredOn => "PoweredOn",
        };
        f.write_str(s)
    }
}

/// One advertising device seen during a scan window
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScanResult {
    /// Opaque platform identifier, stable per device
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    /// Advertised service UUIDs, as reported by the platform
    pub services: Vec<String>,
}

impl ScanResult {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

/// Scan filter. Empty `services` means every advertisement is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    pub services: Vec<String>,
    pub name_prefix: Option<String>,
}

impl ScanFilter {
    pub fn service(uuid: &str) -> Self {
        Self {
            services: vec![uuid.to_string()],
            name_prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub device_id: String,
    pub mtu: u16,
    /// Platforms with a native connect timeout should honour this; the
    /// validator enforces it regardless.
    pub timeout: Duration,
}

/// What the platform reports after a successful connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedDevice {
    pub id: String,
    pub name: Option<String>,
    /// Negotiated MTU, `None` if the platform does not expose it
    pub mtu: Option<u16>,
}

pub type StateStream = BoxStream<'static, AdapterState>;
pub type ScanStream = BoxStream<'static, Result<ScanResult, BleError>>;

pub trait BleCentral: Send + Sync {
    type Adapter: BleAdapter;

    /// Opens an adapter session. The session keeps `lease` until it is
    /// destroyed.
    fn create_adapter(
        &self,
        lease: AdapterLease,
    ) -> impl Future<Output = Result<Self::Adapter, BleError>> + Send;
}

pub trait BleAdapter: Send + Sync + Sized {
    fn state(&self) -> impl Future<Output = Result<AdapterState, BleError>> + Send;

    /// Subscribes to state changes. The stream yields the current state first.
    /// Dropping the stream releases the subscription.
    fn watch_state(&self) -> impl Future<Output = Result<StateStream, BleError>> + Send;

    /// Starts scanning. The returned stream yields advertisements (possibly
    /// repeated per device) until [`BleAdapter::stop_scan`] is called.
    fn start_scan(
        &self,
        filter: &ScanFilter,
    ) -> impl Future<Output = Result<ScanStream, BleError>> + Send;

    fn stop_scan(&self) -> impl Future<Output = Result<(), BleError>> + Send;

    fn connect(
        &self,
        request: &ConnectRequest,
    ) -> impl Future<Output = Result<ConnectedDevice, BleError>> + Send;

    fn cancel_connection(&self, device_id: &str)
    -> impl Future<Output = Result<(), BleError>> + Send;

    /// Discovers all services and characteristics of a connected device.
    fn discover(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<Vec<GattService>, BleError>> + Send;

    /// Tears the session down. The adapter lease is released only once this
    /// completes.
    fn destroy(self) -> impl Future<Output = ()> + Send;
}
