//! The seven diagnostic steps
//!
//! Every step runs to completion on its own and reports only through the
//! [`StepBoard`]: a failing step never aborts the validator, and any later
//! step can still be triggered.

use std::time::Duration;

use futures::StreamExt;
use provdiag_proto::BleConfig;
use provdiag_proto::ble::{DEVICE_NAME_PREFIX, REQUESTED_MTU, SERVICE_UUID};
use tokio::time::Instant;

use crate::central::{AdapterState, BleAdapter, BleCentral, ConnectRequest, ScanFilter};
use crate::gatt::{GattService, evaluate_service, find_provisioning_service};
use crate::lease::AdapterSlot;
use crate::scan::DeviceList;
use crate::step::{StepBoard, StepId};
use crate::{BleError, ScanResult};

const NO_ADAPTER: &str = "No BLE manager - run step 1 first";
const NO_CONNECTION: &str = "No connected device - run step 5 first";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSettings {
    pub scan_window: Duration,
    pub state_timeout: Duration,
    pub connect_timeout: Duration,
    pub requested_mtu: u16,
    pub device_name_prefix: String,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            scan_window: Duration::from_secs(10),
            state_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            requested_mtu: REQUESTED_MTU,
            device_name_prefix: DEVICE_NAME_PREFIX.to_string(),
        }
    }
}

impl ValidatorSettings {
    pub fn from_config(config: &BleConfig) -> Self {
        Self {
            scan_window: config.scan_timeout(),
            device_name_prefix: config.device_name_prefix.clone(),
            ..Default::default()
        }
    }
}

/// The live GATT link to one device
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Connection {
    pub device_id: String,
    pub name: Option<String>,
    pub mtu: Option<u16>,
    /// Filled in by discovery
    pub services: Option<Vec<GattService>>,
}

pub struct Validator<C: BleCentral> {
    central: C,
    slot: AdapterSlot,
    settings: ValidatorSettings,
    adapter: Option<C::Adapter>,
    /// A scan was started and not yet stopped
    scanning: bool,
    unfiltered: DeviceList,
    filtered: DeviceList,
    connection: Option<Connection>,
    board: StepBoard,
}

impl<C: BleCentral> Validator<C> {
    /// A validator creating its adapter under the process-wide slot.
    pub fn new(central: C, settings: ValidatorSettings) -> Self {
        Self::with_slot(central, AdapterSlot::global(), settings)
    }

    pub fn with_slot(central: C, slot: AdapterSlot, settings: ValidatorSettings) -> Self {
        Self {
            central,
            slot,
            settings,
            adapter: None,
            scanning: false,
            unfiltered: DeviceList::new(),
            filtered: DeviceList::new(),
            connection: None,
            board: StepBoard::new(),
        }
    }

    pub fn board(&self) -> &StepBoard {
        &self.board
    }

    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn unfiltered_devices(&self) -> &DeviceList {
        &self.unfiltered
    }

    pub fn filtered_devices(&self) -> &DeviceList {
        &self.filtered
    }

    /// Looks a device up in the scan results, filtered scan first.
    pub fn find_device(&self, pattern: &str) -> Option<ScanResult> {
        self.filtered
            .find(pattern)
            .or_else(|| self.unfiltered.find(pattern))
            .cloned()
    }

    /// Step 1: replace any existing adapter session with a fresh one.
    pub async fn create_adapter(&mut self) {
        let step = StepId::CreateAdapter;
        self.board.start(step);

        if self.adapter.is_some() {
            self.board.log(step, "Destroying previous BLE manager...");
            if let Some(conn) = &self.connection {
                self.board
                    .log(step, format!("Dropping connection to {}", conn.device_id));
            }
            self.shutdown().await;
            self.board.log(step, "Previous BLE manager destroyed");
            // scan results and the link belonged to the old manager
            for later in &StepId::ALL[2..] {
                self.board.reset(*later);
            }
        }
        self.unfiltered.clear();
        self.filtered.clear();

        let lease = match self.slot.acquire().await {
            Ok(lease) => lease,
            Err(e) => {
                self.board
                    .fail(step, format!("Failed to create BLE manager: {e}"));
                return;
            }
        };

        match self.central.create_adapter(lease).await {
            Ok(adapter) => {
                self.adapter = Some(adapter);
                self.board.log(step, "BLE manager created");
                self.board.pass(step);
            }
            Err(e) => {
                self.board
                    .fail(step, format!("Failed to create BLE manager: {e}"));
            }
        }
    }

    /// Step 2: wait, bounded, for the adapter to be powered on.
    pub async fn check_adapter_state(&mut self) {
        let step = StepId::AdapterState;
        self.board.start(step);

        let Some(adapter) = self.adapter.as_ref() else {
            self.board.fail(step, NO_ADAPTER);
            return;
        };

        let mut last = match adapter.state().await {
            Ok(state) => state,
            Err(e) => {
                self.board
                    .fail(step, format!("Failed to read adapter state: {e}"));
                return;
            }
        };
        self.board.log(step, format!("Current state: {last}"));
        if last == AdapterState::PoweredOn {
            self.board.pass(step);
            return;
        }

        let timeout = self.settings.state_timeout;
        self.board.log(
            step,
            format!("Waiting for PoweredOn (timeout {}s)...", timeout.as_secs()),
        );
        let deadline = Instant::now() + timeout;
        let mut watch = match adapter.watch_state().await {
            Ok(watch) => watch,
            Err(e) => {
                self.board
                    .fail(step, format!("Failed to subscribe to state changes: {e}"));
                return;
            }
        };

        let timer = tokio::time::sleep_until(deadline);
        tokio::pin!(timer);
        let powered_on = loop {
            tokio::select! {
                biased;
                next = watch.next() => match next {
                    Some(AdapterState::PoweredOn) => break Some(true),
                    Some(state) => {
                        if state != last {
                            self.board.log(step, format!("State changed: {state}"));
                            last = state;
                        }
                    }
                    None => break None,
                },
                _ = &mut timer => break Some(false),
            }
        };
        drop(watch);

        match powered_on {
            Some(true) => {
                self.board.log(step, "State changed: PoweredOn");
                self.board.pass(step);
            }
            Some(false) => self.board.fail(
                step,
                format!(
                    "Timed out after {}s waiting for PoweredOn (last state: {last})",
                    timeout.as_secs()
                ),
            ),
            None => self
                .board
                .fail(step, "State subscription ended before PoweredOn"),
        }
    }

    /// Step 3: scan everything in range.
    pub async fn scan_unfiltered(&mut self) {
        self.run_scan(StepId::UnfilteredScan, ScanFilter::default())
            .await
    }

    /// Step 4: scan only for devices advertising the provisioning service.
    pub async fn scan_filtered(&mut self) {
        self.run_scan(StepId::FilteredScan, ScanFilter::service(SERVICE_UUID))
            .await
    }

    async fn run_scan(&mut self, step: StepId, filter: ScanFilter) {
        self.board.start(step);
        let devices = match step {
            StepId::UnfilteredScan => &mut self.unfiltered,
            _ => &mut self.filtered,
        };
        devices.clear();

        let Some(adapter) = self.adapter.as_ref() else {
            self.board.fail(step, NO_ADAPTER);
            return;
        };

        if self.scanning {
            if let Err(e) = adapter.stop_scan().await {
                log::debug!("stopping leftover scan: {e}");
            }
            self.scanning = false;
        }

        let window = self.settings.scan_window;
        match filter.services.first() {
            Some(uuid) => self.board.log(
                step,
                format!("Scanning {}s for service {uuid}...", window.as_secs()),
            ),
            None => self
                .board
                .log(step, format!("Scanning {}s (no filter)...", window.as_secs())),
        }

        let mut stream = match adapter.start_scan(&filter).await {
            Ok(stream) => stream,
            Err(e) => {
                self.board.fail(step, format!("Failed to start scan: {e}"));
                return;
            }
        };
        self.scanning = true;

        let timer = tokio::time::sleep(window);
        tokio::pin!(timer);
        let mut exhausted = false;
        let error = loop {
            tokio::select! {
                _ = &mut timer => break None,
                item = stream.next(), if !exhausted => match item {
                    Some(Ok(device)) => {
                        let rssi = device
                            .rssi
                            .map(|r| format!("{r} dBm"))
                            .unwrap_or_else(|| "N/A".to_string());
                        let line = format!(
                            "Found: {} ({}) RSSI: {rssi}",
                            device.display_name(),
                            device.id,
                        );
                        if devices.insert(device) {
                            self.board.log(step, line);
                        }
                    }
                    Some(Err(e)) => break Some(e),
                    None => exhausted = true,
                },
            }
        };
        drop(stream);

        if let Err(e) = adapter.stop_scan().await {
            self.board.log(step, format!("Failed to stop scan: {e}"));
        }
        self.scanning = false;

        if let Some(e) = error {
            self.board.fail(step, describe_error("Scan error", &e));
            return;
        }

        let count = devices.len();
        self.board
            .log(step, format!("Scan complete. Found {count} device(s)"));
        if step == StepId::UnfilteredScan {
            let prefix = &self.settings.device_name_prefix;
            let esp = devices.count_with_prefix(prefix);
            self.board
                .log(step, format!("{esp} device(s) named {prefix}*"));
        }

        if count > 0 {
            self.board.pass(step);
        } else {
            self.board.fail(step, "No devices found");
        }
    }

    /// Step 5: connect to a device from either scan.
    pub async fn connect(&mut self, device: &ScanResult) {
        let step = StepId::Connect;
        self.board.start(step);

        let Some(adapter) = self.adapter.as_ref() else {
            self.board.fail(step, NO_ADAPTER);
            return;
        };
        if !self.unfiltered.contains(&device.id) && !self.filtered.contains(&device.id) {
            self.board.fail(
                step,
                format!("Device {} was not seen in any scan", device.id),
            );
            return;
        }

        let request = ConnectRequest {
            device_id: device.id.clone(),
            mtu: self.settings.requested_mtu,
            timeout: self.settings.connect_timeout,
        };
        self.board.log(
            step,
            format!(
                "Connecting to {} ({}), requesting MTU {}...",
                device.display_name(),
                device.id,
                request.mtu
            ),
        );

        match tokio::time::timeout(request.timeout, adapter.connect(&request)).await {
            Ok(Ok(connected)) => {
                let name = connected.name.or_else(|| device.name.clone());
                self.board.log(step, "Connected");
                self.board.log(step, format!("Device ID: {}", connected.id));
                self.board.log(
                    step,
                    format!("Name: {}", name.as_deref().unwrap_or("Unknown")),
                );
                match connected.mtu {
                    Some(mtu) => self.board.log(step, format!("MTU: {mtu}")),
                    None => self.board.log(step, "MTU: not reported by platform"),
                }
                self.connection = Some(Connection {
                    device_id: connected.id,
                    name,
                    mtu: connected.mtu,
                    services: None,
                });
                self.board.pass(step);
            }
            Ok(Err(e)) => {
                self.board
                    .log(step, format!("Connection failed: {}", e.message));
                match &e.code {
                    Some(code) => self.board.fail(step, format!("Error code: {code}")),
                    None => self.board.fail(step, "Connect failed"),
                }
            }
            Err(_) => self.board.fail(
                step,
                format!(
                    "Connection timed out after {}s",
                    request.timeout.as_secs()
                ),
            ),
        }
    }

    /// Step 6: discover services and characteristics of the connected device.
    pub async fn discover(&mut self) {
        let step = StepId::Discover;
        self.board.start(step);

        let Some(connection) = self.connection.as_mut() else {
            self.board.fail(step, NO_CONNECTION);
            return;
        };
        let Some(adapter) = self.adapter.as_ref() else {
            self.board.fail(step, NO_ADAPTER);
            return;
        };

        self.board.log(
            step,
            format!("Discovering services on {}...", connection.device_id),
        );
        let services = match adapter.discover(&connection.device_id).await {
            Ok(services) => services,
            Err(e) => {
                connection.services = None;
                self.board.fail(step, describe_error("Discovery failed", &e));
                return;
            }
        };

        self.board
            .log(step, format!("Discovered {} service(s)", services.len()));
        for service in &services {
            self.board.log(step, format!("Service: {}", service.uuid));
            for c in &service.characteristics {
                self.board.log(
                    step,
                    format!(
                        "  Characteristic: {} [{}]",
                        c.uuid,
                        c.flags.labels().join(", ")
                    ),
                );
            }
        }
        connection.services = Some(services);
        self.board.pass(step);
    }

    /// Step 7: check the provisioning service carries the expected
    /// characteristics.
    ///
    /// Only a connection is required; if discovery has not run there are no
    /// services to match and the step fails on the missing service.
    pub fn validate(&mut self) {
        let step = StepId::Validate;
        self.board.start(step);

        let Some(connection) = self.connection.as_ref() else {
            self.board.fail(step, NO_CONNECTION);
            return;
        };
        let services = connection.services.as_deref().unwrap_or_default();

        self.board
            .log(step, format!("Looking for service {SERVICE_UUID}"));
        let Some(service) = find_provisioning_service(services) else {
            self.board.log(step, "Provisioning service NOT FOUND");
            self.board.log(step, "Discovered services:");
            if services.is_empty() {
                self.board.log(step, "  (none)");
            }
            for s in services {
                self.board.log(step, format!("  {}", s.uuid));
            }
            self.board.fail(step, "Provisioning service missing");
            return;
        };
        self.board.log(step, format!("Found service: {}", service.uuid));

        let report = evaluate_service(service);
        for expected in &report.expected {
            let mark = if expected.found { "FOUND" } else { "MISSING" };
            self.board.log(
                step,
                format!("{} ({}): {mark}", expected.label, expected.uuid),
            );
        }
        for uuid in &report.extra {
            self.board.log(step, format!("Extra characteristic: {uuid}"));
        }

        if report.all_found() {
            self.board
                .log(step, "All expected characteristics present");
            self.board.pass(step);
        } else {
            let missing = report.expected.iter().filter(|e| !e.found).count();
            self.board.fail(
                step,
                format!("{missing} expected characteristic(s) missing"),
            );
        }
    }

    /// Drops the connection and resets steps 5-7. A failing cancel is ignored.
    pub async fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            if let Some(adapter) = self.adapter.as_ref() {
                if let Err(e) = adapter.cancel_connection(&conn.device_id).await {
                    log::debug!("ignoring disconnect failure for {}: {e}", conn.device_id);
                }
            }
        }
        for step in [StepId::Connect, StepId::Discover, StepId::Validate] {
            self.board.reset(step);
        }
    }

    /// Releases everything in order: active scan, connection, adapter.
    /// Safe to call any number of times.
    pub async fn shutdown(&mut self) {
        let Some(adapter) = self.adapter.take() else {
            self.scanning = false;
            self.connection = None;
            return;
        };

        if self.scanning {
            if let Err(e) = adapter.stop_scan().await {
                log::debug!("ignoring stop_scan failure on shutdown: {e}");
            }
            self.scanning = false;
        }
        if let Some(conn) = self.connection.take() {
            if let Err(e) = adapter.cancel_connection(&conn.device_id).await {
                log::debug!("ignoring disconnect failure on shutdown: {e}");
            }
        }
        adapter.destroy().await;
        log::debug!("BLE manager destroyed");
    }
}

fn describe_error(context: &str, e: &BleError) -> String {
    match &e.code {
        Some(code) => format!("{context} (code {code}): {}", e.message),
        None => format!("{context}: {}", e.message),
    }
}
