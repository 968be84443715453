//! btleplug backend
//!
//! Scan results come from the adapter's event stream; each discovered
//! peripheral is cached by id so a later connect can find it again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use btleplug::api::{
    Central as _, CentralEvent, CentralState, CharPropFlags, Manager as _, Peripheral as _,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use uuid::Uuid;

use crate::central::{
    AdapterState, BleAdapter, BleCentral, ConnectRequest, ConnectedDevice, ScanFilter,
    ScanStream, StateStream,
};
use crate::gatt::{CharacteristicFlags, GattCharacteristic, GattService};
use crate::lease::AdapterLease;
use crate::{BleError, ScanResult};

type PeripheralCache = Arc<Mutex<HashMap<String, Peripheral>>>;

/// The host's first Bluetooth adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct BtleplugCentral;

pub struct BtleplugAdapter {
    adapter: Adapter,
    peripherals: PeripheralCache,
    // dropped last: the manager and adapter must be gone before the lease frees
    _manager: Manager,
    _lease: AdapterLease,
}

impl BleCentral for BtleplugCentral {
    type Adapter = BtleplugAdapter;

    async fn create_adapter(&self, lease: AdapterLease) -> Result<BtleplugAdapter, BleError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| BleError::new("No Bluetooth adapter found"))?;
        if let Ok(info) = adapter.adapter_info().await {
            log::debug!("using adapter {info}");
        }
        Ok(BtleplugAdapter {
            adapter,
            peripherals: Arc::default(),
            _manager: manager,
            _lease: lease,
        })
    }
}

fn adapter_state(state: CentralState) -> AdapterState {
    match state {
        CentralState::PoweredOn => AdapterState::PoweredOn,
        CentralState::PoweredOff => AdapterState::PoweredOff,
        _ => AdapterState::Unknown,
    }
}

fn flags(props: CharPropFlags) -> CharacteristicFlags {
    CharacteristicFlags {
        read: props.contains(CharPropFlags::READ),
        write: props.contains(CharPropFlags::WRITE),
        write_without_response: props.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        notify: props.contains(CharPropFlags::NOTIFY),
        indicate: props.contains(CharPropFlags::INDICATE),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, BleError> {
    Uuid::parse_str(s).map_err(|e| BleError::with_code(format!("invalid UUID {s}: {e}"), "Uuid"))
}

/// Whether an advertisement carries one of `wanted`, either in its service
/// list or as a service-data key. An empty `wanted` matches everything.
fn advertises_any(
    services: &[Uuid],
    service_data: &HashMap<Uuid, Vec<u8>>,
    wanted: &[Uuid],
) -> bool {
    wanted.is_empty()
        || wanted
            .iter()
            .any(|uuid| services.contains(uuid) || service_data.contains_key(uuid))
}

/// Reads what the platform currently knows about a peripheral, or `None` if
/// it does not advertise any of `wanted`.
async fn describe(
    adapter: &Adapter,
    id: &PeripheralId,
    wanted: &[Uuid],
) -> Result<Option<(Peripheral, ScanResult)>, BleError> {
    let peripheral = adapter.peripheral(id).await?;
    let (name, rssi, services) = match peripheral.properties().await? {
        Some(props) => {
            if !advertises_any(&props.services, &props.service_data, wanted) {
                return Ok(None);
            }
            (
                props.local_name,
                props.rssi,
                props.services.iter().map(Uuid::to_string).collect(),
            )
        }
        None if wanted.is_empty() => (None, None, Vec::new()),
        None => return Ok(None),
    };
    let result = ScanResult {
        id: peripheral.id().to_string(),
        name,
        rssi,
        services,
    };
    Ok(Some((peripheral, result)))
}

impl BtleplugAdapter {
    fn cached(&self, device_id: &str) -> Result<Peripheral, BleError> {
        let cache = self
            .peripherals
            .lock()
            .map_err(|_| BleError::new("peripheral cache poisoned"))?;
        cache.get(device_id).cloned().ok_or_else(|| {
            BleError::with_code(format!("device {device_id} not seen in a scan"), "DeviceNotFound")
        })
    }
}

impl BleAdapter for BtleplugAdapter {
    async fn state(&self) -> Result<AdapterState, BleError> {
        Ok(adapter_state(self.adapter.adapter_state().await?))
    }

    async fn watch_state(&self) -> Result<StateStream, BleError> {
        // subscribe before reading so no transition falls in between
        let events = self.adapter.events().await?;
        let current = self.state().await?;
        let updates = events.filter_map(|event| async move {
            match event {
                CentralEvent::StateUpdate(state) => Some(adapter_state(state)),
                _ => None,
            }
        });
        Ok(futures::stream::once(async move { current })
            .chain(updates)
            .boxed())
    }

    async fn start_scan(&self, filter: &ScanFilter) -> Result<ScanStream, BleError> {
        let services = filter
            .services
            .iter()
            .map(|s| parse_uuid(s))
            .collect::<Result<Vec<_>, _>>()?;

        let events = self.adapter.events().await?;
        self.adapter
            .start_scan(btleplug::api::ScanFilter {
                services: services.clone(),
            })
            .await?;

        // the OS filter is advisory: cached peripherals still raise updates
        let adapter = self.adapter.clone();
        let cache = self.peripherals.clone();
        let name_prefix = filter.name_prefix.clone();
        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            let cache = cache.clone();
            let name_prefix = name_prefix.clone();
            let services = services.clone();
            async move {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => return None,
                };
                let (peripheral, device) = match describe(&adapter, &id, &services).await {
                    Ok(Some(found)) => found,
                    Ok(None) => return None,
                    Err(e) => {
                        log::debug!("skipping {id:?}: {e}");
                        return None;
                    }
                };
                if let Some(prefix) = &name_prefix {
                    if !device.name.as_deref().is_some_and(|n| n.starts_with(prefix.as_str())) {
                        return None;
                    }
                }
                if let Ok(mut cache) = cache.lock() {
                    cache.insert(device.id.clone(), peripheral);
                }
                Some(Ok(device))
            }
        });
        Ok(stream.boxed())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<ConnectedDevice, BleError> {
        let peripheral = self.cached(&request.device_id)?;
        // btleplug negotiates the MTU on its own and does not report the result
        log::debug!(
            "connecting to {} (requested MTU {}, timeout {:?})",
            request.device_id,
            request.mtu,
            request.timeout
        );
        peripheral.connect().await?;
        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name);
        Ok(ConnectedDevice {
            id: request.device_id.clone(),
            name,
            mtu: None,
        })
    }

    async fn cancel_connection(&self, device_id: &str) -> Result<(), BleError> {
        let peripheral = self.cached(device_id)?;
        peripheral.disconnect().await?;
        Ok(())
    }

    async fn discover(&self, device_id: &str) -> Result<Vec<GattService>, BleError> {
        let peripheral = self.cached(device_id)?;
        peripheral.discover_services().await?;
        Ok(peripheral
            .services()
            .into_iter()
            .map(|service| GattService {
                uuid: service.uuid.to_string(),
                characteristics: service
                    .characteristics
                    .into_iter()
                    .map(|c| GattCharacteristic {
                        uuid: c.uuid.to_string(),
                        flags: flags(c.properties),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn destroy(self) {
        if let Ok(mut cache) = self.peripherals.lock() {
            cache.clear();
        }
        drop(self);
        log::debug!("Bluetooth adapter released");
    }
}
