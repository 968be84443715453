//! Scripted central for tests
//!
//! Advertisements are replayed at fixed offsets from scan start, adapter state
//! is a watch channel the test can flip, and every call is recorded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use provdiag_proto::ble::uuid_eq;
use tokio::sync::watch;

use crate::central::{
    AdapterState, BleAdapter, BleCentral, ConnectRequest, ConnectedDevice, ScanFilter,
    ScanStream, StateStream,
};
use crate::gatt::GattService;
use crate::lease::AdapterLease;
use crate::{BleError, ScanResult};

#[derive(Debug, Clone)]
pub(crate) enum ConnectBehavior {
    Accept { mtu: Option<u16> },
    Refuse(BleError),
    Hang,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct World {
    pub created: usize,
    pub destroyed: usize,
    pub live: usize,
    pub max_live: usize,
    pub subscriptions: usize,
    pub watchers: usize,
    pub max_watchers: usize,
    pub scans_started: usize,
    pub stop_calls: usize,
    pub last_filter: Option<ScanFilter>,
    pub last_connect: Option<ConnectRequest>,
    pub cancels: Vec<String>,
    pub calls: Vec<&'static str>,

    fail_create: Option<BleError>,
    fail_discover: Option<BleError>,
    fail_cancel: Option<BleError>,
    advertisements: Vec<(Duration, Result<ScanResult, BleError>)>,
    connect: HashMap<String, ConnectBehavior>,
    services: HashMap<String, Vec<GattService>>,
}

#[derive(Clone)]
pub(crate) struct MockCentral {
    world: Arc<Mutex<World>>,
    state: Arc<watch::Sender<AdapterState>>,
}

impl Default for MockCentral {
    fn default() -> Self {
        Self {
            world: Arc::default(),
            state: Arc::new(watch::Sender::new(AdapterState::PoweredOn)),
        }
    }
}

fn lock(world: &Mutex<World>) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockCentral {
    pub fn snapshot(&self) -> World {
        lock(&self.world).clone()
    }

    pub fn set_state(&self, state: AdapterState) {
        self.state.send_replace(state);
    }

    /// Replays `item` `at` after each scan starts.
    pub fn advertise(&self, at: Duration, item: Result<ScanResult, BleError>) {
        lock(&self.world).advertisements.push((at, item));
    }

    pub fn on_connect(&self, id: &str, behavior: ConnectBehavior) {
        lock(&self.world).connect.insert(id.to_string(), behavior);
    }

    pub fn services(&self, id: &str, services: Vec<GattService>) {
        lock(&self.world).services.insert(id.to_string(), services);
    }

    pub fn fail_create(&self, e: BleError) {
        lock(&self.world).fail_create = Some(e);
    }

    pub fn fail_discover(&self, e: BleError) {
        lock(&self.world).fail_discover = Some(e);
    }

    pub fn fail_cancel(&self, e: BleError) {
        lock(&self.world).fail_cancel = Some(e);
    }
}

pub(crate) struct MockAdapter {
    world: Arc<Mutex<World>>,
    state: Arc<watch::Sender<AdapterState>>,
    _lease: AdapterLease,
}

/// Counts live state subscriptions.
struct WatchGuard(Arc<Mutex<World>>);

impl Drop for WatchGuard {
    fn drop(&mut self) {
        lock(&self.0).watchers -= 1;
    }
}

impl BleCentral for MockCentral {
    type Adapter = MockAdapter;

    async fn create_adapter(&self, lease: AdapterLease) -> Result<MockAdapter, BleError> {
        {
            let mut world = lock(&self.world);
            if let Some(e) = world.fail_create.clone() {
                return Err(e);
            }
            world.calls.push("create");
            world.created += 1;
            world.live += 1;
            world.max_live = world.max_live.max(world.live);
        }
        Ok(MockAdapter {
            world: self.world.clone(),
            state: self.state.clone(),
            _lease: lease,
        })
    }
}

impl BleAdapter for MockAdapter {
    async fn state(&self) -> Result<AdapterState, BleError> {
        Ok(*self.state.borrow())
    }

    async fn watch_state(&self) -> Result<StateStream, BleError> {
        {
            let mut world = lock(&self.world);
            world.subscriptions += 1;
            world.watchers += 1;
            world.max_watchers = world.max_watchers.max(world.watchers);
        }
        let guard = WatchGuard(self.world.clone());
        let rx = self.state.subscribe();
        let stream =
            futures::stream::unfold((rx, guard, true), |(mut rx, guard, first)| async move {
                if !first {
                    rx.changed().await.ok()?;
                }
                let state = *rx.borrow_and_update();
                Some((state, (rx, guard, false)))
            });
        Ok(stream.boxed())
    }

    async fn start_scan(&self, filter: &ScanFilter) -> Result<ScanStream, BleError> {
        let script: Vec<_> = {
            let mut world = lock(&self.world);
            world.calls.push("start_scan");
            world.scans_started += 1;
            world.last_filter = Some(filter.clone());
            world
                .advertisements
                .iter()
                .filter(|(_, item)| match item {
                    Ok(device) => filter.services.iter().all(|wanted| {
                        device.services.iter().any(|s| uuid_eq(s, wanted))
                    }),
                    Err(_) => true,
                })
                .cloned()
                .collect()
        };

        let start = tokio::time::Instant::now();
        let stream = futures::stream::iter(script)
            .then(move |(at, item)| async move {
                tokio::time::sleep_until(start + at).await;
                item
            })
            .chain(futures::stream::pending());
        Ok(stream.boxed())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        let mut world = lock(&self.world);
        world.calls.push("stop_scan");
        world.stop_calls += 1;
        Ok(())
    }

    async fn connect(&self, request: &ConnectRequest) -> Result<ConnectedDevice, BleError> {
        let behavior = {
            let mut world = lock(&self.world);
            world.calls.push("connect");
            world.last_connect = Some(request.clone());
            world.connect.get(&request.device_id).cloned()
        };
        match behavior {
            Some(ConnectBehavior::Accept { mtu }) => Ok(ConnectedDevice {
                id: request.device_id.clone(),
                name: None,
                mtu,
            }),
            Some(ConnectBehavior::Refuse(e)) => Err(e),
            Some(ConnectBehavior::Hang) => std::future::pending().await,
            None => Err(BleError::with_code("Device not found", "DeviceNotFound")),
        }
    }

    async fn cancel_connection(&self, device_id: &str) -> Result<(), BleError> {
        let mut world = lock(&self.world);
        world.calls.push("cancel");
        world.cancels.push(device_id.to_string());
        match world.fail_cancel.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn discover(&self, device_id: &str) -> Result<Vec<GattService>, BleError> {
        let world = lock(&self.world);
        if let Some(e) = world.fail_discover.clone() {
            return Err(e);
        }
        Ok(world.services.get(device_id).cloned().unwrap_or_default())
    }

    async fn destroy(self) {
        tokio::task::yield_now().await;
        let mut world = lock(&self.world);
        world.calls.push("destroy");
        world.destroyed += 1;
        world.live -= 1;
    }
}
