use std::collections::HashMap;

use crate::ScanResult;

/// Devices seen in one scan window, deduplicated by id, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    devices: Vec<ScanResult>,
    index: HashMap<String, usize>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an advertisement. Returns `false` if the device was already
    /// listed; the first advertisement is kept as is.
    pub fn insert(&mut self, device: ScanResult) -> bool {
        if self.index.contains_key(&device.id) {
            return false;
        }
        self.index.insert(device.id.clone(), self.devices.len());
        self.devices.push(device);
        true
    }

    pub fn get(&self, id: &str) -> Option<&ScanResult> {
        self.index.get(id).map(|&i| &self.devices[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanResult> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.index.clear();
    }

    pub fn count_with_prefix(&self, prefix: &str) -> usize {
        self.devices
            .iter()
            .filter(|d| {
                d.name
                    .as_deref()
                    .is_some_and(|n| provdiag_proto::ble::is_provisioning_device(n, prefix))
            })
            .count()
    }

    /// Finds a device by exact id, else by a fragment of its name or id.
    pub fn find(&self, pattern: &str) -> Option<&ScanResult> {
        self.get(pattern).or_else(|| {
            self.devices.iter().find(|d| {
                d.id.contains(pattern) || d.name.as_deref().is_some_and(|n| n.contains(pattern))
            })
        })
    }
}
