//! Exclusive ownership of the platform adapter
//!
//! Native BLE stacks allow one live manager per process; a second one created
//! while the first is still tearing down ends up bound to a dead native
//! object. An [`AdapterLease`] is the capability to hold that manager. It is
//! owned by the adapter session and released only when the session's
//! `destroy` finishes, so the next [`AdapterSlot::acquire`] waits for a
//! completed teardown.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::BleError;

static GLOBAL_SLOT: Lazy<AdapterSlot> = Lazy::new(AdapterSlot::new);

#[derive(Debug, Clone)]
pub struct AdapterSlot {
    permit: Arc<Semaphore>,
}

#[derive(Debug)]
pub struct AdapterLease {
    _permit: OwnedSemaphorePermit,
}

impl AdapterSlot {
    /// A slot independent of the process-wide one. Only useful where the
    /// adapter is not a native resource, e.g. tests.
    pub fn new() -> Self {
        Self {
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// The process-wide slot every real adapter must be created under.
    pub fn global() -> Self {
        GLOBAL_SLOT.clone()
    }

    /// Waits until no lease is outstanding, then takes it.
    pub async fn acquire(&self) -> Result<AdapterLease, BleError> {
        let permit = self
            .permit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BleError::new("adapter slot closed"))?;
        Ok(AdapterLease { _permit: permit })
    }

    pub fn is_free(&self) -> bool {
        self.permit.available_permits() == 1
    }
}

impl Default for AdapterSlot {
    fn default() -> Self {
        Self::new()
    }
}
