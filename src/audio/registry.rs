use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

use super::bridge::EndpointNotificationBridge;
use super::device::{AudioDevice, DataFlow, DeviceRole, DeviceState};
use crate::config::DeviceConfig;
use crate::error::{AudioError, AudioResult};
use crate::events::{EventChannel, SubscriptionId};
use crate::system::{AudioSystemInterface, EndpointHandle};

const COMPONENT: &str = "device registry";

/// Raised after the registry's entry set changed, outside its guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Added(AudioDevice),
    Removed(AudioDevice),
}

struct RegistryState {
    filter: Option<DataFlow>,
    devices: BTreeMap<String, Box<dyn EndpointHandle>>,
    disposed: bool,
}

struct BridgeSubscriptions {
    added: SubscriptionId,
    removed: SubscriptionId,
    state_changed: SubscriptionId,
}

/// Live set of active endpoints matching an optional flow filter.
///
/// The registry owns every native handle it holds and releases each one
/// exactly once, when the entry is removed or the registry is disposed.
pub struct DeviceRegistry {
    audio_system: Arc<dyn AudioSystemInterface>,
    bridge: Arc<EndpointNotificationBridge>,
    state: Mutex<RegistryState>,
    subscriptions: Mutex<Option<BridgeSubscriptions>>,
    changes: EventChannel<RegistryChange>,
}

/// Build a snapshot of a native handle. A handle whose state cannot be read
/// is treated as not present.
fn describe(handle: &dyn EndpointHandle) -> AudioDevice {
    let id = handle.id().to_string();
    let name = handle.friendly_name().unwrap_or_else(|_| id.clone());
    let state = handle.state().unwrap_or(DeviceState::NotPresent);
    AudioDevice::new(id, name, handle.data_flow()).with_state(state)
}

impl DeviceRegistry {
    pub fn new(
        audio_system: Arc<dyn AudioSystemInterface>,
        bridge: Arc<EndpointNotificationBridge>,
        filter: Option<DataFlow>,
    ) -> Arc<Self> {
        info!("Creating device registry (filter: {:?})", filter);

        let registry = Arc::new(Self {
            audio_system,
            bridge,
            state: Mutex::new(RegistryState {
                filter,
                devices: BTreeMap::new(),
                disposed: false,
            }),
            subscriptions: Mutex::new(None),
            changes: EventChannel::new(),
        });

        registry.subscribe_to_bridge();
        if let Err(e) = registry.reload() {
            warn!("Initial device enumeration skipped: {}", e);
        }

        registry
    }

    /// Registry tracking the endpoints named by `[devices] filter`.
    pub fn from_config(
        audio_system: Arc<dyn AudioSystemInterface>,
        bridge: Arc<EndpointNotificationBridge>,
        config: &DeviceConfig,
    ) -> Arc<Self> {
        Self::new(audio_system, bridge, config.filter.as_flow())
    }

    fn subscribe_to_bridge(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let added = self.bridge.device_added.subscribe({
            let weak = weak.clone();
            move |event| {
                if let Some(registry) = weak.upgrade() {
                    registry.add(&event.device_id);
                }
            }
        });

        let removed = self.bridge.device_removed.subscribe({
            let weak = weak.clone();
            move |event| {
                if let Some(registry) = weak.upgrade() {
                    registry.remove(&event.device_id);
                }
            }
        });

        let state_changed = self.bridge.state_changed.subscribe(move |event| {
            if let Some(registry) = weak.upgrade() {
                if event.state == DeviceState::Active {
                    registry.add(&event.device_id);
                } else {
                    registry.remove(&event.device_id);
                }
            }
        });

        *self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(BridgeSubscriptions {
            added,
            removed,
            state_changed,
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_state(&self) -> AudioResult<MutexGuard<'_, RegistryState>> {
        let state = self.lock_state();
        if state.disposed {
            return Err(AudioError::disposed(COMPONENT));
        }
        Ok(state)
    }

    /// Events raised whenever an entry is inserted or removed.
    pub fn changes(&self) -> &EventChannel<RegistryChange> {
        &self.changes
    }

    pub fn filter(&self) -> AudioResult<Option<DataFlow>> {
        Ok(self.live_state()?.filter)
    }

    /// Change the flow filter. A changed filter sweeps entries that no longer
    /// qualify and enumerates the flows the new filter admits.
    pub fn set_filter(&self, filter: Option<DataFlow>) -> AudioResult<()> {
        {
            let mut state = self.live_state()?;
            if state.filter == filter {
                return Ok(());
            }
            info!("Device registry filter changed: {:?} -> {:?}", state.filter, filter);
            state.filter = filter;
        }
        self.reload()
    }

    /// Sweep invalid entries, then enumerate active endpoints for the current
    /// filter and insert the ones not yet tracked.
    pub fn reload(&self) -> AudioResult<()> {
        let (filter, swept) = {
            let mut state = self.live_state()?;
            let filter = state.filter;
            let stale: Vec<String> = state
                .devices
                .iter()
                .filter(|(_, handle)| !describe(handle.as_ref()).satisfies(filter))
                .map(|(id, _)| id.clone())
                .collect();
            let swept: Vec<Box<dyn EndpointHandle>> = stale
                .iter()
                .filter_map(|id| state.devices.remove(id))
                .collect();
            (filter, swept)
        };
        self.release(swept);

        let mut found = Vec::new();
        for flow in DataFlow::expand(filter) {
            match self.audio_system.enumerate_endpoints(flow, DeviceState::Active) {
                Ok(handles) => found.extend(handles),
                Err(e) => warn!("Failed to enumerate {} endpoints: {}", flow, e),
            }
        }
        debug!("Enumerated {} active endpoints", found.len());

        let mut added = Vec::new();
        let mut discarded = Vec::new();
        {
            let mut state = self.live_state()?;
            for handle in found {
                let device = describe(handle.as_ref());
                if state.devices.contains_key(&device.id) || !device.satisfies(state.filter) {
                    discarded.push(handle);
                    continue;
                }
                state.devices.insert(device.id.clone(), handle);
                added.push(device);
            }
        }
        drop(discarded);

        for device in added {
            info!("Device registered: {}", device);
            self.changes.emit(&RegistryChange::Added(device));
        }
        Ok(())
    }

    /// Resolve and insert an endpoint if it is not tracked yet and satisfies
    /// the validity predicate. Returns true if the entry was inserted.
    pub fn add(&self, device_id: &str) -> bool {
        {
            let state = self.lock_state();
            if state.disposed || state.devices.contains_key(device_id) {
                return false;
            }
        }

        let handle = match self.audio_system.get_endpoint(device_id) {
            Ok(handle) => handle,
            Err(e) => {
                debug!("Could not resolve endpoint {}: {}", device_id, e);
                return false;
            }
        };

        // Read under the guard so a state change handled while the handle was
        // being resolved cannot slip an inactive endpoint in.
        let mut state = self.lock_state();
        let device = describe(handle.as_ref());
        if state.disposed
            || state.devices.contains_key(&device.id)
            || !device.satisfies(state.filter)
        {
            drop(state);
            debug!("Discarding endpoint {}", device_id);
            return false;
        }
        state.devices.insert(device.id.clone(), handle);
        drop(state);

        info!("Device registered: {}", device);
        self.changes.emit(&RegistryChange::Added(device));
        true
    }

    /// Remove and release an entry. Returns true if it was tracked.
    pub fn remove(&self, device_id: &str) -> bool {
        let handle = {
            let mut state = self.lock_state();
            if state.disposed {
                return false;
            }
            state.devices.remove(device_id)
        };

        match handle {
            Some(handle) => {
                self.release(vec![handle]);
                true
            }
            None => false,
        }
    }

    fn release(&self, handles: Vec<Box<dyn EndpointHandle>>) {
        for handle in handles {
            let device = describe(handle.as_ref());
            drop(handle);
            info!("Device unregistered: {}", device.id);
            self.changes.emit(&RegistryChange::Removed(device));
        }
    }

    pub fn list_ids(&self) -> AudioResult<Vec<String>> {
        Ok(self.live_state()?.devices.keys().cloned().collect())
    }

    pub fn list(&self) -> AudioResult<Vec<AudioDevice>> {
        Ok(self
            .live_state()?
            .devices
            .values()
            .map(|handle| describe(handle.as_ref()))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.lock_state().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.lock_state().devices.contains_key(device_id)
    }

    pub fn try_get(&self, device_id: &str) -> AudioResult<Option<AudioDevice>> {
        Ok(self
            .live_state()?
            .devices
            .get(device_id)
            .map(|handle| describe(handle.as_ref())))
    }

    /// Look up the OS default endpoint for (flow, role). A default the registry
    /// has not observed yet is reported as absent.
    pub fn try_get_default(
        &self,
        flow: DataFlow,
        role: DeviceRole,
    ) -> AudioResult<Option<AudioDevice>> {
        drop(self.live_state()?);

        let default_id = match self.audio_system.get_default_endpoint_id(flow, role) {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Failed to resolve default {} endpoint for {}: {}", flow, role, e);
                return Ok(None);
            }
        };

        self.try_get(&default_id)
    }

    pub fn is_disposed(&self) -> bool {
        self.lock_state().disposed
    }

    /// Unsubscribe from the bridge and release every entry. Idempotent.
    pub fn dispose(&self) {
        let released = {
            let mut state = self.lock_state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.devices)
        };

        let subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscriptions) = subscriptions {
            self.bridge.device_added.unsubscribe(subscriptions.added);
            self.bridge.device_removed.unsubscribe(subscriptions.removed);
            self.bridge.state_changed.unsubscribe(subscriptions.state_changed);
        }

        info!("Device registry disposed, releasing {} endpoints", released.len());
        drop(released);
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.dispose();
    }
}
