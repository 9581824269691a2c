use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak, mpsc};
use anyhow::anyhow;
use tracing::{debug, info, warn};

use super::bridge::{DefaultDeviceChanged, DeviceStateChanged, EndpointNotificationBridge};
use super::device::{AudioDevice, DataFlow, DeviceRole, DeviceState};
use super::dispatch::{Dispatcher, InlineDispatcher};
use super::registry::{DeviceRegistry, RegistryChange};
use crate::config::DeviceConfig;
use crate::error::{AudioError, AudioResult};
use crate::events::{EventChannel, SubscriptionId};

const COMPONENT: &str = "device selector";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorMode {
    /// Track the OS default endpoint for the selector's (flow, role).
    Auto,
    /// Hold whatever the caller picked.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChanged {
    pub previous: Option<String>,
    pub current: Option<AudioDevice>,
}

struct SelectorState {
    mode: SelectorMode,
    selected: Option<AudioDevice>,
    disposed: bool,
}

struct SelectorCore {
    registry: Arc<DeviceRegistry>,
    flow: DataFlow,
    role: DeviceRole,
    dispatcher: Arc<dyn Dispatcher>,
    state: Mutex<SelectorState>,
    selection_changed: EventChannel<SelectionChanged>,
}

struct SelectorSubscriptions {
    default_changed: SubscriptionId,
    state_changed: SubscriptionId,
    registry_changed: SubscriptionId,
}

/// Picks one active endpoint out of a [`DeviceRegistry`].
///
/// Every recomputation goes through one mutator that runs on the configured
/// dispatch context, and `selection_changed` is raised only after the
/// selector's guard has been released.
pub struct DeviceSelector {
    core: Arc<SelectorCore>,
    bridge: Arc<EndpointNotificationBridge>,
    subscriptions: Mutex<Option<SelectorSubscriptions>>,
}

impl SelectorCore {
    fn lock_state(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `work` on the dispatch context and hand its result back.
    /// Fails if the context dropped the job without running it.
    fn run<R, F>(self: &Arc<Self>, work: F) -> AudioResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&SelectorCore) -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let core = Arc::clone(self);
        self.dispatcher.invoke(Box::new(move || {
            let _ = tx.send(work(&core));
        }));
        rx.recv()
            .map_err(|_| AudioError::Subsystem(anyhow!("dispatch context is shut down")))
    }

    /// Notification-driven recomputation; there is no caller to report to.
    fn run_detached<F>(self: &Arc<Self>, what: &str, work: F)
    where
        F: FnOnce(&SelectorCore) + Send + 'static,
    {
        if let Err(e) = self.run(work) {
            warn!("{} selector dropped {}: {}", self.flow, what, e);
        }
    }

    fn resolve_default(&self) -> Option<AudioDevice> {
        self.registry
            .try_get_default(self.flow, self.role)
            .ok()
            .flatten()
    }

    /// Install `next` if the selector is live and, when `required` is set,
    /// in that mode. Returns None when rejected, otherwise whether the
    /// selection changed. The event is raised after the guard is dropped.
    fn apply(&self, required: Option<SelectorMode>, next: Option<AudioDevice>) -> Option<bool> {
        let change = {
            let mut state = self.lock_state();
            if state.disposed || required.is_some_and(|mode| mode != state.mode) {
                return None;
            }

            let previous_id = state.selected.as_ref().map(|d| d.id.clone());
            let next_id = next.as_ref().map(|d| d.id.clone());
            if previous_id == next_id {
                state.selected = next;
                return Some(false);
            }

            state.selected = next.clone();
            SelectionChanged {
                previous: previous_id,
                current: next,
            }
        };

        match &change.current {
            Some(device) => info!("Selected {} device: {}", self.flow, device),
            None => info!("Cleared {} device selection", self.flow),
        }
        self.selection_changed.emit(&change);
        Some(true)
    }

    fn clear_if_selected(&self, device_id: &str) {
        let change = {
            let mut state = self.lock_state();
            if state.disposed
                || state.selected.as_ref().map(|d| d.id.as_str()) != Some(device_id)
            {
                return;
            }
            state.selected = None;
            SelectionChanged {
                previous: Some(device_id.to_string()),
                current: None,
            }
        };

        info!("Selected device {} is no longer active", device_id);
        self.selection_changed.emit(&change);
    }
}

impl DeviceSelector {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        bridge: Arc<EndpointNotificationBridge>,
        flow: DataFlow,
        role: DeviceRole,
        mode: SelectorMode,
        dispatcher: Option<Arc<dyn Dispatcher>>,
    ) -> Self {
        info!("Creating {} device selector for {} ({:?})", flow, role, mode);

        let core = Arc::new(SelectorCore {
            registry,
            flow,
            role,
            dispatcher: dispatcher.unwrap_or_else(|| Arc::new(InlineDispatcher)),
            state: Mutex::new(SelectorState {
                mode,
                selected: None,
                disposed: false,
            }),
            selection_changed: EventChannel::new(),
        });

        let selector = Self {
            subscriptions: Mutex::new(None),
            bridge,
            core,
        };
        selector.subscribe();

        if mode == SelectorMode::Auto {
            selector.core.run_detached("initial default resolution", |core| {
                let next = core.resolve_default();
                core.apply(Some(SelectorMode::Auto), next);
            });
        }

        selector
    }

    /// Selector using the role and mode from `[devices]`.
    pub fn from_config(
        registry: Arc<DeviceRegistry>,
        bridge: Arc<EndpointNotificationBridge>,
        flow: DataFlow,
        config: &DeviceConfig,
        dispatcher: Option<Arc<dyn Dispatcher>>,
    ) -> Self {
        Self::new(
            registry,
            bridge,
            flow,
            config.role,
            config.selector_mode,
            dispatcher,
        )
    }

    fn subscribe(&self) {
        let weak: Weak<SelectorCore> = Arc::downgrade(&self.core);
        let (flow, role) = (self.core.flow, self.core.role);

        let default_changed = self.bridge.default_changed.subscribe({
            let weak = weak.clone();
            move |event: &DefaultDeviceChanged| {
                if event.flow != flow || event.role != role {
                    return;
                }
                let Some(core) = weak.upgrade() else { return };
                let device_id = event.device_id.clone();
                core.run_detached("default change", move |core| {
                    if core.lock_state().mode != SelectorMode::Auto {
                        return;
                    }
                    let next = device_id
                        .as_deref()
                        .and_then(|id| core.registry.try_get(id).ok().flatten());
                    core.apply(Some(SelectorMode::Auto), next);
                });
            }
        });

        let state_changed = self.bridge.state_changed.subscribe({
            let weak = weak.clone();
            move |event: &DeviceStateChanged| {
                if event.state == DeviceState::Active {
                    return;
                }
                let Some(core) = weak.upgrade() else { return };
                let device_id = event.device_id.clone();
                core.run_detached("state change", move |core| {
                    core.clear_if_selected(&device_id)
                });
            }
        });

        let registry_changed = self.core.registry.changes().subscribe(move |change| {
            let Some(core) = weak.upgrade() else { return };
            match change {
                RegistryChange::Removed(device) => {
                    let device_id = device.id.clone();
                    core.run_detached("device removal", move |core| {
                        core.clear_if_selected(&device_id)
                    });
                }
                RegistryChange::Added(device) if device.flow == flow => {
                    // A default that showed up before its endpoint did.
                    core.run_detached("device arrival", |core| {
                        let waiting = {
                            let state = core.lock_state();
                            state.mode == SelectorMode::Auto && state.selected.is_none()
                        };
                        if waiting {
                            let next = core.resolve_default();
                            if next.is_some() {
                                core.apply(Some(SelectorMode::Auto), next);
                            }
                        }
                    });
                }
                RegistryChange::Added(_) => {}
            }
        });

        *self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(SelectorSubscriptions {
            default_changed,
            state_changed,
            registry_changed,
        });
    }

    pub fn flow(&self) -> DataFlow {
        self.core.flow
    }

    pub fn role(&self) -> DeviceRole {
        self.core.role
    }

    pub fn mode(&self) -> SelectorMode {
        self.core.lock_state().mode
    }

    pub fn selected(&self) -> Option<AudioDevice> {
        self.core.lock_state().selected.clone()
    }

    pub fn selection_changed(&self) -> &EventChannel<SelectionChanged> {
        &self.core.selection_changed
    }

    /// Switching from Manual to Auto adopts the registry's current default
    /// right away; switching to Manual keeps the current selection.
    pub fn set_mode(&self, mode: SelectorMode) -> AudioResult<()> {
        self.core
            .run(move |core| {
                let previous = {
                    let mut state = core.lock_state();
                    if state.disposed {
                        return Err(AudioError::disposed(COMPONENT));
                    }
                    std::mem::replace(&mut state.mode, mode)
                };

                if previous != mode {
                    info!("{} selector mode: {:?} -> {:?}", core.flow, previous, mode);
                }
                if previous == SelectorMode::Manual && mode == SelectorMode::Auto {
                    let next = core.resolve_default();
                    core.apply(Some(SelectorMode::Auto), next);
                }
                Ok(())
            })
            .and_then(|result| result)
    }

    /// Select a device (or clear the selection with `None`) in Manual mode.
    ///
    /// Returns false when the request was ignored: the selector is in Auto
    /// mode, or the device is not a live registry entry.
    pub fn try_change_device(&self, device_id: Option<&str>) -> AudioResult<bool> {
        let device_id = device_id.map(str::to_string);
        self.core
            .run(move |core| {
                {
                    let state = core.lock_state();
                    if state.disposed {
                        return Err(AudioError::disposed(COMPONENT));
                    }
                    if state.mode == SelectorMode::Auto {
                        debug!("Manual device change ignored in Auto mode");
                        return Ok(false);
                    }
                }

                let next = match device_id {
                    Some(id) => match core.registry.try_get(&id).ok().flatten() {
                        Some(device) => Some(device),
                        None => {
                            debug!("Manual device change to unknown device {} ignored", id);
                            return Ok(false);
                        }
                    },
                    None => None,
                };

                Ok(core.apply(Some(SelectorMode::Manual), next).is_some())
            })
            .and_then(|result| result)
    }

    /// Unsubscribe from the bridge and registry. Idempotent.
    pub fn dispose(&self) {
        {
            let mut state = self.core.lock_state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.selected = None;
        }

        let subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscriptions) = subscriptions {
            self.bridge
                .default_changed
                .unsubscribe(subscriptions.default_changed);
            self.bridge
                .state_changed
                .unsubscribe(subscriptions.state_changed);
            self.core
                .registry
                .changes()
                .unsubscribe(subscriptions.registry_changed);
        }
        debug!("{} device selector disposed", self.core.flow);
    }
}

impl Drop for DeviceSelector {
    fn drop(&mut self) {
        self.dispose();
    }
}
