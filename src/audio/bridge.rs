use anyhow::Result;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use super::device::{DataFlow, DeviceRole, DeviceState};
use crate::events::EventChannel;
use crate::system::{AudioSystemInterface, EndpointNotificationClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAdded {
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRemoved {
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStateChanged {
    pub device_id: String,
    pub state: DeviceState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultDeviceChanged {
    pub flow: DataFlow,
    pub role: DeviceRole,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValueChanged {
    pub device_id: String,
    pub key: String,
}

/// Turns raw endpoint callbacks into one typed channel per event kind.
///
/// Holds no state of its own besides its subscribers.
#[derive(Default)]
pub struct EndpointNotificationBridge {
    pub device_added: EventChannel<DeviceAdded>,
    pub device_removed: EventChannel<DeviceRemoved>,
    pub state_changed: EventChannel<DeviceStateChanged>,
    pub default_changed: EventChannel<DefaultDeviceChanged>,
    pub property_changed: EventChannel<PropertyValueChanged>,
}

impl EndpointNotificationBridge {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EndpointNotificationClient for EndpointNotificationBridge {
    fn on_device_added(&self, device_id: &str) {
        debug!("Endpoint added: {}", device_id);
        self.device_added.emit(&DeviceAdded {
            device_id: device_id.to_string(),
        });
    }

    fn on_device_removed(&self, device_id: &str) {
        debug!("Endpoint removed: {}", device_id);
        self.device_removed.emit(&DeviceRemoved {
            device_id: device_id.to_string(),
        });
    }

    fn on_device_state_changed(&self, device_id: &str, new_state: DeviceState) {
        debug!("Endpoint {} state changed to {}", device_id, new_state);
        self.state_changed.emit(&DeviceStateChanged {
            device_id: device_id.to_string(),
            state: new_state,
        });
    }

    fn on_default_device_changed(&self, flow: DataFlow, role: DeviceRole, device_id: Option<&str>) {
        debug!(
            "Default {} endpoint for {} changed to {:?}",
            flow, role, device_id
        );
        self.default_changed.emit(&DefaultDeviceChanged {
            flow,
            role,
            device_id: device_id.map(str::to_string),
        });
    }

    fn on_property_value_changed(&self, device_id: &str, key: &str) {
        self.property_changed.emit(&PropertyValueChanged {
            device_id: device_id.to_string(),
            key: key.to_string(),
        });
    }
}

/// Keeps a bridge registered with the audio system for as long as it lives.
///
/// Unregistration happens exactly once, either on [`dispose`](Self::dispose)
/// or on drop.
pub struct EndpointNotificationSubscription {
    audio_system: Arc<dyn AudioSystemInterface>,
    bridge: Arc<EndpointNotificationBridge>,
    client: Mutex<Option<Arc<dyn EndpointNotificationClient>>>,
}

impl EndpointNotificationSubscription {
    pub fn register(audio_system: Arc<dyn AudioSystemInterface>) -> Result<Self> {
        let bridge = Arc::new(EndpointNotificationBridge::new());
        let client: Arc<dyn EndpointNotificationClient> = bridge.clone();
        audio_system.register_endpoint_notifications(Arc::clone(&client))?;
        info!("Endpoint notification bridge registered");

        Ok(Self {
            audio_system,
            bridge,
            client: Mutex::new(Some(client)),
        })
    }

    pub fn bridge(&self) -> &Arc<EndpointNotificationBridge> {
        &self.bridge
    }

    pub fn dispose(&self) {
        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(client) = client {
            if let Err(e) = self.audio_system.unregister_endpoint_notifications(&client) {
                warn!("Failed to unregister endpoint notifications: {}", e);
            } else {
                info!("Endpoint notification bridge unregistered");
            }
        }
    }
}

impl Drop for EndpointNotificationSubscription {
    fn drop(&mut self) {
        self.dispose();
    }
}
