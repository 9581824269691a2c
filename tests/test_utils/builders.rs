//! Test utility builders for creating endpoints, mock systems and wired-up
//! components
//!
//! Individual helpers may not be used by all tests, so dead code warnings are suppressed.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use audio_session_sync::audio::{
    AudioDevice, DataFlow, DeviceRegistry, DeviceRole, DeviceSelector, DeviceState,
    EndpointNotificationSubscription, SelectorMode,
};
use audio_session_sync::events::EventChannel;
use audio_session_sync::system::{AudioSystemInterface, MockAudioSystem};

/// Builder for creating test AudioDevice instances
pub struct AudioDeviceBuilder {
    id: String,
    name: String,
    flow: DataFlow,
    state: DeviceState,
}

impl AudioDeviceBuilder {
    pub fn new() -> Self {
        Self {
            id: "test_device_1".to_string(),
            name: "Test Device".to_string(),
            flow: DataFlow::Render,
            state: DeviceState::Active,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn render(mut self) -> Self {
        self.flow = DataFlow::Render;
        self
    }

    pub fn capture(mut self) -> Self {
        self.flow = DataFlow::Capture;
        self
    }

    pub fn state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    pub fn unplugged(self) -> Self {
        self.state(DeviceState::Unplugged)
    }

    pub fn build(self) -> AudioDevice {
        AudioDevice::new(self.id, self.name, self.flow).with_state(self.state)
    }
}

impl Default for AudioDeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A mock audio system with a registered notification bridge and a registry
pub struct Harness {
    pub system: MockAudioSystem,
    pub subscription: EndpointNotificationSubscription,
    pub registry: Arc<DeviceRegistry>,
}

impl Harness {
    pub fn new(system: MockAudioSystem, filter: Option<DataFlow>) -> Self {
        let native: Arc<dyn AudioSystemInterface> = Arc::new(system.clone());
        let subscription = EndpointNotificationSubscription::register(Arc::clone(&native))
            .expect("bridge registration");
        let registry = DeviceRegistry::new(native, Arc::clone(subscription.bridge()), filter);
        Self {
            system,
            subscription,
            registry,
        }
    }

    pub fn selector(&self, flow: DataFlow, mode: SelectorMode) -> DeviceSelector {
        DeviceSelector::new(
            Arc::clone(&self.registry),
            Arc::clone(self.subscription.bridge()),
            flow,
            DeviceRole::Multimedia,
            mode,
            None,
        )
    }

    /// Release everything in dependency order
    pub fn dispose(&self) {
        self.registry.dispose();
        self.subscription.dispose();
    }
}

/// Collects every event raised on a channel
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn attach(channel: &EventChannel<T>) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        channel.subscribe(move |event: &T| sink.lock().unwrap().push(event.clone()));
        Self { events }
    }

    pub fn events(&self) -> Vec<T> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

/// Helper functions for creating common test scenarios
pub mod scenarios {
    use super::*;

    pub fn speakers() -> AudioDevice {
        AudioDeviceBuilder::new()
            .id("speakers")
            .name("Speakers")
            .render()
            .build()
    }

    pub fn headphones() -> AudioDevice {
        AudioDeviceBuilder::new()
            .id("headphones")
            .name("Headphones")
            .render()
            .build()
    }

    pub fn microphone() -> AudioDevice {
        AudioDeviceBuilder::new()
            .id("microphone")
            .name("Microphone")
            .capture()
            .build()
    }

    /// Speakers (default render), headphones, a microphone (default
    /// capture) and an unplugged HDMI output
    pub fn typical_system() -> MockAudioSystem {
        let system = MockAudioSystem::new();
        system.add_endpoint(speakers());
        system.add_endpoint(headphones());
        system.add_endpoint(microphone());
        system.add_endpoint(
            AudioDeviceBuilder::new()
                .id("hdmi")
                .name("HDMI Output")
                .render()
                .unplugged()
                .build(),
        );
        system.set_default_silently(DataFlow::Render, DeviceRole::Multimedia, Some("speakers"));
        system.set_default_silently(
            DataFlow::Capture,
            DeviceRole::Multimedia,
            Some("microphone"),
        );
        system
    }
}
