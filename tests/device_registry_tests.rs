use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use audio_session_sync::audio::{
    DataFlow, DeviceRegistry, DeviceRole, DeviceState, EndpointNotificationSubscription,
    RegistryChange,
};
use audio_session_sync::system::{
    AudioSystemInterface, EndpointHandle, EndpointNotificationClient, MockAudioSystem,
    SessionControl,
};

mod test_utils;
use test_utils::builders::{AudioDeviceBuilder, Harness, Recorder, scenarios};

fn sorted_ids(harness: &Harness) -> Vec<String> {
    let mut ids = harness.registry.list_ids().unwrap();
    ids.sort();
    ids
}

#[test]
fn test_filter_render_then_none_lists_all_active() {
    let system = MockAudioSystem::new();
    system.add_endpoint(AudioDeviceBuilder::new().id("A").render().build());
    system.add_endpoint(AudioDeviceBuilder::new().id("B").capture().build());

    let harness = Harness::new(system, Some(DataFlow::Render));
    assert_eq!(sorted_ids(&harness), vec!["A"]);

    harness.registry.set_filter(None).unwrap();
    assert_eq!(sorted_ids(&harness), vec!["A", "B"]);
}

#[test]
fn test_narrowing_filter_sweeps_and_releases() {
    let harness = Harness::new(scenarios::typical_system(), None);
    assert_eq!(
        sorted_ids(&harness),
        vec!["headphones", "microphone", "speakers"]
    );

    let changes = Recorder::attach(harness.registry.changes());
    harness
        .registry
        .set_filter(Some(DataFlow::Capture))
        .unwrap();

    assert_eq!(sorted_ids(&harness), vec!["microphone"]);
    let removed: Vec<String> = changes
        .events()
        .into_iter()
        .filter_map(|change| match change {
            RegistryChange::Removed(device) => Some(device.id),
            RegistryChange::Added(_) => None,
        })
        .collect();
    assert_eq!(removed.len(), 2);
    // Only the tracked handles remain live; duplicates found by the reload were released
    assert_eq!(harness.system.live_endpoint_handles(), 1);
}

#[test]
fn test_enumeration_failure_yields_empty_registry() {
    let system = scenarios::typical_system();
    system.set_enumeration_failure(true);

    let harness = Harness::new(system, None);
    assert!(harness.registry.is_empty());

    harness.system.set_enumeration_failure(false);
    harness.registry.reload().unwrap();
    assert_eq!(harness.registry.len(), 3);
}

#[test]
fn test_notifications_converge_to_active_matching_set() {
    let harness = Harness::new(scenarios::typical_system(), Some(DataFlow::Render));

    // Added twice, removed, re-added, state flapping; delivered out of order
    let dock = AudioDeviceBuilder::new().id("dock").render().build();
    harness.system.plug(dock.clone());
    harness.system.fire_device_added("dock");
    harness.system.set_endpoint_state("headphones", DeviceState::Unplugged);
    harness.system.fire_state_changed("headphones", DeviceState::Unplugged);
    harness.system.set_endpoint_state("hdmi", DeviceState::Active);
    harness.system.fire_device_removed("speakers");
    harness.system.fire_device_added("speakers");
    harness.system.plug(scenarios::microphone());

    // Active and render: speakers, hdmi, dock
    assert_eq!(sorted_ids(&harness), vec!["dock", "hdmi", "speakers"]);

    harness.system.unplug("dock");
    harness.system.fire_device_removed("dock");
    assert_eq!(sorted_ids(&harness), vec!["hdmi", "speakers"]);
}

#[test]
fn test_add_ignores_unresolvable_and_inactive_endpoints() {
    let harness = Harness::new(MockAudioSystem::new(), None);

    assert!(!harness.registry.add("missing"));

    harness
        .system
        .add_endpoint(AudioDeviceBuilder::new().id("off").state(DeviceState::Disabled).build());
    assert!(!harness.registry.add("off"));
    assert!(harness.registry.is_empty());
    // Rejected handles are released immediately
    assert_eq!(harness.system.live_endpoint_handles(), 0);
}

#[test]
fn test_add_and_remove_raise_change_events() {
    let harness = Harness::new(MockAudioSystem::new(), None);
    let changes = Recorder::attach(harness.registry.changes());

    harness.system.plug(scenarios::speakers());
    harness.system.unplug("speakers");

    let events = changes.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], RegistryChange::Added(device) if device.id == "speakers"));
    assert!(matches!(&events[1], RegistryChange::Removed(device) if device.id == "speakers"));
}

#[test]
fn test_try_get_default_requires_observed_endpoint() {
    let harness = Harness::new(scenarios::typical_system(), Some(DataFlow::Render));

    let default = harness
        .registry
        .try_get_default(DataFlow::Render, DeviceRole::Multimedia)
        .unwrap();
    assert_eq!(default.map(|d| d.id), Some("speakers".to_string()));

    // Default known to the OS but not tracked by this registry
    let capture = harness
        .registry
        .try_get_default(DataFlow::Capture, DeviceRole::Multimedia)
        .unwrap();
    assert!(capture.is_none());
    assert!(!harness.registry.contains("microphone"));
}

#[test]
fn test_try_get_default_lookup_failure_is_absence() {
    let harness = Harness::new(scenarios::typical_system(), None);
    harness.system.set_default_lookup_failure(true);

    let default = harness
        .registry
        .try_get_default(DataFlow::Render, DeviceRole::Multimedia)
        .unwrap();
    assert!(default.is_none());
}

#[test]
fn test_unreadable_name_falls_back_to_id() {
    let system = MockAudioSystem::new();
    system.add_endpoint(scenarios::speakers());
    system.set_name_failure(true);

    let harness = Harness::new(system, None);
    let device = harness.registry.try_get("speakers").unwrap().unwrap();
    assert_eq!(device.name, "speakers");
}

#[test]
fn test_dispose_releases_every_handle_once() {
    let harness = Harness::new(scenarios::typical_system(), None);
    assert_eq!(harness.system.live_endpoint_handles(), 3);

    harness.registry.dispose();
    harness.registry.dispose();

    assert_eq!(harness.system.live_endpoint_handles(), 0);
    assert!(harness.registry.is_disposed());
    assert!(harness.registry.list().unwrap_err().is_disposed());
    assert!(harness.registry.set_filter(None).is_err());

    // Notifications after disposal are ignored
    harness.system.plug(AudioDeviceBuilder::new().id("late").build());
    assert!(harness.registry.is_empty());
}

#[test]
fn test_subscription_unregisters_bridge() {
    let harness = Harness::new(MockAudioSystem::new(), None);
    assert_eq!(harness.system.client_count(), 1);

    harness.dispose();
    harness.subscription.dispose();
    assert_eq!(harness.system.client_count(), 0);
}

/// Unplugs the endpoint right after handing out its handle, as if the
/// state-changed notification raced the registry's `add`.
struct UnplugAfterResolve {
    inner: MockAudioSystem,
    unplugged: AtomicBool,
}

impl AudioSystemInterface for UnplugAfterResolve {
    fn enumerate_endpoints(
        &self,
        flow: DataFlow,
        state: DeviceState,
    ) -> anyhow::Result<Vec<Box<dyn EndpointHandle>>> {
        self.inner.enumerate_endpoints(flow, state)
    }

    fn get_endpoint(&self, id: &str) -> anyhow::Result<Box<dyn EndpointHandle>> {
        let handle = self.inner.get_endpoint(id)?;
        if !self.unplugged.swap(true, Ordering::SeqCst) {
            self.inner.set_endpoint_state(id, DeviceState::Unplugged);
        }
        Ok(handle)
    }

    fn get_default_endpoint_id(
        &self,
        flow: DataFlow,
        role: DeviceRole,
    ) -> anyhow::Result<Option<String>> {
        self.inner.get_default_endpoint_id(flow, role)
    }

    fn register_endpoint_notifications(
        &self,
        client: Arc<dyn EndpointNotificationClient>,
    ) -> anyhow::Result<()> {
        self.inner.register_endpoint_notifications(client)
    }

    fn unregister_endpoint_notifications(
        &self,
        client: &Arc<dyn EndpointNotificationClient>,
    ) -> anyhow::Result<()> {
        self.inner.unregister_endpoint_notifications(client)
    }

    fn enumerate_sessions(&self, device_id: &str) -> anyhow::Result<Vec<Box<dyn SessionControl>>> {
        self.inner.enumerate_sessions(device_id)
    }
}

#[test]
fn test_add_rechecks_state_after_resolving_handle() {
    let system = MockAudioSystem::new();
    let native: Arc<dyn AudioSystemInterface> = Arc::new(UnplugAfterResolve {
        inner: system.clone(),
        unplugged: AtomicBool::new(false),
    });
    let subscription = EndpointNotificationSubscription::register(Arc::clone(&native)).unwrap();
    let registry = DeviceRegistry::new(native, Arc::clone(subscription.bridge()), None);
    let changes = Recorder::attach(registry.changes());

    system.plug(AudioDeviceBuilder::new().id("dock").render().build());

    assert!(!registry.contains("dock"));
    assert!(changes.events().is_empty());
    assert_eq!(system.live_endpoint_handles(), 0);

    // Once active again it is picked up normally
    system.set_endpoint_state("dock", DeviceState::Active);
    assert!(registry.contains("dock"));

    registry.dispose();
    subscription.dispose();
}
