use std::sync::{Arc, Barrier};
use std::thread;

use audio_session_sync::audio::{DataFlow, DeviceRole, DeviceState};
use audio_session_sync::session::{
    ChannelVolumeChanged, DisconnectReason, GroupingParamChanged, SessionRegistry,
    SessionRegistryChange, SessionState,
};
use audio_session_sync::system::{
    AudioSystemInterface, EndpointHandle, EndpointNotificationClient, MockAudioSystem,
    SessionControl,
};

mod test_utils;
use test_utils::builders::{Recorder, scenarios};

fn registry_for(system: &MockAudioSystem) -> Arc<SessionRegistry> {
    let native: Arc<dyn AudioSystemInterface> = Arc::new(system.clone());
    SessionRegistry::new(native)
}

#[test]
fn test_reload_tracks_sessions_of_given_device() {
    let system = scenarios::typical_system();
    system.add_session("headphones", 10);
    system.add_session("headphones", 20);
    system.add_session("speakers", 30);

    let registry = registry_for(&system);
    assert_eq!(registry.reload(Some("headphones")).unwrap(), 2);

    assert_eq!(registry.device_id().as_deref(), Some("headphones"));
    assert!(registry.try_get(10).unwrap().is_some());
    assert!(registry.try_get(20).unwrap().is_some());
    assert!(registry.try_get(30).unwrap().is_none());
}

#[test]
fn test_reload_without_device_uses_default_render_then_capture() {
    let system = scenarios::typical_system();
    system.add_session("speakers", 1);
    system.add_session("microphone", 2);

    let registry = registry_for(&system);
    registry.reload(None).unwrap();
    assert_eq!(registry.device_id().as_deref(), Some("speakers"));
    assert!(registry.try_get(1).unwrap().is_some());

    system.set_default_silently(DataFlow::Render, DeviceRole::Multimedia, None);
    registry.reload(None).unwrap();
    assert_eq!(registry.device_id().as_deref(), Some("microphone"));
    assert!(registry.try_get(2).unwrap().is_some());
    assert!(registry.try_get(1).unwrap().is_none());
}

#[test]
fn test_reload_with_no_device_or_failures_is_empty() {
    let system = MockAudioSystem::new();
    let registry = registry_for(&system);
    assert_eq!(registry.reload(None).unwrap(), 0);
    assert!(registry.device_id().is_none());

    let system = scenarios::typical_system();
    system.add_session("speakers", 1);
    system.set_default_lookup_failure(true);
    let registry = registry_for(&system);
    assert_eq!(registry.reload(None).unwrap(), 0);

    system.set_default_lookup_failure(false);
    system.set_session_enumeration_failure(true);
    assert_eq!(registry.reload(None).unwrap(), 0);
    assert!(registry.is_empty());
}

#[test]
fn test_duplicate_process_ids_keep_first_and_release_rest() {
    let system = scenarios::typical_system();
    let first = system.add_session("speakers", 42);
    let second = system.add_session("speakers", 42);
    let third = system.add_session("speakers", 42);
    system.add_session("speakers", 7);

    let registry = registry_for(&system);
    assert_eq!(registry.reload(Some("speakers")).unwrap(), 2);
    assert_eq!(registry.len(), 2);

    // Only the first enumerated control for pid 42 is still held
    assert_eq!(first.controls_released(), 0);
    assert_eq!(first.client_count(), 1);
    assert_eq!(second.controls_released(), 1);
    assert_eq!(third.controls_released(), 1);
    assert_eq!(second.client_count(), 0);
}

#[test]
fn test_reload_releases_previous_sessions() {
    let system = scenarios::typical_system();
    let session = system.add_session("speakers", 5);

    let registry = registry_for(&system);
    registry.reload(Some("speakers")).unwrap();
    let changes = Recorder::attach(registry.changes());
    registry.reload(Some("speakers")).unwrap();

    assert_eq!(session.controls_created(), 2);
    assert_eq!(session.controls_released(), 1);
    assert_eq!(session.client_count(), 1);
    assert_eq!(
        changes.events(),
        vec![
            SessionRegistryChange::Removed(5),
            SessionRegistryChange::Added(5)
        ]
    );
}

#[test]
fn test_disconnect_removes_and_disposes_session() {
    let system = scenarios::typical_system();
    let native = system.add_session("speakers", 9);
    system.add_session("speakers", 10);

    let registry = registry_for(&system);
    registry.reload(Some("speakers")).unwrap();
    let tracked = registry.try_get(9).unwrap().unwrap();
    let changes = Recorder::attach(registry.changes());

    native.fire_disconnect(DisconnectReason::DeviceRemoval);

    assert!(registry.try_get(9).unwrap().is_none());
    assert!(registry.try_get(10).unwrap().is_some());
    assert!(tracked.is_disposed());
    assert!(tracked.volume().unwrap_err().is_disposed());
    assert_eq!(native.controls_released(), 1);
    assert_eq!(native.client_count(), 0);
    assert_eq!(changes.events(), vec![SessionRegistryChange::Removed(9)]);

    // A second disconnect from the stale control is harmless
    native.fire_disconnect(DisconnectReason::SessionLogoff);
    assert_eq!(native.controls_released(), 1);
}

#[test]
fn test_session_facets_write_through() {
    let system = scenarios::typical_system();
    let native = system.add_session("speakers", 3);

    let registry = registry_for(&system);
    registry.reload(Some("speakers")).unwrap();
    let session = registry.try_get(3).unwrap().unwrap();

    session.set_display_name("Player").unwrap();
    assert_eq!(native.display_name(), "Player");
    assert_eq!(session.display_name().unwrap(), "Player");

    session.set_volume(0.25).unwrap();
    assert_eq!(native.volume(), 0.25);
    session.set_volume(3.0).unwrap();
    assert_eq!(session.volume().unwrap(), 1.0);
    session.set_volume(-1.0).unwrap();
    assert_eq!(session.volume().unwrap(), 0.0);

    session.set_muted(true).unwrap();
    assert!(session.is_muted().unwrap());

    session.set_icon_path("player.ico").unwrap();
    assert_eq!(session.icon_path().unwrap(), "player.ico");

    assert_eq!(session.state().unwrap(), SessionState::Active);
}

#[test]
fn test_session_events_are_forwarded() {
    let system = scenarios::typical_system();
    let native = system.add_session("speakers", 3);

    let registry = registry_for(&system);
    registry.reload(Some("speakers")).unwrap();
    let session = registry.try_get(3).unwrap().unwrap();

    let volumes = Recorder::attach(&session.events().volume_changed);
    let names = Recorder::attach(&session.events().display_name_changed);
    let states = Recorder::attach(&session.events().state_changed);
    let channels = Recorder::attach(&session.events().channel_volume_changed);
    let icons = Recorder::attach(&session.events().icon_path_changed);
    let groupings = Recorder::attach(&session.events().grouping_param_changed);

    native.fire_volume_changed(0.5, true);
    native.fire_display_name_changed("Renamed");
    native.fire_state_changed(SessionState::Inactive);
    // The native buffer may be longer than the reported channel count
    native.fire_channel_volume_changed(2, &[0.25, 0.75, 0.9, 0.1], 1);
    native.fire_icon_path_changed("app.ico");
    native.fire_grouping_param_changed("group-7");

    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes.events()[0].level, 0.5);
    assert!(volumes.events()[0].muted);
    assert_eq!(names.events()[0].name, "Renamed");
    assert_eq!(states.events()[0].state, SessionState::Inactive);

    assert_eq!(
        channels.events(),
        vec![ChannelVolumeChanged {
            channel_count: 2,
            volumes: vec![0.25, 0.75],
            changed_channel: 1,
        }]
    );
    assert_eq!(icons.events()[0].path, "app.ico");
    assert_eq!(
        groupings.events(),
        vec![GroupingParamChanged {
            grouping_id: "group-7".to_string()
        }]
    );
}

/// Holds every session enumeration at a barrier so two reloads overlap.
struct OverlappingEnumeration {
    inner: MockAudioSystem,
    barrier: Barrier,
}

impl AudioSystemInterface for OverlappingEnumeration {
    fn enumerate_endpoints(
        &self,
        flow: DataFlow,
        state: DeviceState,
    ) -> anyhow::Result<Vec<Box<dyn EndpointHandle>>> {
        self.inner.enumerate_endpoints(flow, state)
    }

    fn get_endpoint(&self, id: &str) -> anyhow::Result<Box<dyn EndpointHandle>> {
        self.inner.get_endpoint(id)
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
        self.barrier.wait();
        self.inner.enumerate_sessions(device_id)
    }
}

#[test]
fn test_overlapping_reloads_track_a_single_device() {
    let system = scenarios::typical_system();
    let on_speakers = system.add_session("speakers", 1);
    let on_headphones = system.add_session("headphones", 2);

    let native: Arc<dyn AudioSystemInterface> = Arc::new(OverlappingEnumeration {
        inner: system.clone(),
        barrier: Barrier::new(2),
    });
    let registry = SessionRegistry::new(native);

    let handles: Vec<_> = ["speakers", "headphones"]
        .into_iter()
        .map(|device| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.reload(Some(device)).unwrap())
        })
        .collect();
    let tracked: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    let pids: Vec<u32> = registry
        .list()
        .unwrap()
        .iter()
        .map(|s| s.process_id())
        .collect();
    let expected = match registry.device_id().as_deref() {
        Some("speakers") => vec![1],
        Some("headphones") => vec![2],
        other => panic!("unexpected device {other:?}"),
    };
    assert_eq!(pids, expected);
    assert_eq!(tracked, 1);

    // The superseded batch was released, the surviving one is still held
    assert_eq!(
        on_speakers.controls_released() + on_headphones.controls_released(),
        1
    );
}

#[test]
fn test_notification_registration_failure_still_tracks() {
    let system = scenarios::typical_system();
    let native = system.add_session("speakers", 3);
    native.set_registration_failure(true);

    let registry = registry_for(&system);
    assert_eq!(registry.reload(Some("speakers")).unwrap(), 1);
    assert_eq!(native.client_count(), 0);
}

#[test]
fn test_current_process_lookup() {
    let system = scenarios::typical_system();
    system.add_session("speakers", std::process::id());

    let registry = registry_for(&system);
    registry.reload(None).unwrap();

    let session = registry.try_get_session_for_current_process().unwrap();
    assert_eq!(session.map(|s| s.process_id()), Some(std::process::id()));
}

#[test]
fn test_dispose_releases_everything_once() {
    let system = scenarios::typical_system();
    let a = system.add_session("speakers", 1);
    let b = system.add_session("speakers", 2);

    let registry = registry_for(&system);
    registry.reload(Some("speakers")).unwrap();
    let held = registry.try_get(1).unwrap().unwrap();

    registry.dispose();
    registry.dispose();

    assert_eq!(a.controls_released(), 1);
    assert_eq!(b.controls_released(), 1);
    assert!(held.is_disposed());
    assert!(registry.reload(None).unwrap_err().is_disposed());
    assert!(registry.list().is_err());

    // Disposing the session again through the leftover reference is a no-op
    held.dispose();
    assert_eq!(a.controls_released(), 1);
}
