use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::{AudioDevice, DataFlow, DeviceRole, DeviceState};
use crate::playback::{
    PipelineRequest, PlaybackState, PlaybackStopped, SampleSource, SharedSampleSource, WaveFormat,
};
use crate::session::{DisconnectReason, SessionState};
use crate::system::traits::{
    AudioSystemInterface, EndpointHandle, EndpointNotificationClient, FileSystemInterface,
    PipelineFactory, RenderPipeline, SessionControl, SessionNotificationClient,
};

type EndpointClients = Arc<Mutex<Vec<Arc<dyn EndpointNotificationClient>>>>;

/// Mock audio system for testing - provides controllable endpoints, defaults,
/// sessions and notifications
///
/// Endpoint handles handed out by the mock read their state live from the
/// endpoint table, and count their own releases.
#[derive(Clone, Default)]
pub struct MockAudioSystem {
    pub endpoints: Arc<Mutex<Vec<AudioDevice>>>,
    pub defaults: Arc<Mutex<HashMap<(DataFlow, DeviceRole), String>>>,
    pub sessions: Arc<Mutex<HashMap<String, Vec<MockSession>>>>,
    pub clients: EndpointClients,
    pub endpoints_acquired: Arc<AtomicUsize>,
    pub endpoints_released: Arc<AtomicUsize>,
    pub should_fail_enumeration: Arc<AtomicBool>,
    pub should_fail_get_endpoint: Arc<AtomicBool>,
    pub should_fail_default_lookup: Arc<AtomicBool>,
    pub should_fail_session_enumeration: Arc<AtomicBool>,
    pub should_fail_registration: Arc<AtomicBool>,
    pub should_fail_name: Arc<AtomicBool>,
}

impl MockAudioSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint without raising a notification
    pub fn add_endpoint(&self, device: AudioDevice) {
        let mut endpoints = self.endpoints.lock().unwrap();
        endpoints.retain(|d| d.id != device.id);
        endpoints.push(device);
    }

    /// Add an endpoint and notify `on_device_added`
    pub fn plug(&self, device: AudioDevice) {
        let id = device.id.clone();
        self.add_endpoint(device);
        self.fire_device_added(&id);
    }

    /// Remove an endpoint and notify `on_device_removed`
    pub fn unplug(&self, device_id: &str) {
        self.endpoints.lock().unwrap().retain(|d| d.id != device_id);
        self.fire_device_removed(device_id);
    }

    /// Change an endpoint's state and notify `on_device_state_changed`
    pub fn set_endpoint_state(&self, device_id: &str, state: DeviceState) {
        if let Some(device) = self
            .endpoints
            .lock()
            .unwrap()
            .iter_mut()
            .find(|d| d.id == device_id)
        {
            device.state = state;
        }
        self.fire_state_changed(device_id, state);
    }

    /// Set the default endpoint for (flow, role) without notifying
    pub fn set_default_silently(&self, flow: DataFlow, role: DeviceRole, device_id: Option<&str>) {
        let mut defaults = self.defaults.lock().unwrap();
        match device_id {
            Some(id) => defaults.insert((flow, role), id.to_string()),
            None => defaults.remove(&(flow, role)),
        };
    }

    /// Set the default endpoint for (flow, role) and notify
    pub fn set_default(&self, flow: DataFlow, role: DeviceRole, device_id: Option<&str>) {
        self.set_default_silently(flow, role, device_id);
        self.fire_default_changed(flow, role, device_id);
    }

    /// Register a session on a device; the returned handle drives it
    pub fn add_session(&self, device_id: &str, process_id: u32) -> MockSession {
        let session = MockSession::new(process_id);
        self.sessions
            .lock()
            .unwrap()
            .entry(device_id.to_string())
            .or_default()
            .push(session.clone());
        session
    }

    fn snapshot_clients(&self) -> Vec<Arc<dyn EndpointNotificationClient>> {
        self.clients.lock().unwrap().clone()
    }

    pub fn fire_device_added(&self, device_id: &str) {
        for client in self.snapshot_clients() {
            client.on_device_added(device_id);
        }
    }

    pub fn fire_device_removed(&self, device_id: &str) {
        for client in self.snapshot_clients() {
            client.on_device_removed(device_id);
        }
    }

    pub fn fire_state_changed(&self, device_id: &str, state: DeviceState) {
        for client in self.snapshot_clients() {
            client.on_device_state_changed(device_id, state);
        }
    }

    pub fn fire_default_changed(&self, flow: DataFlow, role: DeviceRole, device_id: Option<&str>) {
        for client in self.snapshot_clients() {
            client.on_default_device_changed(flow, role, device_id);
        }
    }

    pub fn fire_property_changed(&self, device_id: &str, key: &str) {
        for client in self.snapshot_clients() {
            client.on_property_value_changed(device_id, key);
        }
    }

    /// Get count of registered notification clients
    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    /// Endpoint handles handed out and not yet released
    pub fn live_endpoint_handles(&self) -> usize {
        self.endpoints_acquired.load(Ordering::SeqCst)
            - self.endpoints_released.load(Ordering::SeqCst)
    }

    pub fn set_enumeration_failure(&self, should_fail: bool) {
        self.should_fail_enumeration.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_get_endpoint_failure(&self, should_fail: bool) {
        self.should_fail_get_endpoint.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_default_lookup_failure(&self, should_fail: bool) {
        self.should_fail_default_lookup.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_session_enumeration_failure(&self, should_fail: bool) {
        self.should_fail_session_enumeration
            .store(should_fail, Ordering::SeqCst);
    }

    pub fn set_registration_failure(&self, should_fail: bool) {
        self.should_fail_registration.store(should_fail, Ordering::SeqCst);
    }

    /// Make every handle's `friendly_name` fail
    pub fn set_name_failure(&self, should_fail: bool) {
        self.should_fail_name.store(should_fail, Ordering::SeqCst);
    }

    fn handle_for(&self, device: &AudioDevice) -> Box<dyn EndpointHandle> {
        self.endpoints_acquired.fetch_add(1, Ordering::SeqCst);
        Box::new(MockEndpoint {
            id: device.id.clone(),
            flow: device.flow,
            endpoints: Arc::clone(&self.endpoints),
            fail_name: Arc::clone(&self.should_fail_name),
            released: Arc::clone(&self.endpoints_released),
        })
    }
}

impl AudioSystemInterface for MockAudioSystem {
    fn enumerate_endpoints(
        &self,
        flow: DataFlow,
        state: DeviceState,
    ) -> Result<Vec<Box<dyn EndpointHandle>>> {
        if self.should_fail_enumeration.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock enumeration failure"));
        }

        let matching: Vec<AudioDevice> = self
            .endpoints
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.flow == flow && d.state == state)
            .cloned()
            .collect();
        Ok(matching.iter().map(|d| self.handle_for(d)).collect())
    }

    fn get_endpoint(&self, id: &str) -> Result<Box<dyn EndpointHandle>> {
        if self.should_fail_get_endpoint.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock get endpoint failure"));
        }

        let device = self
            .endpoints
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Endpoint not found: {}", id))?;
        Ok(self.handle_for(&device))
    }

    fn get_default_endpoint_id(&self, flow: DataFlow, role: DeviceRole) -> Result<Option<String>> {
        if self.should_fail_default_lookup.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock default lookup failure"));
        }
        Ok(self.defaults.lock().unwrap().get(&(flow, role)).cloned())
    }

    fn register_endpoint_notifications(
        &self,
        client: Arc<dyn EndpointNotificationClient>,
    ) -> Result<()> {
        if self.should_fail_registration.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock registration failure"));
        }
        self.clients.lock().unwrap().push(client);
        Ok(())
    }

    fn unregister_endpoint_notifications(
        &self,
        client: &Arc<dyn EndpointNotificationClient>,
    ) -> Result<()> {
        self.clients
            .lock()
            .unwrap()
            .retain(|registered| !Arc::ptr_eq(registered, client));
        Ok(())
    }

    fn enumerate_sessions(&self, device_id: &str) -> Result<Vec<Box<dyn SessionControl>>> {
        if self.should_fail_session_enumeration.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock session enumeration failure"));
        }

        let sessions = self
            .sessions
            .lock()
            .unwrap()
            .get(device_id)
            .cloned()
            .unwrap_or_default();
        Ok(sessions
            .iter()
            .map(|session| Box::new(session.control()) as Box<dyn SessionControl>)
            .collect())
    }
}

/// Endpoint handle backed by the mock's endpoint table
pub struct MockEndpoint {
    id: String,
    flow: DataFlow,
    endpoints: Arc<Mutex<Vec<AudioDevice>>>,
    fail_name: Arc<AtomicBool>,
    released: Arc<AtomicUsize>,
}

impl EndpointHandle for MockEndpoint {
    fn id(&self) -> &str {
        &self.id
    }

    fn data_flow(&self) -> DataFlow {
        self.flow
    }

    fn state(&self) -> Result<DeviceState> {
        Ok(self
            .endpoints
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == self.id)
            .map_or(DeviceState::NotPresent, |d| d.state))
    }

    fn friendly_name(&self) -> Result<String> {
        if self.fail_name.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock property store failure"));
        }
        self.endpoints
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == self.id)
            .map(|d| d.name.clone())
            .ok_or_else(|| anyhow::anyhow!("Endpoint gone: {}", self.id))
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockSessionShared {
    process_id: u32,
    display_name: Mutex<String>,
    icon_path: Mutex<String>,
    volume: Mutex<f32>,
    muted: AtomicBool,
    state: Mutex<SessionState>,
    clients: Mutex<Vec<Arc<dyn SessionNotificationClient>>>,
    controls_created: AtomicUsize,
    controls_released: AtomicUsize,
    should_fail_registration: AtomicBool,
}

/// Test handle for one mock session; every enumeration hands out a fresh
/// control backed by the same shared state
#[derive(Clone)]
pub struct MockSession {
    shared: Arc<MockSessionShared>,
}

impl MockSession {
    pub fn new(process_id: u32) -> Self {
        Self {
            shared: Arc::new(MockSessionShared {
                process_id,
                display_name: Mutex::new(format!("Process {process_id}")),
                icon_path: Mutex::new(String::new()),
                volume: Mutex::new(1.0),
                muted: AtomicBool::new(false),
                state: Mutex::new(SessionState::Active),
                clients: Mutex::new(Vec::new()),
                controls_created: AtomicUsize::new(0),
                controls_released: AtomicUsize::new(0),
                should_fail_registration: AtomicBool::new(false),
            }),
        }
    }

    pub fn control(&self) -> MockSessionControl {
        self.shared.controls_created.fetch_add(1, Ordering::SeqCst);
        MockSessionControl {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn process_id(&self) -> u32 {
        self.shared.process_id
    }

    pub fn volume(&self) -> f32 {
        *self.shared.volume.lock().unwrap()
    }

    pub fn display_name(&self) -> String {
        self.shared.display_name.lock().unwrap().clone()
    }

    pub fn controls_created(&self) -> usize {
        self.shared.controls_created.load(Ordering::SeqCst)
    }

    pub fn controls_released(&self) -> usize {
        self.shared.controls_released.load(Ordering::SeqCst)
    }

    pub fn client_count(&self) -> usize {
        self.shared.clients.lock().unwrap().len()
    }

    pub fn set_registration_failure(&self, should_fail: bool) {
        self.shared
            .should_fail_registration
            .store(should_fail, Ordering::SeqCst);
    }

    fn snapshot_clients(&self) -> Vec<Arc<dyn SessionNotificationClient>> {
        self.shared.clients.lock().unwrap().clone()
    }

    pub fn fire_volume_changed(&self, level: f32, muted: bool) {
        for client in self.snapshot_clients() {
            client.on_simple_volume_changed(level, muted);
        }
    }

    pub fn fire_display_name_changed(&self, name: &str) {
        for client in self.snapshot_clients() {
            client.on_display_name_changed(name);
        }
    }

    pub fn fire_channel_volume_changed(
        &self,
        channel_count: usize,
        volumes: &[f32],
        changed_channel: usize,
    ) {
        for client in self.snapshot_clients() {
            client.on_channel_volume_changed(channel_count, volumes, changed_channel);
        }
    }

    pub fn fire_icon_path_changed(&self, path: &str) {
        for client in self.snapshot_clients() {
            client.on_icon_path_changed(path);
        }
    }

    pub fn fire_grouping_param_changed(&self, grouping_id: &str) {
        for client in self.snapshot_clients() {
            client.on_grouping_param_changed(grouping_id);
        }
    }

    pub fn fire_state_changed(&self, state: SessionState) {
        *self.shared.state.lock().unwrap() = state;
        for client in self.snapshot_clients() {
            client.on_state_changed(state);
        }
    }

    pub fn fire_disconnect(&self, reason: DisconnectReason) {
        for client in self.snapshot_clients() {
            client.on_session_disconnected(reason);
        }
    }
}

/// Session control handed to the code under test
pub struct MockSessionControl {
    shared: Arc<MockSessionShared>,
}

impl SessionControl for MockSessionControl {
    fn process_id(&self) -> u32 {
        self.shared.process_id
    }

    fn display_name(&self) -> Result<String> {
        Ok(self.shared.display_name.lock().unwrap().clone())
    }

    fn set_display_name(&self, name: &str) -> Result<()> {
        *self.shared.display_name.lock().unwrap() = name.to_string();
        Ok(())
    }

    fn icon_path(&self) -> Result<String> {
        Ok(self.shared.icon_path.lock().unwrap().clone())
    }

    fn set_icon_path(&self, path: &str) -> Result<()> {
        *self.shared.icon_path.lock().unwrap() = path.to_string();
        Ok(())
    }

    fn volume(&self) -> Result<f32> {
        Ok(*self.shared.volume.lock().unwrap())
    }

    fn set_volume(&self, level: f32) -> Result<()> {
        *self.shared.volume.lock().unwrap() = level;
        Ok(())
    }

    fn is_muted(&self) -> Result<bool> {
        Ok(self.shared.muted.load(Ordering::SeqCst))
    }

    fn set_muted(&self, muted: bool) -> Result<()> {
        self.shared.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }

    fn state(&self) -> Result<SessionState> {
        Ok(*self.shared.state.lock().unwrap())
    }

    fn register_notifications(&self, client: Arc<dyn SessionNotificationClient>) -> Result<()> {
        if self.shared.should_fail_registration.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock session registration failure"));
        }
        self.shared.clients.lock().unwrap().push(client);
        Ok(())
    }

    fn unregister_notifications(&self, client: &Arc<dyn SessionNotificationClient>) -> Result<()> {
        self.shared
            .clients
            .lock()
            .unwrap()
            .retain(|registered| !Arc::ptr_eq(registered, client));
        Ok(())
    }
}

impl Drop for MockSessionControl {
    fn drop(&mut self) {
        self.shared.controls_released.fetch_add(1, Ordering::SeqCst);
    }
}

type StoppedHandler = Arc<dyn Fn(&PlaybackStopped) + Send + Sync>;

struct MockPipelineShared {
    request: PipelineRequest,
    state: Mutex<PlaybackState>,
    volume: Mutex<f32>,
    position: AtomicU64,
    source: Mutex<Option<Arc<dyn SharedSampleSource>>>,
    handler: Mutex<Option<StoppedHandler>>,
    released: AtomicBool,
}

/// Test handle onto a pipeline built by [`MockPipelineFactory`]
#[derive(Clone)]
pub struct MockPipelineHandle {
    shared: Arc<MockPipelineShared>,
}

impl MockPipelineHandle {
    pub fn request(&self) -> PipelineRequest {
        self.shared.request.clone()
    }

    pub fn state(&self) -> PlaybackState {
        *self.shared.state.lock().unwrap()
    }

    pub fn volume(&self) -> f32 {
        *self.shared.volume.lock().unwrap()
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    pub fn has_source(&self) -> bool {
        self.shared.source.lock().unwrap().is_some()
    }

    /// Pull `len` bytes from the bound source the way a pump thread would
    pub fn pump(&self, len: usize) -> Vec<u8> {
        let source = self.shared.source.lock().unwrap().clone();
        let mut buffer = vec![0u8; len];
        let read = source.map_or(0, |source| source.read(&mut buffer));
        buffer.truncate(read);
        self.shared.position.fetch_add(read as u64, Ordering::SeqCst);
        buffer
    }

    /// Simulate the pipeline stopping on its own
    pub fn fire_stopped(&self, error: Option<&str>) {
        *self.shared.state.lock().unwrap() = PlaybackState::Stopped;
        let event = match error {
            Some(message) => PlaybackStopped::with_error(message),
            None => PlaybackStopped::normal(),
        };
        let handler = self.shared.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler(&event);
        }
    }
}

/// Pipeline handed to the code under test
pub struct MockPipeline {
    shared: Arc<MockPipelineShared>,
    fail_initialize: bool,
    released: Arc<AtomicUsize>,
}

impl RenderPipeline for MockPipeline {
    fn initialize(&mut self, source: Arc<dyn SharedSampleSource>) -> Result<()> {
        if self.fail_initialize {
            return Err(anyhow::anyhow!("Mock initialize failure"));
        }
        *self.shared.source.lock().unwrap() = Some(source);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        *self.shared.state.lock().unwrap() = PlaybackState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        *self.shared.state.lock().unwrap() = PlaybackState::Paused;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        *self.shared.state.lock().unwrap() = PlaybackState::Stopped;
        Ok(())
    }

    fn playback_state(&self) -> PlaybackState {
        *self.shared.state.lock().unwrap()
    }

    fn volume(&self) -> Result<f32> {
        Ok(*self.shared.volume.lock().unwrap())
    }

    fn set_volume(&mut self, level: f32) -> Result<()> {
        *self.shared.volume.lock().unwrap() = level;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.shared.position.load(Ordering::SeqCst)
    }

    fn set_stopped_handler(&mut self, handler: Box<dyn Fn(&PlaybackStopped) + Send + Sync>) {
        *self.shared.handler.lock().unwrap() = Some(Arc::from(handler));
    }
}

impl Drop for MockPipeline {
    fn drop(&mut self) {
        self.shared.source.lock().unwrap().take();
        self.shared.handler.lock().unwrap().take();
        self.shared.released.store(true, Ordering::SeqCst);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock pipeline factory - records every request and keeps a handle to
/// every pipeline it built
#[derive(Clone, Default)]
pub struct MockPipelineFactory {
    pub built: Arc<Mutex<Vec<MockPipelineHandle>>>,
    pub released: Arc<AtomicUsize>,
    pub create_calls: Arc<AtomicUsize>,
    pub should_fail_create: Arc<AtomicBool>,
    pub should_fail_initialize: Arc<AtomicBool>,
}

impl MockPipelineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_create_failure(&self, should_fail: bool) {
        self.should_fail_create.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_initialize_failure(&self, should_fail: bool) {
        self.should_fail_initialize.store(should_fail, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn built_count(&self) -> usize {
        self.built.lock().unwrap().len()
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Pipelines built and not yet released
    pub fn live_count(&self) -> usize {
        self.built
            .lock()
            .unwrap()
            .iter()
            .filter(|handle| !handle.is_released())
            .count()
    }

    pub fn latest(&self) -> Option<MockPipelineHandle> {
        self.built.lock().unwrap().last().cloned()
    }
}

impl PipelineFactory for MockPipelineFactory {
    fn create(&self, request: &PipelineRequest) -> Result<Box<dyn RenderPipeline>> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_create.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock pipeline creation failure"));
        }

        let shared = Arc::new(MockPipelineShared {
            request: request.clone(),
            state: Mutex::new(PlaybackState::Stopped),
            volume: Mutex::new(1.0),
            position: AtomicU64::new(0),
            source: Mutex::new(None),
            handler: Mutex::new(None),
            released: AtomicBool::new(false),
        });
        self.built.lock().unwrap().push(MockPipelineHandle {
            shared: Arc::clone(&shared),
        });

        Ok(Box::new(MockPipeline {
            shared,
            fail_initialize: self.should_fail_initialize.load(Ordering::SeqCst),
            released: Arc::clone(&self.released),
        }))
    }
}

/// Sample source that plays back queued bytes; reads past the queue come up
/// short
pub struct MockSampleSource {
    format: WaveFormat,
    queue: Arc<Mutex<VecDeque<u8>>>,
    drops: Arc<AtomicUsize>,
}

/// Feeds and observes a [`MockSampleSource`] after it has been moved away
#[derive(Clone)]
pub struct MockSourceFeeder {
    queue: Arc<Mutex<VecDeque<u8>>>,
    drops: Arc<AtomicUsize>,
}

impl MockSampleSource {
    pub fn new(format: WaveFormat, bytes: &[u8]) -> Self {
        Self {
            format,
            queue: Arc::new(Mutex::new(bytes.iter().copied().collect())),
            drops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn feeder(&self) -> MockSourceFeeder {
        MockSourceFeeder {
            queue: Arc::clone(&self.queue),
            drops: Arc::clone(&self.drops),
        }
    }
}

impl MockSourceFeeder {
    pub fn push(&self, bytes: &[u8]) {
        self.queue.lock().unwrap().extend(bytes.iter().copied());
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_dropped(&self) -> bool {
        self.drops.load(Ordering::SeqCst) > 0
    }
}

impl SampleSource for MockSampleSource {
    fn read(&mut self, buffer: &mut [u8]) -> usize {
        let mut queue = self.queue.lock().unwrap();
        let count = buffer.len().min(queue.len());
        for (slot, byte) in buffer.iter_mut().zip(queue.drain(..count)) {
            *slot = byte;
        }
        count
    }

    fn format(&self) -> WaveFormat {
        self.format
    }
}

impl Drop for MockSampleSource {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock file system for testing - provides controllable file operations
#[derive(Clone, Default)]
pub struct MockFileSystem {
    pub files: Arc<Mutex<HashMap<PathBuf, String>>>,
    pub read_calls: Arc<Mutex<Vec<PathBuf>>>,
    pub write_calls: Arc<Mutex<Vec<(PathBuf, String)>>>,
    pub directory_creation_calls: Arc<Mutex<Vec<PathBuf>>>,
    pub should_fail_read: Arc<AtomicBool>,
    pub should_fail_write: Arc<AtomicBool>,
    pub should_fail_create_dir: Arc<AtomicBool>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the mock file system
    pub fn add_file<P: AsRef<Path>>(&self, path: P, content: String) {
        self.files
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), content);
    }

    pub fn get_read_calls(&self) -> Vec<PathBuf> {
        self.read_calls.lock().unwrap().clone()
    }

    pub fn get_write_calls(&self) -> Vec<(PathBuf, String)> {
        self.write_calls.lock().unwrap().clone()
    }

    pub fn get_directory_creation_calls(&self) -> Vec<PathBuf> {
        self.directory_creation_calls.lock().unwrap().clone()
    }

    pub fn set_read_failure(&self, should_fail: bool) {
        self.should_fail_read.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_write_failure(&self, should_fail: bool) {
        self.should_fail_write.store(should_fail, Ordering::SeqCst);
    }

    pub fn set_create_dir_failure(&self, should_fail: bool) {
        self.should_fail_create_dir.store(should_fail, Ordering::SeqCst);
    }

    /// Check if a file exists in the mock system
    pub fn file_exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.files.lock().unwrap().contains_key(path.as_ref())
    }
}

impl FileSystemInterface for MockFileSystem {
    fn read_config_file(&self, path: &Path) -> Result<String> {
        self.read_calls.lock().unwrap().push(path.to_path_buf());

        if self.should_fail_read.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock read failure"));
        }

        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("File not found: {}", path.display()))
    }

    fn write_config_file(&self, path: &Path, content: &str) -> Result<()> {
        self.write_calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), content.to_string()));

        if self.should_fail_write.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock write failure"));
        }

        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn config_file_exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn create_config_dir(&self, path: &Path) -> Result<()> {
        self.directory_creation_calls
            .lock()
            .unwrap()
            .push(path.to_path_buf());

        if self.should_fail_create_dir.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock create directory failure"));
        }

        Ok(())
    }
}
