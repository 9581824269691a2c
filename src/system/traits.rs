use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::audio::{DataFlow, DeviceRole, DeviceState};
use crate::playback::{PipelineRequest, PlaybackState, PlaybackStopped, SharedSampleSource};
use crate::session::{DisconnectReason, SessionState};

/// Trait for audio system operations - abstracts endpoint enumeration, default
/// lookup, notification registration and session enumeration
pub trait AudioSystemInterface: Send + Sync {
    /// Enumerate endpoints of one flow that are currently in `state`
    fn enumerate_endpoints(
        &self,
        flow: DataFlow,
        state: DeviceState,
    ) -> Result<Vec<Box<dyn EndpointHandle>>>;

    /// Resolve an endpoint handle by its opaque ID
    fn get_endpoint(&self, id: &str) -> Result<Box<dyn EndpointHandle>>;

    /// Get the ID of the default endpoint for a (flow, role) pair
    fn get_default_endpoint_id(&self, flow: DataFlow, role: DeviceRole) -> Result<Option<String>>;

    /// Register a client for endpoint change notifications
    /// Callbacks may arrive on any thread
    fn register_endpoint_notifications(
        &self,
        client: Arc<dyn EndpointNotificationClient>,
    ) -> Result<()>;

    /// Remove a client previously passed to `register_endpoint_notifications`
    fn unregister_endpoint_notifications(
        &self,
        client: &Arc<dyn EndpointNotificationClient>,
    ) -> Result<()>;

    /// Enumerate the session controls of one endpoint
    fn enumerate_sessions(&self, device_id: &str) -> Result<Vec<Box<dyn SessionControl>>>;
}

/// A native endpoint handle. Dropping the box releases it.
pub trait EndpointHandle: Send + Sync {
    fn id(&self) -> &str;

    fn data_flow(&self) -> DataFlow;

    fn state(&self) -> Result<DeviceState>;

    fn friendly_name(&self) -> Result<String>;
}

/// Raw endpoint callbacks as delivered by the OS
pub trait EndpointNotificationClient: Send + Sync {
    fn on_device_added(&self, device_id: &str);

    fn on_device_removed(&self, device_id: &str);

    fn on_device_state_changed(&self, device_id: &str, new_state: DeviceState);

    fn on_default_device_changed(&self, flow: DataFlow, role: DeviceRole, device_id: Option<&str>);

    fn on_property_value_changed(&self, device_id: &str, key: &str);
}

/// A native per-process session control. Dropping the box releases it.
pub trait SessionControl: Send + Sync {
    fn process_id(&self) -> u32;

    fn display_name(&self) -> Result<String>;

    fn set_display_name(&self, name: &str) -> Result<()>;

    fn icon_path(&self) -> Result<String>;

    fn set_icon_path(&self, path: &str) -> Result<()>;

    fn volume(&self) -> Result<f32>;

    fn set_volume(&self, level: f32) -> Result<()>;

    fn is_muted(&self) -> Result<bool>;

    fn set_muted(&self, muted: bool) -> Result<()>;

    fn state(&self) -> Result<SessionState>;

    fn register_notifications(&self, client: Arc<dyn SessionNotificationClient>) -> Result<()>;

    fn unregister_notifications(&self, client: &Arc<dyn SessionNotificationClient>) -> Result<()>;
}

/// Raw per-session callbacks as delivered by the OS
pub trait SessionNotificationClient: Send + Sync {
    fn on_simple_volume_changed(&self, level: f32, muted: bool);

    fn on_channel_volume_changed(&self, channel_count: usize, volumes: &[f32], changed_channel: usize);

    fn on_display_name_changed(&self, name: &str);

    fn on_icon_path_changed(&self, path: &str);

    fn on_grouping_param_changed(&self, grouping_id: &str);

    fn on_state_changed(&self, state: SessionState);

    fn on_session_disconnected(&self, reason: DisconnectReason);
}

/// Builds native render pipelines bound to one device/config pair
pub trait PipelineFactory: Send + Sync {
    fn create(&self, request: &PipelineRequest) -> Result<Box<dyn RenderPipeline>>;
}

/// A constructed native render pipeline. Dropping the box releases it.
pub trait RenderPipeline: Send {
    /// Bind the pull source the pipeline's pump thread will read from
    fn initialize(&mut self, source: Arc<dyn SharedSampleSource>) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn playback_state(&self) -> PlaybackState;

    fn volume(&self) -> Result<f32>;

    fn set_volume(&mut self, level: f32) -> Result<()>;

    /// Bytes rendered since the pipeline was initialized
    fn position(&self) -> u64;

    /// Install the handler for the pipeline's own "stopped" notification
    fn set_stopped_handler(&mut self, handler: Box<dyn Fn(&PlaybackStopped) + Send + Sync>);
}

/// Trait for file system operations - abstracts std::fs for testability
pub trait FileSystemInterface {
    /// Read the entire contents of a configuration file
    fn read_config_file(&self, path: &Path) -> Result<String>;

    /// Write configuration content to a file
    fn write_config_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Check if a configuration file exists
    fn config_file_exists(&self, path: &Path) -> bool;

    /// Create the directory structure for config files
    fn create_config_dir(&self, path: &Path) -> Result<()>;
}
