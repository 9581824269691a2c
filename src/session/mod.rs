pub mod audio_session;
pub mod bridge;
pub mod registry;
pub mod types;

pub use audio_session::AudioSession;
pub use bridge::{
    ChannelVolumeChanged, DisplayNameChanged, GroupingParamChanged, IconPathChanged,
    SessionDisconnected, SessionNotificationBridge, SessionStateChanged, VolumeChanged,
};
pub use registry::{SessionRegistry, SessionRegistryChange};
pub use types::{DisconnectReason, SessionState};
