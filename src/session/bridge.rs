use tracing::debug;

use super::types::{DisconnectReason, SessionState};
use crate::events::EventChannel;
use crate::system::SessionNotificationClient;

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeChanged {
    pub level: f32,
    pub muted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelVolumeChanged {
    pub channel_count: usize,
    pub volumes: Vec<f32>,
    pub changed_channel: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNameChanged {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconPathChanged {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingParamChanged {
    pub grouping_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStateChanged {
    pub state: SessionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionDisconnected {
    pub reason: DisconnectReason,
}

/// Typed fan-out for the raw callbacks of one session control.
#[derive(Default)]
pub struct SessionNotificationBridge {
    pub volume_changed: EventChannel<VolumeChanged>,
    pub channel_volume_changed: EventChannel<ChannelVolumeChanged>,
    pub display_name_changed: EventChannel<DisplayNameChanged>,
    pub icon_path_changed: EventChannel<IconPathChanged>,
    pub grouping_param_changed: EventChannel<GroupingParamChanged>,
    pub state_changed: EventChannel<SessionStateChanged>,
    pub disconnected: EventChannel<SessionDisconnected>,
}

impl SessionNotificationBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every subscriber. Called when the owning session is disposed.
    pub fn clear(&self) {
        self.volume_changed.clear();
        self.channel_volume_changed.clear();
        self.display_name_changed.clear();
        self.icon_path_changed.clear();
        self.grouping_param_changed.clear();
        self.state_changed.clear();
        self.disconnected.clear();
    }
}

impl SessionNotificationClient for SessionNotificationBridge {
    fn on_simple_volume_changed(&self, level: f32, muted: bool) {
        self.volume_changed.emit(&VolumeChanged { level, muted });
    }

    fn on_channel_volume_changed(&self, channel_count: usize, volumes: &[f32], changed_channel: usize) {
        self.channel_volume_changed.emit(&ChannelVolumeChanged {
            channel_count,
            volumes: volumes.iter().copied().take(channel_count).collect(),
            changed_channel,
        });
    }

    fn on_display_name_changed(&self, name: &str) {
        self.display_name_changed.emit(&DisplayNameChanged {
            name: name.to_string(),
        });
    }

    fn on_icon_path_changed(&self, path: &str) {
        self.icon_path_changed.emit(&IconPathChanged {
            path: path.to_string(),
        });
    }

    fn on_grouping_param_changed(&self, grouping_id: &str) {
        self.grouping_param_changed.emit(&GroupingParamChanged {
            grouping_id: grouping_id.to_string(),
        });
    }

    fn on_state_changed(&self, state: SessionState) {
        debug!("Session state changed to {}", state);
        self.state_changed.emit(&SessionStateChanged { state });
    }

    fn on_session_disconnected(&self, reason: DisconnectReason) {
        debug!("Session disconnected: {}", reason);
        self.disconnected.emit(&SessionDisconnected { reason });
    }
}
