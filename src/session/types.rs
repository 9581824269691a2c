use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a per-process audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Inactive,
    Active,
    Expired,
}

/// Why the OS disconnected a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    DeviceRemoval,
    ServerShutdown,
    FormatChanged,
    SessionLogoff,
    SessionDisconnected,
    ExclusiveModeOverride,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Inactive => write!(f, "Inactive"),
            SessionState::Active => write!(f, "Active"),
            SessionState::Expired => write!(f, "Expired"),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DisconnectReason::DeviceRemoval => "device removed",
            DisconnectReason::ServerShutdown => "audio service stopped",
            DisconnectReason::FormatChanged => "stream format changed",
            DisconnectReason::SessionLogoff => "user logged off",
            DisconnectReason::SessionDisconnected => "remote session disconnected",
            DisconnectReason::ExclusiveModeOverride => "exclusive-mode stream took over",
        };
        write!(f, "{}", reason)
    }
}
