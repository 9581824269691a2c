use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Everything a [`PipelineFactory`](crate::system::PipelineFactory) needs to
/// build one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub device_id: String,
    pub share_mode: ShareMode,
    /// Event-driven buffer pump instead of timer polling.
    pub event_sync: bool,
    pub latency: Duration,
}

/// The pipeline's own "stopped" notification, forwarded unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStopped {
    pub error: Option<String>,
}

impl PlaybackStopped {
    pub fn normal() -> Self {
        Self { error: None }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
        }
    }
}

impl fmt::Display for ShareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareMode::Shared => write!(f, "shared"),
            ShareMode::Exclusive => write!(f, "exclusive"),
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
        }
    }
}
