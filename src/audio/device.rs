use serde::{Deserialize, Serialize};
use std::fmt;

/// Directionality of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFlow {
    Render,
    Capture,
}

/// OS usage hint used to pick among several default endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    Console,
    Multimedia,
    Communications,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    Active,
    Disabled,
    NotPresent,
    Unplugged,
}

/// Snapshot of an endpoint owned by a [`DeviceRegistry`](super::DeviceRegistry).
///
/// The registry keeps the native handle; callers only ever see these copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub flow: DataFlow,
    pub state: DeviceState,
}

impl DataFlow {
    pub fn all() -> [DataFlow; 2] {
        [DataFlow::Render, DataFlow::Capture]
    }

    /// Flows implied by an optional registry filter.
    pub fn expand(filter: Option<DataFlow>) -> Vec<DataFlow> {
        match filter {
            Some(flow) => vec![flow],
            None => Self::all().to_vec(),
        }
    }
}

impl fmt::Display for DataFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFlow::Render => write!(f, "Render"),
            DataFlow::Capture => write!(f, "Capture"),
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Console => write!(f, "Console"),
            DeviceRole::Multimedia => write!(f, "Multimedia"),
            DeviceRole::Communications => write!(f, "Communications"),
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Active => write!(f, "Active"),
            DeviceState::Disabled => write!(f, "Disabled"),
            DeviceState::NotPresent => write!(f, "Not present"),
            DeviceState::Unplugged => write!(f, "Unplugged"),
        }
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): [{}]", self.name, self.flow, self.state)
    }
}

impl AudioDevice {
    pub fn new(id: String, name: String, flow: DataFlow) -> Self {
        Self {
            id,
            name,
            flow,
            state: DeviceState::Active,
        }
    }

    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    pub fn is_active(&self) -> bool {
        self.state == DeviceState::Active
    }

    /// The registry validity predicate: flow matches the filter (if any) and
    /// the endpoint is active.
    pub fn satisfies(&self, filter: Option<DataFlow>) -> bool {
        filter.is_none_or(|flow| flow == self.flow) && self.is_active()
    }
}
