use thiserror::Error;

/// Errors surfaced to callers of the registries, selector, provider and renderer.
///
/// Transient subsystem failures are logged and degraded to "absent" inside each
/// component, so the only error most callers ever see is [`AudioError::Disposed`].
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("{component} has been disposed")]
    Disposed { component: &'static str },

    #[error("audio subsystem error: {0}")]
    Subsystem(#[from] anyhow::Error),
}

impl AudioError {
    pub fn disposed(component: &'static str) -> Self {
        Self::Disposed { component }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed { .. })
    }
}

pub type AudioResult<T> = std::result::Result<T, AudioError>;
