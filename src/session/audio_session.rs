use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::bridge::SessionNotificationBridge;
use super::types::SessionState;
use crate::error::{AudioError, AudioResult};
use crate::system::{SessionControl, SessionNotificationClient};

const COMPONENT: &str = "audio session";

struct NativeSession {
    control: Box<dyn SessionControl>,
    client: Option<Arc<dyn SessionNotificationClient>>,
}

/// One tracked per-process session.
///
/// The facets write through to the native control. [`dispose`](Self::dispose)
/// unregisters the notification bridge and releases the control exactly once;
/// it also runs by itself when the OS reports the session disconnected.
pub struct AudioSession {
    process_id: u32,
    bridge: Arc<SessionNotificationBridge>,
    native: Mutex<Option<NativeSession>>,
}

impl AudioSession {
    /// Wrap a native control and subscribe a notification bridge to it.
    pub fn attach(control: Box<dyn SessionControl>) -> Arc<Self> {
        let process_id = control.process_id();
        let bridge = Arc::new(SessionNotificationBridge::new());

        let client: Arc<dyn SessionNotificationClient> = bridge.clone();
        let client = match control.register_notifications(Arc::clone(&client)) {
            Ok(()) => Some(client),
            Err(e) => {
                warn!(
                    "Failed to subscribe to session notifications for process {}: {}",
                    process_id, e
                );
                None
            }
        };

        let session = Arc::new(Self {
            process_id,
            bridge,
            native: Mutex::new(Some(NativeSession { control, client })),
        });

        let weak = Arc::downgrade(&session);
        session.bridge.disconnected.subscribe(move |event| {
            if let Some(session) = weak.upgrade() {
                debug!(
                    "Session for process {} disconnected ({}), disposing",
                    session.process_id, event.reason
                );
                session.dispose();
            }
        });

        session
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Typed notifications for this session.
    pub fn events(&self) -> &SessionNotificationBridge {
        &self.bridge
    }

    pub fn is_disposed(&self) -> bool {
        self.lock_native().is_none()
    }

    fn lock_native(&self) -> MutexGuard<'_, Option<NativeSession>> {
        self.native.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_control<T>(
        &self,
        f: impl FnOnce(&dyn SessionControl) -> anyhow::Result<T>,
    ) -> AudioResult<T> {
        let native = self.lock_native();
        let native = native
            .as_ref()
            .ok_or_else(|| AudioError::disposed(COMPONENT))?;
        Ok(f(native.control.as_ref())?)
    }

    pub fn display_name(&self) -> AudioResult<String> {
        self.with_control(|control| control.display_name())
    }

    pub fn set_display_name(&self, name: &str) -> AudioResult<()> {
        self.with_control(|control| control.set_display_name(name))
    }

    pub fn icon_path(&self) -> AudioResult<String> {
        self.with_control(|control| control.icon_path())
    }

    pub fn set_icon_path(&self, path: &str) -> AudioResult<()> {
        self.with_control(|control| control.set_icon_path(path))
    }

    pub fn volume(&self) -> AudioResult<f32> {
        self.with_control(|control| control.volume())
    }

    /// Levels outside 0.0..=1.0 are clamped.
    pub fn set_volume(&self, level: f32) -> AudioResult<()> {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        self.with_control(|control| control.set_volume(level))
    }

    pub fn is_muted(&self) -> AudioResult<bool> {
        self.with_control(|control| control.is_muted())
    }

    pub fn set_muted(&self, muted: bool) -> AudioResult<()> {
        self.with_control(|control| control.set_muted(muted))
    }

    pub fn state(&self) -> AudioResult<SessionState> {
        self.with_control(|control| control.state())
    }

    /// Idempotent; safe to call from inside one of this session's own callbacks.
    pub fn dispose(&self) {
        let Some(native) = self.lock_native().take() else {
            return;
        };

        if let Some(client) = &native.client {
            if let Err(e) = native.control.unregister_notifications(client) {
                warn!(
                    "Failed to unsubscribe session notifications for process {}: {}",
                    self.process_id, e
                );
            }
        }
        drop(native);
        self.bridge.clear();
        debug!("Released session for process {}", self.process_id);
    }
}

impl fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSession")
            .field("process_id", &self.process_id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.dispose();
    }
}
