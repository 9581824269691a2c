use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

use super::audio_session::AudioSession;
use crate::audio::{DataFlow, DeviceRole};
use crate::error::{AudioError, AudioResult};
use crate::events::EventChannel;
use crate::system::AudioSystemInterface;

const COMPONENT: &str = "session registry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRegistryChange {
    Added(u32),
    Removed(u32),
}

struct SessionTable {
    device_id: Option<String>,
    /// Bumped by every clear; a reload only installs its batch if no newer
    /// clear happened while it was enumerating.
    generation: u64,
    sessions: BTreeMap<u32, Arc<AudioSession>>,
    disposed: bool,
}

/// Sessions active on one device, keyed by owning process ID.
///
/// Each session removes itself from the registry as soon as it reports
/// disconnection.
pub struct SessionRegistry {
    audio_system: Arc<dyn AudioSystemInterface>,
    weak_self: Weak<SessionRegistry>,
    table: Mutex<SessionTable>,
    changes: EventChannel<SessionRegistryChange>,
}

impl SessionRegistry {
    pub fn new(audio_system: Arc<dyn AudioSystemInterface>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            audio_system,
            weak_self: weak_self.clone(),
            table: Mutex::new(SessionTable {
                device_id: None,
                generation: 0,
                sessions: BTreeMap::new(),
                disposed: false,
            }),
            changes: EventChannel::new(),
        })
    }

    fn lock_table(&self) -> MutexGuard<'_, SessionTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_table(&self) -> AudioResult<MutexGuard<'_, SessionTable>> {
        let table = self.lock_table();
        if table.disposed {
            return Err(AudioError::disposed(COMPONENT));
        }
        Ok(table)
    }

    pub fn changes(&self) -> &EventChannel<SessionRegistryChange> {
        &self.changes
    }

    /// Device whose sessions were enumerated by the last reload.
    pub fn device_id(&self) -> Option<String> {
        self.lock_table().device_id.clone()
    }

    /// Replace the tracked set with the sessions of `device_id`, or of the
    /// default render endpoint (falling back to the default capture
    /// endpoint) when no device is given. Returns the number tracked.
    pub fn reload(&self, device_id: Option<&str>) -> AudioResult<usize> {
        let generation = self.clear_all()?;

        let Some(target) = self.resolve_device(device_id) else {
            info!("No audio device available, session registry left empty");
            return Ok(0);
        };

        let controls = match self.audio_system.enumerate_sessions(&target) {
            Ok(controls) => controls,
            Err(e) => {
                warn!("Failed to enumerate sessions on {}: {}", target, e);
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let mut attached = Vec::new();
        for control in controls {
            let process_id = control.process_id();
            if !seen.insert(process_id) {
                debug!("Discarding duplicate session for process {}", process_id);
                drop(control);
                continue;
            }
            let session = AudioSession::attach(control);
            self.watch_disconnect(&session);
            attached.push(session);
        }

        let mut added = Vec::new();
        let mut orphaned = Vec::new();
        {
            let mut table = self.lock_table();
            if table.disposed || table.generation != generation {
                debug!("Session reload of {} superseded, discarding its batch", target);
                orphaned = attached;
            } else {
                table.device_id = Some(target.clone());
                for session in attached {
                    if session.is_disposed() || table.sessions.contains_key(&session.process_id()) {
                        orphaned.push(session);
                        continue;
                    }
                    added.push(session.process_id());
                    table.sessions.insert(session.process_id(), session);
                }
            }
        }
        for session in orphaned {
            session.dispose();
        }

        info!("Tracking {} sessions on {}", added.len(), target);
        for process_id in &added {
            self.changes.emit(&SessionRegistryChange::Added(*process_id));
        }
        Ok(added.len())
    }

    fn resolve_device(&self, device_id: Option<&str>) -> Option<String> {
        if let Some(id) = device_id {
            return Some(id.to_string());
        }

        for flow in DataFlow::all() {
            match self
                .audio_system
                .get_default_endpoint_id(flow, DeviceRole::Multimedia)
            {
                Ok(Some(id)) => return Some(id),
                Ok(None) => debug!("No default {} endpoint", flow),
                Err(e) => warn!("Failed to resolve default {} endpoint: {}", flow, e),
            }
        }
        None
    }

    fn watch_disconnect(&self, session: &Arc<AudioSession>) {
        let registry = self.weak_self.clone();
        let tracked = Arc::downgrade(session);
        let process_id = session.process_id();

        session.events().disconnected.subscribe(move |_| {
            if let Some(registry) = registry.upgrade() {
                registry.remove_session(process_id, &tracked);
            }
        });
    }

    fn remove_session(&self, process_id: u32, tracked: &Weak<AudioSession>) {
        let removed = {
            let mut table = self.lock_table();
            let same = table
                .sessions
                .get(&process_id)
                .is_some_and(|current| Weak::ptr_eq(&Arc::downgrade(current), tracked));
            if !same {
                return;
            }
            table.sessions.remove(&process_id)
        };

        if let Some(session) = removed {
            session.dispose();
            info!("Session for process {} disconnected", process_id);
            self.changes.emit(&SessionRegistryChange::Removed(process_id));
        }
    }

    pub fn try_get(&self, process_id: u32) -> AudioResult<Option<Arc<AudioSession>>> {
        Ok(self.live_table()?.sessions.get(&process_id).cloned())
    }

    pub fn try_get_session_for_current_process(&self) -> AudioResult<Option<Arc<AudioSession>>> {
        self.try_get(std::process::id())
    }

    pub fn list(&self) -> AudioResult<Vec<Arc<AudioSession>>> {
        Ok(self.live_table()?.sessions.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.lock_table().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every tracked session.
    pub fn clear(&self) -> AudioResult<()> {
        self.clear_all().map(|_| ())
    }

    fn clear_all(&self) -> AudioResult<u64> {
        let (generation, released) = {
            let mut table = self.live_table()?;
            table.device_id = None;
            table.generation += 1;
            (table.generation, std::mem::take(&mut table.sessions))
        };
        self.release(released, true);
        Ok(generation)
    }

    fn release(&self, sessions: BTreeMap<u32, Arc<AudioSession>>, notify: bool) {
        for (process_id, session) in sessions {
            session.dispose();
            if notify {
                self.changes.emit(&SessionRegistryChange::Removed(process_id));
            }
        }
    }

    /// Idempotent.
    pub fn dispose(&self) {
        let released = {
            let mut table = self.lock_table();
            if table.disposed {
                return;
            }
            table.disposed = true;
            table.device_id = None;
            std::mem::take(&mut table.sessions)
        };
        debug!("Session registry disposed, releasing {} sessions", released.len());
        self.release(released, false);
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.dispose();
    }
}
