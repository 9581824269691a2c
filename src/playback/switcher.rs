use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::format::WaveFormat;
use super::source::{SampleSource, SharedSampleSource};
use crate::config::ProviderConfig;
use crate::error::{AudioError, AudioResult};
use crate::events::EventChannel;

const COMPONENT: &str = "source switch provider";

/// Raised once per run of short reads from the installed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackEnded {
    pub requested: usize,
    pub produced: usize,
}

struct SwitchState {
    inner: Option<Box<dyn SampleSource>>,
    ended: bool,
    disposed: bool,
}

/// Pull source that forwards reads to a swappable inner source.
///
/// Sits on the render pipeline's pump thread. The guard is held only around
/// the forwarded read and around the reference swap; the outgoing source is
/// dropped after the guard is released.
pub struct SourceSwitchProvider {
    fallback_format: WaveFormat,
    pad_short_reads: bool,
    state: Mutex<SwitchState>,
    playback_ended: EventChannel<PlaybackEnded>,
}

impl SourceSwitchProvider {
    pub fn new(fallback_format: WaveFormat) -> Self {
        Self {
            fallback_format,
            pad_short_reads: true,
            state: Mutex::new(SwitchState {
                inner: None,
                ended: false,
                disposed: false,
            }),
            playback_ended: EventChannel::new(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.fallback_format()).with_short_read_padding(config.pad_short_reads)
    }

    /// When enabled (the default) a short read from the inner source is
    /// padded with silence up to the requested length.
    pub fn with_short_read_padding(mut self, pad: bool) -> Self {
        self.pad_short_reads = pad;
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, SwitchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn playback_ended(&self) -> &EventChannel<PlaybackEnded> {
        &self.playback_ended
    }

    pub fn fallback_format(&self) -> WaveFormat {
        self.fallback_format
    }

    pub fn has_source(&self) -> bool {
        self.lock_state().inner.is_some()
    }

    /// Swap the inner source. `None` switches to silence.
    pub fn change_provider(&self, source: Option<Box<dyn SampleSource>>) -> AudioResult<()> {
        let previous = {
            let mut state = self.lock_state();
            if state.disposed {
                drop(state);
                drop(source);
                return Err(AudioError::disposed(COMPONENT));
            }
            state.ended = false;
            std::mem::replace(&mut state.inner, source)
        };

        match &previous {
            Some(_) => debug!("Replaced inner sample source"),
            None => debug!("Installed inner sample source"),
        }
        drop(previous);
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.lock_state().disposed
    }

    /// Idempotent. Reads after disposal return 0.
    pub fn dispose(&self) {
        let previous = {
            let mut state = self.lock_state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.inner.take()
        };
        drop(previous);
        info!("Source switch provider disposed");
    }
}

impl SharedSampleSource for SourceSwitchProvider {
    fn read(&self, buffer: &mut [u8]) -> usize {
        let requested = buffer.len();

        let (produced, silence, newly_ended) = {
            let mut state = self.lock_state();
            if state.disposed {
                return 0;
            }
            if requested == 0 {
                return 0;
            }

            if state.inner.is_none() {
                drop(state);
                buffer.fill(self.fallback_format.silence_byte());
                return requested;
            }

            let (produced, silence) = match state.inner.as_mut() {
                Some(inner) => (
                    inner.read(buffer).min(requested),
                    inner.format().silence_byte(),
                ),
                None => (0, self.fallback_format.silence_byte()),
            };
            let short = produced < requested;
            let newly_ended = short && !state.ended;
            state.ended = short;
            (produced, silence, newly_ended)
        };

        if newly_ended {
            self.playback_ended.emit(&PlaybackEnded {
                requested,
                produced,
            });
        }

        if self.pad_short_reads && produced < requested {
            buffer[produced..].fill(silence);
            return requested;
        }
        produced
    }

    fn format(&self) -> WaveFormat {
        self.lock_state()
            .inner
            .as_ref()
            .map(|inner| inner.format())
            .unwrap_or(self.fallback_format)
    }
}

impl Drop for SourceSwitchProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}
