use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::source::SharedSampleSource;
use super::types::{PipelineRequest, PlaybackState, PlaybackStopped, ShareMode};
use crate::audio::{AudioDevice, DeviceSelector, SelectionChanged};
use crate::config::RendererConfig;
use crate::error::{AudioError, AudioResult};
use crate::events::{EventChannel, SubscriptionId};
use crate::system::{PipelineFactory, RenderPipeline};

const COMPONENT: &str = "renderer";

struct RendererState {
    device: Option<AudioDevice>,
    share_mode: ShareMode,
    event_sync: bool,
    latency: Duration,
    source: Option<Arc<dyn SharedSampleSource>>,
    pipeline: Option<Box<dyn RenderPipeline>>,
    /// Last observed logical intent; only Playing or Paused.
    intent: PlaybackState,
    generation: u64,
    disposed: bool,
}

struct SelectorLink {
    channel: EventChannel<SelectionChanged>,
    subscription: SubscriptionId,
}

/// Owns at most one native render pipeline bound to a device, an output
/// configuration and a source.
///
/// Any configuration change tears the pipeline down and builds a new one in
/// place, carrying the play/pause intent across. Construction failures are
/// logged and leave the renderer without a pipeline until the next change or
/// an explicit [`reload`](Self::reload).
pub struct ReconfigurableRenderer {
    factory: Arc<dyn PipelineFactory>,
    state: Mutex<RendererState>,
    stopped: EventChannel<PlaybackStopped>,
    selector_link: Mutex<Option<SelectorLink>>,
}

impl ReconfigurableRenderer {
    pub fn new(factory: Arc<dyn PipelineFactory>, config: &RendererConfig) -> Arc<Self> {
        info!(
            "Creating renderer ({} mode, event sync: {}, latency: {} ms)",
            config.share_mode, config.event_sync, config.latency_ms
        );

        Arc::new(Self {
            factory,
            state: Mutex::new(RendererState {
                device: None,
                share_mode: config.share_mode,
                event_sync: config.event_sync,
                latency: config.latency(),
                source: None,
                pipeline: None,
                intent: PlaybackState::Paused,
                generation: 0,
                disposed: false,
            }),
            stopped: EventChannel::new(),
            selector_link: Mutex::new(None),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, RendererState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_state(&self) -> AudioResult<MutexGuard<'_, RendererState>> {
        let state = self.lock_state();
        if state.disposed {
            return Err(AudioError::disposed(COMPONENT));
        }
        Ok(state)
    }

    /// The pipeline's own "stopped" notifications.
    pub fn stopped(&self) -> &EventChannel<PlaybackStopped> {
        &self.stopped
    }

    fn reconfigure(&self, change: impl FnOnce(&mut RendererState)) -> AudioResult<()> {
        let mut state = self.live_state()?;
        change(&mut state);
        drop(state);
        self.rebuild()
    }

    pub fn set_source(&self, source: Option<Arc<dyn SharedSampleSource>>) -> AudioResult<()> {
        self.reconfigure(|state| state.source = source)
    }

    pub fn set_device(&self, device: Option<AudioDevice>) -> AudioResult<()> {
        if let Some(device) = &device {
            debug!("Renderer device set to {}", device);
        }
        self.reconfigure(|state| state.device = device)
    }

    pub fn set_share_mode(&self, share_mode: ShareMode) -> AudioResult<()> {
        self.reconfigure(|state| state.share_mode = share_mode)
    }

    pub fn set_event_sync(&self, event_sync: bool) -> AudioResult<()> {
        self.reconfigure(|state| state.event_sync = event_sync)
    }

    pub fn set_latency(&self, latency: Duration) -> AudioResult<()> {
        self.reconfigure(|state| state.latency = latency)
    }

    /// Rebuild with the current configuration, e.g. after a failed build.
    pub fn reload(&self) -> AudioResult<()> {
        self.rebuild()
    }

    fn rebuild(&self) -> AudioResult<()> {
        let (previous, plan, intent, generation) = {
            let mut guard = self.live_state()?;
            let state = &mut *guard;
            state.generation += 1;

            if let Some(pipeline) = &state.pipeline {
                state.intent = match pipeline.playback_state() {
                    PlaybackState::Playing => PlaybackState::Playing,
                    _ => PlaybackState::Paused,
                };
            }

            let plan = match (&state.device, &state.source) {
                (Some(device), Some(source)) if device.is_active() => Some((
                    PipelineRequest {
                        device_id: device.id.clone(),
                        share_mode: state.share_mode,
                        event_sync: state.event_sync,
                        latency: state.latency,
                    },
                    Arc::clone(source),
                )),
                _ => None,
            };

            (state.pipeline.take(), plan, state.intent, state.generation)
        };
        drop(previous);

        let pipeline = match plan {
            Some((request, source)) => self.build(&request, source, intent),
            None => {
                debug!("Renderer has no active device or no source, pipeline released");
                None
            }
        };

        let discarded = {
            let mut state = self.lock_state();
            if state.disposed || state.generation != generation {
                pipeline
            } else {
                if pipeline.is_none() {
                    state.intent = PlaybackState::Paused;
                }
                state.pipeline = pipeline;
                None
            }
        };
        if discarded.is_some() {
            debug!("Discarding pipeline superseded by a newer rebuild");
        }
        drop(discarded);
        Ok(())
    }

    fn build(
        &self,
        request: &PipelineRequest,
        source: Arc<dyn SharedSampleSource>,
        intent: PlaybackState,
    ) -> Option<Box<dyn RenderPipeline>> {
        let mut pipeline = match self.factory.create(request) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!("Failed to create render pipeline on {}: {}", request.device_id, e);
                return None;
            }
        };

        let stopped = self.stopped.clone();
        pipeline.set_stopped_handler(Box::new(move |event| stopped.emit(event)));

        if let Err(e) = pipeline.initialize(source) {
            error!(
                "Failed to initialize render pipeline on {}: {}",
                request.device_id, e
            );
            return None;
        }

        if intent == PlaybackState::Playing {
            if let Err(e) = pipeline.play() {
                warn!("Failed to resume playback after rebuild: {}", e);
            }
        }

        info!(
            "Render pipeline ready on {} ({}, event sync: {}, latency: {:?}, {})",
            request.device_id, request.share_mode, request.event_sync, request.latency, intent
        );
        Some(pipeline)
    }

    pub fn play(&self) -> AudioResult<()> {
        let mut state = self.live_state()?;
        let result = match state.pipeline.as_mut() {
            Some(pipeline) => pipeline.play(),
            None => return Ok(()),
        };
        match result {
            Ok(()) => state.intent = PlaybackState::Playing,
            Err(e) => warn!("Failed to start playback: {}", e),
        }
        Ok(())
    }

    pub fn pause(&self) -> AudioResult<()> {
        let mut state = self.live_state()?;
        let result = match state.pipeline.as_mut() {
            Some(pipeline) => pipeline.pause(),
            None => return Ok(()),
        };
        match result {
            Ok(()) => state.intent = PlaybackState::Paused,
            Err(e) => warn!("Failed to pause playback: {}", e),
        }
        Ok(())
    }

    /// Stop playback and release the pipeline. Unlike [`pause`](Self::pause)
    /// the pipeline is not kept.
    pub fn stop(&self) -> AudioResult<()> {
        let pipeline = {
            let mut state = self.live_state()?;
            state.intent = PlaybackState::Paused;
            state.pipeline.take()
        };

        if let Some(mut pipeline) = pipeline {
            if let Err(e) = pipeline.stop() {
                warn!("Failed to stop playback: {}", e);
            }
            drop(pipeline);
            debug!("Render pipeline stopped and released");
        }
        Ok(())
    }

    /// Bytes rendered by the current pipeline, 0 without one.
    pub fn position(&self) -> AudioResult<u64> {
        Ok(self
            .live_state()?
            .pipeline
            .as_ref()
            .map_or(0, |pipeline| pipeline.position()))
    }

    pub fn volume(&self) -> AudioResult<f32> {
        let state = self.live_state()?;
        let Some(pipeline) = state.pipeline.as_ref() else {
            return Ok(0.0);
        };
        Ok(pipeline.volume().unwrap_or_else(|e| {
            warn!("Failed to read pipeline volume: {}", e);
            0.0
        }))
    }

    pub fn set_volume(&self, level: f32) -> AudioResult<()> {
        let mut state = self.live_state()?;
        if let Some(pipeline) = state.pipeline.as_mut() {
            let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
            if let Err(e) = pipeline.set_volume(level) {
                warn!("Failed to set pipeline volume: {}", e);
            }
        }
        Ok(())
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.lock_state()
            .pipeline
            .as_ref()
            .map_or(PlaybackState::Stopped, |pipeline| pipeline.playback_state())
    }

    pub fn has_pipeline(&self) -> bool {
        self.lock_state().pipeline.is_some()
    }

    pub fn device(&self) -> Option<AudioDevice> {
        self.lock_state().device.clone()
    }

    pub fn share_mode(&self) -> ShareMode {
        self.lock_state().share_mode
    }

    pub fn event_sync(&self) -> bool {
        self.lock_state().event_sync
    }

    pub fn latency(&self) -> Duration {
        self.lock_state().latency
    }

    /// Drive the renderer's device from a selector: adopt its current
    /// selection now and every later change.
    pub fn follow_selector(self: &Arc<Self>, selector: &DeviceSelector) -> AudioResult<()> {
        self.unfollow_selector();

        let weak = Arc::downgrade(self);
        let channel = selector.selection_changed().clone();
        let subscription = channel.subscribe(move |change| {
            if let Some(renderer) = weak.upgrade() {
                if let Err(e) = renderer.set_device(change.current.clone()) {
                    debug!("Selection change not applied: {}", e);
                }
            }
        });
        *self
            .selector_link
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(SelectorLink {
            channel,
            subscription,
        });

        self.set_device(selector.selected())
    }

    pub fn unfollow_selector(&self) {
        let link = self
            .selector_link
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(link) = link {
            link.channel.unsubscribe(link.subscription);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.lock_state().disposed
    }

    /// Release the pipeline and the source. Idempotent.
    pub fn dispose(&self) {
        let (pipeline, source) = {
            let mut state = self.lock_state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (state.pipeline.take(), state.source.take())
        };
        self.unfollow_selector();
        drop(pipeline);
        drop(source);
        info!("Renderer disposed");
    }
}

impl Drop for ReconfigurableRenderer {
    fn drop(&mut self) {
        self.dispose();
    }
}
