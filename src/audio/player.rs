// Clip player: tracks which clip is playing and where each clip left off
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;

use super::media::{MediaOutput, MediaOutputFactory};
use super::scheduler::Scheduler;
use crate::clip::{Clip, ClipId};
use crate::error::PlaybackError;
use crate::live::{LiveValue, MappedObserver, Observer};
use crate::settings::PlaybackSettings;

/// What, if anything, the player is holding right now
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing(ClipId),
    Paused(ClipId),
}

impl PlaybackState {
    /// The tracked clip, whether audible or paused
    pub fn clip_id(&self) -> Option<&ClipId> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Playing(clip_id) | PlaybackState::Paused(clip_id) => Some(clip_id),
        }
    }

    pub fn is_playing(&self, clip_id: &ClipId) -> bool {
        matches!(self, PlaybackState::Playing(playing) if playing == clip_id)
    }
}

struct Ticker {
    scheduler: Box<dyn Scheduler>,
    active: bool,
}

struct ActiveOutput {
    id: u64,
    media: Box<dyn MediaOutput>,
    /// `start` calls made on `media` so far
    runs: u64,
}

impl ActiveOutput {
    fn start(&mut self) {
        self.media.start();
        self.runs += 1;
    }
}

// Lock order: output, then ticker, then positions. Every state change happens
// with the output lock held so that background callbacks see the two agree.
struct Inner {
    self_ref: Weak<Inner>,
    factory: Box<dyn MediaOutputFactory>,
    output: Mutex<Option<ActiveOutput>>,
    next_output_id: AtomicU64,
    ticker: Mutex<Ticker>,
    state: LiveValue<PlaybackState>,
    positions: Mutex<HashMap<ClipId, Arc<LiveValue<u32>>>>,
    update_interval: Duration,
}

/// Plays short clips one at a time and remembers the position of every clip
/// it has seen, so returning to a clip resumes where it left off.
///
/// While a clip is playing the output position is sampled periodically and
/// published through `position`. Dropping the player releases the output.
pub struct AudioClipPlayer {
    inner: Arc<Inner>,
}

impl AudioClipPlayer {
    pub fn new<F, S>(factory: F, scheduler: S, settings: &PlaybackSettings) -> Self
    where
        F: MediaOutputFactory + 'static,
        S: Scheduler + 'static,
    {
        let update_interval = settings.position_update_interval();
        let inner = Arc::new_cyclic(|self_ref| Inner {
            self_ref: self_ref.clone(),
            factory: Box::new(factory),
            output: Mutex::new(None),
            next_output_id: AtomicU64::new(0),
            ticker: Mutex::new(Ticker {
                scheduler: Box::new(scheduler),
                active: false,
            }),
            state: LiveValue::new(PlaybackState::Idle),
            positions: Mutex::new(HashMap::new()),
            update_interval,
        });

        Self { inner }
    }

    /// Play `clip` from its stored position.
    ///
    /// The clip's audio is only loaded if a different clip (or none) is tracked,
    /// so resuming a paused clip reuses the prepared resource. On a load failure
    /// the player is left idle.
    pub fn play(&self, clip: &Clip) -> Result<(), PlaybackError> {
        let inner = &self.inner;
        let mut slot = inner.output.lock();
        let already_loaded = inner.state.get().clip_id() == Some(&clip.clip_id);
        let position = inner.position_value(&clip.clip_id).get();
        let output = slot.get_or_insert_with(|| inner.create_output());

        if !already_loaded {
            if let Err(source) = output.media.load(&clip.uri) {
                warn!("Failed to load clip '{}' from {}: {}", clip.clip_id, clip.uri, source);
                inner.clear_clip();
                return Err(PlaybackError::LoadFailed {
                    clip_id: clip.clip_id.clone(),
                    uri: clip.uri.clone(),
                    source,
                });
            }
        }
        output.media.seek(position);
        output.start();

        debug!("Playing clip '{}' from {}ms", clip.clip_id, position);
        inner.state.set(PlaybackState::Playing(clip.clip_id.clone()));
        inner.schedule_position_updates();
        Ok(())
    }

    pub fn stop(&self) {
        let mut slot = self.inner.output.lock();
        if let Some(output) = slot.as_mut() {
            output.media.stop();
        }
        self.inner.clear_clip();
    }

    /// Pause the tracked clip. Its stored position stays at the last sampled value.
    pub fn pause(&self) {
        let mut slot = self.inner.output.lock();
        if let Some(output) = slot.as_mut() {
            output.media.pause();
        }

        self.inner.cancel_position_updates();
        self.inner.state.update(|state| {
            *state = match std::mem::take(state) {
                PlaybackState::Playing(clip_id) => PlaybackState::Paused(clip_id),
                other => other,
            };
        });
    }

    /// Live flag that is true only while `clip_id` is audibly playing
    pub fn is_playing(&self, clip_id: &ClipId) -> MappedObserver<PlaybackState, bool> {
        let clip_id = clip_id.clone();
        self.inner.state.map(move |state| state.is_playing(&clip_id))
    }

    /// Live stored position of `clip_id`, 0 until set or sampled
    pub fn position(&self, clip_id: &ClipId) -> Observer<u32> {
        self.inner.position_value(clip_id).subscribe()
    }

    /// Store a new position for `clip_id`, seeking the output if that clip is tracked
    pub fn set_position(&self, clip_id: &ClipId, position_ms: u32) {
        let mut slot = self.inner.output.lock();
        if self.inner.state.get().clip_id() == Some(clip_id) {
            if let Some(output) = slot.as_mut() {
                output.media.seek(position_ms);
            }
        }

        self.inner.position_value(clip_id).set(position_ms);
    }

    pub fn current_clip(&self) -> Option<ClipId> {
        self.inner.state.get().clip_id().cloned()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.inner.state.get()
    }

    pub fn state(&self) -> Observer<PlaybackState> {
        self.inner.state.subscribe()
    }

    /// Stop tracking the current clip and release the output entirely.
    /// A fresh output is created the next time a clip is played.
    pub fn background(&self) {
        let released = {
            let mut slot = self.inner.output.lock();
            self.inner.clear_clip();
            slot.take()
        };

        // Released outside the lock: an output may wait for its own
        // completion callback, which needs the lock.
        if let Some(mut output) = released {
            output.media.release();
            info!("Released media output");
        }
    }
}

impl Drop for AudioClipPlayer {
    fn drop(&mut self) {
        self.background();
    }
}

impl Inner {
    fn create_output(&self) -> ActiveOutput {
        let id = self.next_output_id.fetch_add(1, Ordering::Relaxed);
        let mut media = self.factory.create();
        let player = self.self_ref.clone();
        media.set_on_completion(Arc::new(move |run| {
            if let Some(player) = player.upgrade() {
                player.on_completion(id, run);
            }
        }));
        debug!("Created media output {}", id);
        ActiveOutput { id, media, runs: 0 }
    }

    fn on_completion(&self, output_id: u64, run: u64) {
        let slot = self.output.lock();
        let current = slot
            .as_ref()
            .is_some_and(|output| output.id == output_id && output.runs == run);
        if !current {
            debug!("Ignoring completion of an earlier playback");
            return;
        }

        debug!("Clip finished playing");
        self.clear_clip();
    }

    /// Callers hold the output lock
    fn clear_clip(&self) {
        self.cancel_position_updates();
        self.state.set(PlaybackState::Idle);
    }

    fn position_value(&self, clip_id: &ClipId) -> Arc<LiveValue<u32>> {
        let mut positions = self.positions.lock();
        let value = positions
            .entry(clip_id.clone())
            .or_insert_with(|| Arc::new(LiveValue::new(0)));
        Arc::clone(value)
    }

    fn schedule_position_updates(&self) {
        let mut ticker = self.ticker.lock();
        if ticker.active {
            return;
        }

        let player = self.self_ref.clone();
        ticker.scheduler.schedule(
            Arc::new(move || {
                if let Some(player) = player.upgrade() {
                    player.sample_position();
                }
            }),
            self.update_interval,
        );
        ticker.active = true;
    }

    fn cancel_position_updates(&self) {
        let mut ticker = self.ticker.lock();
        ticker.scheduler.cancel();
        ticker.active = false;
    }

    /// Copy the output position into the table entry of the playing clip
    fn sample_position(&self) {
        let slot = self.output.lock();
        let Some(output) = slot.as_ref() else {
            return;
        };
        let PlaybackState::Playing(clip_id) = self.state.get() else {
            return;
        };

        self.position_value(&clip_id).set(output.media.current_position());
    }
}
