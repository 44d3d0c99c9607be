// Media output backed by the default audio device
//
// A feeder thread owns the cpal stream (streams cannot move between threads)
// and pushes decoded, channel-mapped and resampled audio into its queue.
// Everything else talks to the feeder through `Shared`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use super::decoder::AudioDecoder;
use super::media::{CompletionCallback, LoadError, MediaOutput, MediaOutputFactory};
use super::output::{AudioOutput, OutputControls};
use super::resample::{map_channels, StreamResampler};

const IDLE_WAIT: Duration = Duration::from_millis(20);
const FULL_WAIT: Duration = Duration::from_millis(5);
const DRAIN_LIMIT: Duration = Duration::from_secs(2);

/// Creates a `DeviceOutput` per request, all at the configured volume
pub struct DeviceOutputFactory {
    volume: f32,
}

impl DeviceOutputFactory {
    pub fn new(volume: f32) -> Self {
        Self { volume }
    }
}

impl MediaOutputFactory for DeviceOutputFactory {
    fn create(&self) -> Box<dyn MediaOutput> {
        Box::new(DeviceOutput::new(self.volume))
    }
}

struct Shared {
    decoder: Mutex<Option<AudioDecoder>>,
    playing: AtomicBool,
    shutdown: AtomicBool,
    /// Bumped on every load, seek and stop so the feeder drops stale audio
    generation: AtomicU64,
    /// `start` calls so far, reported with completions
    runs: AtomicU64,
    base_position_ms: AtomicU32,
    on_completion: Mutex<Option<CompletionCallback>>,
}

pub struct DeviceOutput {
    shared: Arc<Shared>,
    volume: f32,
    controls: Option<Arc<OutputControls>>,
    feeder: Option<JoinHandle<()>>,
}

impl DeviceOutput {
    /// The device itself is only opened by the first `load`
    pub fn new(volume: f32) -> Self {
        Self {
            shared: Arc::new(Shared {
                decoder: Mutex::new(None),
                playing: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                runs: AtomicU64::new(0),
                base_position_ms: AtomicU32::new(0),
                on_completion: Mutex::new(None),
            }),
            volume,
            controls: None,
            feeder: None,
        }
    }

    fn path_from_uri(uri: &str) -> &Path {
        Path::new(uri.strip_prefix("file://").unwrap_or(uri))
    }

    fn ensure_feeder(&mut self) -> Result<Arc<OutputControls>, LoadError> {
        if let Some(controls) = &self.controls {
            return Ok(Arc::clone(controls));
        }

        self.shared.shutdown.store(false, Ordering::SeqCst);
        let (ready_tx, ready_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let volume = self.volume;
        let feeder = thread::Builder::new()
            .name("clip-feeder".into())
            .spawn(move || {
                let output = match AudioOutput::new(volume) {
                    Ok(output) => {
                        let _ = ready_tx.send(Ok(output.controls()));
                        output
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                Feeder::new(shared, output).run();
            })?;

        let controls = match ready_rx.recv() {
            Ok(Ok(controls)) => controls,
            Ok(Err(e)) => {
                let _ = feeder.join();
                return Err(LoadError::Device(format!("{:#}", e)));
            }
            Err(_) => {
                let _ = feeder.join();
                return Err(LoadError::Device("output thread exited".to_string()));
            }
        };

        info!(
            "Opened audio output at {}Hz, {} channels",
            controls.sample_rate(),
            controls.channels()
        );
        self.controls = Some(Arc::clone(&controls));
        self.feeder = Some(feeder);
        Ok(controls)
    }

    fn wake_feeder(&self) {
        if let Some(feeder) = &self.feeder {
            feeder.thread().unpark();
        }
    }

    fn halt(&self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        if let Some(controls) = &self.controls {
            controls.set_paused(true);
            controls.clear();
        }
    }
}

impl MediaOutput for DeviceOutput {
    fn load(&mut self, uri: &str) -> Result<(), LoadError> {
        self.halt();
        {
            let mut decoder = self.shared.decoder.lock();
            *decoder = None;
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
        }

        let decoder = AudioDecoder::open(Self::path_from_uri(uri))?;
        self.ensure_feeder()?;

        debug!(
            "Loaded {} ({}Hz, {} channels)",
            uri,
            decoder.sample_rate(),
            decoder.channels()
        );
        let mut slot = self.shared.decoder.lock();
        *slot = Some(decoder);
        self.shared.base_position_ms.store(0, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn seek(&mut self, position_ms: u32) {
        let mut slot = self.shared.decoder.lock();
        let Some(decoder) = slot.as_mut() else {
            return;
        };

        match decoder.seek(position_ms) {
            Ok(reached) => {
                self.shared.base_position_ms.store(reached, Ordering::SeqCst);
                if let Some(controls) = &self.controls {
                    controls.clear();
                }
                self.shared.generation.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => warn!("Seek to {}ms failed: {:#}", position_ms, e),
        }
    }

    fn start(&mut self) {
        let slot = self.shared.decoder.lock();
        self.shared.runs.fetch_add(1, Ordering::SeqCst);
        if slot.is_none() {
            return;
        }
        if let Some(controls) = &self.controls {
            controls.set_paused(false);
        }
        self.shared.playing.store(true, Ordering::SeqCst);
        drop(slot);
        self.wake_feeder();
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        if let Some(controls) = &self.controls {
            controls.set_paused(true);
        }
    }

    fn stop(&mut self) {
        self.halt();
        let mut decoder = self.shared.decoder.lock();
        *decoder = None;
        self.shared.base_position_ms.store(0, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn current_position(&self) -> u32 {
        let base = u64::from(self.shared.base_position_ms.load(Ordering::SeqCst));
        let played = self.controls.as_ref().map_or(0, |controls| controls.played_ms());
        u32::try_from(base + played).unwrap_or(u32::MAX)
    }

    fn release(&mut self) {
        self.halt();
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.wake_feeder();
        if let Some(feeder) = self.feeder.take() {
            if feeder.join().is_err() {
                error!("Clip feeder thread panicked");
            }
        }
        self.controls = None;
        *self.shared.decoder.lock() = None;
    }

    fn set_on_completion(&mut self, callback: CompletionCallback) {
        *self.shared.on_completion.lock() = Some(callback);
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        self.release();
    }
}

struct Feeder {
    shared: Arc<Shared>,
    output: AudioOutput,
    controls: Arc<OutputControls>,
    pending: Vec<f32>,
    resampler: Option<StreamResampler>,
    /// The decoder ran dry and the resampler tail has been handed out
    at_end: bool,
    generation: u64,
}

impl Feeder {
    fn new(shared: Arc<Shared>, output: AudioOutput) -> Self {
        let controls = output.controls();
        let generation = shared.generation.load(Ordering::SeqCst);
        Self {
            shared,
            output,
            controls,
            pending: Vec::new(),
            resampler: None,
            at_end: false,
            generation,
        }
    }

    fn run(mut self) {
        while !self.shared.shutdown.load(Ordering::SeqCst) {
            let generation = self.shared.generation.load(Ordering::SeqCst);
            if generation != self.generation {
                self.pending.clear();
                self.resampler = None;
                self.at_end = false;
                self.generation = generation;
            }

            if !self.shared.playing.load(Ordering::SeqCst) {
                thread::park_timeout(IDLE_WAIT);
                continue;
            }

            if !self.pending.is_empty() {
                let written = self.output.write(&self.pending);
                self.pending.drain(..written);
                if written == 0 {
                    thread::sleep(FULL_WAIT);
                }
                continue;
            }

            match self.next_samples(generation) {
                Ok(Some(samples)) => self.pending = samples,
                Ok(None) => self.finish(generation),
                Err(e) => {
                    error!("Clip playback failed: {:#}", e);
                    self.finish(generation);
                }
            }
        }
        debug!("Clip feeder stopped");
    }

    /// Next block of device-ready samples. `None` at end of stream.
    fn next_samples(&mut self, generation: u64) -> Result<Option<Vec<f32>>> {
        let mut slot = self.shared.decoder.lock();
        if self.shared.generation.load(Ordering::SeqCst) != generation {
            return Ok(Some(Vec::new()));
        }
        let Some(decoder) = slot.as_mut() else {
            self.shared.playing.store(false, Ordering::SeqCst);
            return Ok(Some(Vec::new()));
        };
        if self.at_end {
            return Ok(None);
        }
        let Some(samples) = decoder.decode_next()? else {
            drop(slot);
            self.at_end = true;
            return match self.resampler.as_mut() {
                Some(resampler) => {
                    let tail = resampler.flush()?;
                    Ok((!tail.is_empty()).then_some(tail))
                }
                None => Ok(None),
            };
        };

        let device_channels = usize::from(self.controls.channels());
        let device_rate = self.controls.sample_rate();
        let source_rate = decoder.sample_rate();
        let mapped = map_channels(&samples, decoder.channels(), device_channels);
        drop(slot);

        if source_rate == device_rate {
            return Ok(Some(mapped));
        }

        let mut resampler = match self.resampler.take() {
            Some(resampler) => resampler,
            None => StreamResampler::new(source_rate, device_rate, device_channels)?,
        };
        let resampled = resampler.process(&mapped);
        self.resampler = Some(resampler);
        resampled.map(Some)
    }

    /// Let queued audio play out, then report completion unless something
    /// (pause, seek, stop, load) intervened
    fn finish(&mut self, generation: u64) {
        let shared = Arc::clone(&self.shared);
        let interrupted = || {
            shared.shutdown.load(Ordering::SeqCst)
                || !shared.playing.load(Ordering::SeqCst)
                || shared.generation.load(Ordering::SeqCst) != generation
        };

        let started = Instant::now();
        while self.output.queued() > 0 && started.elapsed() < DRAIN_LIMIT {
            if interrupted() {
                return;
            }
            thread::sleep(FULL_WAIT);
        }

        // Checked under the decoder lock so a concurrent `start` either
        // interrupts this completion or comes after it with a new run
        let run = {
            let _slot = self.shared.decoder.lock();
            if interrupted() {
                return;
            }
            self.shared.playing.store(false, Ordering::SeqCst);
            self.controls.set_paused(true);
            self.shared.runs.load(Ordering::SeqCst)
        };

        let callback = self.shared.on_completion.lock().clone();
        if let Some(callback) = callback {
            debug!("Clip reached its end");
            callback(run);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_uris_map_to_paths() {
        assert_eq!(
            DeviceOutput::path_from_uri("file:///data/clips/a.mp3"),
            Path::new("/data/clips/a.mp3")
        );
        assert_eq!(
            DeviceOutput::path_from_uri("clips/a.mp3"),
            Path::new("clips/a.mp3")
        );
    }

    #[test]
    fn test_missing_file_fails_before_opening_device() {
        let mut output = DeviceOutput::new(1.0);
        let uri = std::env::temp_dir().join("audioclips-device-missing.wav");

        let result = output.load(&uri.to_string_lossy());

        assert!(matches!(result, Err(LoadError::Io(_))));
        assert!(output.feeder.is_none());
    }

    #[test]
    fn test_unloaded_output_is_inert() {
        let mut output = DeviceOutput::new(0.5);
        output.start();
        output.seek(1000);
        output.pause();
        output.stop();

        assert_eq!(output.current_position(), 0);
        assert!(!output.shared.playing.load(Ordering::SeqCst));
        output.release();
    }

    #[test]
    fn test_every_start_counts_as_a_run() {
        let mut output = DeviceOutput::new(1.0);
        output.start();
        output.start();

        assert_eq!(output.shared.runs.load(Ordering::SeqCst), 2);
        assert!(!output.shared.playing.load(Ordering::SeqCst));
    }
}
