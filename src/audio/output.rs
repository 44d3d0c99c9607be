// Audio output using cpal
// Handles cross-platform audio output with a ring buffer

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use log::error;
use ringbuf::{HeapRb, traits::{Consumer, Observer, Producer, Split}};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

const RING_BUFFER_SIZE: usize = 48000 * 2 / 4; // ~250ms of stereo audio at 48kHz

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// State shared between the owner of the stream and the device callback
pub struct OutputControls {
    volume: f32,
    clear_flag: AtomicBool,
    paused: AtomicBool,
    consumed_samples: AtomicU64,
    sample_rate: u32,
    channels: u16,
}

impl OutputControls {
    fn new(sample_rate: u32, channels: u16, volume: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            clear_flag: AtomicBool::new(false),
            paused: AtomicBool::new(true),
            consumed_samples: AtomicU64::new(0),
            sample_rate,
            channels,
        }
    }

    /// Drop whatever is queued and restart the played-frames count
    pub fn clear(&self) {
        self.clear_flag.store(true, Ordering::SeqCst);
        self.consumed_samples.store(0, Ordering::SeqCst);
    }

    /// A paused stream outputs silence and keeps queued samples for later
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Frames the device has played since the last `clear`
    pub fn played_frames(&self) -> u64 {
        self.consumed_samples.load(Ordering::SeqCst) / u64::from(self.channels.max(1))
    }

    pub fn played_ms(&self) -> u64 {
        self.played_frames() * 1000 / u64::from(self.sample_rate.max(1))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// The open device stream plus the producing side of its sample queue.
/// The stream is not `Send`, so this lives on the thread that created it.
pub struct AudioOutput {
    _stream: Stream,
    producer: RingProducer,
    controls: Arc<OutputControls>,
}

impl AudioOutput {
    /// Create a new audio output with default device
    pub fn new(volume: f32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no output device available"))?;

        let config = device
            .default_output_config()
            .context("failed to get default output config")?;

        let controls = Arc::new(OutputControls::new(
            config.sample_rate().0,
            config.channels(),
            volume,
        ));

        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), consumer, controls.clone())?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), consumer, controls.clone())?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), consumer, controls.clone())?
            }
            format => return Err(anyhow!("unsupported sample format: {:?}", format)),
        };

        stream.play().context("failed to start stream")?;

        Ok(Self {
            _stream: stream,
            producer,
            controls,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut consumer: RingConsumer,
        controls: Arc<OutputControls>,
    ) -> Result<Stream> {
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if controls.clear_flag.swap(false, Ordering::SeqCst) {
                        while consumer.try_pop().is_some() {}
                    }

                    if controls.paused.load(Ordering::SeqCst) {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0f32);
                        }
                        return;
                    }

                    let vol = controls.volume;
                    let mut consumed = 0u64;
                    for sample in data.iter_mut() {
                        let value = match consumer.try_pop() {
                            Some(value) => {
                                consumed += 1;
                                value * vol
                            }
                            None => 0.0f32,
                        };
                        *sample = T::from_sample(value);
                    }
                    controls.consumed_samples.fetch_add(consumed, Ordering::SeqCst);
                },
                move |err| {
                    error!("Audio output error: {}", err);
                },
                None,
            )
            .context("failed to build output stream")?;

        Ok(stream)
    }

    pub fn controls(&self) -> Arc<OutputControls> {
        Arc::clone(&self.controls)
    }

    /// Write samples to the output buffer
    /// Returns the number of samples actually written
    pub fn write(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Samples still waiting to be played
    pub fn queued(&self) -> usize {
        self.producer.occupied_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_is_clamped() {
        assert_eq!(OutputControls::new(48000, 2, 1.5).volume, 1.0);
        assert_eq!(OutputControls::new(48000, 2, -0.2).volume, 0.0);
    }

    #[test]
    fn test_played_time_counts_frames_until_cleared() {
        let controls = OutputControls::new(48000, 2, 1.0);
        controls.consumed_samples.store(48000 * 2 + 960, Ordering::SeqCst);

        assert_eq!(controls.played_frames(), 48480);
        assert_eq!(controls.played_ms(), 1010);

        controls.clear();
        assert_eq!(controls.played_ms(), 0);
    }
}
