// Channel mapping and sample rate conversion between a clip and the device
use anyhow::Result;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

const CHUNK_FRAMES: usize = 1024;

/// Map interleaved samples from `from` channels to `to` channels.
/// Mono is duplicated, extra source channels are folded down.
pub fn map_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut mapped = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        if to == 1 {
            mapped.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            for channel in 0..to {
                mapped.push(frame[channel.min(from - 1)]);
            }
        }
    }
    mapped
}

/// Streams interleaved audio through a fixed-input rubato resampler
pub struct StreamResampler {
    inner: FastFixedIn<f32>,
    ratio: f64,
    channels: usize,
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32, channels: usize) -> Result<Self> {
        let ratio = f64::from(to_rate) / f64::from(from_rate);
        let inner = FastFixedIn::<f32>::new(
            ratio,
            1.0,
            PolynomialDegree::Linear,
            CHUNK_FRAMES,
            channels,
        )?;

        Ok(Self {
            inner,
            ratio,
            channels,
            pending: vec![Vec::with_capacity(CHUNK_FRAMES * 2); channels],
        })
    }

    /// Feed interleaved samples, returning whatever full chunks could be converted
    pub fn process(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        for frame in interleaved.chunks_exact(self.channels) {
            for (channel, sample) in frame.iter().enumerate() {
                self.pending[channel].push(*sample);
            }
        }

        let mut output = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }

            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();
            let resampled = self.inner.process(&chunk, None)?;
            let frames = resampled.first().map_or(0, Vec::len);
            Self::interleave_into(&mut output, &resampled, frames);
        }
        Ok(output)
    }

    /// Convert whatever is still buffered, padding the final chunk with silence
    /// and trimming the padding back off the result
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let buffered = self.pending.first().map_or(0, Vec::len);
        if buffered == 0 {
            return Ok(Vec::new());
        }

        let resampled = self.inner.process_partial(Some(self.pending.as_slice()), None)?;
        for channel in &mut self.pending {
            channel.clear();
        }

        let expected = (buffered as f64 * self.ratio).ceil() as usize;
        let frames = resampled.first().map_or(0, Vec::len).min(expected);
        let mut output = Vec::new();
        Self::interleave_into(&mut output, &resampled, frames);
        Ok(output)
    }

    fn interleave_into(output: &mut Vec<f32>, channels: &[Vec<f32>], frames: usize) {
        output.reserve(frames * channels.len());
        for frame in 0..frames {
            for channel in channels {
                output.push(channel[frame]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_is_duplicated_to_stereo() {
        assert_eq!(map_channels(&[0.1, 0.2], 1, 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_stereo_folds_to_mono() {
        assert_eq!(map_channels(&[0.25, 0.75, -1.0, 1.0], 2, 1), vec![0.5, 0.0]);
    }

    #[test]
    fn test_same_layout_is_untouched() {
        let samples = [0.5, -0.5, 0.25, -0.25];
        assert_eq!(map_channels(&samples, 2, 2), samples.to_vec());
    }

    #[test]
    fn test_resampler_roughly_doubles_frames() {
        let mut resampler = StreamResampler::new(22050, 44100, 1).unwrap();
        let input = vec![0.0f32; CHUNK_FRAMES * 4];

        let output = resampler.process(&input).unwrap();

        let expected = CHUNK_FRAMES * 8;
        assert!(output.len() + CHUNK_FRAMES * 2 >= expected);
        assert!(output.len() <= expected + CHUNK_FRAMES);
    }

    #[test]
    fn test_resampler_buffers_partial_chunks() {
        let mut resampler = StreamResampler::new(48000, 44100, 2).unwrap();
        let output = resampler.process(&[0.0; 64]).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_flush_converts_the_partial_tail() {
        let mut resampler = StreamResampler::new(22050, 44100, 2).unwrap();
        assert!(resampler.process(&[0.25; 200]).unwrap().is_empty());

        let tail = resampler.flush().unwrap();

        assert_eq!(tail.len(), 400);
        assert!(resampler.flush().unwrap().is_empty());
    }
}
