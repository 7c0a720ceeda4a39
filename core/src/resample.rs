//! Audio resampling utilities for converting between the caller's sample
//! rate and a profile's native rate. Uses linear interpolation.

use serde::{Deserialize, Serialize};

/// Resample a complete buffer from `from_rate` to `to_rate`.
///
/// # Example
/// ```
/// use sonicwire_core::resample::resample_audio;
///
/// let audio_48k = vec![0.0f32; 4800];
/// let audio_44k = resample_audio(&audio_48k, 48000, 44100);
/// assert_eq!(audio_44k.len(), 4410);
/// ```
pub fn resample_audio(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let new_length = (samples.len() as f64 / step).round() as usize;
    let mut resampled = Vec::with_capacity(new_length);

    for i in 0..new_length {
        let src = i as f64 * step;
        let floor = src.floor() as usize;
        let fraction = (src - floor as f64) as f32;

        let interpolated = if floor + 1 < samples.len() {
            samples[floor] * (1.0 - fraction) + samples[floor + 1] * fraction
        } else {
            samples[samples.len() - 1]
        };
        resampled.push(interpolated);
    }

    resampled
}

/// Linear-interpolation resampler that keeps its phase across chunks, so
/// feeding a stream piecewise yields the same output as one call over the
/// whole stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResampler {
    from_rate: u32,
    to_rate: u32,
    /// Source samples advanced per output sample
    step: f64,
    /// Next output position, relative to `last` (or to the next chunk's
    /// first sample when nothing has been seen yet)
    position: f64,
    last: Option<f32>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            from_rate,
            to_rate,
            step: from_rate as f64 / to_rate as f64,
            position: 0.0,
            last: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.from_rate == self.to_rate
    }

    pub fn process(&mut self, chunk: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return chunk.to_vec();
        }

        // Virtual source: the carried-over sample followed by this chunk.
        let last = self.last;
        let carried = usize::from(last.is_some());
        let len = carried + chunk.len();
        let source = |i: usize| -> f32 {
            match (i, last) {
                (0, Some(last)) => last,
                _ => chunk[i - carried],
            }
        };

        let mut out = Vec::with_capacity((chunk.len() as f64 / self.step) as usize + 1);
        while self.position + 1.0 < len as f64 {
            let floor = self.position.floor() as usize;
            let fraction = (self.position - floor as f64) as f32;
            out.push(source(floor) * (1.0 - fraction) + source(floor + 1) * fraction);
            self.position += self.step;
        }

        if len > 0 {
            self.last = Some(source(len - 1));
            self.position -= (len - 1) as f64;
        }
        out
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resample_audio(&samples, 48000, 48000), samples);
    }

    #[test]
    fn test_resample_lengths() {
        let samples = vec![0.5f32; 48000];
        assert_eq!(resample_audio(&samples, 48000, 16000).len(), 16000);
        assert_eq!(resample_audio(&samples, 48000, 48048).len(), 48048);
        assert_eq!(resample_audio(&samples[..4], 16000, 48000).len(), 12);
    }

    #[test]
    fn test_resample_preserves_tone_frequency() {
        let from = 48000;
        let to = 44100;
        let tone: Vec<f32> = (0..4800)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / from as f32).sin())
            .collect();
        let out = resample_audio(&tone, from, to);
        for (i, &s) in out.iter().enumerate().take(4000) {
            let expected = (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / to as f32).sin();
            assert!((s - expected).abs() < 0.02, "sample {}: {} vs {}", i, s, expected);
        }
    }

    #[test]
    fn test_stream_matches_batch() {
        let samples: Vec<f32> = (0..10_000).map(|i| ((i * 31) % 101) as f32 / 101.0).collect();
        let batch = resample_audio(&samples, 44100, 48000);

        let mut stream = StreamResampler::new(44100, 48000);
        let mut pieced = Vec::new();
        for chunk in samples.chunks(333) {
            pieced.extend(stream.process(chunk));
        }

        assert!(pieced.len() + 2 >= batch.len());
        for (a, b) in pieced.iter().zip(&batch) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_stream_passthrough() {
        let mut stream = StreamResampler::new(48000, 48000);
        assert!(stream.is_passthrough());
        assert_eq!(stream.process(&[1.0, 2.0]), vec![1.0, 2.0]);
        assert!(stream.process(&[]).is_empty());
    }
}
