//! Rolling sample buffer addressed by absolute stream position.

use serde::{Deserialize, Serialize};

/// Samples received so far, minus a discarded prefix.
///
/// Positions are absolute sample indices since the stream started, so
/// detector state never has to be rebased when old samples are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleBuffer {
    /// Absolute position of `samples[0]`
    base: usize,
    samples: Vec<f32>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[f32]) {
        self.samples.extend_from_slice(chunk);
    }

    /// First absolute position still held.
    pub fn base(&self) -> usize {
        self.base
    }

    /// One past the last absolute position received.
    pub fn end(&self) -> usize {
        self.base + self.samples.len()
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether `[start, start + len)` is fully buffered.
    pub fn contains(&self, start: usize, len: usize) -> bool {
        start >= self.base && start + len <= self.end()
    }

    /// Sample at absolute position `pos`.
    pub fn at(&self, pos: usize) -> f32 {
        self.samples[pos - self.base]
    }

    /// Samples in `[start, start + len)`; the range must be buffered.
    pub fn window(&self, start: usize, len: usize) -> &[f32] {
        let from = start - self.base;
        &self.samples[from..from + len]
    }

    /// Drop everything before absolute position `pos`.
    pub fn discard_before(&mut self, pos: usize) {
        if pos <= self.base {
            return;
        }
        let count = (pos - self.base).min(self.samples.len());
        self.samples.drain(..count);
        self.base += count;
    }

    pub fn clear(&mut self) {
        self.base = 0;
        self.samples.clear();
    }
}
