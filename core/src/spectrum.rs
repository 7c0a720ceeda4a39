//! Spectral analysis of one symbol window.
//!
//! A real FFT over exactly one symbol puts every candidate tone on an
//! integer bin. Each candidate's energy is summed over a small
//! neighbourhood of bins and divided by the window's total energy
//! (Parseval), so a clean tone set sums to roughly 1 independent of volume.

use std::fmt;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::{AudioModemError, Result};
use crate::profile::Profile;
use crate::symbol::{MarkerKind, TONES_PER_SLOT};
use crate::MIN_WINDOW_ENERGY;

/// Normalized energies of one analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// `tones_per_symbol × 16` data candidates, slot-major
    pub data: Vec<f32>,
    /// Share of window energy in the start-marker tone set
    pub start_marker: f32,
    /// Share of window energy in the end-marker tone set
    pub end_marker: f32,
    /// Mean square of the window after DC removal
    pub power: f32,
}

impl Spectrum {
    pub fn slot(&self, slot: usize) -> &[f32] {
        &self.data[slot * TONES_PER_SLOT..(slot + 1) * TONES_PER_SLOT]
    }

    pub fn slots(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks(TONES_PER_SLOT)
    }

    /// Sum over slots of the strongest candidate: how much of the window's
    /// energy sits on the data grid.
    pub fn concentration(&self) -> f32 {
        self.slots()
            .map(|slot| slot.iter().fold(0.0f32, |m, &e| m.max(e)))
            .sum()
    }

    pub fn marker(&self, kind: MarkerKind) -> f32 {
        match kind {
            MarkerKind::Start => self.start_marker,
            MarkerKind::End => self.end_marker,
        }
    }

    pub fn is_silent(&self) -> bool {
        self.power == 0.0
    }
}

/// Reusable FFT plan and buffers for one profile.
#[derive(Clone)]
pub struct SpectralAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    data_bins: Vec<usize>,
    start_bins: Vec<usize>,
    end_bins: Vec<usize>,
    radius: usize,
}

impl fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("len", &self.fft.len())
            .field("candidates", &self.data_bins.len())
            .field("radius", &self.radius)
            .finish()
    }
}

impl SpectralAnalyzer {
    pub fn new(profile: &Profile) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(profile.symbol_duration_samples);
        let input = fft.make_input_vec();
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        let slots = 0..profile.tones_per_symbol;
        let data_bins = slots
            .clone()
            .flat_map(|slot| (0..TONES_PER_SLOT as u8).map(move |tone| (slot, tone)))
            .map(|(slot, tone)| profile.data_bin(slot, tone))
            .collect();
        let start_bins = slots.clone().map(|s| profile.marker_bin(MarkerKind::Start, s)).collect();
        let end_bins = slots.map(|s| profile.marker_bin(MarkerKind::End, s)).collect();

        Self {
            fft,
            input,
            output,
            scratch,
            data_bins,
            start_bins,
            end_bins,
            radius: profile.neighbourhood_radius(),
        }
    }

    pub fn window_len(&self) -> usize {
        self.fft.len()
    }

    fn neighbourhood_energy(&self, center: usize) -> f32 {
        let lo = center.saturating_sub(self.radius);
        let hi = (center + self.radius).min(self.output.len() - 1);
        self.output[lo..=hi].iter().map(|c| c.norm_sqr()).sum()
    }

    /// Analyze exactly one symbol window.
    pub fn analyze(&mut self, window: &[f32]) -> Result<Spectrum> {
        let n = self.window_len();
        if window.len() != n {
            return Err(AudioModemError::InvalidInputSize);
        }

        let mean = window.iter().sum::<f32>() / n as f32;
        let mut total = 0.0f64;
        for (dst, &x) in self.input.iter_mut().zip(window) {
            *dst = x - mean;
            total += (*dst as f64) * (*dst as f64);
        }

        let power = total / n as f64;
        if power < MIN_WINDOW_ENERGY {
            return Ok(Spectrum {
                data: vec![0.0; self.data_bins.len()],
                start_marker: 0.0,
                end_marker: 0.0,
                power: 0.0,
            });
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .map_err(|e| AudioModemError::FftError(format!("{:?}", e)))?;

        // Parseval for a one-sided real spectrum: sum |X_k|^2 over k in (0, N/2)
        // counts half the window energy times N.
        let scale = (2.0 / (n as f64 * total)) as f32;

        let data = self
            .data_bins
            .iter()
            .map(|&bin| self.neighbourhood_energy(bin) * scale)
            .collect();
        let start_marker = self.start_bins.iter().map(|&b| self.neighbourhood_energy(b)).sum::<f32>() * scale;
        let end_marker = self.end_bins.iter().map(|&b| self.neighbourhood_energy(b)).sum::<f32>() * scale;

        Ok(Spectrum {
            data,
            start_marker,
            end_marker,
            power: power as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulator::FskModulator;
    use crate::profile::ProfileId;
    use crate::symbol::Symbol;

    #[test]
    fn test_clean_symbol_concentrates_energy() {
        let profile = ProfileId::Fastest.profile();
        let modulator = FskModulator::new(profile);
        let mut analyzer = SpectralAnalyzer::new(profile);

        let symbol = Symbol::from_bytes(&[0x3C, 0xA5, 0x0F]);
        let mut window = Vec::new();
        modulator.modulate_symbol(&symbol, 0.1, &mut window);

        let spectrum = analyzer.analyze(&window).unwrap();
        for (slot, energies) in spectrum.slots().enumerate() {
            let best = energies
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i as u8)
                .unwrap();
            assert_eq!(best, symbol.tone(slot));
        }
        assert!(spectrum.concentration() > 0.85, "concentration {}", spectrum.concentration());
        assert!(spectrum.concentration() < 1.05);
        assert!(spectrum.start_marker < 0.05);
        assert!(spectrum.end_marker < 0.05);
    }

    #[test]
    fn test_marker_windows() {
        let profile = ProfileId::Normal.profile();
        let modulator = FskModulator::new(profile);
        let mut analyzer = SpectralAnalyzer::new(profile);

        let mut start = Vec::new();
        modulator.modulate_marker(MarkerKind::Start, 0.5, &mut start);
        let spectrum = analyzer.analyze(&start).unwrap();
        assert!(spectrum.start_marker > 0.85);
        assert!(spectrum.end_marker < 0.05);
        assert!(spectrum.concentration() < 0.1);

        let mut end = Vec::new();
        modulator.modulate_marker(MarkerKind::End, 0.5, &mut end);
        let spectrum = analyzer.analyze(&end).unwrap();
        assert!(spectrum.end_marker > 0.85);
        assert!(spectrum.start_marker < 0.05);
    }

    #[test]
    fn test_volume_independent() {
        let profile = ProfileId::Fast.profile();
        let modulator = FskModulator::new(profile);
        let mut analyzer = SpectralAnalyzer::new(profile);
        let symbol = Symbol::from_bytes(&[1, 2, 3]);

        let mut quiet = Vec::new();
        modulator.modulate_symbol(&symbol, 0.01, &mut quiet);
        let mut loud = Vec::new();
        modulator.modulate_symbol(&symbol, 0.3, &mut loud);

        let a = analyzer.analyze(&quiet).unwrap();
        let b = analyzer.analyze(&loud).unwrap();
        for (x, y) in a.data.iter().zip(&b.data) {
            assert!((x - y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_silence_is_all_zero() {
        let profile = ProfileId::Fastest.profile();
        let mut analyzer = SpectralAnalyzer::new(profile);
        let spectrum = analyzer.analyze(&vec![0.0; profile.symbol_duration_samples]).unwrap();
        assert!(spectrum.is_silent());
        assert!(spectrum.data.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_wrong_window_length() {
        let profile = ProfileId::Fastest.profile();
        let mut analyzer = SpectralAnalyzer::new(profile);
        assert_eq!(analyzer.analyze(&[0.0; 10]), Err(AudioModemError::InvalidInputSize));
    }
}
