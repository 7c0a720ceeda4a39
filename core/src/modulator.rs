//! Waveform synthesis: frame bytes to faded multi-tone symbols.

use std::f64::consts::PI;

use crate::error::{AudioModemError, Result};
use crate::framing::Frame;
use crate::profile::Profile;
use crate::symbol::{symbols_from_bytes, MarkerKind, Symbol};
use crate::MAX_AMPLITUDE;

/// Symbol envelope: flat top with a sine-squared ramp of `taper_len`
/// samples at each edge.
fn raised_cosine_window(len: usize, taper_len: usize) -> Vec<f32> {
    let taper = taper_len.min(len / 2);
    let mut window = vec![1.0; len];
    for i in 0..taper {
        let progress = i as f64 / taper as f64;
        let value = (PI * progress / 2.0).sin().powi(2) as f32;
        window[i] = value;
        window[len - 1 - i] = value;
    }
    window
}

/// Multi-tone FSK modulator for one profile.
///
/// Every window (marker or data) is the sum of `tones_per_symbol` sines, one
/// per slot, shaped by the same fade envelope.
pub struct FskModulator<'a> {
    profile: &'a Profile,
    envelope: Vec<f32>,
}

impl<'a> FskModulator<'a> {
    pub fn new(profile: &'a Profile) -> Self {
        Self {
            profile,
            envelope: raised_cosine_window(profile.symbol_duration_samples, profile.fade_samples()),
        }
    }

    /// Per-tone amplitude so the summed waveform peaks at `volume × MAX_AMPLITUDE`.
    pub fn tone_amplitude(&self, volume: f32) -> Result<f32> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(AudioModemError::InvalidVolume(volume));
        }
        Ok(volume * MAX_AMPLITUDE / self.profile.tones_per_symbol as f32)
    }

    fn render_tones(&self, frequencies: impl Iterator<Item = f32>, amplitude: f32, out: &mut Vec<f32>) {
        let n = self.profile.symbol_duration_samples;
        let start = out.len();
        out.resize(start + n, 0.0);
        let window = &mut out[start..];

        for frequency in frequencies {
            let angular = 2.0 * PI * frequency as f64 / self.profile.sample_rate as f64;
            for (i, sample) in window.iter_mut().enumerate() {
                *sample += (angular * i as f64).sin() as f32;
            }
        }

        for (sample, &weight) in window.iter_mut().zip(&self.envelope) {
            *sample *= weight * amplitude;
        }
    }

    /// Append one data symbol to `out`.
    pub fn modulate_symbol(&self, symbol: &Symbol, amplitude: f32, out: &mut Vec<f32>) {
        let profile = self.profile;
        let freqs = symbol
            .tones()
            .iter()
            .enumerate()
            .map(|(slot, &tone)| profile.data_frequency(slot, tone));
        self.render_tones(freqs, amplitude, out);
    }

    /// Append one marker window to `out`.
    pub fn modulate_marker(&self, kind: MarkerKind, amplitude: f32, out: &mut Vec<f32>) {
        let profile = self.profile;
        let freqs = (0..profile.tones_per_symbol).map(|slot| profile.marker_frequency(kind, slot));
        self.render_tones(freqs, amplitude, out);
    }

    /// Render a complete transmission: preamble, data symbols, postamble.
    pub fn render(&self, frame: &Frame, volume: f32) -> Result<Vec<f32>> {
        let amplitude = self.tone_amplitude(volume)?;
        let profile = self.profile;

        let bytes = frame.to_bytes(profile);
        let symbols = symbols_from_bytes(&bytes, profile.bytes_per_symbol());

        let n = profile.symbol_duration_samples;
        let mut samples = Vec::with_capacity(
            profile.preamble_samples() + symbols.len() * n + profile.postamble_samples(),
        );

        self.modulate_marker(MarkerKind::Start, amplitude, &mut samples);
        self.modulate_marker(MarkerKind::End, amplitude, &mut samples);
        for symbol in &symbols {
            self.modulate_symbol(symbol, amplitude, &mut samples);
        }
        for _ in 0..crate::POSTAMBLE_SYMBOLS {
            self.modulate_marker(MarkerKind::End, amplitude, &mut samples);
        }

        Ok(samples)
    }
}

/// Render `frame` with `profile` at `volume` in `[0, 1]`.
pub fn render(frame: &Frame, profile: &Profile, volume: f32) -> Result<Vec<f32>> {
    FskModulator::new(profile).render(frame, volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{encode_frame, wire_len};
    use crate::profile::ProfileId;

    #[test]
    fn test_raised_cosine_window() {
        let window = raised_cosine_window(100, 10);
        assert_eq!(window.len(), 100);
        assert_eq!(window[0], 0.0);
        assert!(window[5] > 0.0 && window[5] < 1.0);
        assert_eq!(window[50], 1.0);
        assert_eq!(window[99], 0.0);
    }

    #[test]
    fn test_render_length() {
        let profile = ProfileId::Fastest.profile();
        let frame = encode_frame(b"hi", profile).unwrap();
        let samples = render(&frame, profile, 1.0).unwrap();

        let symbols = wire_len(2, profile).div_ceil(profile.bytes_per_symbol());
        assert_eq!(samples.len(), (4 + symbols) * profile.symbol_duration_samples);
    }

    #[test]
    fn test_amplitude_bounded_by_volume() {
        let profile = ProfileId::Fast.profile();
        let frame = encode_frame(b"amplitude", profile).unwrap();
        for volume in [0.0f32, 0.3, 1.0] {
            let samples = render(&frame, profile, volume).unwrap();
            let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            assert!(peak <= volume * MAX_AMPLITUDE + 1e-4, "peak {} at volume {}", peak, volume);
        }
    }

    #[test]
    fn test_invalid_volume() {
        let profile = ProfileId::Normal.profile();
        let frame = encode_frame(b"x", profile).unwrap();
        assert_eq!(render(&frame, profile, 1.5), Err(AudioModemError::InvalidVolume(1.5)));
        assert_eq!(render(&frame, profile, -0.1), Err(AudioModemError::InvalidVolume(-0.1)));
        assert!(matches!(
            render(&frame, profile, f32::NAN),
            Err(AudioModemError::InvalidVolume(_))
        ));
    }

    #[test]
    fn test_symbol_edges_fade_to_zero() {
        let profile = ProfileId::Fastest.profile();
        let modulator = FskModulator::new(profile);
        let mut out = Vec::new();
        modulator.modulate_symbol(&Symbol::from_bytes(&[0x12, 0x34, 0x56]), 1.0, &mut out);
        assert_eq!(out.len(), profile.symbol_duration_samples);
        assert_eq!(out[0], 0.0);
        assert!(out[out.len() - 1].abs() < 1e-3);
    }
}
