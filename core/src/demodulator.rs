//! Spectrum to symbol decisions and byte accumulation.
//!
//! A symbol with any slot whose winning bin is not clearly above the rest is
//! rejected as weak, and the bytes it would have carried become Reed-Solomon
//! erasures.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{AudioModemError, Result};
use crate::framing::{decode_header, wire_len, HEADER_WIRE_LEN};
use crate::profile::Profile;
use crate::spectrum::{SpectralAnalyzer, Spectrum};
use crate::symbol::Symbol;
use crate::{MIN_TONE_ENERGY, WEAK_SIGNAL_RATIO};

/// Picks the strongest candidate in every tone slot.
pub struct FskDemodulator<'a> {
    profile: &'a Profile,
}

impl<'a> FskDemodulator<'a> {
    pub fn new(profile: &'a Profile) -> Self {
        Self { profile }
    }

    /// Decide a symbol from one window's spectrum.
    ///
    /// Fails with `WeakSignal` when any slot's winner does not stand clearly
    /// above that slot's median candidate.
    pub fn symbol_from_spectrum(&self, spectrum: &Spectrum) -> Result<Symbol> {
        let mut tones = Vec::with_capacity(self.profile.tones_per_symbol);

        for energies in spectrum.slots() {
            let (best, best_energy) = energies
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
                .ok_or(AudioModemError::InvalidInputSize)?;

            let mut sorted = energies.to_vec();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            let median = sorted[sorted.len() / 2];

            if best_energy < WEAK_SIGNAL_RATIO * median + MIN_TONE_ENERGY {
                return Err(AudioModemError::WeakSignal);
            }
            tones.push(best as u8);
        }

        Ok(Symbol::from_tones(tones))
    }

    /// Analyze and decide one symbol window.
    pub fn demodulate(&self, analyzer: &mut SpectralAnalyzer, window: &[f32]) -> Result<Symbol> {
        let spectrum = analyzer.analyze(window)?;
        self.symbol_from_spectrum(&spectrum)
    }
}

/// Collects demodulated symbols into frame bytes.
///
/// Weak symbols contribute zero bytes whose positions are recorded as
/// erasures for the Reed-Solomon decoder. Once the protected header has
/// arrived the expected wire length is known and the assembler reports
/// completion as soon as enough bytes are collected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameAssembler {
    bytes: Vec<u8>,
    erasures: Vec<usize>,
    expected: Option<usize>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one demodulated symbol. Returns whether the frame is complete.
    ///
    /// Fails when the header cannot be recovered or declares an impossible
    /// length.
    pub fn push(&mut self, symbol: Result<Symbol>, profile: &Profile) -> Result<bool> {
        match symbol {
            Ok(symbol) => self.bytes.extend(symbol.to_bytes()),
            Err(AudioModemError::WeakSignal) => {
                let start = self.bytes.len();
                let count = profile.bytes_per_symbol();
                self.erasures.extend(start..start + count);
                self.bytes.resize(start + count, 0);
            }
            Err(e) => return Err(e),
        }

        if self.expected.is_none() && self.bytes.len() >= HEADER_WIRE_LEN {
            let declared = decode_header(&self.bytes, &self.erasures, profile)?;
            self.expected = Some(wire_len(declared, profile));
        }

        Ok(self.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        self.expected.is_some_and(|expected| self.bytes.len() >= expected)
    }

    /// Wire length announced by the header, once known.
    pub fn expected_len(&self) -> Option<usize> {
        self.expected
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn erasures(&self) -> &[usize] {
        &self.erasures
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<usize>) {
        (self.bytes, self.erasures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{decode_frame, encode_frame};
    use crate::modulator::FskModulator;
    use crate::profile::ProfileId;
    use crate::symbol::symbols_from_bytes;

    #[test]
    fn test_demodulate_clean_symbols() {
        let profile = ProfileId::Fast.profile();
        let modulator = FskModulator::new(profile);
        let demodulator = FskDemodulator::new(profile);
        let mut analyzer = SpectralAnalyzer::new(profile);

        for bytes in [[0x00, 0x00, 0x00], [0xFF, 0xFF, 0xFF], [0x12, 0xAB, 0x7E]] {
            let symbol = Symbol::from_bytes(&bytes);
            let mut window = Vec::new();
            modulator.modulate_symbol(&symbol, 0.5, &mut window);
            assert_eq!(demodulator.demodulate(&mut analyzer, &window).unwrap(), symbol);
        }
    }

    #[test]
    fn test_silence_is_weak() {
        let profile = ProfileId::Fastest.profile();
        let demodulator = FskDemodulator::new(profile);
        let mut analyzer = SpectralAnalyzer::new(profile);
        let window = vec![0.0; profile.symbol_duration_samples];
        assert_eq!(
            demodulator.demodulate(&mut analyzer, &window),
            Err(AudioModemError::WeakSignal)
        );
    }

    #[test]
    fn test_assembler_completes_at_declared_length() {
        let profile = ProfileId::Fastest.profile();
        let bytes = encode_frame(b"assemble me", profile).unwrap().to_bytes(profile);
        let mut assembler = FrameAssembler::new();

        let symbols = symbols_from_bytes(&bytes, profile.bytes_per_symbol());
        let last = symbols.len() - 1;
        for (i, symbol) in symbols.into_iter().enumerate() {
            let complete = assembler.push(Ok(symbol), profile).unwrap();
            assert_eq!(complete, i == last);
        }
        assert_eq!(assembler.expected_len(), Some(bytes.len()));

        let (received, erasures) = assembler.into_parts();
        assert_eq!(decode_frame(&received, &erasures, profile).unwrap(), b"assemble me");
    }

    #[test]
    fn test_weak_symbols_become_erasures() {
        let profile = ProfileId::Fastest.profile();
        let bytes = encode_frame(&[0x5A; 40], profile).unwrap().to_bytes(profile);
        let mut assembler = FrameAssembler::new();

        for (i, symbol) in symbols_from_bytes(&bytes, 3).into_iter().enumerate() {
            let input = if i == 4 || i == 11 { Err(AudioModemError::WeakSignal) } else { Ok(symbol) };
            assembler.push(input, profile).unwrap();
        }
        assert!(assembler.is_complete());
        assert_eq!(assembler.erasures(), &[12, 13, 14, 33, 34, 35]);

        let (received, erasures) = assembler.into_parts();
        assert_eq!(decode_frame(&received, &erasures, profile).unwrap(), vec![0x5A; 40]);
    }

    #[test]
    fn test_corrupt_header_is_reported() {
        let profile = ProfileId::Fastest.profile();
        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(Ok(Symbol::from_bytes(&[0xFF, 0x01, 0x02])), profile), Ok(false));
        let result = assembler.push(Ok(Symbol::from_bytes(&[0x03, 0x04, 0x05])), profile);
        assert!(matches!(
            result,
            Err(AudioModemError::UncorrectableBlock { block: 0 }) | Err(AudioModemError::InvalidLength { .. })
        ));
    }
}
