//! Static table of modulation profiles.
//!
//! Every profile runs at 48 kHz with symbol windows that are whole
//! multiples of 1024 samples. Frequencies are laid out on a half-step grid
//! of `frequency_step / 2` (46.875 Hz): data tones occupy even grid units
//! and marker tones the odd units in between, so a marker can never be
//! mistaken for part of a data symbol.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{AudioModemError, Result};
use crate::symbol::{MarkerKind, TONES_PER_SLOT};
use crate::{FADE_DURATION_MS, SAMPLE_RATE};

/// Frequency step between adjacent data candidates in Hz.
const FREQUENCY_STEP: f32 = 93.75;

const AUDIBLE_BASE_FREQ: f32 = 1875.0;
const ULTRASONIC_BASE_FREQ: f32 = 15000.0;

const MAX_PAYLOAD_BYTES: usize = 140;
const ECC_BLOCK_LEN: usize = 32;
const ECC_CORRECTABLE: usize = 4;

/// Identifier of a built-in profile. Discriminants are the wire-level ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProfileId {
    Normal = 0,
    Fast = 1,
    Fastest = 2,
    UltrasonicNormal = 3,
    UltrasonicFast = 4,
    UltrasonicFastest = 5,
}

impl ProfileId {
    /// All profiles in detection priority order.
    pub const ALL: [ProfileId; 6] = [
        ProfileId::Normal,
        ProfileId::Fast,
        ProfileId::Fastest,
        ProfileId::UltrasonicNormal,
        ProfileId::UltrasonicFast,
        ProfileId::UltrasonicFastest,
    ];

    pub fn profile(self) -> &'static Profile {
        &registry()[self as usize]
    }
}

impl From<ProfileId> for u8 {
    fn from(id: ProfileId) -> u8 {
        id as u8
    }
}

impl TryFrom<u8> for ProfileId {
    type Error = AudioModemError;

    fn try_from(value: u8) -> Result<Self> {
        ProfileId::ALL
            .get(value as usize)
            .copied()
            .ok_or(AudioModemError::UnknownProfile(value))
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().name)
    }
}

/// Immutable description of one modulation profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: ProfileId,
    pub name: &'static str,
    /// Frequency of data tone 0 in slot 0 (Hz)
    pub base_frequency: f32,
    /// Spacing between adjacent data candidates (Hz)
    pub frequency_step: f32,
    /// Number of simultaneous tones; each carries 4 bits
    pub tones_per_symbol: usize,
    pub symbol_duration_samples: usize,
    pub sample_rate: u32,
    pub max_payload_bytes: usize,
    /// Data bytes per Reed-Solomon block
    pub ecc_block_len: usize,
    /// Byte errors correctable per block (t); each block carries 2t parity bytes
    pub ecc_correctable: usize,
    /// Tone index of the start marker in even slots (odd slots use the mirror)
    pub marker_index: u8,
}

impl Profile {
    pub fn bits_per_symbol(&self) -> usize {
        self.tones_per_symbol * 4
    }

    pub fn bytes_per_symbol(&self) -> usize {
        self.tones_per_symbol / 2
    }

    /// Length of the raised-cosine ramp at each symbol edge.
    pub fn fade_samples(&self) -> usize {
        self.sample_rate as usize * FADE_DURATION_MS / 1000
    }

    pub fn parity_per_block(&self) -> usize {
        2 * self.ecc_correctable
    }

    /// Resolution of a transform over one symbol window (Hz per bin).
    pub fn bin_spacing(&self) -> f32 {
        self.sample_rate as f32 / self.symbol_duration_samples as f32
    }

    /// Transform bins between a data tone and the marker tone next to it.
    pub fn bins_per_half_step(&self) -> usize {
        (self.frequency_step / 2.0 / self.bin_spacing()).round() as usize
    }

    /// Half-width of the bin neighbourhood integrated around each candidate.
    /// Chosen so neighbourhoods of adjacent grid units never overlap.
    pub fn neighbourhood_radius(&self) -> usize {
        self.bins_per_half_step().saturating_sub(1) / 2
    }

    pub fn candidates_per_symbol(&self) -> usize {
        self.tones_per_symbol * TONES_PER_SLOT
    }

    /// Tone index used by a marker set in the given slot.
    pub fn marker_tone(&self, kind: MarkerKind, slot: usize) -> u8 {
        let primary = (slot % 2 == 0) == (kind == MarkerKind::Start);
        if primary {
            self.marker_index
        } else {
            (TONES_PER_SLOT as u8 - 1) - self.marker_index
        }
    }

    fn grid_unit(&self) -> f32 {
        self.frequency_step / 2.0
    }

    fn data_unit(slot: usize, tone: u8) -> usize {
        2 * (slot * TONES_PER_SLOT + tone as usize)
    }

    pub fn data_frequency(&self, slot: usize, tone: u8) -> f32 {
        self.base_frequency + Self::data_unit(slot, tone) as f32 * self.grid_unit()
    }

    pub fn marker_frequency(&self, kind: MarkerKind, slot: usize) -> f32 {
        let unit = Self::data_unit(slot, self.marker_tone(kind, slot)) + 1;
        self.base_frequency + unit as f32 * self.grid_unit()
    }

    pub fn frequency_to_bin(&self, frequency: f32) -> usize {
        (frequency / self.bin_spacing()).round() as usize
    }

    pub fn data_bin(&self, slot: usize, tone: u8) -> usize {
        self.frequency_to_bin(self.data_frequency(slot, tone))
    }

    pub fn marker_bin(&self, kind: MarkerKind, slot: usize) -> usize {
        self.frequency_to_bin(self.marker_frequency(kind, slot))
    }

    /// Highest frequency any candidate of this profile can occupy.
    pub fn max_frequency(&self) -> f32 {
        self.base_frequency
            + (2 * self.candidates_per_symbol()) as f32 * self.grid_unit()
    }

    pub fn preamble_samples(&self) -> usize {
        crate::PREAMBLE_SYMBOLS * self.symbol_duration_samples
    }

    pub fn postamble_samples(&self) -> usize {
        crate::POSTAMBLE_SYMBOLS * self.symbol_duration_samples
    }

    /// Check the structural invariants the modem relies on.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> {
            Err(AudioModemError::InvalidConfig(format!("{}: {}", self.name, msg)))
        };

        if self.tones_per_symbol == 0 || self.tones_per_symbol % 2 != 0 || self.tones_per_symbol > 8 {
            return invalid(format!("tones_per_symbol {} must be even and at most 8", self.tones_per_symbol));
        }
        if self.symbol_duration_samples == 0 {
            return invalid("symbol window is empty".to_string());
        }
        if self.marker_index as usize >= TONES_PER_SLOT / 2 {
            return invalid(format!("marker index {} must be below {}", self.marker_index, TONES_PER_SLOT / 2));
        }

        // Every grid unit must land on a whole transform bin.
        let unit_bins = self.grid_unit() / self.bin_spacing();
        let base_bins = self.base_frequency / self.bin_spacing();
        if unit_bins < 1.0 || (unit_bins - unit_bins.round()).abs() > 1e-3 {
            return invalid(format!("grid unit spans {:.3} bins, expected an integer >= 1", unit_bins));
        }
        if (base_bins - base_bins.round()).abs() > 1e-3 {
            return invalid(format!("base frequency is not bin-aligned ({:.3} bins)", base_bins));
        }

        if self.max_frequency() >= self.sample_rate as f32 / 2.0 {
            return invalid(format!("tone table reaches {} Hz, above Nyquist", self.max_frequency()));
        }
        if 2 * self.fade_samples() >= self.symbol_duration_samples {
            return invalid("fade ramps cover the whole symbol".to_string());
        }
        if self.ecc_block_len == 0 || self.ecc_block_len + self.parity_per_block() > 255 {
            return invalid(format!(
                "block of {} data + {} parity bytes does not fit GF(256)",
                self.ecc_block_len,
                self.parity_per_block()
            ));
        }
        if self.max_payload_bytes > u16::MAX as usize {
            return invalid(format!("max payload {} exceeds the length field", self.max_payload_bytes));
        }

        Ok(())
    }
}

const fn builtin(
    id: ProfileId,
    name: &'static str,
    base_frequency: f32,
    tones_per_symbol: usize,
    symbol_duration_samples: usize,
    marker_index: u8,
) -> Profile {
    Profile {
        id,
        name,
        base_frequency,
        frequency_step: FREQUENCY_STEP,
        tones_per_symbol,
        symbol_duration_samples,
        sample_rate: SAMPLE_RATE,
        max_payload_bytes: MAX_PAYLOAD_BYTES,
        ecc_block_len: ECC_BLOCK_LEN,
        ecc_correctable: ECC_CORRECTABLE,
        marker_index,
    }
}

static PROFILES: [Profile; 6] = [
    builtin(ProfileId::Normal, "Normal", AUDIBLE_BASE_FREQ, 6, 9 * 1024, 1),
    builtin(ProfileId::Fast, "Fast", AUDIBLE_BASE_FREQ, 6, 6 * 1024, 4),
    builtin(ProfileId::Fastest, "Fastest", AUDIBLE_BASE_FREQ, 6, 3 * 1024, 7),
    builtin(ProfileId::UltrasonicNormal, "UltrasonicNormal", ULTRASONIC_BASE_FREQ, 4, 9 * 1024, 1),
    builtin(ProfileId::UltrasonicFast, "UltrasonicFast", ULTRASONIC_BASE_FREQ, 4, 6 * 1024, 4),
    builtin(ProfileId::UltrasonicFastest, "UltrasonicFastest", ULTRASONIC_BASE_FREQ, 4, 3 * 1024, 7),
];

static REGISTRY: Lazy<&'static [Profile]> = Lazy::new(|| {
    for (index, profile) in PROFILES.iter().enumerate() {
        assert_eq!(profile.id as usize, index, "profile table out of order");
        if let Err(e) = profile.validate() {
            panic!("built-in profile table is inconsistent: {}", e);
        }
    }
    &PROFILES[..]
});

/// All built-in profiles, validated on first access.
pub fn registry() -> &'static [Profile] {
    *REGISTRY
}

/// Resolve a wire-level profile id.
pub fn lookup(id: u8) -> Result<&'static Profile> {
    registry()
        .get(id as usize)
        .ok_or(AudioModemError::UnknownProfile(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_validates() {
        assert_eq!(registry().len(), ProfileId::ALL.len());
        for profile in registry() {
            profile.validate().unwrap();
        }
    }

    #[test]
    fn test_lookup_unknown_profile() {
        assert_eq!(lookup(6), Err(AudioModemError::UnknownProfile(6)));
        assert_eq!(lookup(255), Err(AudioModemError::UnknownProfile(255)));
        assert_eq!(lookup(2).unwrap().name, "Fastest");
        assert_eq!(ProfileId::try_from(4).unwrap(), ProfileId::UltrasonicFast);
        assert!(ProfileId::try_from(9).is_err());
    }

    #[test]
    fn test_bins_are_integer_aligned() {
        for profile in registry() {
            let spacing = profile.bin_spacing() as f64;
            for slot in 0..profile.tones_per_symbol {
                for tone in 0..TONES_PER_SLOT as u8 {
                    let freq = profile.data_frequency(slot, tone) as f64;
                    let bins = freq / spacing;
                    assert!((bins - bins.round()).abs() < 1e-3, "{} slot {} tone {}", profile.name, slot, tone);
                }
            }
        }
    }

    #[test]
    fn test_neighbourhoods_are_disjoint() {
        for profile in registry() {
            let half = profile.bins_per_half_step();
            let w = profile.neighbourhood_radius();
            assert!(2 * w < half, "{}: radius {} overlaps at spacing {}", profile.name, w, half);
        }
        assert_eq!(lookup(0).unwrap().neighbourhood_radius(), 4);
        assert_eq!(lookup(1).unwrap().neighbourhood_radius(), 2);
        assert_eq!(lookup(2).unwrap().neighbourhood_radius(), 1);
    }

    #[test]
    fn test_marker_sets_differ_between_profiles() {
        let tones = |p: &Profile, kind| -> Vec<u8> {
            (0..p.tones_per_symbol).map(|slot| p.marker_tone(kind, slot)).collect()
        };
        for a in registry() {
            assert_ne!(tones(a, MarkerKind::Start), tones(a, MarkerKind::End));
            for b in registry() {
                if a.id == b.id || a.base_frequency != b.base_frequency {
                    continue;
                }
                assert_ne!(tones(a, MarkerKind::Start), tones(b, MarkerKind::Start), "{} vs {}", a.name, b.name);
                assert_ne!(tones(a, MarkerKind::Start), tones(b, MarkerKind::End), "{} vs {}", a.name, b.name);
            }
        }
    }

    #[test]
    fn test_marker_tones_alternate() {
        let profile = lookup(0).unwrap();
        assert_eq!(profile.marker_tone(MarkerKind::Start, 0), 1);
        assert_eq!(profile.marker_tone(MarkerKind::Start, 1), 14);
        assert_eq!(profile.marker_tone(MarkerKind::End, 0), 14);
        assert_eq!(profile.marker_tone(MarkerKind::End, 1), 1);
    }

    #[test]
    fn test_profile_table_values() {
        let normal = ProfileId::Normal.profile();
        assert_eq!(normal.bytes_per_symbol(), 3);
        assert_eq!(normal.bits_per_symbol(), 24);
        assert_eq!(normal.fade_samples(), 240);
        assert_eq!(normal.parity_per_block(), 8);
        assert_eq!(normal.preamble_samples(), 2 * 9216);

        let ultra = ProfileId::UltrasonicFastest.profile();
        assert_eq!(ultra.bytes_per_symbol(), 2);
        assert!(ultra.max_frequency() < 24000.0);
        assert!(ultra.base_frequency >= 15000.0);
        assert_eq!(ProfileId::Fast.to_string(), "Fast");
    }
}
