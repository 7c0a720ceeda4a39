//! Data-over-sound transceiver core
//!
//! Turns a byte payload into a multi-tone FSK waveform (preamble, data
//! symbols, postamble) and recovers it from captured audio. Frames are
//! protected by a CRC-16 and Reed-Solomon parity; the receiver finds frames
//! with a sample-accurate marker search and follows slow clock drift.

pub mod buffer;
pub mod decode_state;
pub mod demodulator;
pub mod diagnostics;
pub mod error;
pub mod fec;
pub mod framing;
pub mod modulator;
pub mod pcm;
pub mod profile;
pub mod resample;
pub mod spectrum;
pub mod symbol;
pub mod sync;
pub mod transceiver;

pub use decode_state::{DecodeState, DetectorPhase, StepStatus};
pub use diagnostics::{Diagnostics, LogDiagnostics, NoopDiagnostics};
pub use error::{AudioModemError, Result};
pub use profile::{lookup, Profile, ProfileId};
pub use transceiver::{Transceiver, TransceiverConfig};

// Audio configuration
pub const SAMPLE_RATE: u32 = 48_000;
pub const FADE_DURATION_MS: usize = 5;
/// Peak amplitude of a full-volume transmission
pub const MAX_AMPLITUDE: f32 = 0.9;

// Frame structure
pub const PREAMBLE_SYMBOLS: usize = 2;
pub const POSTAMBLE_SYMBOLS: usize = 2;

// Detection thresholds (shares of window energy)
pub const MARKER_THRESHOLD: f32 = 0.4;
/// A marker run shorter than `symbol / MIN_MARKER_RUN_DIVISOR` samples is noise
pub const MIN_MARKER_RUN_DIVISOR: usize = 4;
pub const WEAK_SIGNAL_RATIO: f32 = 3.0;
pub const MIN_TONE_ENERGY: f32 = 0.005;
/// Windows with a lower mean square are treated as silence
pub const MIN_WINDOW_ENERGY: f64 = 1e-9;

// Timing recovery
pub const DRIFT_MARGIN: f32 = 0.03;
pub const DRIFT_PATIENCE: i32 = 2;
pub const DRIFT_NUDGE_DIVISOR: usize = 384;
pub const DFT_REFRESH_SYMBOLS: usize = 4;
