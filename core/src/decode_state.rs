//! Explicit, serializable receiver state for one profile.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::demodulator::{FrameAssembler, FskDemodulator};
use crate::diagnostics::Diagnostics;
use crate::error::AudioModemError;
use crate::framing::decode_frame;
use crate::profile::{Profile, ProfileId};
use crate::spectrum::SpectralAnalyzer;
use crate::sync::{MarkerSearch, SymbolTracker, TrackEvent};

/// Outcome of one [`DecodeState::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    /// All buffered samples consumed; feed more audio
    Pending,
    Decoded(Vec<u8>),
    /// A frame was found but could not be recovered
    Failed(AudioModemError),
}

/// Coarse receiver phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorPhase {
    Searching,
    Synchronized,
    Draining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Phase {
    Searching,
    Synchronized {
        tracker: SymbolTracker,
        assembler: FrameAssembler,
    },
    Draining {
        assembler: FrameAssembler,
        resume_at: usize,
    },
}

/// Per-stream decoder state machine.
///
/// `Searching → Synchronized → Draining → Searching`. Each call to
/// [`step`](Self::step) appends a chunk and runs until either a frame
/// result is produced or the buffered samples are exhausted. Call again
/// with an empty chunk to continue after a result.
#[derive(Clone, Serialize, Deserialize)]
pub struct DecodeState {
    profile: ProfileId,
    phase: Phase,
    buffer: SampleBuffer,
    search: MarkerSearch,
    #[serde(skip)]
    analyzer: Option<SpectralAnalyzer>,
}

impl fmt::Debug for DecodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeState")
            .field("profile", &self.profile)
            .field("phase", &self.phase())
            .field("buffered", &self.buffer.len())
            .field("base", &self.buffer.base())
            .finish()
    }
}

impl DecodeState {
    pub fn new(profile: ProfileId) -> Self {
        Self {
            profile,
            phase: Phase::Searching,
            buffer: SampleBuffer::new(),
            search: MarkerSearch::new(profile.profile()),
            analyzer: None,
        }
    }

    pub fn profile(&self) -> &'static Profile {
        self.profile.profile()
    }

    pub fn profile_id(&self) -> ProfileId {
        self.profile
    }

    pub fn phase(&self) -> DetectorPhase {
        match self.phase {
            Phase::Searching => DetectorPhase::Searching,
            Phase::Synchronized { .. } => DetectorPhase::Synchronized,
            Phase::Draining { .. } => DetectorPhase::Draining,
        }
    }

    /// Samples currently retained in the rolling buffer.
    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Absolute number of samples fed so far.
    pub fn samples_received(&self) -> usize {
        self.buffer.end()
    }

    /// Forget all buffered audio and partial frames.
    pub fn reset(&mut self) {
        let analyzer = self.analyzer.take();
        *self = Self::new(self.profile);
        self.analyzer = analyzer;
    }

    /// Append `chunk` and advance the state machine.
    pub fn step(&mut self, chunk: &[f32], diagnostics: &dyn Diagnostics) -> StepStatus {
        self.buffer.extend(chunk);
        let profile = self.profile.profile();
        let mut analyzer = self
            .analyzer
            .take()
            .unwrap_or_else(|| SpectralAnalyzer::new(profile));

        let status = self.run(profile, &mut analyzer, diagnostics);

        self.analyzer = Some(analyzer);
        self.trim();
        status
    }

    fn run(&mut self, profile: &Profile, analyzer: &mut SpectralAnalyzer, diagnostics: &dyn Diagnostics) -> StepStatus {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Searching) {
                Phase::Searching => match self.search.scan(&self.buffer, analyzer, diagnostics) {
                    Ok(Some(lock)) => {
                        diagnostics.debug(format_args!(
                            "{}: preamble at sample {}, data from {}",
                            profile.name, lock.preamble_start, lock.data_origin
                        ));
                        self.phase = Phase::Synchronized {
                            tracker: SymbolTracker::new(profile, lock.data_origin),
                            assembler: FrameAssembler::new(),
                        };
                    }
                    Ok(None) => return StepStatus::Pending,
                    Err(e) => {
                        diagnostics.warn(format_args!("{}: search aborted: {}", profile.name, e));
                        self.search.restart(self.buffer.end());
                        return StepStatus::Pending;
                    }
                },

                Phase::Synchronized { mut tracker, mut assembler } => {
                    let event = match tracker.advance(&self.buffer, analyzer) {
                        Ok(Some(event)) => event,
                        Ok(None) => {
                            self.phase = Phase::Synchronized { tracker, assembler };
                            return StepStatus::Pending;
                        }
                        Err(e) => {
                            self.search.restart(tracker.cursor());
                            return StepStatus::Failed(e);
                        }
                    };

                    let spectrum = match event {
                        TrackEvent::Symbol(spectrum) => spectrum,
                        TrackEvent::Postamble => {
                            diagnostics.debug(format_args!(
                                "{}: postamble at sample {} after {} bytes",
                                profile.name,
                                tracker.cursor(),
                                assembler.bytes().len()
                            ));
                            self.phase = Phase::Draining {
                                assembler,
                                resume_at: tracker.resume_point(),
                            };
                            continue;
                        }
                    };

                    let symbol = FskDemodulator::new(profile).symbol_from_spectrum(&spectrum);
                    match assembler.push(symbol, profile) {
                        Ok(true) => {
                            if tracker.drift().total_correction() != 0 {
                                diagnostics.debug(format_args!(
                                    "{}: symbol boundary corrected by {} samples",
                                    profile.name,
                                    tracker.drift().total_correction()
                                ));
                            }
                            self.phase = Phase::Draining {
                                assembler,
                                resume_at: tracker.resume_point(),
                            };
                        }
                        Ok(false) => self.phase = Phase::Synchronized { tracker, assembler },
                        Err(e) => {
                            diagnostics.warn(format_args!("{}: frame header rejected: {}", profile.name, e));
                            self.search.restart(tracker.cursor());
                            return StepStatus::Failed(e);
                        }
                    }
                }

                Phase::Draining { assembler, resume_at } => {
                    self.search.restart(resume_at);
                    let (bytes, erasures) = assembler.into_parts();
                    return match decode_frame(&bytes, &erasures, profile) {
                        Ok(payload) => {
                            diagnostics.info(format_args!(
                                "{}: decoded {} bytes ({} erasures)",
                                profile.name,
                                payload.len(),
                                erasures.len()
                            ));
                            StepStatus::Decoded(payload)
                        }
                        Err(e) => {
                            diagnostics.warn(format_args!("{}: frame dropped: {}", profile.name, e));
                            StepStatus::Failed(e)
                        }
                    };
                }
            }
        }
    }

    fn trim(&mut self) {
        let keep_from = match &self.phase {
            Phase::Searching => self.search.earliest_needed(),
            Phase::Synchronized { tracker, .. } => tracker.earliest_needed(),
            Phase::Draining { .. } => return,
        };
        self.buffer.discard_before(keep_from);
    }
}
