//! Public encode and decode entry points.
//!
//! [`Transceiver`] owns the configuration, one [`DecodeState`] per receive
//! profile and a resampler for input that is not at the native rate. One-shot
//! [`Transceiver::decode`] runs on a fresh set of states; the streaming path
//! keeps them across pushes.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::decode_state::{DecodeState, StepStatus};
use crate::diagnostics::{Diagnostics, NoopDiagnostics};
use crate::error::{AudioModemError, Result};
use crate::framing::encode_frame;
use crate::modulator::FskModulator;
use crate::pcm::f32_to_i16;
use crate::profile::{lookup, ProfileId};
use crate::resample::{resample_audio, StreamResampler};
use crate::SAMPLE_RATE;

/// Runtime configuration of a [`Transceiver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransceiverConfig {
    /// Rate of the audio exchanged with the caller (Hz)
    pub sample_rate: u32,
    /// Profiles listened for by the streaming receiver, in priority order
    pub rx_profiles: Vec<ProfileId>,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            rx_profiles: ProfileId::ALL.to_vec(),
        }
    }
}

struct Receiver {
    state: DecodeState,
    resampler: StreamResampler,
}

/// Encoder and multi-profile receiver behind one handle.
///
/// Each instance is owned by one thread at a time; streaming state lives in
/// the instance and is cleared by [`reset`](Self::reset).
pub struct Transceiver {
    config: TransceiverConfig,
    receivers: Vec<Receiver>,
    pending: VecDeque<Vec<u8>>,
    diagnostics: Box<dyn Diagnostics>,
}

impl Transceiver {
    pub fn new(config: TransceiverConfig) -> Result<Self> {
        Self::with_diagnostics(config, Box::new(NoopDiagnostics))
    }

    pub fn with_diagnostics(config: TransceiverConfig, diagnostics: Box<dyn Diagnostics>) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(AudioModemError::InvalidConfig("sample rate must be positive".to_string()));
        }
        if config.rx_profiles.is_empty() {
            return Err(AudioModemError::InvalidConfig("no receive profiles configured".to_string()));
        }

        let receivers = config
            .rx_profiles
            .iter()
            .map(|&id| Receiver {
                state: DecodeState::new(id),
                resampler: StreamResampler::new(config.sample_rate, id.profile().sample_rate),
            })
            .collect();

        Ok(Self {
            config,
            receivers,
            pending: VecDeque::new(),
            diagnostics,
        })
    }

    pub fn config(&self) -> &TransceiverConfig {
        &self.config
    }

    /// Replace the diagnostics sink; pass [`NoopDiagnostics`] to silence
    /// logging at runtime.
    pub fn set_diagnostics(&mut self, diagnostics: Box<dyn Diagnostics>) {
        self.diagnostics = diagnostics;
    }

    /// Render `payload` as a complete transmission at the configured rate.
    pub fn encode(&self, payload: &[u8], profile_id: impl Into<u8>, volume: f32) -> Result<Vec<f32>> {
        let profile = lookup(profile_id.into())?;
        let frame = encode_frame(payload, profile)?;
        let samples = FskModulator::new(profile).render(&frame, volume)?;

        self.diagnostics.debug(format_args!(
            "{}: encoded {} bytes into {} samples",
            profile.name,
            payload.len(),
            samples.len()
        ));

        Ok(resample_audio(&samples, profile.sample_rate, self.config.sample_rate))
    }

    /// Same as [`encode`](Self::encode), as signed 16-bit PCM.
    pub fn encode_i16(&self, payload: &[u8], profile_id: impl Into<u8>, volume: f32) -> Result<Vec<i16>> {
        self.encode(payload, profile_id, volume).map(|samples| f32_to_i16(&samples))
    }

    /// Decode the first frame found in a complete recording.
    ///
    /// With `profile_id` unset every built-in profile is tried in priority
    /// order. Absence of a frame is `Ok(None)`, not an error.
    pub fn decode(&self, samples: &[f32], profile_id: Option<u8>) -> Result<Option<Vec<u8>>> {
        let candidates = match profile_id {
            Some(id) => vec![ProfileId::try_from(id)?],
            None => ProfileId::ALL.to_vec(),
        };

        for id in candidates {
            let profile = id.profile();
            let audio = resample_audio(samples, self.config.sample_rate, profile.sample_rate);
            let mut state = DecodeState::new(id);

            let mut status = state.step(&audio, self.diagnostics.as_ref());
            loop {
                match status {
                    StepStatus::Pending => break,
                    StepStatus::Decoded(payload) => return Ok(Some(payload)),
                    StepStatus::Failed(_) => status = state.step(&[], self.diagnostics.as_ref()),
                }
            }
        }

        Ok(None)
    }

    /// Feed a chunk of live audio. Returns at most one payload per call;
    /// further payloads completed by the same chunk are queued and returned
    /// by later calls (an empty chunk drains the queue).
    pub fn decode_stream_push(&mut self, chunk: &[f32]) -> Option<Vec<u8>> {
        let diagnostics = self.diagnostics.as_ref();

        for receiver in &mut self.receivers {
            let audio = receiver.resampler.process(chunk);
            let mut status = receiver.state.step(&audio, diagnostics);
            loop {
                match status {
                    StepStatus::Pending => break,
                    StepStatus::Decoded(payload) => self.pending.push_back(payload),
                    StepStatus::Failed(e) => diagnostics.debug(format_args!(
                        "{}: stream frame failed: {}",
                        receiver.state.profile().name,
                        e
                    )),
                }
                status = receiver.state.step(&[], diagnostics);
            }
        }

        self.pending.pop_front()
    }

    /// Receiver states, one per configured profile.
    pub fn decode_states(&self) -> impl Iterator<Item = &DecodeState> {
        self.receivers.iter().map(|r| &r.state)
    }

    /// Discard all buffered audio, partial frames and queued payloads.
    pub fn reset(&mut self) {
        for receiver in &mut self.receivers {
            receiver.state.reset();
            receiver.resampler.reset();
        }
        self.pending.clear();
    }
}
