use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioModemError {
    #[error("Unknown profile id {0}")]
    UnknownProfile(u8),

    #[error("Invalid volume {0}: expected a value in [0, 1]")]
    InvalidVolume(f32),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Checksum mismatch in frame body")]
    ChecksumFailure,

    #[error("Reed-Solomon block {block} is uncorrectable")]
    UncorrectableBlock { block: usize },

    #[error("Declared frame length {declared} exceeds profile maximum {max}")]
    InvalidLength { declared: usize, max: usize },

    #[error("Frame truncated: {received} of {expected} bytes")]
    TruncatedFrame { received: usize, expected: usize },

    #[error("Symbol energy too weak to demodulate")]
    WeakSignal,

    #[error("Invalid input size")]
    InvalidInputSize,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("FFT error: {0}")]
    FftError(String),
}

impl AudioModemError {
    /// Errors caused by the caller's arguments rather than the channel.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownProfile(_)
                | Self::InvalidVolume(_)
                | Self::PayloadTooLarge { .. }
                | Self::InvalidConfig(_)
        )
    }

    /// Errors raised while reconstructing a received frame. The receiver
    /// reports these and keeps listening.
    pub fn is_frame_failure(&self) -> bool {
        matches!(
            self,
            Self::ChecksumFailure
                | Self::UncorrectableBlock { .. }
                | Self::InvalidLength { .. }
                | Self::TruncatedFrame { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AudioModemError>;
