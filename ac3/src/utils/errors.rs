#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("Unsupported bit rate {bit_rate} bps at {sample_rate} Hz")]
    UnsupportedBitRate { bit_rate: u32, sample_rate: u32 },

    #[error("Unsupported channel count: {0} (expected 1 to 6)")]
    UnsupportedChannelCount(usize),

    #[error("Bandwidth code must be between 0 and 60. Got {0}")]
    InvalidBandwidthCode(u8),

    #[error("Dialog normalization must be between 1 and 31. Got {0}")]
    InvalidDialogNormalization(u8),

    #[error("Bitstream mode must be between 0 and 7. Got {0}")]
    InvalidBitstreamMode(u8),

    #[error("{name} must be at most {max}. Got {value}")]
    InvalidBitAllocationCode {
        name: &'static str,
        value: u8,
        max: u8,
    },

    #[error("Invalid delta bit allocation: {0}")]
    InvalidDeltaBitAllocation(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Expected {expected} interleaved samples per frame, got {actual}")]
    InputLength { expected: usize, actual: usize },

    #[error("No SNR offset fits the frame budget of {frame_size} words")]
    BitAllocationExhausted { frame_size: usize },

    #[error("Frame payload of {bits} bits exceeds the {capacity} bits available")]
    FrameOverflow { bits: u64, capacity: u64 },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Insufficient buffer data for frame extraction")]
    InsufficientData,

    #[error("Reserved frame size: fscod = {fscod}, frmsizecod = {frmsizecod}")]
    InvalidFrameSize { fscod: u8, frmsizecod: u8 },

    #[error("CRC1 check failed for frame")]
    Crc1Mismatch,

    #[error("CRC2 check failed for frame")]
    Crc2Mismatch,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SyncError {
    #[error("Invalid syncword. Read {0:#06X}, expected 0x0B77")]
    InvalidSyncWord(u16),

    #[error("Reserved fscod {0}")]
    ReservedSampleRate(u8),

    #[error("Reserved frmsizecod {0}")]
    ReservedFrameSize(u8),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BsiError {
    #[error("Unsupported bsid {0} (expected at most 10)")]
    UnsupportedBitstreamId(u8),

    #[error("dialnorm value 0 is reserved")]
    ReservedDialogNormalization,
}
