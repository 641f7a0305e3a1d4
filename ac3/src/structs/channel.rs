//! Audio coding modes and channel layouts.
//!
//! Channels are always handled in coded order: the full-bandwidth channels
//! in the order `acmod` defines (L, C, R, Ls, Rs for 3/2), followed by the
//! LFE channel when present.

use std::fmt::Display;

use anyhow::{Result, bail};

use crate::utils::errors::ConfigError;
use crate::utils::tables::ACMOD_CHANNELS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLabel {
    L,
    R,
    C,
    LFE,
    Ls,
    Rs,
    /// Single surround channel of the 2/1 and 3/1 modes.
    S,
    /// First channel of a dual-mono pair.
    Ch1,
    /// Second channel of a dual-mono pair.
    Ch2,
}

/// Full-bandwidth channel arrangement signalled by `acmod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AudioCodingMode {
    DualMono = 0,
    Mono = 1,
    Stereo = 2,
    ThreeFront = 3,
    TwoOne = 4,
    ThreeOne = 5,
    TwoTwo = 6,
    ThreeTwo = 7,
}

impl AudioCodingMode {
    pub fn from_acmod(acmod: u8) -> Result<Self> {
        Ok(match acmod {
            0 => Self::DualMono,
            1 => Self::Mono,
            2 => Self::Stereo,
            3 => Self::ThreeFront,
            4 => Self::TwoOne,
            5 => Self::ThreeOne,
            6 => Self::TwoTwo,
            7 => Self::ThreeTwo,
            _ => bail!("Invalid acmod: {acmod}"),
        })
    }

    pub fn acmod(self) -> u8 {
        self as u8
    }

    pub fn full_bandwidth_channels(self) -> usize {
        ACMOD_CHANNELS[self as usize]
    }

    /// Three front channels: `cmixlev` is present in the BSI.
    pub fn has_center(self) -> bool {
        let acmod = self.acmod();
        acmod & 1 != 0 && acmod != 1
    }

    /// At least one surround channel: `surmixlev` is present in the BSI.
    pub fn has_surround(self) -> bool {
        self.acmod() & 4 != 0
    }

    pub fn labels(self) -> &'static [ChannelLabel] {
        use ChannelLabel::*;

        match self {
            Self::DualMono => &[Ch1, Ch2],
            Self::Mono => &[C],
            Self::Stereo => &[L, R],
            Self::ThreeFront => &[L, C, R],
            Self::TwoOne => &[L, R, S],
            Self::ThreeOne => &[L, C, R, S],
            Self::TwoTwo => &[L, R, Ls, Rs],
            Self::ThreeTwo => &[L, C, R, Ls, Rs],
        }
    }
}

impl Display for AudioCodingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DualMono => "1+1",
            Self::Mono => "1/0",
            Self::Stereo => "2/0",
            Self::ThreeFront => "3/0",
            Self::TwoOne => "2/1",
            Self::ThreeOne => "3/1",
            Self::TwoTwo => "2/2",
            Self::ThreeTwo => "3/2",
        };
        write!(f, "{name}")
    }
}

/// Coding mode plus LFE flag. Fixed for the life of an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub mode: AudioCodingMode,
    pub lfe: bool,
}

impl ChannelLayout {
    /// The canonical layout for an input channel count:
    /// 1/0, 2/0, 3/0, 2/2, 3/2 and 3/2 with LFE.
    pub fn from_channel_count(channels: usize) -> Result<Self> {
        let (mode, lfe) = match channels {
            1 => (AudioCodingMode::Mono, false),
            2 => (AudioCodingMode::Stereo, false),
            3 => (AudioCodingMode::ThreeFront, false),
            4 => (AudioCodingMode::TwoTwo, false),
            5 => (AudioCodingMode::ThreeTwo, false),
            6 => (AudioCodingMode::ThreeTwo, true),
            _ => bail!(ConfigError::UnsupportedChannelCount(channels)),
        };

        Ok(Self { mode, lfe })
    }

    pub fn full_bandwidth_channels(&self) -> usize {
        self.mode.full_bandwidth_channels()
    }

    pub fn channels(&self) -> usize {
        self.full_bandwidth_channels() + self.lfe as usize
    }

    pub fn lfe_channel(&self) -> Option<usize> {
        self.lfe.then(|| self.full_bandwidth_channels())
    }

    pub fn is_lfe(&self, ch: usize) -> bool {
        self.lfe_channel() == Some(ch)
    }

    pub fn labels(&self) -> Vec<ChannelLabel> {
        let mut labels = self.mode.labels().to_vec();
        if self.lfe {
            labels.push(ChannelLabel::LFE);
        }

        labels
    }
}

impl Display for ChannelLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.lfe {
            write!(f, "{} + LFE", self.mode)
        } else {
            write!(f, "{}", self.mode)
        }
    }
}
