//! Per-frame working data.
//!
//! A frame holds six audio blocks, each with one [`ChannelBlock`] per coded
//! channel. The transform fills coefficients and raw exponents, the exponent
//! model fills strategies and encoded exponents, and the allocator produces
//! a [`BapTable`] next to it.

use crate::utils::tables::{BLOCK_SAMPLES, MAX_CHANNELS, NB_BLOCKS};

/// Exponent that marks a coefficient as silent.
pub const SILENT_EXPONENT: u8 = 24;

/// Exponent coding strategy of one channel in one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExpStrategy {
    /// Exponents of the previous block are reused.
    #[default]
    Reuse = 0,
    D15 = 1,
    D25 = 2,
    D45 = 3,
}

impl ExpStrategy {
    /// The 2-bit `chexpstr` code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Coefficients sharing one coded exponent, 0 for [`ExpStrategy::Reuse`].
    pub fn group_size(self) -> usize {
        match self {
            Self::Reuse => 0,
            Self::D15 => 1,
            Self::D25 => 2,
            Self::D45 => 4,
        }
    }

    pub fn is_reuse(self) -> bool {
        self == Self::Reuse
    }
}

/// Transform output and exponents of one channel in one block.
#[derive(Debug, Clone)]
pub struct ChannelBlock {
    /// Fixed-point coefficients, scaled by `2^exp_bias` relative to the
    /// 24-bit mantissa lattice.
    pub coefs: [i32; BLOCK_SAMPLES],
    /// Raw exponents derived from `coefs`.
    pub exps: [u8; BLOCK_SAMPLES],
    /// Exponents as the decoder reconstructs them.
    pub encoded_exps: [u8; BLOCK_SAMPLES],
    /// Normalization shift folded out of the exponents.
    pub exp_bias: i8,
    pub strategy: ExpStrategy,
}

impl Default for ChannelBlock {
    fn default() -> Self {
        Self {
            coefs: [0; BLOCK_SAMPLES],
            exps: [SILENT_EXPONENT; BLOCK_SAMPLES],
            encoded_exps: [SILENT_EXPONENT; BLOCK_SAMPLES],
            exp_bias: 0,
            strategy: ExpStrategy::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioBlock {
    pub channels: [ChannelBlock; MAX_CHANNELS],
}

/// The six audio blocks of one frame. Built fresh for every encode call.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub blocks: Box<[AudioBlock; NB_BLOCKS]>,
}

impl Default for AudioFrame {
    fn default() -> Self {
        Self {
            blocks: Box::default(),
        }
    }
}

impl AudioFrame {
    /// Strategies of one channel across the frame.
    pub fn strategies(&self, ch: usize) -> [ExpStrategy; NB_BLOCKS] {
        std::array::from_fn(|blk| self.blocks[blk].channels[ch].strategy)
    }

    /// True when the first `channels` channels hold no signal at all.
    pub fn is_silent(&self, channels: usize) -> bool {
        self.blocks
            .iter()
            .all(|block| block.channels[..channels].iter().all(|ch| ch.coefs.iter().all(|&c| c == 0)))
    }
}

/// Bit-allocation pointers indexed by block, channel and coefficient.
pub type BapTable = [[[u8; BLOCK_SAMPLES]; MAX_CHANNELS]; NB_BLOCKS];

/// A zeroed, heap-allocated [`BapTable`].
pub fn bap_table() -> Box<BapTable> {
    Box::new([[[0; BLOCK_SAMPLES]; MAX_CHANNELS]; NB_BLOCKS])
}
