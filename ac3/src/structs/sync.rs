//! Synchronization information.
//!
//! Every frame opens with the 16-bit syncword `0x0B77`, CRC1, the sample
//! rate code and the frame size code. Together the two codes give the frame
//! length, which is all a demuxer needs to walk a stream.

use anyhow::{Result, bail};

use crate::utils::bitstream_io::{BitstreamIoWriter, BsIoSliceReader};
use crate::utils::errors::SyncError;
use crate::utils::tables::{BIT_RATES_KBPS, FRAME_SIZE_WORDS, SAMPLE_RATES};

pub const SYNC_WORD: u16 = 0x0B77;

/// syncinfo(): syncword, crc1, fscod, frmsizecod.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncInfo {
    pub crc1: u16,
    pub fscod: u8,
    pub frmsizecod: u8,
}

impl SyncInfo {
    pub const BITS: u32 = 40;

    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let syncword = reader.get_n::<u16>(16)?;
        if syncword != SYNC_WORD {
            bail!(SyncError::InvalidSyncWord(syncword));
        }

        let crc1 = reader.get_n(16)?;

        let fscod = reader.get_n(2)?;
        if fscod == 3 {
            bail!(SyncError::ReservedSampleRate(fscod));
        }

        let frmsizecod = reader.get_n(6)?;
        if frmsizecod >= 38 {
            bail!(SyncError::ReservedFrameSize(frmsizecod));
        }

        Ok(Self {
            crc1,
            fscod,
            frmsizecod,
        })
    }

    pub fn write(&self, writer: &mut BitstreamIoWriter) -> Result<()> {
        writer.put_n(16, SYNC_WORD)?;
        writer.put_n(16, self.crc1)?;
        writer.put_n(2, self.fscod)?;
        writer.put_n(6, self.frmsizecod)?;
        Ok(())
    }

    /// Frame length in 16-bit words.
    pub fn frame_size_words(&self) -> Option<usize> {
        frame_size_words(self.fscod, self.frmsizecod)
    }

    /// Sample rate before any `bsid` rate reduction.
    pub fn nominal_sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.fscod as usize]
    }

    /// Bit rate in kbps before any `bsid` rate reduction.
    pub fn nominal_bit_rate_kbps(&self) -> u32 {
        BIT_RATES_KBPS[(self.frmsizecod >> 1) as usize]
    }
}

/// Frame length in 16-bit words for a sample rate and frame size code.
///
/// At 44.1 kHz the odd codes carry one extra word of padding.
pub fn frame_size_words(fscod: u8, frmsizecod: u8) -> Option<usize> {
    let row = FRAME_SIZE_WORDS.get(fscod as usize)?;
    let words = *row.get((frmsizecod >> 1) as usize)? as usize;

    Some(words + (fscod == 1 && frmsizecod & 1 != 0) as usize)
}
