//! Frame assembly.
//!
//! Writes syncinfo, the BSI and the six audio blocks, pads the frame to its
//! exact size and fills in both CRC words. The side information emitted here
//! is mirrored by [`FrameAssembler::overhead_bits`], which the allocator
//! subtracts from the frame before sizing mantissas.

use anyhow::{Result, bail};
use log::trace;

use crate::process::allocate::Allocation;
use crate::process::exponent::{exponent_bits, group_exponents};
use crate::process::mantissa::MantissaPacker;
use crate::structs::block::{AudioBlock, AudioFrame};
use crate::structs::bsi::Bsi;
use crate::structs::channel::AudioCodingMode;
use crate::structs::config::StreamParams;
use crate::structs::sync::{SYNC_WORD, SyncInfo};
use crate::utils::bitstream_io::BitstreamIoWriter;
use crate::utils::crc::{CRC16_AC3_ALG, Crc16};
use crate::utils::errors::EncodeError;

/// auxdatae, crcrsv and crc2.
pub const FRAME_END_BITS: u32 = 18;

/// Rematrixing bands when coupling is off.
const REMAT_BANDS: u32 = 4;

/// Words covered by CRC1: the first 5/8 of the frame.
pub fn crc1_words(frame_size: usize) -> usize {
    (frame_size >> 1) + (frame_size >> 3)
}

#[derive(Debug)]
pub struct FrameAssembler {
    params: StreamParams,
    bsi: Bsi,
    crc: Crc16,
}

impl FrameAssembler {
    pub fn new(params: &StreamParams) -> Self {
        Self {
            params: params.clone(),
            bsi: params.bsi(),
            crc: Crc16::new(&CRC16_AC3_ALG),
        }
    }

    pub fn bsi(&self) -> &Bsi {
        &self.bsi
    }

    fn nfchans(&self) -> usize {
        self.params.layout.full_bandwidth_channels()
    }

    fn has_delta(&self) -> bool {
        self.params.delta_bit_alloc.iter().any(Option::is_some)
    }

    /// Every bit of the frame except the mantissas.
    pub fn overhead_bits(&self, frame: &AudioFrame) -> u32 {
        let nfchans = self.nfchans() as u32;
        let channels = self.params.channels() as u32;
        let acmod = self.params.layout.mode;

        let mut bits = SyncInfo::BITS + self.bsi.bits();

        for (blk, block) in frame.blocks.iter().enumerate() {
            let first = blk == 0;

            // blksw, dithflag, dynrnge
            bits += 2 * nfchans + 1;
            if acmod == AudioCodingMode::DualMono {
                bits += 1;
            }

            // cplstre, cplinu
            bits += 1 + first as u32;

            if acmod == AudioCodingMode::Stereo {
                bits += 1 + if first { REMAT_BANDS } else { 0 };
            }

            // chexpstr, lfeexpstr
            bits += 2 * nfchans + self.params.layout.lfe as u32;

            for ch in 0..self.params.channels() {
                let strategy = block.channels[ch].strategy;
                if strategy.is_reuse() {
                    continue;
                }

                bits += exponent_bits(self.params.nb_coefs[ch], strategy);
                if !self.params.layout.is_lfe(ch) {
                    // chbwcod, gainrng
                    bits += 6 + 2;
                }
            }

            // baie, snroffste, deltbaie, skiple
            bits += 4;
            if first {
                bits += 2 + 2 + 2 + 2 + 3;
                bits += 6 + 7 * channels;

                if self.has_delta() {
                    bits += 2 * nfchans;
                    bits += self
                        .params
                        .delta_bit_alloc
                        .iter()
                        .flatten()
                        .map(|dba| dba.bits())
                        .sum::<u32>();
                }
            }
        }

        bits + FRAME_END_BITS
    }

    /// Writes one complete frame of `frame_size` words.
    pub fn assemble(&self, frame: &AudioFrame, alloc: &Allocation, frame_size: usize) -> Result<Vec<u8>> {
        let frame_bytes = 2 * frame_size;
        let capacity = 16 * frame_size as u64;

        let sync = SyncInfo {
            crc1: 0,
            fscod: self.params.fscod,
            frmsizecod: self.params.frmsizecod + (frame_size - self.params.frame_size_min) as u8,
        };

        let mut writer = BitstreamIoWriter::with_capacity(frame_bytes);
        sync.write(&mut writer)?;
        self.bsi.write(&mut writer)?;

        for (blk, block) in frame.blocks.iter().enumerate() {
            self.write_block(&mut writer, blk, block, alloc)?;
        }

        let bits = writer.position() + FRAME_END_BITS as u64;
        if bits > capacity {
            bail!(EncodeError::FrameOverflow { bits, capacity });
        }
        trace!("Frame payload {bits} of {capacity} bits");

        let mut data = writer.into_bytes()?;
        data.resize(frame_bytes - 2, 0);
        self.fill_crcs(&mut data, frame_size);

        Ok(data)
    }

    fn write_block(
        &self,
        writer: &mut BitstreamIoWriter,
        blk: usize,
        block: &AudioBlock,
        alloc: &Allocation,
    ) -> Result<()> {
        let params = &self.params;
        let nfchans = self.nfchans();
        let channels = params.channels();
        let acmod = params.layout.mode;
        let first = blk == 0;

        for _ in 0..nfchans {
            writer.put(false)?;
        }
        for _ in 0..nfchans {
            writer.put(true)?;
        }
        writer.put(false)?;
        if acmod == AudioCodingMode::DualMono {
            writer.put(false)?;
        }

        // Coupling is never used: signalled once in block 0.
        writer.put(first)?;
        if first {
            writer.put(false)?;
        }

        if acmod == AudioCodingMode::Stereo {
            writer.put(first)?;
            if first {
                writer.put_n(REMAT_BANDS, 0u8)?;
            }
        }

        for ch in 0..nfchans {
            writer.put_n(2, block.channels[ch].strategy.code())?;
        }
        if let Some(lfe) = params.layout.lfe_channel() {
            writer.put(!block.channels[lfe].strategy.is_reuse())?;
        }

        for ch in 0..nfchans {
            if !block.channels[ch].strategy.is_reuse() {
                writer.put_n(6, params.bandwidth_code)?;
            }
        }

        for ch in 0..channels {
            let channel = &block.channels[ch];
            if channel.strategy.is_reuse() {
                continue;
            }

            let (dc, words) = group_exponents(&channel.encoded_exps, params.nb_coefs[ch], channel.strategy);
            writer.put_n(4, dc)?;
            for word in words {
                writer.put_n(7, word)?;
            }
            if !params.layout.is_lfe(ch) {
                writer.put_n(2, 0u8)?;
            }
        }

        writer.put(first)?;
        if first {
            let codes = &params.bit_alloc;
            writer.put_n(2, codes.sdecaycod)?;
            writer.put_n(2, codes.fdecaycod)?;
            writer.put_n(2, codes.sgaincod)?;
            writer.put_n(2, codes.dbkneecod)?;
            writer.put_n(3, codes.floorcod)?;
        }

        writer.put(first)?;
        if first {
            writer.put_n(6, alloc.csnroffst)?;
            for _ in 0..channels {
                writer.put_n(4, alloc.fsnroffst)?;
                writer.put_n(3, params.bit_alloc.fgaincod)?;
            }
        }

        let delta = first && self.has_delta();
        writer.put(delta)?;
        if delta {
            let deltas = &params.delta_bit_alloc[..nfchans];
            for dba in deltas {
                // deltbae: 1 is a new allocation, 2 is none.
                writer.put_n(2, if dba.is_some() { 1u8 } else { 2 })?;
            }
            for dba in deltas.iter().flatten() {
                writer.put_n(3, (dba.segments.len() - 1) as u8)?;
                for seg in &dba.segments {
                    writer.put_n(5, seg.offset)?;
                    writer.put_n(4, seg.len)?;
                    writer.put_n(3, seg.ba)?;
                }
            }
        }

        // skiple
        writer.put(false)?;

        let mut packer = MantissaPacker::new();
        for ch in 0..channels {
            let channel = &block.channels[ch];
            let nb = params.nb_coefs[ch];
            packer.push_channel(
                &channel.coefs[..nb],
                &channel.encoded_exps[..nb],
                channel.exp_bias,
                &alloc.bap[blk][ch][..nb],
            );
        }
        for word in packer.into_words() {
            writer.put_n(word.bits, word.value)?;
        }

        Ok(())
    }

    /// Fills CRC1 at bytes 2..4 and appends crcrsv and CRC2.
    ///
    /// `data` holds everything up to CRC2 with auxdatae and crcrsv zeroed.
    fn fill_crcs(&self, data: &mut Vec<u8>, frame_size: usize) {
        let crc1_end = 2 * crc1_words(frame_size);

        let crc1 = self.crc.checksum(&data[4..crc1_end]);
        let crc1 = self.crc.leading(crc1, ((crc1_end - 4) * 8) as u32);
        data[2..4].copy_from_slice(&crc1.to_be_bytes());

        let mut crc2 = self.crc.checksum(&data[crc1_end..]);
        if crc2 == SYNC_WORD {
            // Keeps the syncword from appearing at the end of the frame.
            if let Some(last) = data.last_mut() {
                *last |= 1;
            }
            crc2 = self.crc.checksum(&data[crc1_end..]);
        }
        data.extend_from_slice(&crc2.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::exponent::process_exponents;
    use crate::process::masking::BitAllocParams;
    use crate::structs::config::{DeltaBitAlloc, DeltaSegment, EncoderConfig};
    use crate::utils::bitstream_io::BsIoSliceReader;

    fn silent_frame(params: &StreamParams) -> AudioFrame {
        let mut frame = AudioFrame::default();
        process_exponents(&mut frame, &params.layout, &params.nb_coefs);
        frame
    }


    #[test]
    fn silent_stereo_overhead() -> Result<()> {
        let params = StreamParams::resolve(&EncoderConfig::new(44100, 64000, 2))?;
        let assembler = FrameAssembler::new(&params);
        let frame = silent_frame(&params);

        // 67 header, 341 for block 0, 15 per later block, 18 at the end.
        assert_eq!(assembler.overhead_bits(&frame), 67 + 341 + 5 * 15 + 18);
        Ok(())
    }

    #[test]
    fn frame_has_exact_size_and_valid_crcs() -> Result<()> {
        let params = StreamParams::resolve(&EncoderConfig::new(44100, 64000, 2))?;
        let assembler = FrameAssembler::new(&params);
        let frame = silent_frame(&params);

        for frame_size in [139, 140] {
            let data = assembler.assemble(&frame, &Allocation::zero(), frame_size)?;
            assert_eq!(data.len(), 2 * frame_size);
            assert_eq!(&data[..2], &[0x0B, 0x77]);

            let crc = Crc16::default();
            let crc1_end = 2 * crc1_words(frame_size);
            assert_eq!(crc.checksum(&data[2..crc1_end]), 0);
            assert_eq!(crc.checksum(&data[2..]), 0);

            let sync = SyncInfo::read(&mut BsIoSliceReader::from_slice(&data))?;
            assert_eq!(sync.frame_size_words(), Some(frame_size));
        }
        Ok(())
    }

    #[test]
    fn written_bits_match_the_accounting() -> Result<()> {
        let mut config = EncoderConfig::new(48000, 384000, 6);
        config.delta_bit_alloc = vec![
            None,
            Some(DeltaBitAlloc {
                segments: vec![
                    DeltaSegment {
                        offset: 3,
                        len: 4,
                        ba: 5,
                    },
                    DeltaSegment {
                        offset: 1,
                        len: 2,
                        ba: 1,
                    },
                ],
            }),
        ];
        let params = StreamParams::resolve(&config)?;
        let assembler = FrameAssembler::new(&params);
        let frame = silent_frame(&params);

        let mut writer = BitstreamIoWriter::with_capacity(2 * params.frame_size_min);
        SyncInfo::default().write(&mut writer)?;
        assembler.bsi().write(&mut writer)?;
        for (blk, block) in frame.blocks.iter().enumerate() {
            assembler.write_block(&mut writer, blk, block, &Allocation::zero())?;
        }

        assert_eq!(
            writer.position() + FRAME_END_BITS as u64,
            assembler.overhead_bits(&frame) as u64
        );
        Ok(())
    }

    #[test]
    fn mantissas_are_counted_once() -> Result<()> {
        let params = StreamParams::resolve(&EncoderConfig::new(48000, 192000, 1))?;
        let assembler = FrameAssembler::new(&params);
        let frame = silent_frame(&params);

        let mut alloc = Allocation::zero();
        for k in 0..30 {
            alloc.bap[2][0][k] = [1, 2, 3, 4, 5, 6][k % 6];
        }

        let mut writer = BitstreamIoWriter::with_capacity(2 * params.frame_size_min);
        for (blk, block) in frame.blocks.iter().enumerate() {
            assembler.write_block(&mut writer, blk, block, &alloc)?;
        }
        let side = writer.position();

        let mut writer = BitstreamIoWriter::with_capacity(2 * params.frame_size_min);
        for (blk, block) in frame.blocks.iter().enumerate() {
            assembler.write_block(&mut writer, blk, block, &Allocation::zero())?;
        }

        // Five bap 1 or bap 2 mantissas fill two words, five bap 4 fill three.
        let mantissas = 2 * 5 + 2 * 7 + 5 * 3 + 3 * 7 + 5 * 4 + 5 * 5;
        assert_eq!(side - writer.position(), mantissas);
        Ok(())
    }

    #[test]
    fn overflow_is_reported() -> Result<()> {
        let params = StreamParams::resolve(&EncoderConfig::new(44100, 64000, 2))?;
        let assembler = FrameAssembler::new(&params);
        let frame = silent_frame(&params);

        let mut alloc = Allocation::zero();
        alloc.bap[0][0][..223].fill(15);

        let err = assembler.assemble(&frame, &alloc, 139).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EncodeError>(),
            Some(EncodeError::FrameOverflow { capacity: 2224, .. })
        ));
        Ok(())
    }

    #[test]
    fn bit_alloc_params_follow_the_stream() -> Result<()> {
        let params = StreamParams::resolve(&EncoderConfig::new(22050, 32000, 2))?;
        let bit_alloc = BitAllocParams::new(&params.bit_alloc, params.fscod, params.halfratecod);
        assert_eq!((bit_alloc.fscod, bit_alloc.halfratecod), (1, 1));
        assert_eq!(FrameAssembler::new(&params).bsi().bsid, 9);
        Ok(())
    }
}
