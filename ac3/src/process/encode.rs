use anyhow::{Result, bail};
use log::{debug, info};

use crate::process::allocate::{Allocation, AllocationSearch, INITIAL_CSNR, masking_curves};
use crate::process::assemble::FrameAssembler;
use crate::process::exponent::process_exponents;
use crate::process::masking::BitAllocParams;
use crate::process::transform::Transform;
use crate::structs::block::{AudioFrame, BapTable, ExpStrategy};
use crate::structs::config::{EncoderConfig, StreamParams};
use crate::utils::errors::EncodeError;
use crate::utils::tables::{BLOCK_SAMPLES, FRAME_SAMPLES, MAX_CHANNELS, NB_BLOCKS};
use crate::utils::timing::FramePacer;

/// Encodes interleaved 16-bit PCM into AC-3 frames.
///
/// Every call consumes 1536 samples per channel, interleaved in coded
/// channel order (L, C, R, Ls, Rs, LFE for 3/2 with LFE), and returns one
/// complete frame.
///
/// # Example
///
/// ```rust
/// use ac3::process::encode::Encoder;
/// use ac3::structs::config::EncoderConfig;
///
/// let mut encoder = Encoder::new(EncoderConfig::new(48000, 192000, 2))?;
/// let silence = vec![0i16; encoder.samples_per_frame()];
///
/// let frame = encoder.encode(&silence)?;
/// assert_eq!(frame.data.len(), 768);
/// assert_eq!(&frame.data[..2], &[0x0B, 0x77]);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct Encoder {
    params: StreamParams,
    bit_alloc: BitAllocParams,
    transform: Transform,
    assembler: FrameAssembler,
    state: EncoderState,
}

/// State carried from one frame to the next.
#[derive(Debug, Clone)]
pub struct EncoderState {
    /// Last half-block of input per channel.
    pub history: [[i16; BLOCK_SAMPLES]; MAX_CHANNELS],
    pub pacer: FramePacer,
    /// Starting point of the next SNR offset search.
    pub csnroffst: u8,
    pub frames_encoded: u64,
}

impl Default for EncoderState {
    fn default() -> Self {
        Self {
            history: [[0; BLOCK_SAMPLES]; MAX_CHANNELS],
            pacer: FramePacer::default(),
            csnroffst: INITIAL_CSNR,
            frames_encoded: 0,
        }
    }
}

/// One encoded frame with the decisions that shaped it.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    /// Frame length in 16-bit words.
    pub frame_size: usize,
    pub csnroffst: u8,
    pub fsnroffst: u8,
    /// Exponent strategies, one row per coded channel.
    pub strategies: Vec<[ExpStrategy; NB_BLOCKS]>,
    pub bap: Box<BapTable>,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let params = StreamParams::resolve(&config)?;
        let bit_alloc = BitAllocParams::new(&params.bit_alloc, params.fscod, params.halfratecod);

        info!(
            "AC-3 encoder: {} Hz, {} kbps, {} ({} channels)",
            params.sample_rate,
            params.bit_rate / 1000,
            params.layout,
            params.channels()
        );

        Ok(Self {
            assembler: FrameAssembler::new(&params),
            params,
            bit_alloc,
            transform: Transform::new(),
            state: EncoderState::default(),
        })
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    pub fn state(&self) -> &EncoderState {
        &self.state
    }

    /// Interleaved samples expected by [`Encoder::encode`].
    pub fn samples_per_frame(&self) -> usize {
        self.params.channels() * FRAME_SAMPLES
    }

    pub fn encode(&mut self, samples: &[i16]) -> Result<EncodedFrame> {
        let channels = self.params.channels();
        let expected = self.samples_per_frame();
        if samples.len() != expected {
            bail!(EncodeError::InputLength {
                expected,
                actual: samples.len()
            });
        }

        let mut frame = AudioFrame::default();
        for (block, input) in frame
            .blocks
            .iter_mut()
            .zip(samples.chunks_exact(channels * BLOCK_SAMPLES))
        {
            for ch in 0..channels {
                self.transform.analyze(
                    &mut self.state.history[ch],
                    input.iter().skip(ch).step_by(channels).copied(),
                    &mut block.channels[ch],
                );
            }
        }

        process_exponents(&mut frame, &self.params.layout, &self.params.nb_coefs);

        let params = &self.params;
        let frame_size = self
            .state
            .pacer
            .next_frame_size(params.frame_size_min, params.bit_rate, params.sample_rate);

        let overhead = self.assembler.overhead_bits(&frame);
        let capacity = 16 * frame_size as u32;
        if overhead > capacity {
            debug!("Side information alone takes {overhead} of {capacity} bits");
            bail!(EncodeError::BitAllocationExhausted { frame_size });
        }

        // Coded exponents of silence still carry a little energy near DC,
        // so silent frames skip the search instead of allocating to it.
        let alloc = if frame.is_silent(channels) {
            Allocation::zero()
        } else {
            let curves = masking_curves(params, &self.bit_alloc, &frame);
            let search = AllocationSearch::new(&self.bit_alloc, &curves, capacity - overhead);
            let alloc = search.run(self.state.csnroffst, frame_size)?;
            self.state.csnroffst = alloc.csnroffst;
            alloc
        };

        let data = self.assembler.assemble(&frame, &alloc, frame_size)?;

        self.state
            .pacer
            .advance(frame_size, params.bit_rate, params.sample_rate);
        self.state.frames_encoded += 1;

        debug!(
            "Frame {}: {} words, {} side bits, {} mantissa bits",
            self.state.frames_encoded - 1,
            frame_size,
            overhead,
            alloc.mantissa_bits
        );

        Ok(EncodedFrame {
            data,
            frame_size,
            csnroffst: alloc.csnroffst,
            fsnroffst: alloc.fsnroffst,
            strategies: (0..channels).map(|ch| frame.strategies(ch)).collect(),
            bap: alloc.bap,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;
    use crate::process::assemble::crc1_words;
    use crate::utils::crc::Crc16;

    fn sine(freq: f64, sample_rate: f64, amplitude: f64, frames: usize) -> Vec<i16> {
        (0..frames * FRAME_SAMPLES)
            .map(|n| ((2.0 * PI * freq * n as f64 / sample_rate).sin() * amplitude) as i16)
            .collect()
    }

    #[test]
    fn silent_stereo_frame() -> Result<()> {
        let mut encoder = Encoder::new(EncoderConfig::new(44100, 64000, 2))?;
        let frame = encoder.encode(&[0; 2 * FRAME_SAMPLES])?;

        assert_eq!(frame.frame_size, 139);
        assert_eq!(frame.data.len(), 2 * encoder.params().frame_size_min);
        assert!(frame.bap.iter().flatten().flatten().all(|&b| b == 0));
        assert_eq!((frame.csnroffst, frame.fsnroffst), (0, 0));
        assert_eq!(encoder.state().csnroffst, INITIAL_CSNR);

        for strategies in &frame.strategies {
            assert_eq!(strategies[0], ExpStrategy::D45);
            assert!(strategies[1..].iter().all(|s| s.is_reuse()));
        }

        // 483 bits of headers and exponents, then zeros up to CRC2.
        let first_pad_byte = 483usize.div_ceil(8);
        assert!(frame.data[first_pad_byte..frame.data.len() - 2].iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn tone_is_allocated_at_its_bin() -> Result<()> {
        let input = sine(1000.0, 44100.0, 16000.0, 2);
        let mut encoder = Encoder::new(EncoderConfig::new(44100, 64000, 1))?;

        encoder.encode(&input[..FRAME_SAMPLES])?;
        let frame = encoder.encode(&input[FRAME_SAMPLES..])?;

        // 1 kHz falls in bin 11 at 86.13 Hz per bin.
        for blk in 0..NB_BLOCKS {
            let bap = &frame.bap[blk][0];
            assert!(bap[10..=13].iter().all(|&b| b > 0), "block {blk}: {:?}", &bap[10..=13]);
            assert!(bap[64..].iter().all(|&b| b == 0), "block {blk}");
        }
        Ok(())
    }

    #[test]
    fn frames_carry_valid_crcs() -> Result<()> {
        let input = sine(440.0, 48000.0, 12000.0, 3);
        let stereo: Vec<i16> = input.iter().flat_map(|&s| [s, s / 2]).collect();
        let mut encoder = Encoder::new(EncoderConfig::new(48000, 192000, 2))?;
        let crc = Crc16::default();

        for chunk in stereo.chunks_exact(encoder.samples_per_frame()) {
            let frame = encoder.encode(chunk)?;
            assert_eq!(frame.data.len(), 768);
            assert_eq!(crc.checksum(&frame.data[2..2 * crc1_words(384)]), 0);
            assert_eq!(crc.checksum(&frame.data[2..]), 0);
        }
        Ok(())
    }

    #[test]
    fn encoding_is_deterministic() -> Result<()> {
        let input = sine(3000.0, 32000.0, 20000.0, 3);
        let mut first = Encoder::new(EncoderConfig::new(32000, 96000, 1))?;
        let mut second = Encoder::new(EncoderConfig::new(32000, 96000, 1))?;

        for chunk in input.chunks_exact(FRAME_SAMPLES) {
            let a = first.encode(chunk)?;
            let b = second.encode(chunk)?;
            assert_eq!(a.data, b.data);
            assert_eq!(a.bap, b.bap);
        }
        assert_eq!(first.state().frames_encoded, 3);
        Ok(())
    }

    #[test]
    fn padding_follows_the_bit_rate() -> Result<()> {
        let mut encoder = Encoder::new(EncoderConfig::new(44100, 64000, 2))?;
        let silence = vec![0; encoder.samples_per_frame()];

        let sizes = (0..5)
            .map(|_| encoder.encode(&silence).map(|frame| frame.data.len()))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(sizes, [278, 280, 278, 278, 280]);
        Ok(())
    }

    #[test]
    fn six_channels_with_lfe() -> Result<()> {
        let tone = sine(100.0, 48000.0, 8000.0, 1);
        let input: Vec<i16> = tone.iter().flat_map(|&s| [s, 0, s, 0, 0, s]).collect();

        let mut encoder = Encoder::new(EncoderConfig::new(48000, 448000, 6))?;
        let frame = encoder.encode(&input)?;

        assert_eq!(frame.data.len(), 1792);
        assert_eq!(frame.strategies.len(), 6);
        assert!(frame.strategies[5].iter().all(|&s| s == ExpStrategy::D15 || s.is_reuse()));
        assert!(frame.bap.iter().all(|block| block[5][7..].iter().all(|&b| b == 0)));
        Ok(())
    }

    #[test]
    fn wrong_input_length_is_rejected() -> Result<()> {
        let mut encoder = Encoder::new(EncoderConfig::new(48000, 192000, 2))?;
        let err = encoder.encode(&[0; FRAME_SAMPLES]).unwrap_err();

        assert_eq!(
            err.downcast_ref::<EncodeError>(),
            Some(&EncodeError::InputLength {
                expected: 2 * FRAME_SAMPLES,
                actual: FRAME_SAMPLES
            })
        );
        Ok(())
    }
}
