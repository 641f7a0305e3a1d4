//! Encoder configuration.
//!
//! [`EncoderConfig`] is what the caller supplies. [`StreamParams`] is the
//! validated, resolved form the encoder works from: bitstream codes, frame
//! size and per-channel coefficient counts.

use anyhow::{Result, bail};
use log::debug;

use crate::structs::bsi::{Bsi, ProgramInfo};
use crate::structs::channel::{AudioCodingMode, ChannelLayout};
use crate::utils::errors::ConfigError;
use crate::utils::tables::{
    BIT_RATES_KBPS, FRAME_SAMPLES, LFE_COEFS, MAX_CHANNELS, NB_BANDS, SAMPLE_RATES,
};

/// Codes selecting the masking model constants. Fixed for a whole stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitAllocCodes {
    pub sdecaycod: u8,
    pub fdecaycod: u8,
    pub sgaincod: u8,
    pub dbkneecod: u8,
    pub floorcod: u8,
    /// Fast gain code, shared by all channels.
    pub fgaincod: u8,
}

impl Default for BitAllocCodes {
    fn default() -> Self {
        Self {
            sdecaycod: 2,
            fdecaycod: 1,
            sgaincod: 1,
            dbkneecod: 2,
            floorcod: 4,
            fgaincod: 4,
        }
    }
}

impl BitAllocCodes {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("sdecaycod", self.sdecaycod, 3),
            ("fdecaycod", self.fdecaycod, 3),
            ("sgaincod", self.sgaincod, 3),
            ("dbkneecod", self.dbkneecod, 3),
            ("floorcod", self.floorcod, 7),
            ("fgaincod", self.fgaincod, 7),
        ];

        for (name, value, max) in fields {
            if value > max {
                bail!(ConfigError::InvalidBitAllocationCode { name, value, max });
            }
        }

        Ok(())
    }
}

/// One run of bands whose mask is biased by a delta code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaSegment {
    /// Band offset from the end of the previous segment (5 bits).
    pub offset: u8,
    /// Number of bands (4 bits).
    pub len: u8,
    /// Delta code (3 bits). 0..=3 lower the mask, 4..=7 raise it.
    pub ba: u8,
}

impl DeltaSegment {
    /// Mask adjustment in PSD units.
    pub fn delta(&self) -> i32 {
        if self.ba >= 4 {
            (self.ba as i32 - 3) << 7
        } else {
            (self.ba as i32 - 4) << 7
        }
    }
}

/// Delta bit allocation for one full-bandwidth channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaBitAlloc {
    pub segments: Vec<DeltaSegment>,
}

impl DeltaBitAlloc {
    pub const MAX_SEGMENTS: usize = 8;

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> {
            bail!(ConfigError::InvalidDeltaBitAllocation(msg))
        };

        if self.segments.is_empty() || self.segments.len() > Self::MAX_SEGMENTS {
            return invalid(format!(
                "segment count must be 1 to {}, got {}",
                Self::MAX_SEGMENTS,
                self.segments.len()
            ));
        }

        let mut band = 0usize;
        for (i, seg) in self.segments.iter().enumerate() {
            if seg.offset > 31 || seg.len > 15 || seg.ba > 7 {
                return invalid(format!("segment {i} field out of range: {seg:?}"));
            }

            band += (seg.offset + seg.len) as usize;
            if band > NB_BANDS {
                return invalid(format!("segment {i} ends past band {NB_BANDS}"));
            }
        }

        Ok(())
    }

    /// Bits taken by `deltnseg` and the segments.
    pub fn bits(&self) -> u32 {
        3 + 12 * self.segments.len() as u32
    }
}

/// Caller-facing encoder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub sample_rate: u32,
    /// Target bit rate in bits per second.
    pub bit_rate: u32,
    /// Input channel count, 1 to 6. Six channels means 3/2 plus LFE.
    pub channels: usize,
    /// `chbwcod` for every full-bandwidth channel (0..=60).
    pub bandwidth_code: u8,
    /// Dialog level in -dBFS (1..=31).
    pub dialnorm: u8,
    pub bsmod: u8,
    pub copyright: bool,
    pub original: bool,
    pub bit_alloc: BitAllocCodes,
    /// Per full-bandwidth channel. Missing entries mean no delta allocation.
    pub delta_bit_alloc: Vec<Option<DeltaBitAlloc>>,
}

impl EncoderConfig {
    pub fn new(sample_rate: u32, bit_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            bit_rate,
            channels,
            bandwidth_code: 50,
            dialnorm: 31,
            bsmod: 0,
            copyright: false,
            original: true,
            bit_alloc: BitAllocCodes::default(),
            delta_bit_alloc: Vec::new(),
        }
    }
}

/// Resolved stream parameters derived from an [`EncoderConfig`].
#[derive(Debug, Clone)]
pub struct StreamParams {
    pub layout: ChannelLayout,
    pub sample_rate: u32,
    pub bit_rate: u32,
    pub fscod: u8,
    pub halfratecod: u8,
    pub bsid: u8,
    /// Frame size code of the short frame; an odd value signals padding.
    pub frmsizecod: u8,
    /// Short frame size in 16-bit words.
    pub frame_size_min: usize,
    pub bandwidth_code: u8,
    /// Coefficients coded per channel, in coded channel order.
    pub nb_coefs: [usize; MAX_CHANNELS],
    pub dialnorm: u8,
    pub bsmod: u8,
    pub copyright: bool,
    pub original: bool,
    pub bit_alloc: BitAllocCodes,
    pub delta_bit_alloc: [Option<DeltaBitAlloc>; MAX_CHANNELS],
}

impl StreamParams {
    pub fn resolve(config: &EncoderConfig) -> Result<Self> {
        let layout = ChannelLayout::from_channel_count(config.channels)?;

        let Some((fscod, halfratecod)) = (0..3u8).find_map(|h| {
            SAMPLE_RATES
                .iter()
                .position(|&rate| rate >> h == config.sample_rate)
                .map(|fscod| (fscod as u8, h))
        }) else {
            bail!(ConfigError::UnsupportedSampleRate(config.sample_rate));
        };

        let Some(rate_index) = BIT_RATES_KBPS
            .iter()
            .position(|&kbps| (kbps >> halfratecod) * 1000 == config.bit_rate)
        else {
            bail!(ConfigError::UnsupportedBitRate {
                bit_rate: config.bit_rate,
                sample_rate: config.sample_rate,
            });
        };

        if config.bandwidth_code > 60 {
            bail!(ConfigError::InvalidBandwidthCode(config.bandwidth_code));
        }
        if !(1..=31).contains(&config.dialnorm) {
            bail!(ConfigError::InvalidDialogNormalization(config.dialnorm));
        }
        if config.bsmod > 7 {
            bail!(ConfigError::InvalidBitstreamMode(config.bsmod));
        }
        config.bit_alloc.validate()?;

        let nfchans = layout.full_bandwidth_channels();
        if config.delta_bit_alloc.len() > nfchans {
            bail!(ConfigError::InvalidDeltaBitAllocation(format!(
                "{} entries for {nfchans} full-bandwidth channels",
                config.delta_bit_alloc.len()
            )));
        }

        let mut delta_bit_alloc: [Option<DeltaBitAlloc>; MAX_CHANNELS] = Default::default();
        for (ch, dba) in config.delta_bit_alloc.iter().enumerate() {
            if let Some(dba) = dba {
                dba.validate()?;
                delta_bit_alloc[ch] = Some(dba.clone());
            }
        }

        let mut nb_coefs = [0; MAX_CHANNELS];
        for (ch, coefs) in nb_coefs.iter_mut().enumerate().take(layout.channels()) {
            *coefs = if layout.is_lfe(ch) {
                LFE_COEFS
            } else {
                (config.bandwidth_code as usize + 12) * 3 + 37
            };
        }

        let frame_size_min = (config.bit_rate as u64 * FRAME_SAMPLES as u64
            / (config.sample_rate as u64 * 16)) as usize;

        let params = Self {
            layout,
            sample_rate: config.sample_rate,
            bit_rate: config.bit_rate,
            fscod,
            halfratecod,
            bsid: 8 + halfratecod,
            frmsizecod: (rate_index as u8) << 1,
            frame_size_min,
            bandwidth_code: config.bandwidth_code,
            nb_coefs,
            dialnorm: config.dialnorm,
            bsmod: config.bsmod,
            copyright: config.copyright,
            original: config.original,
            bit_alloc: config.bit_alloc,
            delta_bit_alloc,
        };

        debug!(
            "Resolved stream: fscod {}, bsid {}, frmsizecod {}, {} words/frame, {}",
            params.fscod, params.bsid, params.frmsizecod, params.frame_size_min, params.layout
        );

        Ok(params)
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// The BSI every frame of the stream carries. Mix levels are -4.5 dB
    /// center and -6 dB surround; Dolby Surround is not indicated.
    pub fn bsi(&self) -> Bsi {
        let mode = self.layout.mode;

        Bsi {
            bsid: self.bsid,
            bsmod: self.bsmod,
            acmod: mode,
            cmixlev: mode.has_center().then_some(1),
            surmixlev: mode.has_surround().then_some(1),
            dsurmod: (mode == AudioCodingMode::Stereo).then_some(0),
            lfeon: self.layout.lfe,
            program: ProgramInfo {
                dialnorm: self.dialnorm,
                ..Default::default()
            },
            program2: (mode == AudioCodingMode::DualMono).then(|| ProgramInfo {
                dialnorm: self.dialnorm,
                ..Default::default()
            }),
            copyrightb: self.copyright,
            origbs: self.original,
            timecod1: None,
            timecod2: None,
            addbsi: Vec::new(),
        }
    }
}
