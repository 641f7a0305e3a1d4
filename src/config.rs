//! Encoding profiles loaded from YAML.
//!
//! Every field is optional. Values given on the command line take precedence
//! over the profile, and the profile over the library defaults.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use ac3::structs::config::{BitAllocCodes, DeltaBitAlloc, DeltaSegment, EncoderConfig};

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Bit rate in bits per second.
    pub bitrate: Option<u32>,
    /// Full-bandwidth channel bandwidth code (chbwcod).
    pub bandwidth: Option<u8>,
    pub dialnorm: Option<u8>,
    pub bsmod: Option<u8>,
    pub copyright: Option<bool>,
    pub original: Option<bool>,
    pub bit_alloc: Option<BitAllocProfile>,
    #[serde(default)]
    pub delta_bit_alloc: Vec<DeltaProfile>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BitAllocProfile {
    pub sdecaycod: u8,
    pub fdecaycod: u8,
    pub sgaincod: u8,
    pub dbkneecod: u8,
    pub floorcod: u8,
    pub fgaincod: u8,
}

/// Delta bit allocation segments for one full-bandwidth channel.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeltaProfile {
    pub channel: usize,
    pub segments: Vec<SegmentProfile>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SegmentProfile {
    pub offset: u8,
    pub len: u8,
    pub ba: u8,
}

impl Profile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;

        Self::from_yaml(&text).with_context(|| format!("Invalid profile {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Writes the profile's values into `config`.
    pub fn apply(&self, config: &mut EncoderConfig) -> Result<()> {
        if let Some(bitrate) = self.bitrate {
            config.bit_rate = bitrate;
        }
        if let Some(bandwidth) = self.bandwidth {
            config.bandwidth_code = bandwidth;
        }
        if let Some(dialnorm) = self.dialnorm {
            config.dialnorm = dialnorm;
        }
        if let Some(bsmod) = self.bsmod {
            config.bsmod = bsmod;
        }
        if let Some(copyright) = self.copyright {
            config.copyright = copyright;
        }
        if let Some(original) = self.original {
            config.original = original;
        }

        if let Some(codes) = &self.bit_alloc {
            config.bit_alloc = BitAllocCodes {
                sdecaycod: codes.sdecaycod,
                fdecaycod: codes.fdecaycod,
                sgaincod: codes.sgaincod,
                dbkneecod: codes.dbkneecod,
                floorcod: codes.floorcod,
                fgaincod: codes.fgaincod,
            };
        }

        for delta in &self.delta_bit_alloc {
            if delta.channel >= config.channels {
                bail!(
                    "Delta bit allocation for channel {} but the input has {} channels",
                    delta.channel,
                    config.channels
                );
            }

            if config.delta_bit_alloc.len() <= delta.channel {
                config.delta_bit_alloc.resize(delta.channel + 1, None);
            }
            config.delta_bit_alloc[delta.channel] = Some(DeltaBitAlloc {
                segments: delta
                    .segments
                    .iter()
                    .map(|seg| DeltaSegment {
                        offset: seg.offset,
                        len: seg.len,
                        ba: seg.ba,
                    })
                    .collect(),
            });
        }

        Ok(())
    }
}

/// Bit rate used when neither the command line nor a profile sets one.
pub fn default_bit_rate(sample_rate: u32, channels: usize) -> u32 {
    let nominal = match channels {
        1 => 96_000,
        2 => 192_000,
        3 => 320_000,
        4 => 384_000,
        _ => 448_000,
    };

    let halfratecod = match sample_rate {
        24000 | 22050 | 16000 => 1,
        12000 | 11025 | 8000 => 2,
        _ => 0,
    };

    nominal >> halfratecod
}
