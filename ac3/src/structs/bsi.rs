//! Bitstream information (BSI).
//!
//! The BSI follows syncinfo and describes the coded program: bitstream
//! identification and mode, channel configuration, mix levels, dialog
//! normalization and the optional time codes and additional information.

use anyhow::{Result, bail};
use log::Level;

use crate::log_or_err;
use crate::process::parse::ParserState;
use crate::structs::channel::AudioCodingMode;
use crate::utils::bitstream_io::{BitstreamIoWriter, BsIoSliceReader};
use crate::utils::errors::BsiError;
use crate::utils::tables::ACMOD_MIX_BITS;

/// Highest bsid accepted: 8 is full rate, 9 and 10 are the half and
/// quarter sample rate variants.
pub const MAX_BSID: u8 = 10;

/// `mixlevel` and `roomtyp`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioProductionInfo {
    pub mixlevel: u8,
    pub roomtyp: u8,
}

/// Fields repeated once per program. Dual mono carries two sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    pub dialnorm: u8,
    pub compr: Option<u8>,
    pub langcod: Option<u8>,
    pub audprod: Option<AudioProductionInfo>,
}

impl ProgramInfo {
    fn read(state: &ParserState, reader: &mut BsIoSliceReader) -> Result<Self> {
        let dialnorm = reader.get_n(5)?;
        if dialnorm == 0 {
            log_or_err!(state, Level::Warn, BsiError::ReservedDialogNormalization);
        }

        let compr = reader.get_optional(8)?;
        let langcod = reader.get_optional(8)?;
        let audprod = if reader.get()? {
            Some(AudioProductionInfo {
                mixlevel: reader.get_n(5)?,
                roomtyp: reader.get_n(2)?,
            })
        } else {
            None
        };

        Ok(Self {
            dialnorm,
            compr,
            langcod,
            audprod,
        })
    }

    fn write(&self, writer: &mut BitstreamIoWriter) -> Result<()> {
        writer.put_n(5, self.dialnorm)?;
        writer.put_optional(8, self.compr)?;
        writer.put_optional(8, self.langcod)?;
        writer.put(self.audprod.is_some())?;
        if let Some(audprod) = &self.audprod {
            writer.put_n(5, audprod.mixlevel)?;
            writer.put_n(2, audprod.roomtyp)?;
        }

        Ok(())
    }

    fn bits(&self) -> u32 {
        5 + 1
            + self.compr.map_or(0, |_| 8)
            + 1
            + self.langcod.map_or(0, |_| 8)
            + 1
            + self.audprod.map_or(0, |_| 7)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bsi {
    pub bsid: u8,
    pub bsmod: u8,
    pub acmod: AudioCodingMode,
    /// Present with three front channels.
    pub cmixlev: Option<u8>,
    /// Present with surround channels.
    pub surmixlev: Option<u8>,
    /// Present in 2/0 mode only.
    pub dsurmod: Option<u8>,
    pub lfeon: bool,
    pub program: ProgramInfo,
    /// Second program of a dual-mono stream.
    pub program2: Option<ProgramInfo>,
    pub copyrightb: bool,
    pub origbs: bool,
    pub timecod1: Option<u16>,
    pub timecod2: Option<u16>,
    /// Additional bitstream information, 1 to 64 bytes.
    pub addbsi: Vec<u8>,
}

impl Bsi {
    pub fn read(state: &ParserState, reader: &mut BsIoSliceReader) -> Result<Self> {
        let bsid = reader.get_n(5)?;
        if bsid > MAX_BSID {
            bail!(BsiError::UnsupportedBitstreamId(bsid));
        }

        let bsmod = reader.get_n(3)?;
        let acmod = AudioCodingMode::from_acmod(reader.get_n(3)?)?;

        let cmixlev = if acmod.has_center() {
            Some(reader.get_n(2)?)
        } else {
            None
        };
        let surmixlev = if acmod.has_surround() {
            Some(reader.get_n(2)?)
        } else {
            None
        };
        let dsurmod = if acmod == AudioCodingMode::Stereo {
            Some(reader.get_n(2)?)
        } else {
            None
        };

        let lfeon = reader.get()?;
        let program = ProgramInfo::read(state, reader)?;
        let program2 = if acmod == AudioCodingMode::DualMono {
            Some(ProgramInfo::read(state, reader)?)
        } else {
            None
        };

        let copyrightb = reader.get()?;
        let origbs = reader.get()?;
        let timecod1 = reader.get_optional(14)?;
        let timecod2 = reader.get_optional(14)?;

        let mut addbsi = Vec::new();
        if reader.get()? {
            let addbsil = reader.get_n::<u8>(6)? as usize;
            addbsi.reserve(addbsil + 1);
            for _ in 0..=addbsil {
                addbsi.push(reader.get_n(8)?);
            }
        }

        Ok(Self {
            bsid,
            bsmod,
            acmod,
            cmixlev,
            surmixlev,
            dsurmod,
            lfeon,
            program,
            program2,
            copyrightb,
            origbs,
            timecod1,
            timecod2,
            addbsi,
        })
    }

    pub fn write(&self, writer: &mut BitstreamIoWriter) -> Result<()> {
        writer.put_n(5, self.bsid)?;
        writer.put_n(3, self.bsmod)?;
        writer.put_n(3, self.acmod.acmod())?;

        if self.acmod.has_center() {
            writer.put_n(2, self.cmixlev.unwrap_or_default())?;
        }
        if self.acmod.has_surround() {
            writer.put_n(2, self.surmixlev.unwrap_or_default())?;
        }
        if self.acmod == AudioCodingMode::Stereo {
            writer.put_n(2, self.dsurmod.unwrap_or_default())?;
        }

        writer.put(self.lfeon)?;
        self.program.write(writer)?;
        if self.acmod == AudioCodingMode::DualMono {
            self.program2.clone().unwrap_or_default().write(writer)?;
        }

        writer.put(self.copyrightb)?;
        writer.put(self.origbs)?;
        writer.put_optional(14, self.timecod1)?;
        writer.put_optional(14, self.timecod2)?;

        let addbsi = &self.addbsi[..self.addbsi.len().min(64)];
        writer.put(!addbsi.is_empty())?;
        if !addbsi.is_empty() {
            writer.put_n(6, (addbsi.len() - 1) as u8)?;
            for &byte in addbsi {
                writer.put_n(8, byte)?;
            }
        }

        Ok(())
    }

    /// Size of the BSI as [`Bsi::write`] emits it.
    pub fn bits(&self) -> u32 {
        let program2 = if self.acmod == AudioCodingMode::DualMono {
            self.program2.clone().unwrap_or_default().bits()
        } else {
            0
        };
        let addbsi = match self.addbsi.len().min(64) {
            0 => 0,
            len => 6 + 8 * len as u32,
        };

        5 + 3
            + 3
            + ACMOD_MIX_BITS[self.acmod as usize]
            + 1
            + self.program.bits()
            + program2
            + 2
            + 1
            + self.timecod1.map_or(0, |_| 14)
            + 1
            + self.timecod2.map_or(0, |_| 14)
            + 1
            + addbsi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo() -> Bsi {
        Bsi {
            bsid: 8,
            bsmod: 0,
            acmod: AudioCodingMode::Stereo,
            cmixlev: None,
            surmixlev: None,
            dsurmod: Some(0),
            lfeon: false,
            program: ProgramInfo {
                dialnorm: 31,
                ..Default::default()
            },
            program2: None,
            copyrightb: false,
            origbs: true,
            timecod1: None,
            timecod2: None,
            addbsi: Vec::new(),
        }
    }

    fn write_read(bsi: &Bsi) -> Result<Bsi> {
        let mut writer = BitstreamIoWriter::with_capacity(16);
        bsi.write(&mut writer)?;
        assert_eq!(writer.position(), bsi.bits() as u64);

        let bytes = writer.into_bytes()?;
        Bsi::read(&ParserState::default(), &mut BsIoSliceReader::from_slice(&bytes))
    }

    #[test]
    fn minimal_stereo_header() -> Result<()> {
        let bsi = stereo();
        assert_eq!(bsi.bits(), 27);
        assert_eq!(write_read(&bsi)?, bsi);
        Ok(())
    }

    #[test]
    fn dual_mono_with_optional_fields() -> Result<()> {
        let bsi = Bsi {
            acmod: AudioCodingMode::DualMono,
            dsurmod: None,
            program: ProgramInfo {
                dialnorm: 27,
                compr: Some(0x40),
                langcod: Some(9),
                audprod: Some(AudioProductionInfo {
                    mixlevel: 12,
                    roomtyp: 1,
                }),
            },
            program2: Some(ProgramInfo {
                dialnorm: 20,
                ..Default::default()
            }),
            timecod2: Some(0x1234),
            addbsi: vec![1, 2, 3],
            ..stereo()
        };

        assert_eq!(write_read(&bsi)?, bsi);
        Ok(())
    }

    #[test]
    fn reserved_dialnorm_fails_in_strict_mode() -> Result<()> {
        let bsi = Bsi {
            program: ProgramInfo::default(),
            ..stereo()
        };

        let mut writer = BitstreamIoWriter::with_capacity(16);
        bsi.write(&mut writer)?;
        let bytes = writer.into_bytes()?;

        let lenient = ParserState::default();
        assert!(Bsi::read(&lenient, &mut BsIoSliceReader::from_slice(&bytes)).is_ok());

        let strict = ParserState {
            fail_level: Level::Warn,
        };
        let err = Bsi::read(&strict, &mut BsIoSliceReader::from_slice(&bytes)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BsiError>(),
            Some(&BsiError::ReservedDialogNormalization)
        );
        Ok(())
    }
}
