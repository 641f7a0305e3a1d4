use anyhow::Result;
use log::{Level, trace};

use crate::process::extract::Frame;
use crate::structs::bsi::Bsi;
use crate::structs::sync::SyncInfo;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::tables::FRAME_SAMPLES;

/// Parses extracted frames into their syncinfo and BSI.
#[derive(Debug, Default)]
pub struct Parser {
    state: ParserState,
}

impl Parser {
    pub fn parse(&mut self, frame: &Frame) -> Result<FrameHeader> {
        let reader = &mut BsIoSliceReader::from_slice(frame.as_ref());
        let header = FrameHeader::read(&self.state, reader)?;

        trace!(
            "Frame: bsid {}, {}, {} words",
            header.bsi.bsid,
            header.bsi.acmod,
            header.frame_size_words()
        );

        Ok(header)
    }

    /// Sets the failure level for validation errors.
    ///
    /// - `log::Level::Error`: Only fail on Error level messages (default)
    /// - `log::Level::Warn`: Fail on Warning level and above (strict mode)
    pub fn set_fail_level(&mut self, level: Level) {
        self.state.fail_level = level;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserState {
    pub fail_level: Level,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            fail_level: Level::Error,
        }
    }
}

/// Syncinfo and BSI of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub sync: SyncInfo,
    pub bsi: Bsi,
}

impl FrameHeader {
    pub fn read(state: &ParserState, reader: &mut BsIoSliceReader) -> Result<Self> {
        let sync = SyncInfo::read(reader)?;
        let bsi = Bsi::read(state, reader)?;

        Ok(Self { sync, bsi })
    }

    /// Sample rate shift signalled by bsid 9 and 10.
    pub fn halfratecod(&self) -> u8 {
        self.bsi.bsid.saturating_sub(8)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sync.nominal_sample_rate() >> self.halfratecod()
    }

    /// Bit rate in bits per second.
    pub fn bit_rate(&self) -> u32 {
        (self.sync.nominal_bit_rate_kbps() >> self.halfratecod()) * 1000
    }

    pub fn frame_size_words(&self) -> usize {
        self.sync.frame_size_words().unwrap_or_default()
    }

    /// Coded channels including LFE.
    pub fn channels(&self) -> usize {
        self.bsi.acmod.full_bandwidth_channels() + self.bsi.lfeon as usize
    }

    pub fn samples_per_frame(&self) -> usize {
        FRAME_SAMPLES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::encode::Encoder;
    use crate::process::extract::Extractor;
    use crate::structs::channel::AudioCodingMode;
    use crate::structs::config::EncoderConfig;

    fn first_header(config: EncoderConfig) -> Result<FrameHeader> {
        let mut encoder = Encoder::new(config)?;
        let silence = vec![0; encoder.samples_per_frame()];

        let mut extractor = Extractor::default();
        extractor.push_bytes(&encoder.encode(&silence)?.data);
        let frame = extractor.next().ok_or_else(|| anyhow::anyhow!("no frame"))??;

        Parser::default().parse(&frame)
    }

    #[test]
    fn parses_encoder_output() -> Result<()> {
        let mut config = EncoderConfig::new(48000, 448000, 6);
        config.dialnorm = 24;
        config.bsmod = 2;
        let header = first_header(config)?;

        assert_eq!(header.sample_rate(), 48000);
        assert_eq!(header.bit_rate(), 448000);
        assert_eq!(header.frame_size_words(), 896);
        assert_eq!(header.channels(), 6);
        assert_eq!(header.bsi.acmod, AudioCodingMode::ThreeTwo);
        assert_eq!(header.bsi.program.dialnorm, 24);
        assert_eq!(header.bsi.bsmod, 2);
        assert!(header.bsi.lfeon && header.bsi.origbs);
        Ok(())
    }

    #[test]
    fn reduced_sample_rates() -> Result<()> {
        let header = first_header(EncoderConfig::new(22050, 32000, 1))?;
        assert_eq!(header.bsi.bsid, 9);
        assert_eq!(header.sample_rate(), 22050);
        assert_eq!(header.bit_rate(), 32000);
        assert_eq!(header.frame_size_words(), 139);

        let header = first_header(EncoderConfig::new(8000, 24000, 2))?;
        assert_eq!(header.bsi.bsid, 10);
        assert_eq!(header.sample_rate(), 8000);
        assert_eq!(header.bit_rate(), 24000);
        Ok(())
    }
}
