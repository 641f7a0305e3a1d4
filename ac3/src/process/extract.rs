use std::collections::VecDeque;
use std::sync::Arc;

use log::{Level, warn};

use crate::log_or_err;
use crate::process::assemble::crc1_words;
use crate::structs::sync::{SYNC_WORD, frame_size_words};
use crate::utils::crc::{CRC16_AC3_ALG, Crc16};
use crate::utils::errors::ExtractError;

/// syncword, crc1, fscod and frmsizecod.
const SYNC_INFO_BYTES: usize = 5;

/// Extracts AC-3 frames from a continuous bitstream.
///
/// Locks onto the `0x0B77` syncword, takes the frame length from fscod and
/// frmsizecod and checks both CRCs before handing a frame out. A frame that
/// fails a check is dropped by skipping one byte and searching for the next
/// syncword.
///
/// # Example
///
/// ```rust
/// use ac3::process::encode::Encoder;
/// use ac3::process::extract::Extractor;
/// use ac3::structs::config::EncoderConfig;
///
/// let mut encoder = Encoder::new(EncoderConfig::new(48000, 96000, 1))?;
/// let silence = vec![0i16; encoder.samples_per_frame()];
///
/// let mut extractor = Extractor::default();
/// for _ in 0..3 {
///     extractor.push_bytes(&encoder.encode(&silence)?.data);
/// }
///
/// let frames = extractor.filter_map(Result::ok).count();
/// assert_eq!(frames, 3);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Extractor {
    buffer: VecDeque<u8>,
    locked: bool,
    io_counter: usize,
    crc: Crc16,
    error_count: usize,
    frames_processed: usize,
    fail_level: Level,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            buffer: VecDeque::with_capacity(16_384),
            locked: false,
            io_counter: 0,
            crc: Crc16::new(&CRC16_AC3_ALG),
            error_count: 0,
            frames_processed: 0,
            fail_level: Level::Error,
        }
    }
}

impl Extractor {
    /// Adds raw bitstream data to the internal buffer.
    ///
    /// Frames are only cut when the iterator is polled, so data can arrive
    /// in chunks of any size.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend(data);
        self.io_counter += 1;
    }

    /// Sets the level at which a damaged frame becomes an error.
    ///
    /// - `log::Level::Error`: damaged frames are logged and skipped (default)
    /// - `log::Level::Warn`: damaged frames are returned as errors (strict mode)
    pub fn set_fail_level(&mut self, level: Level) {
        self.fail_level = level;
    }

    /// Frames dropped for a bad CRC or frame size.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    fn resync(&mut self) -> Result<(), ExtractError> {
        self.locked = false;

        loop {
            let Some(offset) = self.find_sync() else {
                // A trailing 0x0B may be the first half of the next syncword.
                let keep = usize::from(self.buffer.back() == Some(&0x0B));
                self.consume_front(self.buffer.len() - keep);
                return self.insufficient();
            };

            self.consume_front(offset);
            if self.buffer.len() < SYNC_INFO_BYTES {
                return self.insufficient();
            }

            // A syncword with reserved codes is taken for payload data.
            if self.frame_size_words().is_none() {
                self.consume_front(1);
                continue;
            }

            self.locked = true;
            return Ok(());
        }
    }

    fn find_sync(&self) -> Option<usize> {
        self.buffer
            .iter()
            .zip(self.buffer.iter().skip(1))
            .position(|(&hi, &lo)| u16::from_be_bytes([hi, lo]) == SYNC_WORD)
    }

    fn frame_size_words(&self) -> Option<usize> {
        let codes = *self.buffer.get(4)?;
        frame_size_words(codes >> 6, codes & 0x3F)
    }

    fn consume_front(&mut self, cnt: usize) {
        self.buffer.drain(..cnt);
    }

    fn insufficient(&mut self) -> Result<(), ExtractError> {
        self.io_counter -= 1;
        Err(ExtractError::InsufficientData)
    }

    fn iter_insufficient(&mut self) -> Option<Result<Frame, ExtractError>> {
        self.io_counter -= 1;
        Some(Err(ExtractError::InsufficientData))
    }

    fn check_crcs(&self, frame: &[u8]) -> Option<ExtractError> {
        let crc1_end = 2 * crc1_words(frame.len() / 2);

        if self.crc.checksum(&frame[2..crc1_end]) != 0 {
            Some(ExtractError::Crc1Mismatch)
        } else if self.crc.checksum(&frame[2..]) != 0 {
            Some(ExtractError::Crc2Mismatch)
        } else {
            None
        }
    }

    /// Drops the frame candidate at the front and reports why.
    fn reject(&mut self, error: ExtractError) -> Result<(), ExtractError> {
        self.error_count += 1;
        self.locked = false;
        self.buffer.pop_front();

        log_or_err!(self, Level::Warn, error);
        Ok(())
    }
}

impl Iterator for Extractor {
    type Item = Result<Frame, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.io_counter == 0 {
            return None;
        }

        loop {
            if !self.locked && self.resync().is_err() {
                return None;
            }

            if self.buffer.len() < SYNC_INFO_BYTES {
                return self.iter_insufficient();
            }

            if u16::from_be_bytes([self.buffer[0], self.buffer[1]]) != SYNC_WORD {
                warn!("Lost sync after {} frames", self.frames_processed);
                self.locked = false;
                continue;
            }

            let Some(words) = self.frame_size_words() else {
                let codes = self.buffer[4];
                let error = ExtractError::InvalidFrameSize {
                    fscod: codes >> 6,
                    frmsizecod: codes & 0x3F,
                };
                if let Err(e) = self.reject(error) {
                    return Some(Err(e));
                }
                continue;
            };

            let frame_len = 2 * words;
            if self.buffer.len() < frame_len {
                return self.iter_insufficient();
            }

            let data: Vec<u8> = self.buffer.range(..frame_len).copied().collect();
            if let Some(error) = self.check_crcs(&data) {
                if let Err(e) = self.reject(error) {
                    return Some(Err(e));
                }
                continue;
            }

            self.consume_front(frame_len);
            self.frames_processed += 1;

            return Some(Ok(Frame { data: data.into() }));
        }
    }
}

/// A single frame extracted from a bitstream, syncword included.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Arc<[u8]>,
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Frame {
    /// Frame length in 16-bit words.
    pub fn words(&self) -> usize {
        self.data.len() / 2
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::process::encode::Encoder;
    use crate::structs::config::EncoderConfig;

    fn encoded_frames(count: usize) -> Result<Vec<Vec<u8>>> {
        let mut encoder = Encoder::new(EncoderConfig::new(44100, 64000, 2))?;
        let silence = vec![0; encoder.samples_per_frame()];

        (0..count)
            .map(|_| encoder.encode(&silence).map(|frame| frame.data))
            .collect()
    }

    fn collect(extractor: &mut Extractor) -> Vec<Result<usize, ExtractError>> {
        extractor.map(|frame| frame.map(|f| f.as_ref().len())).collect()
    }

    #[test]
    fn frames_across_pushes() -> Result<()> {
        let frames = encoded_frames(3)?;
        let stream = frames.concat();
        let mut extractor = Extractor::default();

        // Garbage with a stray syncword in front of the first frame.
        extractor.push_bytes(&[0x00, 0x0B, 0x77, 0xFF, 0x12, 0x0B]);
        extractor.push_bytes(&stream[..100]);
        assert!(matches!(
            extractor.next(),
            Some(Err(ExtractError::InsufficientData))
        ));

        extractor.push_bytes(&stream[100..]);
        let lengths: Vec<_> = extractor.by_ref().map_while(Result::ok).map(|f| f.words()).collect();
        assert_eq!(lengths, [139, 140, 139]);
        assert_eq!(extractor.frames_processed(), 3);
        assert_eq!(extractor.error_count(), 1);
        Ok(())
    }

    #[test]
    fn skip_invalid_data() -> Result<()> {
        let frames = encoded_frames(3)?;

        let mut corrupted = frames[0].clone();
        corrupted.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
        corrupted.extend_from_slice(&frames[1]);
        corrupted[4 + frames[0].len() + 100] ^= 0x10;
        corrupted.extend_from_slice(&frames[2]);

        let mut extractor = Extractor::default();
        extractor.push_bytes(&corrupted);

        let results = collect(&mut extractor);
        assert_eq!(
            results,
            [Ok(278), Ok(278), Err(ExtractError::InsufficientData)]
        );
        assert_eq!(extractor.error_count(), 1);
        Ok(())
    }

    #[test]
    fn strict_mode_reports_crc_failures() -> Result<()> {
        let frames = encoded_frames(3)?;
        let mut stream = frames.concat();

        // Byte 100 of frame 1 is covered by CRC1, byte 250 of frame 2 only by CRC2.
        stream[278 + 100] ^= 0x01;
        stream[278 + 280 + 250] ^= 0x80;

        let mut extractor = Extractor::default();
        extractor.set_fail_level(Level::Warn);
        extractor.push_bytes(&stream);

        assert_eq!(
            collect(&mut extractor),
            [
                Ok(278),
                Err(ExtractError::Crc1Mismatch),
                Err(ExtractError::Crc2Mismatch),
            ]
        );
        Ok(())
    }
}
