use std::io::{self, Read};

use anyhow::{Result, anyhow, bail};

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Data chunk size written by streaming producers that don't know the length.
const UNKNOWN_DATA_SIZE: u32 = 0xFFFF_FFFF;

/// Bytes of a `fmt ` chunk that are parsed; the rest is skipped.
const MAX_FMT_SIZE: u32 = 64;

/// Position of each coded channel in the WAV channel order, by channel count.
///
/// WAV orders channels as FL FR FC LFE BL BR while AC-3 codes the front
/// channels left to right and the LFE last.
const CODED_ORDER: [&[usize]; 7] = [
    &[],
    &[0],
    &[0, 1],
    &[0, 2, 1],
    &[0, 1, 2, 3],
    &[0, 2, 1, 3, 4],
    &[0, 2, 1, 4, 5, 3],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: usize,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    pub fn block_align(&self) -> usize {
        self.channels * (self.bits_per_sample as usize / 8)
    }
}

/// Reader for RIFF/WAVE files holding 16-bit integer PCM.
///
/// Only reads forward, so it works on pipes. Samples come out interleaved
/// in AC-3 coded channel order.
pub struct WavReader<R: Read> {
    reader: R,
    format: WavFormat,
    /// Bytes left in the data chunk, `None` when the header gave no length.
    remaining: Option<u64>,
    buffer: Vec<u8>,
}

impl<R: Read> WavReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut header = [0u8; 12];
        reader.read_exact(&mut header)?;
        if &header[..4] != b"RIFF" || &header[8..] != b"WAVE" {
            bail!("Not a RIFF/WAVE file");
        }

        let mut format = None;
        loop {
            let mut chunk = [0u8; 8];
            reader
                .read_exact(&mut chunk)
                .map_err(|e| anyhow!("No data chunk found: {e}"))?;
            let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);

            match &chunk[..4] {
                b"fmt " => format = Some(read_format(&mut reader, size)?),
                b"data" => {
                    let format = format.ok_or_else(|| anyhow!("data chunk before fmt chunk"))?;
                    let remaining = (size != UNKNOWN_DATA_SIZE && size != 0).then_some(size as u64);

                    return Ok(Self {
                        reader,
                        format,
                        remaining,
                        buffer: Vec::new(),
                    });
                }
                id => {
                    log::debug!("Skipping {} chunk ({size} bytes)", String::from_utf8_lossy(id));
                    skip(&mut reader, size as u64 + (size & 1) as u64)?;
                }
            }
        }
    }

    pub fn format(&self) -> WavFormat {
        self.format
    }

    /// Sample frames in the data chunk, when the header gives its size.
    pub fn total_frames(&self) -> Option<u64> {
        self.remaining
            .map(|bytes| bytes / self.format.block_align() as u64)
    }

    /// Reads up to `frames` sample frames into `out`, replacing its contents.
    ///
    /// Returns the number of sample frames read; zero at the end of the data.
    pub fn read_frames(&mut self, frames: usize, out: &mut Vec<i16>) -> Result<usize> {
        let block_align = self.format.block_align();
        let mut wanted = frames * block_align;
        if let Some(remaining) = self.remaining {
            wanted = wanted.min(remaining as usize);
        }

        self.buffer.resize(wanted, 0);
        let read = fill(&mut self.reader, &mut self.buffer)?;
        if let Some(remaining) = &mut self.remaining {
            *remaining -= read as u64;
        }

        let read_frames = read / block_align;
        let order = CODED_ORDER[self.format.channels];

        out.clear();
        out.extend(
            self.buffer[..read_frames * block_align]
                .chunks_exact(block_align)
                .flat_map(|frame| {
                    order
                        .iter()
                        .map(move |&ch| i16::from_le_bytes([frame[2 * ch], frame[2 * ch + 1]]))
                }),
        );

        Ok(read_frames)
    }
}

fn read_format<R: Read>(reader: &mut R, size: u32) -> Result<WavFormat> {
    if size < 16 {
        bail!("fmt chunk too short: {size} bytes");
    }

    let kept = size.min(MAX_FMT_SIZE);
    let mut fmt = vec![0u8; kept as usize];
    reader.read_exact(&mut fmt)?;
    skip(reader, u64::from(size - kept) + u64::from(size & 1))?;

    let u16_at = |i: usize| u16::from_le_bytes([fmt[i], fmt[i + 1]]);
    let u32_at = |i: usize| u32::from_le_bytes([fmt[i], fmt[i + 1], fmt[i + 2], fmt[i + 3]]);

    let format_tag = match u16_at(0) {
        WAVE_FORMAT_EXTENSIBLE if kept >= 40 => u16_at(24),
        tag => tag,
    };
    if format_tag != WAVE_FORMAT_PCM {
        bail!("Unsupported WAV format tag {format_tag:#06X}, only integer PCM is accepted");
    }

    let format = WavFormat {
        channels: u16_at(2) as usize,
        sample_rate: u32_at(4),
        bits_per_sample: u16_at(14),
    };

    if format.bits_per_sample != 16 {
        bail!(
            "Unsupported sample size: {} bits (expected 16)",
            format.bits_per_sample
        );
    }
    if !(1..CODED_ORDER.len()).contains(&format.channels) {
        bail!("Unsupported channel count: {} (expected 1 to 6)", format.channels);
    }

    Ok(format)
}

fn skip<R: Read>(reader: &mut R, bytes: u64) -> io::Result<()> {
    let skipped = io::copy(&mut reader.take(bytes), &mut io::sink())?;
    if skipped < bytes {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// Reads until `buf` is full or the input ends.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn fmt_body(tag: u16, channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
        let block_align = channels * bits / 8;
        let mut body = Vec::new();
        body.extend_from_slice(&tag.to_le_bytes());
        body.extend_from_slice(&channels.to_le_bytes());
        body.extend_from_slice(&sample_rate.to_le_bytes());
        body.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        body.extend_from_slice(&block_align.to_le_bytes());
        body.extend_from_slice(&bits.to_le_bytes());
        body
    }

    fn wav(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body = chunks.concat();
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend(body);
        out
    }

    fn samples(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn reads_pcm_after_unknown_chunks() -> Result<()> {
        let data = samples(&[1, -1, 2, -2, 3, -3]);
        let file = wav(&[
            chunk(b"fmt ", &fmt_body(WAVE_FORMAT_PCM, 2, 44100, 16)),
            chunk(b"LIST", b"odd"),
            chunk(b"data", &data),
        ]);

        let mut reader = WavReader::new(Cursor::new(file))?;
        assert_eq!(
            reader.format(),
            WavFormat {
                channels: 2,
                sample_rate: 44100,
                bits_per_sample: 16
            }
        );
        assert_eq!(reader.total_frames(), Some(3));

        let mut out = Vec::new();
        assert_eq!(reader.read_frames(2, &mut out)?, 2);
        assert_eq!(out, [1, -1, 2, -2]);
        assert_eq!(reader.read_frames(2, &mut out)?, 1);
        assert_eq!(out, [3, -3]);
        assert_eq!(reader.read_frames(2, &mut out)?, 0);
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn channels_come_out_in_coded_order() -> Result<()> {
        // FL FR FC LFE BL BR
        let data = samples(&[10, 20, 30, 40, 50, 60]);

        let mut fmt = fmt_body(WAVE_FORMAT_EXTENSIBLE, 6, 48000, 16);
        fmt.extend_from_slice(&22u16.to_le_bytes());
        fmt.extend_from_slice(&16u16.to_le_bytes());
        fmt.extend_from_slice(&0x3Fu32.to_le_bytes());
        fmt.extend_from_slice(&[
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38,
            0x9B, 0x71,
        ]);

        let file = wav(&[chunk(b"fmt ", &fmt), chunk(b"data", &data)]);
        let mut reader = WavReader::new(Cursor::new(file))?;

        let mut out = Vec::new();
        reader.read_frames(1536, &mut out)?;
        assert_eq!(out, [10, 30, 20, 50, 60, 40]);
        Ok(())
    }

    #[test]
    fn unknown_data_size_reads_to_the_end() -> Result<()> {
        let mut file = wav(&[chunk(b"fmt ", &fmt_body(WAVE_FORMAT_PCM, 1, 48000, 16))]);
        file.extend_from_slice(b"data");
        file.extend_from_slice(&UNKNOWN_DATA_SIZE.to_le_bytes());
        file.extend(samples(&[7, 8, 9]));

        let mut reader = WavReader::new(Cursor::new(file))?;
        assert_eq!(reader.total_frames(), None);

        let mut out = Vec::new();
        assert_eq!(reader.read_frames(1536, &mut out)?, 3);
        assert_eq!(out, [7, 8, 9]);
        Ok(())
    }

    #[test]
    fn rejects_unsupported_formats() {
        let float = wav(&[
            chunk(b"fmt ", &fmt_body(0x0003, 2, 48000, 32)),
            chunk(b"data", &[]),
        ]);
        assert!(WavReader::new(Cursor::new(float)).is_err());

        let pcm24 = wav(&[
            chunk(b"fmt ", &fmt_body(WAVE_FORMAT_PCM, 2, 48000, 24)),
            chunk(b"data", &[]),
        ]);
        assert!(WavReader::new(Cursor::new(pcm24)).is_err());

        let eight_channels = wav(&[
            chunk(b"fmt ", &fmt_body(WAVE_FORMAT_PCM, 8, 48000, 16)),
            chunk(b"data", &[]),
        ]);
        assert!(WavReader::new(Cursor::new(eight_channels)).is_err());

        assert!(WavReader::new(Cursor::new(b"RIFX\0\0\0\0WAVE".to_vec())).is_err());
    }

    #[test]
    fn oversized_fmt_chunks() -> Result<()> {
        let mut fmt = fmt_body(WAVE_FORMAT_PCM, 1, 32000, 16);
        fmt.resize(101, 0xEE);
        let file = wav(&[chunk(b"fmt ", &fmt), chunk(b"data", &samples(&[5, 6]))]);

        let mut reader = WavReader::new(Cursor::new(file))?;
        assert_eq!(reader.format().sample_rate, 32000);
        let mut out = Vec::new();
        assert_eq!(reader.read_frames(1536, &mut out)?, 2);
        assert_eq!(out, [5, 6]);

        // A corrupt size past the end of the file fails instead of allocating it.
        let mut truncated = wav(&[]);
        truncated.extend_from_slice(b"fmt ");
        truncated.extend_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        truncated.extend(fmt_body(WAVE_FORMAT_PCM, 2, 48000, 16));
        assert!(WavReader::new(Cursor::new(truncated)).is_err());
        Ok(())
    }
}
