//! Bitstream I/O over `bitstream_io`.
//!
//! AC-3 packs every field most-significant-bit first. The reader serves the
//! frame parser, the writer serves the frame assembler.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_n({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    /// Reads a presence flag followed by an `n`-bit field when the flag is set.
    #[inline(always)]
    pub fn get_optional<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<Option<I>> {
        if self.get()? {
            self.get_n(n).map(Some)
        } else {
            Ok(None)
        }
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| self.len - pos)
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

/// MSB-first bit writer into an owned byte buffer.
///
/// Tracks its own bit position so the assembler can compare what it wrote
/// against the budget the allocator accounted for.
pub struct BitstreamIoWriter {
    bw: BitWriter<Vec<u8>, BigEndian>,
    written: u64,
}

impl BitstreamIoWriter {
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bw: BitWriter::new(Vec::with_capacity(bytes)),
            written: 0,
        }
    }

    #[inline(always)]
    pub fn put(&mut self, bit: bool) -> io::Result<()> {
        self.bw.write_bit(bit)?;
        self.written += 1;
        Ok(())
    }

    /// Writes the low `n` bits of `value`. `value` must fit in `n` bits.
    #[inline(always)]
    pub fn put_n<U: UnsignedInteger>(&mut self, n: u32, value: U) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }

        self.bw.write_unsigned_var(n, value)?;
        self.written += n as u64;
        Ok(())
    }

    /// Writes a presence flag and, when `value` is set, the `n`-bit field.
    #[inline(always)]
    pub fn put_optional<U: UnsignedInteger>(&mut self, n: u32, value: Option<U>) -> io::Result<()> {
        self.put(value.is_some())?;
        match value {
            Some(value) => self.put_n(n, value),
            None => Ok(()),
        }
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn byte_align(&mut self) -> io::Result<()> {
        let pad = (8 - (self.written & 7)) & 7;
        self.bw.byte_align()?;
        self.written += pad;
        Ok(())
    }

    #[inline(always)]
    pub fn position(&self) -> u64 {
        self.written
    }

    /// Flushes any partial byte with trailing zeros and returns the buffer.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        self.byte_align()?;
        Ok(self.bw.into_writer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_reader_agree() -> io::Result<()> {
        let mut writer = BitstreamIoWriter::with_capacity(16);
        writer.put_n(16, 0x0B77u16)?;
        writer.put(true)?;
        writer.put_n(5, 0x13u8)?;
        writer.put_optional(8, Some(0xA5u8))?;
        writer.put_optional::<u8>(8, None)?;
        writer.put_n(0, 0u8)?;
        assert_eq!(writer.position(), 16 + 1 + 5 + 9 + 1);

        let bytes = writer.into_bytes()?;
        assert_eq!(bytes.len(), 4);
        assert_eq!(&bytes[..2], &[0x0B, 0x77]);

        let mut reader = BsIoSliceReader::from_slice(&bytes);
        assert_eq!(reader.get_n::<u16>(16)?, 0x0B77);
        assert!(reader.get()?);
        assert_eq!(reader.get_n::<u8>(5)?, 0x13);
        assert_eq!(reader.get_optional::<u8>(8)?, Some(0xA5));
        assert_eq!(reader.get_optional::<u8>(8)?, None);
        assert_eq!(reader.available()?, 0);

        Ok(())
    }
}
