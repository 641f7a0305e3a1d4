use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::Result;

/// Buffered reader over a file or stdin.
pub struct InputReader {
    reader: Box<dyn Read + Send>,
}

impl InputReader {
    /// Opens `input_path`, or stdin when the path is "-".
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let reader: Box<dyn Read + Send> = if is_pipe(&input_path) {
            Box::new(BufReader::new(io::stdin()))
        } else {
            Box::new(BufReader::new(File::open(input_path)?))
        };

        Ok(Self { reader })
    }

    /// Feeds the input to `callback` in chunks of up to `chunk_size` bytes.
    /// The callback returns `Ok(false)` to stop early.
    pub fn process_chunks<F>(&mut self, chunk_size: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<bool>,
    {
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let bytes_read = self.reader.read(&mut buffer)?;
            if bytes_read == 0 || !callback(&buffer[..bytes_read])? {
                break;
            }
        }

        Ok(())
    }
}

impl Read for InputReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Opens `output_path` for writing, or stdout when the path is "-".
pub fn create_output<P: AsRef<Path>>(output_path: P) -> Result<Box<dyn Write>> {
    if is_pipe(&output_path) {
        Ok(Box::new(BufWriter::new(io::stdout().lock())))
    } else {
        Ok(Box::new(BufWriter::new(File::create(output_path)?)))
    }
}

pub fn is_pipe<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().as_os_str() == "-"
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn dash_is_stdio() {
        assert!(is_pipe("-"));
        assert!(!is_pipe("./-"));
        assert!(!is_pipe("input.wav"));
    }

    #[test]
    fn file_is_fed_in_chunks() -> Result<()> {
        let path = std::env::temp_dir().join(format!("ac3enc-input-{}.bin", std::process::id()));
        let data: Vec<u8> = (0..=255).collect();
        fs::write(&path, &data)?;

        let mut reader = InputReader::new(&path)?;
        let mut sizes = Vec::new();
        let mut seen = Vec::new();
        reader.process_chunks(100, |chunk| {
            sizes.push(chunk.len());
            seen.extend_from_slice(chunk);
            Ok(sizes.len() < 2)
        })?;
        fs::remove_file(&path)?;

        assert_eq!(sizes, [100, 100]);
        assert_eq!(seen, data[..200]);
        Ok(())
    }
}
