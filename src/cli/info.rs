use std::time::Duration;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::Level;
use serde::Serialize;

use ac3::process::extract::{Extractor, Frame};
use ac3::process::parse::{FrameHeader, Parser};
use ac3::utils::errors::ExtractError;

use super::command::{Cli, InfoArgs};
use crate::input::InputReader;
use crate::timestamp::time_str;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing AC-3 stream: {}", args.input.display());

    let pb = multi
        .map(|multi| -> Result<ProgressBar> {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb.set_message("Analyzing frames...");
            Ok(pb)
        })
        .transpose()?;

    let mut analyzer = StreamAnalyzer::new(cli.fail_level(), pb);
    let mut input_reader = InputReader::new(&args.input)?;

    input_reader.process_chunks(64 * 1024, |chunk| {
        analyzer.push(chunk)?;
        Ok(true)
    })?;

    let Some(summary) = analyzer.finish() else {
        println!("No AC-3 frames found in the input.");
        return Ok(());
    };

    if args.yaml {
        print!("{}", serde_yaml_ng::to_string(&summary)?);
    } else {
        display_summary(&summary);
    }

    Ok(())
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StreamSummary {
    pub sample_rate: u32,
    pub bit_rate: u32,
    pub coding_mode: String,
    pub lfe: bool,
    pub channels: usize,
    pub bsid: u8,
    pub bsmod: u8,
    pub dialnorm: u8,
    pub frames: u64,
    pub duration: String,
    pub bytes: u64,
    pub crc_errors: usize,
}

struct StreamAnalyzer {
    extractor: Extractor,
    parser: Parser,
    fail_level: Level,
    first: Option<FrameHeader>,
    frames: u64,
    samples: u64,
    total_bytes: u64,
    pb: Option<ProgressBar>,
}

impl StreamAnalyzer {
    fn new(fail_level: Level, pb: Option<ProgressBar>) -> Self {
        let mut extractor = Extractor::default();
        let mut parser = Parser::default();
        extractor.set_fail_level(fail_level);
        parser.set_fail_level(fail_level);

        Self {
            extractor,
            parser,
            fail_level,
            first: None,
            frames: 0,
            samples: 0,
            total_bytes: 0,
            pb,
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Result<()> {
        self.total_bytes += chunk.len() as u64;
        self.extractor.push_bytes(chunk);

        while let Some(frame_result) = self.extractor.next() {
            match frame_result {
                Ok(frame) => self.process_frame(&frame)?,
                Err(ExtractError::InsufficientData) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<()> {
        let header = match self.parser.parse(frame) {
            Ok(header) => header,
            Err(e) => {
                if self.fail_level <= Level::Warn {
                    return Err(e);
                }
                log::warn!("Parse error at frame {}: {e}", self.frames);
                return Ok(());
            }
        };

        if let Some(first) = &self.first {
            if first.sample_rate() != header.sample_rate()
                || first.bsi.acmod != header.bsi.acmod
                || first.bsi.lfeon != header.bsi.lfeon
            {
                log::warn!(
                    "Stream parameters changed at frame {}: {} Hz {} -> {} Hz {}",
                    self.frames,
                    first.sample_rate(),
                    first.bsi.acmod,
                    header.sample_rate(),
                    header.bsi.acmod
                );
            }
        } else {
            self.first = Some(header.clone());
        }

        self.frames += 1;
        self.samples += header.samples_per_frame() as u64;

        if self.frames.is_multiple_of(100) {
            if let Some(pb) = &self.pb {
                pb.set_message(format!("Analyzing frames...       {}", self.frames));
            }
        }

        Ok(())
    }

    fn finish(self) -> Option<StreamSummary> {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }

        let first = self.first?;
        Some(StreamSummary {
            sample_rate: first.sample_rate(),
            bit_rate: first.bit_rate(),
            coding_mode: first.bsi.acmod.to_string(),
            lfe: first.bsi.lfeon,
            channels: first.channels(),
            bsid: first.bsi.bsid,
            bsmod: first.bsi.bsmod,
            dialnorm: first.bsi.program.dialnorm,
            frames: self.frames,
            duration: time_str(self.samples, first.sample_rate()),
            bytes: self.total_bytes,
            crc_errors: self.extractor.error_count(),
        })
    }
}

fn display_summary(summary: &StreamSummary) {
    println!();
    println!("AC-3 Stream Information");
    println!("=======================");
    println!();
    println!("Stream Information");
    println!("  Sampling rate             {} Hz", summary.sample_rate);
    println!("  Bit rate                  {} kbps", summary.bit_rate / 1000);
    println!("  Coding mode               {}", summary.coding_mode);
    println!("  LFE                       {}", summary.lfe);
    println!("  Channels                  {}", summary.channels);
    println!("  Bitstream ID              {}", summary.bsid);
    println!("  Bitstream mode            {}", summary.bsmod);
    println!("  Dialogue Level            -{} dBFS", summary.dialnorm);
    println!();

    let size_mb = summary.bytes as f64 / 1_000_000.0;
    println!("Analysis Summary");
    println!("  Frames processed          {}", summary.frames);
    println!("  Size                      {size_mb:.2} MB ({} bytes)", summary.bytes);
    println!("  Duration                  {}", summary.duration);
    println!("  CRC failures              {}", summary.crc_errors);
    println!();
}
