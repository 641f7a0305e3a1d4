use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use anyhow::{Result, anyhow};
use indicatif::MultiProgress;

use ac3::process::encode::{EncodedFrame, Encoder};
use ac3::structs::config::EncoderConfig;
use ac3::utils::tables::FRAME_SAMPLES;

use super::command::{Cli, EncodeArgs};
use super::progress::{create_progress_bar, finish_progress_bar, speed_message};
use crate::config::{Profile, default_bit_rate};
use crate::input::{InputReader, create_output, is_pipe};
use crate::wav::{WavFormat, WavReader};

pub fn cmd_encode(args: &EncodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "Encoding {} (strict mode: {})",
        args.input.display(),
        cli.strict
    );

    let wav = WavReader::new(InputReader::new(&args.input)?)?;
    let format = wav.format();
    log::info!(
        "Input: {} Hz, {} channels, 16-bit PCM",
        format.sample_rate,
        format.channels
    );

    let config = encoder_config(args, format)?;
    let encoder = Encoder::new(config)?;

    let output_path = output_path(args)?;
    let mut output = create_output(&output_path)?;
    if !is_pipe(&output_path) {
        log::info!("Writing {}", output_path.display());
    }

    // One extra frame flushes the encoder's history.
    let total_frames = wav
        .total_frames()
        .map(|frames| frames.div_ceil(FRAME_SAMPLES as u64) + 1);

    let pb = multi
        .map(|multi| create_progress_bar(multi, total_frames))
        .transpose()?;

    let (tx, rx) = mpsc::channel();
    let encode_thread = spawn_encoder_thread(wav, encoder, tx);

    let start_time = Instant::now();
    let mut frames = 0u64;
    let mut bytes = 0u64;

    while let Ok(result) = rx.recv() {
        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                if let Some(pb) = &pb {
                    pb.finish_with_message("encode failed");
                }
                return Err(e);
            }
        };

        output.write_all(&frame.data)?;
        frames += 1;
        bytes += frame.data.len() as u64;

        if let Some(pb) = &pb {
            pb.set_position(frames);
            if frames.is_multiple_of(30) {
                pb.set_message(speed_message(
                    frames * FRAME_SAMPLES as u64,
                    format.sample_rate,
                    start_time,
                ));
            }
        }
    }

    output.flush()?;

    match encode_thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            if let Some(pb) = &pb {
                pb.finish_with_message("encode failed");
            }
            return Err(e);
        }
        Err(_) => {
            if let Some(pb) = &pb {
                pb.finish_with_message("encode thread panicked");
            }
            return Err(anyhow!("Encode thread panicked"));
        }
    }

    if let Some(pb) = &pb {
        let message = speed_message(frames * FRAME_SAMPLES as u64, format.sample_rate, start_time);
        finish_progress_bar(pb, total_frames.is_some(), message);
    }

    log::info!("Encoding complete: {frames} frames, {bytes} bytes");
    Ok(())
}

/// Library defaults, then the profile, then command line options.
fn encoder_config(args: &EncodeArgs, format: WavFormat) -> Result<EncoderConfig> {
    let mut config = EncoderConfig::new(
        format.sample_rate,
        default_bit_rate(format.sample_rate, format.channels),
        format.channels,
    );

    if let Some(path) = &args.config {
        Profile::load(path)?.apply(&mut config)?;
        log::debug!("Applied profile {}", path.display());
    }

    if let Some(bitrate) = args.bitrate {
        config.bit_rate = bitrate;
    }
    if let Some(bandwidth) = args.bandwidth {
        config.bandwidth_code = bandwidth;
    }
    if let Some(dialnorm) = args.dialnorm {
        config.dialnorm = dialnorm;
    }
    if let Some(bsmod) = args.bsmod {
        config.bsmod = bsmod;
    }

    Ok(config)
}

fn output_path(args: &EncodeArgs) -> Result<PathBuf> {
    match &args.output {
        Some(path) => Ok(path.clone()),
        None if is_pipe(&args.input) => Ok(PathBuf::from("-")),
        None => default_output(&args.input),
    }
}

fn default_output(input: &Path) -> Result<PathBuf> {
    let output = input.with_extension("ac3");
    if output == input {
        return Err(anyhow!(
            "Output would overwrite the input {}, pass --output",
            input.display()
        ));
    }
    Ok(output)
}

fn spawn_encoder_thread(
    mut wav: WavReader<InputReader>,
    mut encoder: Encoder,
    tx: mpsc::Sender<Result<EncodedFrame>>,
) -> thread::JoinHandle<Result<()>> {
    thread::spawn(move || -> Result<()> {
        let samples_per_frame = encoder.samples_per_frame();
        let mut samples = Vec::with_capacity(samples_per_frame);
        let mut total_samples = 0u64;

        loop {
            let read = wav.read_frames(FRAME_SAMPLES, &mut samples)?;
            if read == 0 {
                break;
            }
            total_samples += read as u64;

            // The last frame is padded with silence.
            samples.resize(samples_per_frame, 0);
            if !send(&tx, encoder.encode(&samples)) {
                return Ok(());
            }

            if read < FRAME_SAMPLES {
                break;
            }
        }

        samples.clear();
        samples.resize(samples_per_frame, 0);
        send(&tx, encoder.encode(&samples));

        log::debug!(
            "Encoder finished: {total_samples} samples per channel, {} frames",
            encoder.state().frames_encoded
        );
        Ok(())
    })
}

/// Hands a result to the writer. Returns false when encoding should stop.
fn send(tx: &mpsc::Sender<Result<EncodedFrame>>, result: Result<EncodedFrame>) -> bool {
    let failed = result.is_err();
    tx.send(result).is_ok() && !failed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: &str, output: Option<&str>) -> EncodeArgs {
        EncodeArgs {
            input: PathBuf::from(input),
            output: output.map(PathBuf::from),
            bitrate: None,
            config: None,
            bandwidth: None,
            dialnorm: None,
            bsmod: None,
        }
    }

    #[test]
    fn output_defaults_next_to_the_input() -> Result<()> {
        assert_eq!(output_path(&args("music/take.wav", None))?, PathBuf::from("music/take.ac3"));
        assert_eq!(output_path(&args("-", None))?, PathBuf::from("-"));
        assert_eq!(output_path(&args("a.wav", Some("b.ac3")))?, PathBuf::from("b.ac3"));
        assert!(output_path(&args("already.ac3", None)).is_err());
        Ok(())
    }

    #[test]
    fn flags_override_defaults() -> Result<()> {
        let format = WavFormat {
            channels: 6,
            sample_rate: 48000,
            bits_per_sample: 16,
        };

        let config = encoder_config(&args("in.wav", None), format)?;
        assert_eq!(config.bit_rate, 448000);
        assert_eq!(config.dialnorm, 31);

        let mut with_flags = args("in.wav", None);
        with_flags.bitrate = Some(640000);
        with_flags.dialnorm = Some(24);
        with_flags.bandwidth = Some(36);
        let config = encoder_config(&with_flags, format)?;
        assert_eq!(config.bit_rate, 640000);
        assert_eq!(config.dialnorm, 24);
        assert_eq!(config.bandwidth_code, 36);
        Ok(())
    }
}
