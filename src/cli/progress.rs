use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::timestamp::time_str;

const BAR_TEMPLATE: &str =
    "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}";

/// A bar when the frame count is known up front, a spinner otherwise.
pub fn create_progress_bar(multi: &MultiProgress, total_frames: Option<u64>) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_frames {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(&format!(
            "{BAR_TEMPLATE} | ETA: {{eta_precise}}"
        ))?);
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(SPINNER_TEMPLATE)?);
        pb
    };

    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("initializing encoder");
    Ok(pb)
}

/// Encoding speed relative to real time and the current position.
pub fn speed_message(samples: u64, sample_rate: u32, start_time: Instant) -> String {
    let audio_secs = samples as f64 / sample_rate.max(1) as f64;
    let realtime_multiplier = audio_secs / start_time.elapsed().as_secs_f64().max(1e-9);

    format!(
        "speed: {realtime_multiplier:.1}x | timestamp: {}",
        time_str(samples, sample_rate)
    )
}

pub fn finish_progress_bar(pb: &ProgressBar, known_total: bool, message: String) {
    let (template, fallback) = if known_total {
        (BAR_TEMPLATE, ProgressStyle::default_bar())
    } else {
        (SPINNER_TEMPLATE, ProgressStyle::default_spinner())
    };

    pb.set_style(ProgressStyle::with_template(template).unwrap_or(fallback));
    pb.finish_with_message(message);
}
