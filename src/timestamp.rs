/// Formats a sample position as `HH:MM:SS.mmm`.
pub fn time_str(samples: u64, sample_rate: u32) -> String {
    let ms = samples * 1000 / sample_rate.max(1) as u64;
    let hours = ms / 3_600_000;
    let minutes = ms / 60_000 % 60;
    let seconds = ms / 1000 % 60;
    let milliseconds = ms % 1000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sample_positions() {
        assert_eq!(time_str(0, 48000), "00:00:00.000");
        assert_eq!(time_str(1536, 48000), "00:00:00.032");
        assert_eq!(time_str(44100 * 3725 + 22050, 44100), "01:02:05.500");
        assert_eq!(time_str(32000 * 3600 * 120, 32000), "120:00:00.000");
    }
}
