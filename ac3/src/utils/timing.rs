//! Frame pacing for rates whose frames don't divide into whole words.
//!
//! At 44.1 kHz and its reduced rates a frame at the nominal bit rate is a
//! fraction of a word longer than the short frame size. The pacer tracks
//! bits and samples written so far and adds the padding word whenever the
//! stream falls behind its bit rate.

use crate::utils::tables::FRAME_SAMPLES;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FramePacer {
    bits_written: u64,
    samples_written: u64,
}

impl FramePacer {
    /// Size in words of the next frame, without committing it.
    pub fn next_frame_size(&self, frame_size_min: usize, bit_rate: u32, sample_rate: u32) -> usize {
        let (bit_rate, sample_rate) = (bit_rate as u64, sample_rate as u64);
        let behind = self.bits_written * sample_rate < self.samples_written * bit_rate;

        frame_size_min + behind as usize
    }

    /// Records a written frame of `frame_size` words.
    pub fn advance(&mut self, frame_size: usize, bit_rate: u32, sample_rate: u32) {
        let (bit_rate, sample_rate) = (bit_rate as u64, sample_rate as u64);

        self.bits_written += 16 * frame_size as u64;
        self.samples_written += FRAME_SAMPLES as u64;

        // Whole seconds cancel out and keep the counters small.
        while self.bits_written >= bit_rate && self.samples_written >= sample_rate {
            self.bits_written -= bit_rate;
            self.samples_written -= sample_rate;
        }
    }
}
