//! Windowed MDCT analysis.
//!
//! Each audio block transforms 512 samples: the 256 samples of the previous
//! block followed by 256 new ones. The window is a Kaiser-Bessel derived
//! window (alpha = 5) held in Q15, and the MDCT runs as a 128-point complex
//! FFT between a pre- and a post-rotation.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::structs::block::{ChannelBlock, SILENT_EXPONENT};
use crate::utils::tables::{BLOCK_SAMPLES, MDCT_SAMPLES};

pub const KBD_ALPHA: f64 = 5.0;

const QUARTER: usize = BLOCK_SAMPLES / 2;

/// Peak magnitude that input samples are normalized towards before the
/// transform, as a power of two.
const NORM_BITS: i32 = 14;

/// MDCT output is divided by this before rounding to the coefficient lattice.
const MDCT_SCALE: f64 = MDCT_SAMPLES as f64;

pub struct Transform {
    /// First half of the symmetric window in Q15.
    window: [i16; BLOCK_SAMPLES],
    fft: Arc<dyn Fft<f64>>,
    /// `e^(-i*pi*(j + 1/8) / 256)`, shared by the pre- and post-rotation.
    twiddle: Vec<Complex<f64>>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    pub fn new() -> Self {
        let fft = FftPlanner::<f64>::new().plan_fft_forward(QUARTER);
        let twiddle = (0..QUARTER)
            .map(|j| Complex::from_polar(1.0, -PI * (j as f64 + 0.125) / BLOCK_SAMPLES as f64))
            .collect();

        Self {
            window: kbd_window(KBD_ALPHA),
            fft,
            twiddle,
        }
    }

    pub fn window(&self) -> &[i16; BLOCK_SAMPLES] {
        &self.window
    }

    /// Computes `X[k] = sum x[n] cos(pi/256 (n + 1/2 + 128)(k + 1/2))`.
    pub fn mdct(&self, input: &[f64; MDCT_SAMPLES]) -> [f64; BLOCK_SAMPLES] {
        const M: usize = BLOCK_SAMPLES;

        let mut folded = [0.0; M];
        for m in 0..M / 2 {
            folded[m] = -input[3 * M / 2 - 1 - m] - input[3 * M / 2 + m];
        }
        for m in M / 2..M {
            folded[m] = input[m - M / 2] - input[3 * M / 2 - 1 - m];
        }

        let mut buf: Vec<Complex<f64>> = (0..QUARTER)
            .map(|m| Complex::new(folded[2 * m], folded[M - 1 - 2 * m]) * self.twiddle[m])
            .collect();
        self.fft.process(&mut buf);

        let mut output = [0.0; M];
        for (p, (z, t)) in buf.iter().zip(&self.twiddle).enumerate() {
            let c = z * t;
            output[2 * p] = c.re;
            output[M - 1 - 2 * p] = -c.im;
        }

        output
    }

    /// Transforms one block of one channel.
    ///
    /// `history` holds the previous block's raw samples and is replaced by
    /// the new ones. Missing samples are treated as silence.
    pub fn analyze<I>(&self, history: &mut [i16; BLOCK_SAMPLES], samples: I, out: &mut ChannelBlock)
    where
        I: IntoIterator<Item = i16>,
    {
        let mut input = [0i32; MDCT_SAMPLES];
        for (dst, &src) in input.iter_mut().zip(history.iter()) {
            *dst = src as i32;
        }

        let mut fresh = samples.into_iter();
        for (j, slot) in history.iter_mut().enumerate() {
            let sample = fresh.next().unwrap_or(0);
            input[BLOCK_SAMPLES + j] = sample as i32;
            *slot = sample;
        }

        for (j, &w) in self.window.iter().enumerate() {
            input[j] = (input[j] * w as i32) >> 15;
            input[MDCT_SAMPLES - 1 - j] = (input[MDCT_SAMPLES - 1 - j] * w as i32) >> 15;
        }

        let shift = normalization_shift(&input);
        let scaled: [f64; MDCT_SAMPLES] = std::array::from_fn(|n| (input[n] << shift) as f64);
        let spectrum = self.mdct(&scaled);

        let exp_bias = shift as i32 - 10;
        out.exp_bias = exp_bias as i8;
        for (k, &x) in spectrum.iter().enumerate() {
            let mut coef = (-x / MDCT_SCALE).round() as i32;
            out.exps[k] = extract_exponent(&mut coef, exp_bias);
            out.coefs[k] = coef;
        }
    }
}

/// Left shift that brings the block peak up to `2^14`.
fn normalization_shift(input: &[i32; MDCT_SAMPLES]) -> u32 {
    let bits = input.iter().fold(0u32, |acc, &x| acc | x.unsigned_abs());
    let peak_log2 = bits.checked_ilog2().unwrap_or(0) as i32;

    (NORM_BITS - peak_log2).max(0) as u32
}

/// Exponent of one coefficient relative to the 24-bit lattice.
///
/// Coefficients too small for exponent 24 are zeroed. Coefficients too large
/// for exponent 0 are saturated to the largest exponent-0 magnitude.
fn extract_exponent(coef: &mut i32, exp_bias: i32) -> u8 {
    let Some(log2) = coef.unsigned_abs().checked_ilog2() else {
        return SILENT_EXPONENT;
    };

    let exp = 23 - log2 as i32 + exp_bias;
    if exp >= SILENT_EXPONENT as i32 {
        *coef = 0;
        SILENT_EXPONENT
    } else if exp < 0 {
        let limit = (1 << (24 + exp_bias)) - 1;
        *coef = (*coef).clamp(-limit, limit);
        0
    } else {
        exp as u8
    }
}

fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half_sq = x * x / 4.0;

    for k in 1..64 {
        term *= half_sq / (k * k) as f64;
        sum += term;
        if term < sum * 1e-17 {
            break;
        }
    }

    sum
}

/// Rising half of a 512-point KBD window in Q15.
fn kbd_window(alpha: f64) -> [i16; BLOCK_SAMPLES] {
    let half = BLOCK_SAMPLES;

    let kaiser: Vec<f64> = (0..=half)
        .map(|i| {
            let r = 2.0 * i as f64 / half as f64 - 1.0;
            bessel_i0(PI * alpha * (1.0 - r * r).sqrt())
        })
        .collect();
    let total: f64 = kaiser.iter().sum();

    let mut window = [0i16; BLOCK_SAMPLES];
    let mut acc = 0.0;
    for (w, k) in window.iter_mut().zip(&kaiser) {
        acc += k;
        *w = ((acc / total).sqrt() * 32768.0).round().min(32767.0) as i16;
    }

    window
}
