//! Parametric bit allocation.
//!
//! Turns coded exponents into a per-band masking curve and the masking
//! curve plus an SNR offset into bit-allocation pointers. The model is the
//! one a decoder runs, so every step is integer arithmetic on the standard
//! tables.
//!
//! ## Stages
//!
//! 1. **PSD**: `3072 - 128 * exponent` per coefficient, integrated per band
//!    with a table-driven log addition.
//! 2. **Excitation**: fast and slow leaky integrators across the bands, with
//!    low-frequency compensation in the first 22 bands.
//! 3. **Mask**: excitation raised below the dB knee, floored by the hearing
//!    threshold, then biased by any delta bit allocation segments.
//! 4. **bap**: `psd - mask` quantized to a 6-bit address into [`BAPTAB`].

use crate::structs::config::{BitAllocCodes, DeltaBitAlloc};
use crate::utils::tables::{
    BAND_START, BAPTAB, BIN_TO_BAND, BLOCK_SAMPLES, DB_KNEE, FAST_DECAY, FAST_GAIN, FLOOR,
    HEARING_THRESHOLD, LATAB, NB_BANDS, SLOW_DECAY, SLOW_GAIN,
};

/// Last band handled with low-frequency compensation.
const LOWCOMP_BANDS: usize = 22;

/// SNR offset at `csnroffst = 0, fsnroffst = 0`, which zeroes every bap.
const ZERO_ALLOCATION_OFFSET: i32 = -960;

/// Masking constants resolved from the stream's [`BitAllocCodes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitAllocParams {
    pub fscod: usize,
    pub halfratecod: u8,
    pub slow_decay: i32,
    pub fast_decay: i32,
    pub slow_gain: i32,
    pub db_per_bit: i32,
    pub floor: i32,
    pub fast_gain: i32,
    /// Coupling leak initialisation, `cplfleak` and `cplsleak`.
    pub cpl_fast_leak: i32,
    pub cpl_slow_leak: i32,
}

impl BitAllocParams {
    pub fn new(codes: &BitAllocCodes, fscod: u8, halfratecod: u8) -> Self {
        Self {
            fscod: fscod as usize,
            halfratecod,
            slow_decay: (SLOW_DECAY[codes.sdecaycod as usize] >> halfratecod) as i32,
            fast_decay: (FAST_DECAY[codes.fdecaycod as usize] >> halfratecod) as i32,
            slow_gain: SLOW_GAIN[codes.sgaincod as usize] as i32,
            db_per_bit: DB_KNEE[codes.dbkneecod as usize] as i32,
            floor: FLOOR[codes.floorcod as usize] as i32,
            fast_gain: FAST_GAIN[codes.fgaincod as usize] as i32,
            cpl_fast_leak: 0,
            cpl_slow_leak: 0,
        }
    }

    fn hearing_threshold(&self, band: usize) -> i32 {
        HEARING_THRESHOLD[self.fscod][band >> self.halfratecod] as i32
    }
}

/// Combined SNR offset in PSD units.
pub fn snr_offset(csnroffst: u8, fsnroffst: u8) -> i32 {
    ((((csnroffst as i32) - 15) << 4) + fsnroffst as i32) << 2
}

/// Log-domain addition of two PSD values.
#[inline]
pub fn logadd(a: i32, b: i32) -> i32 {
    let adr = ((a - b).unsigned_abs() >> 1).min(255) as usize;
    a.max(b) + LATAB[adr] as i32
}

fn calc_lowcomp1(a: i32, b0: i32, b1: i32, c: i32) -> i32 {
    if b0 + 256 == b1 {
        c
    } else if b0 > b1 {
        (a - 64).max(0)
    } else {
        a
    }
}

fn calc_lowcomp(a: i32, b0: i32, b1: i32, band: usize) -> i32 {
    if band < 7 {
        calc_lowcomp1(a, b0, b1, 384)
    } else if band < 20 {
        calc_lowcomp1(a, b0, b1, 320)
    } else {
        (a - 128).max(0)
    }
}

/// PSD and masking curve of one channel in one block.
#[derive(Debug, Clone)]
pub struct MaskingCurve {
    pub start: usize,
    pub end: usize,
    pub psd: [i16; BLOCK_SAMPLES],
    pub band_psd: [i16; NB_BANDS],
    pub mask: [i16; NB_BANDS],
}

impl MaskingCurve {
    /// Runs the PSD, excitation and mask stages over `start..end`.
    pub fn compute(
        params: &BitAllocParams,
        exps: &[u8; BLOCK_SAMPLES],
        start: usize,
        end: usize,
        is_lfe: bool,
        delta: Option<&DeltaBitAlloc>,
    ) -> Self {
        let mut curve = Self {
            start,
            end,
            psd: [0; BLOCK_SAMPLES],
            band_psd: [0; NB_BANDS],
            mask: [0; NB_BANDS],
        };

        if start >= end {
            return curve;
        }

        curve.integrate_psd(exps);
        curve.build_mask(params, is_lfe);
        if let Some(delta) = delta {
            curve.apply_delta(delta);
        }

        curve
    }

    fn band_range(&self) -> (usize, usize) {
        (
            BIN_TO_BAND[self.start] as usize,
            BIN_TO_BAND[self.end - 1] as usize + 1,
        )
    }

    fn integrate_psd(&mut self, exps: &[u8; BLOCK_SAMPLES]) {
        for bin in self.start..self.end {
            self.psd[bin] = 3072 - ((exps[bin] as i16) << 7);
        }

        let mut bin = self.start;
        let mut band = BIN_TO_BAND[self.start] as usize;
        loop {
            let mut v = self.psd[bin] as i32;
            bin += 1;

            let band_end = (BAND_START[band + 1] as usize).min(self.end);
            while bin < band_end {
                v = logadd(v, self.psd[bin] as i32);
                bin += 1;
            }

            self.band_psd[band] = v as i16;
            band += 1;
            if self.end <= BAND_START[band] as usize {
                break;
            }
        }
    }

    fn build_mask(&mut self, params: &BitAllocParams, is_lfe: bool) {
        let (band_start, band_end) = self.band_range();
        let band_psd = self.band_psd;
        let psd = |band: usize| band_psd[band] as i32;
        let fgain = params.fast_gain;

        let mut excite = [0i32; NB_BANDS];
        let mut fastleak;
        let mut slowleak;
        let begin;

        if band_start == 0 {
            let mut lowcomp = calc_lowcomp1(0, psd(0), psd(1), 384);
            excite[0] = psd(0) - fgain - lowcomp;
            lowcomp = calc_lowcomp1(lowcomp, psd(1), psd(2), 384);
            excite[1] = psd(1) - fgain - lowcomp;

            fastleak = 0;
            slowleak = 0;
            let mut first = 7;
            for band in 2..7 {
                let lfe_edge = is_lfe && band == 6;
                if !lfe_edge {
                    lowcomp = calc_lowcomp1(lowcomp, psd(band), psd(band + 1), 384);
                }
                fastleak = psd(band) - fgain;
                slowleak = psd(band) - params.slow_gain;
                excite[band] = fastleak - lowcomp;
                if !lfe_edge && psd(band) <= psd(band + 1) {
                    first = band + 1;
                    break;
                }
            }

            for band in first..band_end.min(LOWCOMP_BANDS) {
                if !(is_lfe && band == 6) {
                    lowcomp = calc_lowcomp(lowcomp, psd(band), psd(band + 1), band);
                }
                fastleak = (fastleak - params.fast_decay).max(psd(band) - fgain);
                slowleak = (slowleak - params.slow_decay).max(psd(band) - params.slow_gain);
                excite[band] = (fastleak - lowcomp).max(slowleak);
            }
            begin = LOWCOMP_BANDS;
        } else {
            fastleak = (params.cpl_fast_leak << 8) + 768;
            slowleak = (params.cpl_slow_leak << 8) + 768;
            begin = band_start;
        }

        for band in begin..band_end {
            fastleak = (fastleak - params.fast_decay).max(psd(band) - fgain);
            slowleak = (slowleak - params.slow_decay).max(psd(band) - params.slow_gain);
            excite[band] = fastleak.max(slowleak);
        }

        for band in band_start..band_end {
            let knee = (params.db_per_bit - psd(band)).max(0) >> 2;
            self.mask[band] = (excite[band] + knee).max(params.hearing_threshold(band)) as i16;
        }
    }

    fn apply_delta(&mut self, delta: &DeltaBitAlloc) {
        let (mut band, _) = self.band_range();
        for seg in &delta.segments {
            band += seg.offset as usize;
            let end = (band + seg.len as usize).min(NB_BANDS);
            for mask in &mut self.mask[band.min(end)..end] {
                *mask = (*mask as i32 + seg.delta()) as i16;
            }
            band = end;
        }
    }

    /// Fills `bap[start..end]` for the given SNR offset.
    pub fn allocate(&self, snr_offset: i32, floor: i32, bap: &mut [u8; BLOCK_SAMPLES]) {
        if self.start >= self.end {
            return;
        }

        if snr_offset == ZERO_ALLOCATION_OFFSET {
            bap[self.start..self.end].fill(0);
            return;
        }

        let mut bin = self.start;
        let mut band = BIN_TO_BAND[self.start] as usize;
        loop {
            let m = ((self.mask[band] as i32 - snr_offset - floor).max(0) & 0x1fe0) + floor;
            let band_end = (BAND_START[band + 1] as usize).min(self.end);
            while bin < band_end {
                let address = ((self.psd[bin] as i32 - m) >> 5).clamp(0, 63) as usize;
                bap[bin] = BAPTAB[address];
                bin += 1;
            }

            band += 1;
            if self.end <= BAND_START[band] as usize {
                break;
            }
        }
    }
}
