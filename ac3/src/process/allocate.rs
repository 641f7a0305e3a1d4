//! SNR offset search.
//!
//! Finds the largest coarse and fine SNR offsets whose bit allocation still
//! fits the frame. Every trial allocates into a fresh candidate table and
//! only a fitting candidate replaces the committed one.

use anyhow::{Result, bail};
use log::{debug, trace};

use crate::process::mantissa::{GroupCounters, channel_mantissa_bits};
use crate::process::masking::{BitAllocParams, MaskingCurve, snr_offset};
use crate::structs::block::{AudioFrame, BapTable, bap_table};
use crate::structs::config::StreamParams;
use crate::utils::errors::EncodeError;
use crate::utils::tables::NB_BLOCKS;

/// Starting `csnroffst` of the first frame.
pub const INITIAL_CSNR: u8 = 40;

pub const MAX_CSNR: u8 = 63;
pub const MAX_FSNR: u8 = 15;

const COARSE_STEP: u8 = 4;

/// Masking curves of every coded channel in every block, `[blk][ch]`.
pub fn masking_curves(
    params: &StreamParams,
    bit_alloc: &BitAllocParams,
    frame: &AudioFrame,
) -> Vec<Vec<MaskingCurve>> {
    frame
        .blocks
        .iter()
        .map(|block| {
            (0..params.channels())
                .map(|ch| {
                    MaskingCurve::compute(
                        bit_alloc,
                        &block.channels[ch].encoded_exps,
                        0,
                        params.nb_coefs[ch],
                        params.layout.is_lfe(ch),
                        params.delta_bit_alloc[ch].as_ref(),
                    )
                })
                .collect()
        })
        .collect()
}

/// Committed result of a search.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub csnroffst: u8,
    pub fsnroffst: u8,
    pub bap: Box<BapTable>,
    pub mantissa_bits: u32,
}

impl Allocation {
    /// Offsets 0/0 zero every bap, which is how silent frames are coded.
    pub fn zero() -> Self {
        Self {
            csnroffst: 0,
            fsnroffst: 0,
            bap: bap_table(),
            mantissa_bits: 0,
        }
    }
}

pub struct AllocationSearch<'a> {
    bit_alloc: &'a BitAllocParams,
    curves: &'a [Vec<MaskingCurve>],
    /// Bits left for mantissas once headers and side information are paid.
    budget: u32,
}

impl<'a> AllocationSearch<'a> {
    pub fn new(bit_alloc: &'a BitAllocParams, curves: &'a [Vec<MaskingCurve>], budget: u32) -> Self {
        Self {
            bit_alloc,
            curves,
            budget,
        }
    }

    /// Allocates every block for one offset pair. `None` when the mantissas
    /// overspend the budget.
    pub fn evaluate(&self, csnroffst: u8, fsnroffst: u8) -> Option<Allocation> {
        let snr = snr_offset(csnroffst, fsnroffst);
        let mut bap = bap_table();
        let mut bits = 0;
        let mut counters = GroupCounters::default();

        for (blk, curves) in self.curves.iter().enumerate().take(NB_BLOCKS) {
            counters.reset();
            for (ch, curve) in curves.iter().enumerate() {
                let table = &mut bap[blk][ch];
                curve.allocate(snr, self.bit_alloc.floor, table);
                bits += channel_mantissa_bits(&table[curve.start..curve.end], &mut counters);
            }

            if bits > self.budget {
                trace!("csnr {csnroffst} fsnr {fsnroffst}: over budget at block {blk}");
                return None;
            }
        }

        trace!("csnr {csnroffst} fsnr {fsnroffst}: {bits} of {} bits", self.budget);
        Some(Allocation {
            csnroffst,
            fsnroffst,
            bap,
            mantissa_bits: bits,
        })
    }

    /// Descends from `start_csnr` in coarse steps until an allocation fits,
    /// then climbs the coarse offset and the fine offset as far as they go.
    pub fn run(&self, start_csnr: u8, frame_size: usize) -> Result<Allocation> {
        let mut csnr = start_csnr.min(MAX_CSNR) as i32;
        let mut best = loop {
            if csnr < 0 {
                bail!(EncodeError::BitAllocationExhausted { frame_size });
            }
            if let Some(fit) = self.evaluate(csnr as u8, 0) {
                break fit;
            }
            csnr -= COARSE_STEP as i32;
        };

        for step in [COARSE_STEP, 1] {
            while best.csnroffst + step <= MAX_CSNR {
                match self.evaluate(best.csnroffst + step, 0) {
                    Some(fit) => best = fit,
                    None => break,
                }
            }
        }

        for step in [COARSE_STEP, 1] {
            while best.fsnroffst + step <= MAX_FSNR {
                match self.evaluate(best.csnroffst, best.fsnroffst + step) {
                    Some(fit) => best = fit,
                    None => break,
                }
            }
        }

        debug!(
            "Bit allocation: csnroffst {}, fsnroffst {}, {} of {} mantissa bits",
            best.csnroffst, best.fsnroffst, best.mantissa_bits, self.budget
        );

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::config::BitAllocCodes;
    use crate::utils::tables::BLOCK_SAMPLES;

    fn curves_for(channels: usize, exp: impl Fn(usize) -> u8) -> (BitAllocParams, Vec<Vec<MaskingCurve>>) {
        let params = BitAllocParams::new(&BitAllocCodes::default(), 1, 0);
        let exps: [u8; BLOCK_SAMPLES] = std::array::from_fn(|k| exp(k).min(24));

        let curves = (0..NB_BLOCKS)
            .map(|_| {
                (0..channels)
                    .map(|_| MaskingCurve::compute(&params, &exps, 0, 253, false, None))
                    .collect()
            })
            .collect();
        (params, curves)
    }

    fn busy_curves(channels: usize) -> (BitAllocParams, Vec<Vec<MaskingCurve>>) {
        curves_for(channels, |k| 1 + (k % 23) as u8 / 3)
    }

    /// A lone peak that still gets bits at `csnroffst = 1`.
    fn peak_curves(channels: usize) -> (BitAllocParams, Vec<Vec<MaskingCurve>>) {
        curves_for(channels, |k| (2 + 2 * k.abs_diff(12)).min(24) as u8)
    }

    #[test]
    fn result_fits_and_is_maximal() -> Result<()> {
        let (params, curves) = busy_curves(2);
        let budget = 8000;
        let search = AllocationSearch::new(&params, &curves, budget);

        let best = search.run(INITIAL_CSNR, 278)?;
        assert!(best.mantissa_bits <= budget);

        if best.fsnroffst < MAX_FSNR {
            assert!(search.evaluate(best.csnroffst, best.fsnroffst + 1).is_none());
        }
        if best.csnroffst < MAX_CSNR {
            assert!(search.evaluate(best.csnroffst + 1, 0).is_none());
        }
        Ok(())
    }

    #[test]
    fn start_point_does_not_matter_for_a_loose_fit() -> Result<()> {
        let (params, curves) = busy_curves(1);
        let search = AllocationSearch::new(&params, &curves, 8000);

        let from_low = search.run(0, 278)?;
        let from_high = search.run(MAX_CSNR, 278)?;
        assert_eq!(from_low.csnroffst, from_high.csnroffst);
        assert_eq!(from_low.fsnroffst, from_high.fsnroffst);
        assert_eq!(from_low.bap, from_high.bap);
        Ok(())
    }

    #[test]
    fn generous_budget_reaches_the_ceiling() -> Result<()> {
        let (params, curves) = busy_curves(1);
        let search = AllocationSearch::new(&params, &curves, u32::MAX);

        let best = search.run(INITIAL_CSNR, 1920)?;
        assert_eq!((best.csnroffst, best.fsnroffst), (MAX_CSNR, MAX_FSNR));
        Ok(())
    }

    #[test]
    fn empty_budget_allocates_nothing() -> Result<()> {
        let (params, curves) = peak_curves(2);
        let search = AllocationSearch::new(&params, &curves, 0);

        let best = search.run(INITIAL_CSNR, 64)?;
        assert_eq!(best.csnroffst, 0);
        assert_eq!(best.mantissa_bits, 0);
        assert!(best.bap.iter().flatten().flatten().all(|&b| b == 0));

        let zero = search.evaluate(0, 0).map(|alloc| alloc.bap);
        assert_eq!(zero, Some(Allocation::zero().bap));
        Ok(())
    }

    #[test]
    fn exhaustion_is_reported() {
        let (params, curves) = peak_curves(2);
        let search = AllocationSearch::new(&params, &curves, 0);

        // 41 descends through 1 and never evaluates the all-zero offset 0.
        let err = search.run(41, 64).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EncodeError>(),
            Some(&EncodeError::BitAllocationExhausted { frame_size: 64 })
        );
    }
}
