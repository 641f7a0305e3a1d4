//! Exponent strategy selection and differential exponent coding.
//!
//! For every channel the six blocks are split into runs that start with a
//! freshly coded block and continue with blocks reusing its exponents. The
//! run length picks the grouping granularity, the first block of a run
//! carries the per-coefficient minimum over the run, and the coded values
//! are smoothed so neighbouring groups differ by at most 2.

use log::trace;

use crate::structs::block::{AudioFrame, ExpStrategy};
use crate::structs::channel::ChannelLayout;
use crate::utils::tables::{BLOCK_SAMPLES, MAX_CHANNELS, NB_BLOCKS};

/// A block reuses the previous exponents when the sum of absolute
/// differences stays at or below this.
pub const EXP_DIFF_THRESHOLD: u32 = 1000;

/// Largest DC exponent the 4-bit absolute field carries.
const MAX_DC_EXPONENT: u8 = 15;

/// Grouping granularity for a run of `len` blocks sharing exponents.
fn run_strategy(len: usize) -> ExpStrategy {
    match len {
        1 => ExpStrategy::D15,
        2 | 3 => ExpStrategy::D25,
        _ => ExpStrategy::D45,
    }
}

fn exp_diff(a: &[u8; BLOCK_SAMPLES], b: &[u8; BLOCK_SAMPLES]) -> u32 {
    a.iter().zip(b).map(|(&x, &y)| x.abs_diff(y) as u32).sum()
}

/// Strategies of one channel across the frame. Block 0 is always coded.
pub fn compute_strategies(frame: &AudioFrame, ch: usize, is_lfe: bool) -> [ExpStrategy; NB_BLOCKS] {
    let mut reuse = [false; NB_BLOCKS];
    for blk in 1..NB_BLOCKS {
        let diff = exp_diff(
            &frame.blocks[blk].channels[ch].exps,
            &frame.blocks[blk - 1].channels[ch].exps,
        );
        reuse[blk] = diff <= EXP_DIFF_THRESHOLD;
    }

    let mut strategies = [ExpStrategy::Reuse; NB_BLOCKS];
    let mut blk = 0;
    while blk < NB_BLOCKS {
        let mut end = blk + 1;
        while end < NB_BLOCKS && reuse[end] {
            end += 1;
        }

        strategies[blk] = if is_lfe {
            ExpStrategy::D15
        } else {
            run_strategy(end - blk)
        };
        blk = end;
    }

    strategies
}

/// Number of coded exponent groups, always a multiple of 3.
pub fn exponent_groups(nb_coefs: usize, strategy: ExpStrategy) -> usize {
    let gs = strategy.group_size();
    if gs == 0 || nb_coefs == 0 {
        return 0;
    }

    (nb_coefs + 3 * gs - 4) / (3 * gs) * 3
}

/// Bits taken by one coded exponent set: the DC value plus one 7-bit word
/// per three groups.
pub fn exponent_bits(nb_coefs: usize, strategy: ExpStrategy) -> u32 {
    if strategy.is_reuse() {
        return 0;
    }

    4 + 7 * (exponent_groups(nb_coefs, strategy) / 3) as u32
}

/// Limits every step between consecutive values to +/-2.
///
/// A successor that rises too fast is lowered in place. A predecessor that
/// sits too high above its successor is lowered and the scan restarts, so
/// the loop ends at the first pass that changes no predecessor. Values only
/// ever decrease, which bounds the number of restarts.
pub fn smooth_deltas(values: &mut [u8]) {
    loop {
        let mut dirty = false;
        for i in 1..values.len() {
            if values[i] > values[i - 1] + 2 {
                values[i] = values[i - 1] + 2;
            } else if values[i - 1] > values[i] + 2 {
                values[i - 1] = values[i] + 2;
                dirty = true;
                break;
            }
        }

        if !dirty {
            break;
        }
    }
}

/// Codes one exponent set and returns the exponents a decoder reconstructs.
///
/// Entries beyond the last group are left at their previous value.
pub fn encode_exponents(
    exps: &[u8; BLOCK_SAMPLES],
    nb_coefs: usize,
    strategy: ExpStrategy,
    encoded: &mut [u8; BLOCK_SAMPLES],
) {
    let gs = strategy.group_size();
    let groups = exponent_groups(nb_coefs, strategy);
    if groups == 0 {
        return;
    }

    let mut coded = Vec::with_capacity(groups + 1);
    coded.push(exps[0].min(MAX_DC_EXPONENT));
    for g in 0..groups {
        let start = 1 + g * gs;
        let end = (start + gs).min(BLOCK_SAMPLES);
        coded.push(exps[start..end].iter().copied().min().unwrap_or(exps[start]));
    }

    smooth_deltas(&mut coded);

    encoded[0] = coded[0];
    for (g, &value) in coded[1..].iter().enumerate() {
        let start = 1 + g * gs;
        let end = (start + gs).min(BLOCK_SAMPLES);
        encoded[start..end].fill(value);
    }
}

/// Splits coded exponents into the absolute DC value and the 7-bit words
/// carrying three differentials each as base-5 digits.
pub fn group_exponents(
    encoded: &[u8; BLOCK_SAMPLES],
    nb_coefs: usize,
    strategy: ExpStrategy,
) -> (u8, Vec<u8>) {
    let gs = strategy.group_size();
    let groups = exponent_groups(nb_coefs, strategy);

    let mut prev = encoded[0] as i32;
    let mut words = Vec::with_capacity(groups / 3);
    for triplet in 0..groups / 3 {
        let mut word = 0;
        for i in 0..3 {
            let value = encoded[1 + (triplet * 3 + i) * gs] as i32;
            word = word * 5 + (value - prev + 2) as u8;
            prev = value;
        }
        words.push(word);
    }

    (encoded[0], words)
}

/// Chooses strategies and codes exponents for every channel of a frame.
///
/// Blocks that reuse exponents receive a copy of the run's coded set.
pub fn process_exponents(frame: &mut AudioFrame, layout: &ChannelLayout, nb_coefs: &[usize; MAX_CHANNELS]) {
    for ch in 0..layout.channels() {
        let strategies = compute_strategies(frame, ch, layout.is_lfe(ch));
        trace!("channel {ch} exponent strategies: {strategies:?}");

        let mut blk = 0;
        while blk < NB_BLOCKS {
            let mut end = blk + 1;
            while end < NB_BLOCKS && strategies[end].is_reuse() {
                end += 1;
            }

            let mut exps = frame.blocks[blk].channels[ch].exps;
            for other in &frame.blocks[blk + 1..end] {
                for (e, &o) in exps.iter_mut().zip(&other.channels[ch].exps) {
                    *e = (*e).min(o);
                }
            }

            let mut encoded = frame.blocks[blk].channels[ch].encoded_exps;
            encode_exponents(&exps, nb_coefs[ch], strategies[blk], &mut encoded);

            for (i, block) in frame.blocks[blk..end].iter_mut().enumerate() {
                let channel = &mut block.channels[ch];
                channel.strategy = strategies[blk + i];
                channel.encoded_exps = encoded;
            }

            blk = end;
        }
    }
}
