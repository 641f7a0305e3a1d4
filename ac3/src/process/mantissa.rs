//! Mantissa quantization and packing.
//!
//! The bap of a coefficient selects its quantizer. Baps 1, 2 and 4 pack
//! three, three and two mantissas into one code word, so both the size
//! estimate and the packer walk the coefficients with the same
//! [`GroupCounters`], reset at the start of every audio block.

/// Quantizer levels of the symmetric baps, indexed by bap.
const SYM_LEVELS: [u16; 6] = [0, 3, 5, 7, 11, 15];

/// Bits of one code word for the grouped baps 1, 2 and 4.
const GROUP_BITS: [u32; 3] = [5, 7, 7];

/// Weight of each grouped mantissa inside its code word.
const GROUP_WEIGHTS: [[u16; 3]; 3] = [[9, 3, 1], [25, 5, 1], [11, 1, 0]];

const GROUP_SIZES: [u8; 3] = [3, 3, 2];

/// Position of the next bap 1, 2 and 4 mantissa inside its group.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GroupCounters {
    counts: [u8; 3],
}

impl GroupCounters {
    pub fn reset(&mut self) {
        self.counts = [0; 3];
    }

    fn slot(bap: u8) -> Option<usize> {
        match bap {
            1 => Some(0),
            2 => Some(1),
            4 => Some(2),
            _ => None,
        }
    }

    /// Advances the counter of a grouped bap and returns the mantissa's
    /// position in its group. Position 0 opens a new code word.
    pub fn advance(&mut self, bap: u8) -> Option<u8> {
        let slot = Self::slot(bap)?;
        let pos = self.counts[slot];
        self.counts[slot] = (pos + 1) % GROUP_SIZES[slot];
        Some(pos)
    }
}

/// Bits one mantissa adds to the frame.
pub fn mantissa_bits(bap: u8, counters: &mut GroupCounters) -> u32 {
    match counters.advance(bap) {
        Some(0) => GROUP_BITS[GroupCounters::slot(bap).unwrap_or_default()],
        Some(_) => 0,
        None => match bap {
            0 => 0,
            3 => 3,
            5 => 4,
            14 => 14,
            15 => 16,
            _ => bap as u32 - 1,
        },
    }
}

/// Mantissa bits of one channel's coefficients, continuing the block's groups.
pub fn channel_mantissa_bits(bap: &[u8], counters: &mut GroupCounters) -> u32 {
    bap.iter().map(|&b| mantissa_bits(b, counters)).sum()
}

#[inline]
fn shift(c: i32, e: i32) -> i64 {
    if e >= 0 {
        (c as i64) << e.min(40)
    } else {
        (c as i64) >> (-e).min(63)
    }
}

/// Symmetric quantization to `levels` levels centred on `levels / 2`.
///
/// `c << e` is the coefficient on the 24-bit mantissa lattice.
pub fn sym_quant(c: i32, e: i32, levels: u16) -> u16 {
    let levels = levels as i64;
    let v = (((levels * shift(c, e)) >> 24) + levels) >> 1;

    v.clamp(0, levels - 1) as u16
}

/// Two's complement quantization to `qbits` bits, rounding half up.
pub fn asym_quant(c: i32, e: i32, qbits: u32) -> u16 {
    let v = (shift(c, e + qbits as i32 - 24) + 1) >> 1;
    let m = 1i64 << (qbits - 1);

    (v.clamp(-m, m - 1) & ((1 << qbits) - 1)) as u16
}

/// One field of the mantissa section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MantissaWord {
    pub value: u16,
    pub bits: u32,
}

/// Quantizes the mantissas of one audio block into code words.
///
/// Channels are pushed in coded order. Grouped mantissas are folded into
/// the word opened by the first member of their group.
#[derive(Debug, Default)]
pub struct MantissaPacker {
    counters: GroupCounters,
    open: [usize; 3],
    words: Vec<MantissaWord>,
}

impl MantissaPacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, coef: i32, exp: i32, bap: u8) {
        if bap == 0 {
            return;
        }

        if let Some(slot) = GroupCounters::slot(bap) {
            let pos = self.counters.advance(bap).unwrap_or_default() as usize;
            let q = sym_quant(coef, exp, SYM_LEVELS[bap as usize]);
            let part = q * GROUP_WEIGHTS[slot][pos];

            if pos == 0 {
                self.open[slot] = self.words.len();
                self.words.push(MantissaWord {
                    value: part,
                    bits: GROUP_BITS[slot],
                });
            } else {
                self.words[self.open[slot]].value += part;
            }
            return;
        }

        let word = match bap {
            3 | 5 => MantissaWord {
                value: sym_quant(coef, exp, SYM_LEVELS[bap as usize]),
                bits: if bap == 3 { 3 } else { 4 },
            },
            14 => MantissaWord {
                value: asym_quant(coef, exp, 14),
                bits: 14,
            },
            15 => MantissaWord {
                value: asym_quant(coef, exp, 16),
                bits: 16,
            },
            _ => MantissaWord {
                value: asym_quant(coef, exp, bap as u32 - 1),
                bits: bap as u32 - 1,
            },
        };
        self.words.push(word);
    }

    /// Pushes `nb_coefs` coefficients of one channel.
    pub fn push_channel(&mut self, coefs: &[i32], exps: &[u8], exp_bias: i8, bap: &[u8]) {
        for ((&coef, &exp), &b) in coefs.iter().zip(exps).zip(bap) {
            self.push(coef, exp as i32 - exp_bias as i32, b);
        }
    }

    pub fn bits(&self) -> u32 {
        self.words.iter().map(|w| w.bits).sum()
    }

    pub fn into_words(self) -> Vec<MantissaWord> {
        self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg(seed: &mut u32) -> u32 {
        *seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
        *seed >> 1
    }

    #[test]
    fn symmetric_levels_stay_in_range() {
        let mut seed = 1;
        for _ in 0..20000 {
            let c = (lcg(&mut seed) as i32 % (1 << 25)) - (1 << 24);
            let e = (lcg(&mut seed) % 30) as i32 - 6;
            for levels in [3, 5, 7, 11, 15] {
                assert!(sym_quant(c, e, levels) < levels, "c {c} e {e} levels {levels}");
            }
        }
    }

    #[test]
    fn symmetric_reference_points() {
        assert_eq!(sym_quant(0, 0, 3), 1);
        assert_eq!(sym_quant(0, 10, 15), 7);
        assert_eq!(sym_quant((1 << 24) - 1, 0, 3), 2);
        assert_eq!(sym_quant(-(1 << 24), 0, 3), 0);
        assert_eq!(sym_quant(1 << 22, 1, 5), 3);
    }

    #[test]
    fn asymmetric_fits_its_width() {
        let mut seed = 9;
        for _ in 0..20000 {
            let c = (lcg(&mut seed) as i32 % (1 << 25)) - (1 << 24);
            let e = (lcg(&mut seed) % 30) as i32 - 6;
            for qbits in [5, 7, 10, 14, 16] {
                assert!((asym_quant(c, e, qbits) as u32) < 1 << qbits);
            }
        }

        assert_eq!(asym_quant(1 << 23, 0, 16), 0x4000);
        assert_eq!(asym_quant(-(1 << 23), 0, 16), 0xC000);
        assert_eq!(asym_quant(1 << 24, 0, 5), 0x0F);
        assert_eq!(asym_quant(-(1 << 24), 0, 5), 0x10);
    }

    #[test]
    fn group_counters_cycle() {
        let mut counters = GroupCounters::default();
        let positions: Vec<_> = (0..7).map(|_| counters.advance(1)).collect();
        assert_eq!(positions, [0u8, 1, 2, 0, 1, 2, 0].map(Some));
        assert_eq!(counters.advance(4), Some(0));
        assert_eq!(counters.advance(4), Some(1));
        assert_eq!(counters.advance(4), Some(0));
        assert_eq!(counters.advance(3), None);

        counters.reset();
        assert_eq!(counters.advance(1), Some(0));
    }

    #[test]
    fn sizes_per_bap() {
        let mut counters = GroupCounters::default();
        let bits: Vec<u32> = [1, 1, 1, 1, 2, 4, 4, 3, 5, 6, 13, 14, 15]
            .iter()
            .map(|&b| mantissa_bits(b, &mut counters))
            .collect();
        assert_eq!(bits, [5, 0, 0, 5, 7, 7, 0, 3, 4, 5, 12, 14, 16]);
    }

    #[test]
    fn packer_matches_size_estimate() {
        let mut seed = 3;
        let baps: Vec<u8> = (0..250).map(|_| (lcg(&mut seed) % 16) as u8).collect();
        let coefs: Vec<i32> = (0..250).map(|_| (lcg(&mut seed) % (1 << 20)) as i32 - (1 << 19)).collect();
        let exps: Vec<u8> = coefs
            .iter()
            .map(|&c| (23 - c.unsigned_abs().max(1).ilog2() as i32).clamp(0, 24) as u8)
            .collect();

        let mut counters = GroupCounters::default();
        let expected = channel_mantissa_bits(&baps[..120], &mut counters)
            + channel_mantissa_bits(&baps[120..], &mut counters);

        let mut packer = MantissaPacker::new();
        packer.push_channel(&coefs[..120], &exps[..120], 0, &baps[..120]);
        packer.push_channel(&coefs[120..], &exps[120..], 0, &baps[120..]);
        assert_eq!(packer.bits(), expected);

        for word in packer.into_words() {
            assert!((word.value as u32) < 1 << word.bits);
        }
    }

    #[test]
    fn grouped_words_combine_digits() {
        let mut packer = MantissaPacker::new();
        packer.push(-(1 << 23), 0, 1);
        packer.push(0, 0, 1);
        packer.push((1 << 23) + (1 << 22), 0, 1);
        packer.push(0, 0, 4);

        let words = packer.into_words();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], MantissaWord { value: 5, bits: 5 });
        assert_eq!(words[1], MantissaWord { value: 11 * 5, bits: 7 });
    }
}
