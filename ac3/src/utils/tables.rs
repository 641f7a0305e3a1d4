//! Immutable tables from ATSC A/52.
//!
//! Every table here is indexed by a small code carried in the bitstream
//! (fscod, frmsizecod, sdecaycod, ...). The band layout tables are generated
//! at compile time from [`BAND_SIZE`].

/// Number of audio blocks in a frame.
pub const NB_BLOCKS: usize = 6;

/// New samples per channel consumed by one audio block.
pub const BLOCK_SAMPLES: usize = 256;

/// Samples per channel in one frame.
pub const FRAME_SAMPLES: usize = NB_BLOCKS * BLOCK_SAMPLES;

/// Transform length (two overlapping blocks).
pub const MDCT_SAMPLES: usize = 2 * BLOCK_SAMPLES;

/// Full-bandwidth channels plus LFE.
pub const MAX_CHANNELS: usize = 6;

pub const NB_BANDS: usize = 50;

/// Coefficient count of the LFE channel.
pub const LFE_COEFS: usize = 7;

/// Nominal sample rates indexed by fscod. `halfratecod` shifts them right.
pub const SAMPLE_RATES: [u32; 3] = [48000, 44100, 32000];

/// Nominal bit rates in kbps, indexed by `frmsizecod >> 1`.
pub const BIT_RATES_KBPS: [u32; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];

/// Frame sizes in 16-bit words, indexed by fscod then `frmsizecod >> 1`.
/// The 44.1 kHz row is the short size; an odd frmsizecod adds one word.
#[rustfmt::skip]
pub const FRAME_SIZE_WORDS: [[u16; 19]; 3] = [
    [  64,   80,   96,  112,  128,  160,  192,  224,  256,  320,  384,  448,  512,  640,  768,  896, 1024, 1152, 1280],
    [  69,   87,  104,  121,  139,  174,  208,  243,  278,  348,  417,  487,  557,  696,  835,  975, 1114, 1253, 1393],
    [  96,  120,  144,  168,  192,  240,  288,  336,  384,  480,  576,  672,  768,  960, 1152, 1344, 1536, 1728, 1920],
];

/// Full-bandwidth channel count per acmod.
pub const ACMOD_CHANNELS: [usize; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

pub const SLOW_DECAY: [u8; 4] = [0x0f, 0x11, 0x13, 0x15];
pub const FAST_DECAY: [u8; 4] = [0x3f, 0x53, 0x67, 0x7b];
pub const SLOW_GAIN: [u16; 4] = [0x540, 0x4d8, 0x478, 0x410];
pub const DB_KNEE: [u16; 4] = [0x000, 0x700, 0x900, 0xb00];
pub const FLOOR: [i16; 8] = [0x2f0, 0x2b0, 0x270, 0x230, 0x1f0, 0x170, 0x0f0, -0x800];
pub const FAST_GAIN: [u16; 8] = [0x080, 0x100, 0x180, 0x200, 0x280, 0x300, 0x380, 0x400];

/// Width in coefficients of each masking band.
#[rustfmt::skip]
pub const BAND_SIZE: [u8; NB_BANDS] = [
     1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
     1,  1,  1,  1,  1,  1,  1,  1,  1,  1,
     1,  1,  1,  1,  1,  1,  1,  1,  3,  3,
     3,  3,  3,  3,  3,  6,  6,  6,  6,  6,
     6, 12, 12, 12, 12, 24, 24, 24, 24, 24,
];

const fn band_start_table() -> [u16; NB_BANDS + 1] {
    let mut table = [0u16; NB_BANDS + 1];
    let mut i = 0;
    while i < NB_BANDS {
        table[i + 1] = table[i] + BAND_SIZE[i] as u16;
        i += 1;
    }

    table
}

const fn bin_to_band_table() -> [u8; 256] {
    let mut table = [(NB_BANDS - 1) as u8; 256];
    let mut band = 0;
    let mut bin = 0;
    while band < NB_BANDS {
        let mut j = 0;
        while j < BAND_SIZE[band] {
            table[bin] = band as u8;
            bin += 1;
            j += 1;
        }
        band += 1;
    }

    table
}

/// First coefficient of each band; the extra entry is one past the last band.
pub const BAND_START: [u16; NB_BANDS + 1] = band_start_table();

/// Band containing each coefficient.
pub const BIN_TO_BAND: [u8; 256] = bin_to_band_table();

/// Log-addition correction indexed by half the difference of two PSD values.
#[rustfmt::skip]
pub const LATAB: [u16; 256] = [
    0x0040, 0x003f, 0x003e, 0x003d, 0x003c, 0x003b, 0x003a, 0x0039,
    0x0038, 0x0037, 0x0036, 0x0035, 0x0034, 0x0034, 0x0033, 0x0032,
    0x0031, 0x0030, 0x002f, 0x002f, 0x002e, 0x002d, 0x002c, 0x002c,
    0x002b, 0x002a, 0x0029, 0x0029, 0x0028, 0x0027, 0x0026, 0x0026,
    0x0025, 0x0024, 0x0024, 0x0023, 0x0023, 0x0022, 0x0021, 0x0021,
    0x0020, 0x0020, 0x001f, 0x001e, 0x001e, 0x001d, 0x001d, 0x001c,
    0x001c, 0x001b, 0x001b, 0x001a, 0x001a, 0x0019, 0x0019, 0x0018,
    0x0018, 0x0017, 0x0017, 0x0016, 0x0016, 0x0015, 0x0015, 0x0015,
    0x0014, 0x0014, 0x0013, 0x0013, 0x0013, 0x0012, 0x0012, 0x0012,
    0x0011, 0x0011, 0x0011, 0x0010, 0x0010, 0x0010, 0x000f, 0x000f,
    0x000f, 0x000e, 0x000e, 0x000e, 0x000d, 0x000d, 0x000d, 0x000d,
    0x000c, 0x000c, 0x000c, 0x000c, 0x000b, 0x000b, 0x000b, 0x000b,
    0x000a, 0x000a, 0x000a, 0x000a, 0x000a, 0x0009, 0x0009, 0x0009,
    0x0009, 0x0009, 0x0008, 0x0008, 0x0008, 0x0008, 0x0008, 0x0008,
    0x0007, 0x0007, 0x0007, 0x0007, 0x0007, 0x0007, 0x0006, 0x0006,
    0x0006, 0x0006, 0x0006, 0x0006, 0x0006, 0x0006, 0x0005, 0x0005,
    0x0005, 0x0005, 0x0005, 0x0005, 0x0005, 0x0005, 0x0004, 0x0004,
    0x0004, 0x0004, 0x0004, 0x0004, 0x0004, 0x0004, 0x0004, 0x0004,
    0x0004, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003,
    0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0003, 0x0002,
    0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002,
    0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002, 0x0002,
    0x0002, 0x0002, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001,
    0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001,
    0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001,
    0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001, 0x0001,
    0x0001, 0x0001, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
];

/// Absolute hearing threshold per band, indexed by fscod then band.
#[rustfmt::skip]
pub const HEARING_THRESHOLD: [[u16; NB_BANDS]; 3] = [
    [
        0x04d0, 0x04d0, 0x0440, 0x0400, 0x03e0, 0x03c0, 0x03b0, 0x03b0, 0x03a0, 0x03a0,
        0x03a0, 0x03a0, 0x03a0, 0x0390, 0x0390, 0x0390, 0x0380, 0x0380, 0x0370, 0x0370,
        0x0360, 0x0360, 0x0350, 0x0350, 0x0340, 0x0340, 0x0330, 0x0320, 0x0310, 0x0300,
        0x02f0, 0x02f0, 0x02f0, 0x02f0, 0x0300, 0x0310, 0x0340, 0x0390, 0x03e0, 0x0420,
        0x0460, 0x0490, 0x04a0, 0x0460, 0x0440, 0x0440, 0x0520, 0x0800, 0x0840, 0x0840,
    ],
    [
        0x04f0, 0x04f0, 0x0460, 0x0410, 0x03e0, 0x03d0, 0x03c0, 0x03b0, 0x03b0, 0x03a0,
        0x03a0, 0x03a0, 0x03a0, 0x03a0, 0x0390, 0x0390, 0x0390, 0x0380, 0x0380, 0x0380,
        0x0370, 0x0370, 0x0360, 0x0360, 0x0350, 0x0350, 0x0340, 0x0340, 0x0320, 0x0310,
        0x0300, 0x02f0, 0x02f0, 0x02f0, 0x02f0, 0x0300, 0x0320, 0x0350, 0x0390, 0x03e0,
        0x0420, 0x0450, 0x04a0, 0x0490, 0x0460, 0x0440, 0x0480, 0x0630, 0x0840, 0x0840,
    ],
    [
        0x0580, 0x0580, 0x04b0, 0x0450, 0x0420, 0x03f0, 0x03e0, 0x03d0, 0x03c0, 0x03b0,
        0x03b0, 0x03b0, 0x03a0, 0x03a0, 0x03a0, 0x03a0, 0x03a0, 0x03a0, 0x03a0, 0x03a0,
        0x0390, 0x0390, 0x0390, 0x0390, 0x0380, 0x0380, 0x0380, 0x0370, 0x0360, 0x0350,
        0x0340, 0x0330, 0x0320, 0x0310, 0x0300, 0x02f0, 0x02f0, 0x02f0, 0x0300, 0x0310,
        0x0330, 0x0350, 0x03c0, 0x0410, 0x0470, 0x04a0, 0x0460, 0x0440, 0x0450, 0x04e0,
    ],
];

/// Bit-allocation pointer for each quantized (psd - mask) address.
#[rustfmt::skip]
pub const BAPTAB: [u8; 64] = [
     0,  1,  1,  1,  1,  1,  2,  2,  3,  3,  3,  4,  4,  5,  5,  6,
     6,  6,  6,  7,  7,  7,  7,  8,  8,  8,  8,  9,  9,  9,  9, 10,
    10, 10, 10, 11, 11, 11, 11, 12, 12, 12, 12, 13, 13, 13, 13, 14,
    14, 14, 14, 14, 14, 14, 14, 15, 15, 15, 15, 15, 15, 15, 15, 15,
];

/// Header bits of the center/surround mix level and Dolby Surround fields, per acmod.
pub const ACMOD_MIX_BITS: [u32; 8] = [0, 0, 2, 2, 2, 4, 2, 4];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_layout() {
        assert_eq!(BAND_START[NB_BANDS], 253);
        assert_eq!(BAND_START[28], 28);
        assert_eq!(BAND_START[45], 133);
        assert_eq!(BIN_TO_BAND[27], 27);
        assert_eq!(BIN_TO_BAND[28], 28);
        assert_eq!(BIN_TO_BAND[30], 28);
        assert_eq!(BIN_TO_BAND[31], 29);
        assert_eq!(BIN_TO_BAND[252], 49);

        for band in 0..NB_BANDS {
            let start = BAND_START[band] as usize;
            let end = BAND_START[band + 1] as usize;
            assert!((start..end).all(|bin| BIN_TO_BAND[bin] as usize == band));
        }
    }

    #[test]
    fn frame_sizes_follow_bit_rate() {
        for (fscod, row) in FRAME_SIZE_WORDS.iter().enumerate() {
            for (i, &words) in row.iter().enumerate() {
                let bits = BIT_RATES_KBPS[i] as u64 * 1000 * FRAME_SAMPLES as u64;
                let expected = bits / (SAMPLE_RATES[fscod] as u64 * 16);
                assert_eq!(words as u64, expected);
            }
        }
    }
}
