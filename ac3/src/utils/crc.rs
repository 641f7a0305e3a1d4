//! CRC-16 for AC-3 frames.
//!
//! Generator polynomial x^16 + x^15 + x^2 + 1, processed MSB first with a zero
//! initial value. CRC1 sits at the start of the frame but protects the data
//! that follows it, so the encoder computes it over the data and then
//! multiplies by a power of x^-1 in GF(2)[x] / P(x) ([`mul_poly`], [`pow_poly`]) to get
//! the value that makes the register read zero after the protected span.

/// CRC algorithm parameters: polynomial and initial value.
pub struct Algorithm<T> {
    poly: T,
    init: T,
}

/// CRC-16 used for both CRC1 and CRC2 (polynomial without the x^16 term).
pub const CRC16_AC3_ALG: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0x0000,
};

/// Full 17-bit generator polynomial.
pub const CRC16_AC3_POLY: u32 = 0x1_8005;

/// Computes the CRC-16 register after shifting `value` through `len` bits.
#[inline(always)]
pub const fn crc16(poly: u16, mut value: u16, len: usize) -> u16 {
    value <<= 8;

    let mut i = 0;
    while i < len {
        value = (value << 1) ^ (((value >> 15) & 1) * poly);
        i += 1;
    }

    value
}

#[inline(always)]
const fn crc16_table(poly: u16) -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = crc16(poly, i as u16, 8);
        i += 1;
    }

    table
}

/// Product of two polynomials modulo `poly`.
pub const fn mul_poly(mut a: u32, mut b: u32, poly: u32) -> u32 {
    let mut c = 0;
    while a != 0 {
        if a & 1 != 0 {
            c ^= b;
        }
        a >>= 1;
        b <<= 1;
        if b & (1 << 16) != 0 {
            b ^= poly;
        }
    }

    c
}

/// `a` raised to the `n`-th power modulo `poly`.
pub const fn pow_poly(mut a: u32, mut n: u32, poly: u32) -> u32 {
    let mut r = 1;
    while n != 0 {
        if n & 1 != 0 {
            r = mul_poly(r, a, poly);
        }
        a = mul_poly(a, a, poly);
        n >>= 1;
    }

    r
}

#[derive(Debug)]
pub struct Crc16 {
    pub poly: u16,
    pub init: u16,
    table: [u16; 256],
}

impl Crc16 {
    pub const fn new(algorithm: &Algorithm<u16>) -> Self {
        Self {
            poly: algorithm.poly,
            init: algorithm.init,
            table: crc16_table(algorithm.poly),
        }
    }

    const fn table_entry(&self, index: u16) -> u16 {
        self.table[(index & 0xFF) as usize]
    }

    #[inline(always)]
    pub const fn update(&self, mut crc: u16, bytes: &[u8]) -> u16 {
        let mut i = 0;

        while i < bytes.len() {
            crc = self.table_entry((crc >> 8) ^ bytes[i] as u16) ^ (crc << 8);
            i += 1;
        }

        crc
    }

    #[inline(always)]
    pub const fn checksum(&self, bytes: &[u8]) -> u16 {
        self.update(self.init, bytes)
    }

    /// Value to store in front of `bits` bits of data whose checksum is `crc`
    /// so that the checksum over the stored value plus the data is zero.
    ///
    /// The register holds `M(x) * x^16 mod P(x)`, so the stored word has to
    /// be scaled by `x^-(bits + 16)`.
    pub const fn leading(&self, crc: u16, bits: u32) -> u16 {
        let inverse = pow_poly(CRC16_AC3_POLY >> 1, bits + 16, CRC16_AC3_POLY);
        mul_poly(inverse, crc as u32, CRC16_AC3_POLY) as u16
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new(&CRC16_AC3_ALG)
    }
}
