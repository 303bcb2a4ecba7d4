//! Integer fixed-point primitives.
//!
//! All results round toward zero. Intermediate products are carried in 256
//! bits (as a `(hi, lo)` pair of u128) so `a × b / d` never loses precision
//! and only fails when the final quotient does not fit in u128.

use qvote_types::WAD;

/// `WAD²`: scales an integer so its square root comes out with 18 decimals.
const WAD_SQUARED: u128 = WAD * WAD;

/// Full 256-bit product of two u128 values as `(hi, lo)`.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_lo, a_hi) = (a & MASK, a >> 64);
    let (b_lo, b_hi) = (b & MASK, b >> 64);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    // Each term is < 2^64, so the sum fits comfortably.
    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | (mid << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// `floor(a × b / d)`, or `None` if `d == 0` or the quotient exceeds u128.
pub fn mul_div_floor(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    let (hi, lo) = mul_wide(a, b);
    if hi == 0 {
        return Some(lo / d);
    }
    if hi >= d {
        return None;
    }

    // Restoring long division of the 256-bit numerator, one bit at a time.
    let mut rem: u128 = hi;
    let mut quotient: u128 = 0;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quotient |= 1 << i;
        }
    }
    Some(quotient)
}

/// `floor(sqrt(hi·2^128 + lo))` by bitwise construction.
fn isqrt_wide(hi: u128, lo: u128) -> u128 {
    let mut root: u128 = 0;
    for bit in (0..128).rev() {
        let candidate = root | (1 << bit);
        if mul_wide(candidate, candidate) <= (hi, lo) {
            root = candidate;
        }
    }
    root
}

/// Integer square root, rounded toward zero.
pub fn isqrt(n: u128) -> u128 {
    isqrt_wide(0, n)
}

/// `sqrt(n)` as an 18-decimal fixed-point value: `floor(sqrt(n · 10^36))`.
pub fn sqrt_wad(n: u128) -> u128 {
    let (hi, lo) = mul_wide(n, WAD_SQUARED);
    isqrt_wide(hi, lo)
}
