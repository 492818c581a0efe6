//! Canonical Signed-Digit encoding: the minimal-weight {-1, 0, +1} digit
//! representation that underlies every shift-add realization in this crate.

use crate::error::{CcError, Result};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Sign {
    Pos,
    Neg,
}

impl Sign {
    pub fn of(positive: bool) -> Self {
        if positive {
            Sign::Pos
        } else {
            Sign::Neg
        }
    }
}

/// Canonical signed-digit encoding of `value`, with `int_bits` digits to the
/// left of the implicit binary point and `total_bits` digits overall.
/// `digits[0]` is the most significant digit. Guarantees minimal Hamming
/// weight and that no two adjacent digits are non-zero.
pub fn to_csd(value: f64, int_bits: i32, total_bits: u32) -> Result<Vec<i8>> {
    let limit = 2f64.powi(int_bits);
    if value.abs() >= limit {
        return Err(CcError::OutOfRange {
            value,
            int_bits,
        });
    }
    let frac_bits = total_bits as i32 - int_bits;
    let scale = 2f64.powi(frac_bits);
    let k = (value * scale).round() as i64;

    // Non-adjacent-form recoding of the scaled integer `k`, LSB first.
    let mut naf = vec![0i8; total_bits as usize];
    let mut acc = k;
    for digit in naf.iter_mut() {
        if acc & 1 != 0 {
            let m4 = acc.rem_euclid(4);
            let d: i64 = if m4 == 1 { 1 } else { -1 };
            *digit = d as i8;
            acc -= d;
        }
        acc >>= 1;
    }

    // `naf[j]` carries weight `2^j` (j counted from the LSB); the digit
    // vector is MSB-first, so digit index `i` corresponds to naf index
    // `total_bits - 1 - i`.
    let mut digits = vec![0i8; total_bits as usize];
    for i in 0..total_bits as usize {
        digits[i] = naf[total_bits as usize - 1 - i];
    }
    Ok(digits)
}

/// One `(position, sign)` pair per non-zero CSD digit of `value`, `w` total
/// bits and `d` fractional bits. `position = w - d - i - 1` for digit index
/// `i`; positive positions are left shifts, negative are right shifts.
pub fn shifts_of(value: f64, w: u32, d: u32) -> Result<Vec<(i32, Sign)>> {
    let int_bits = w as i32 - d as i32;
    let digits = to_csd(value, int_bits, w)?;
    let mut out = Vec::new();
    for (i, &digit) in digits.iter().enumerate() {
        if digit != 0 {
            let position = w as i32 - d as i32 - i as i32 - 1;
            out.push((position, Sign::of(digit > 0)));
        }
    }
    Ok(out)
}

/// Hamming weight of the CSD encoding of `value` — the number of shift-add
/// terms required to realize a multiplication by `value`.
pub fn csd_weight(value: f64, w: u32, d: u32) -> Result<usize> {
    Ok(shifts_of(value, w, d)?.len())
}

/// Hamming weight of the naive two's-complement encoding of the same fixed
/// point value, for comparison against CSD minimality (testable property 2).
pub fn naive_weight(value: f64, w: u32, d: u32) -> usize {
    let scale = 2f64.powi(d as i32);
    let k = (value * scale).round() as i64;
    let mask = if w >= 64 { u64::MAX } else { (1u64 << w) - 1 };
    ((k as u64) & mask).count_ones() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(digits: &[i8], w: u32, d: u32) -> f64 {
        digits
            .iter()
            .enumerate()
            .map(|(i, &digit)| {
                let position = w as i32 - d as i32 - i as i32 - 1;
                digit as f64 * 2f64.powi(position)
            })
            .sum()
    }

    #[test]
    fn csd_reconstructs_value() {
        for n in -7..=7 {
            let v = n as f64 * 0.0625;
            let digits = to_csd(v, 4, 8).unwrap();
            assert!((reconstruct(&digits, 8, 4) - v).abs() < 1e-9, "v={v}");
        }
    }

    #[test]
    fn csd_has_no_adjacent_nonzero_digits() {
        for n in -120..=120 {
            let v = n as f64 * 0.0625;
            let digits = to_csd(v, 4, 8).unwrap();
            for w in digits.windows(2) {
                assert!(!(w[0] != 0 && w[1] != 0), "adjacent nonzero digits for v={v}: {digits:?}");
            }
        }
    }

    #[test]
    fn csd_weight_is_minimal_vs_naive() {
        for n in -120..=120 {
            let v = n as f64 * 0.0625;
            let csd = csd_weight(v, 8, 4).unwrap();
            let naive = naive_weight(v, 8, 4);
            assert!(csd <= naive, "v={v} csd={csd} naive={naive}");
        }
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert!(to_csd(16.0, 4, 8).is_err());
    }

    #[test]
    fn shifts_of_0_75_is_minimal_non_adjacent() {
        // 0.75 = 2^0 - 2^-2, the minimal-weight non-adjacent encoding.
        // (0.5 + 0.25 also sums to 0.75 but uses adjacent positions -1/-2,
        // which would violate the no-adjacent-nonzero invariant above.)
        let shifts = shifts_of(0.75, 8, 4).unwrap();
        assert_eq!(shifts, vec![(0, Sign::Pos), (-2, Sign::Neg)]);
    }
}
