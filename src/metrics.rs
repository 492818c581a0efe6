//! Fidelity (SQNR) and cost (adder count) metrics shared by both
//! decomposition solvers and by the scenario tests that check convergence.

use crate::csd;
use crate::matrix::Matrix;

/// Signal-to-quantization-noise ratio in dB between `approx` and `target`,
/// `10 * log10(||target||_F^2 / ||target - approx||_F^2)`. `f64::INFINITY`
/// when the two matrices are bit-identical.
pub fn sqnr(target: &Matrix, approx: &Matrix) -> f64 {
    let err = target.sub(approx).frobenius_norm_sq();
    if err == 0.0 {
        return f64::INFINITY;
    }
    let signal = target.frobenius_norm_sq();
    10.0 * (signal / err).log10()
}

/// Adder count of a fixed-point matrix realized directly via shift-add: one
/// addition per CSD term beyond the first, summed over every non-zero row
/// entry. `w`/`d` are the total and fractional bit widths used to quantize
/// each entry before weighing it.
pub fn adder_count(matrix: &Matrix, w: u32, d: u32) -> usize {
    let mut total = 0usize;
    for i in 0..matrix.rows() {
        for (_, value) in matrix.nonzero_entries(i) {
            let weight = csd::csd_weight(value, w, d).unwrap_or(0);
            total += weight.saturating_sub(1);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqnr_is_infinite_for_identical_matrices() {
        let m = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(sqnr(&m, &m), f64::INFINITY);
    }

    #[test]
    fn sqnr_is_finite_and_positive_for_close_approximation() {
        let target = Matrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let approx = Matrix::from_rows(vec![vec![0.99, 0.0], vec![0.0, 1.0]]);
        let db = sqnr(&target, &approx);
        assert!(db.is_finite());
        assert!(db > 0.0);
    }

    #[test]
    fn adder_count_is_zero_for_single_power_of_two_entries() {
        let m = Matrix::from_rows(vec![vec![0.5, 0.0], vec![0.0, 0.25]]);
        assert_eq!(adder_count(&m, 8, 4), 0);
    }

    #[test]
    fn adder_count_counts_extra_csd_terms() {
        // 0.75 has CSD weight 2 -> one extra adder beyond the first term.
        let m = Matrix::from_rows(vec![vec![0.75]]);
        assert_eq!(adder_count(&m, 8, 4), 1);
    }
}
