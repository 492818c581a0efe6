//! Sliced power-of-two decomposition (P2D): each column slice of the target
//! matrix is refined iteratively against its own running approximation until
//! the whole matrix meets the SQNR target or the iteration cap is hit.

use itertools::iproduct;

use crate::matrix::Matrix;
use crate::metrics;

use super::P_MAX;

#[derive(Debug, Clone)]
pub struct P2dResult {
    /// `factors[slice][iteration]`, in the order they were applied.
    pub factors: Vec<Vec<Matrix>>,
    pub final_sqnr: f64,
    pub total_adds: usize,
    pub iter_count: usize,
}

/// Deterministic greedy matching pursuit: for each output row of `target`,
/// repeatedly picks the dictionary row and signed power-of-two scale that
/// most reduces squared residual, up to `e` terms. Ties are broken by lowest
/// dictionary index, then by ascending shift exponent, then by positive sign
/// before negative — so the same inputs always produce the same factor.
///
/// Returns the factor matrix together with the number of extra adds it costs
/// (one per row beyond its first distinct term).
pub fn find_factor(target: &Matrix, dict: &Matrix, e: usize, w: u32, d: u32) -> (Matrix, usize) {
    assert_eq!(target.cols(), dict.cols(), "find_factor: column mismatch");
    let rows = target.rows();
    let k = dict.rows();
    let cols = target.cols();
    let exp_min = -(d as i32);
    let exp_max = w as i32 - d as i32 - 1;

    let mut factor = Matrix::zeros(rows, k);
    let mut total_adds = 0usize;

    for i in 0..rows {
        let mut residual = target.row(i).to_vec();
        let mut used_cols = std::collections::BTreeSet::new();

        for _ in 0..e {
            let mut best: Option<(usize, f64, f64)> = None; // (dict col, scale, reduction)
            for j in 0..k {
                let drow = dict.row(j);
                let norm_sq: f64 = drow.iter().map(|v| v * v).sum();
                if norm_sq == 0.0 {
                    continue;
                }
                let dot: f64 = residual.iter().zip(drow).map(|(a, b)| a * b).sum();
                for (exp, sign) in iproduct!(exp_min..=exp_max, [1.0f64, -1.0f64]) {
                    let scale = sign * 2f64.powi(exp);
                    let reduction = 2.0 * scale * dot - scale * scale * norm_sq;
                    let improves = match best {
                        None => reduction > 1e-12,
                        Some((_, _, best_reduction)) => reduction > best_reduction + 1e-12,
                    };
                    if improves {
                        best = Some((j, scale, reduction));
                    }
                }
            }
            let Some((j, scale, _)) = best else { break };
            let drow = dict.row(j).to_vec();
            for c in 0..cols {
                residual[c] -= scale * drow[c];
            }
            used_cols.insert(j);
            factor[(i, j)] += scale;
            if residual.iter().all(|v| v.abs() < 1e-12) {
                break;
            }
        }

        total_adds += used_cols.len().saturating_sub(1);
    }

    (factor, total_adds)
}

/// Runs the P2D pipeline: slice `m` column-wise per `slice_widths`, refine
/// each slice's approximation for up to `P_max` iterations, and stop once the
/// reassembled matrix's SQNR against `m` reaches `target_db`.
pub fn decompose(
    m: &Matrix,
    slice_widths: &[usize],
    e: usize,
    w: u32,
    d: u32,
    target_db: f64,
) -> Option<P2dResult> {
    let slices = m.slice_cols(slice_widths);
    let mut approxes: Vec<Matrix> = slices
        .iter()
        .map(|s| Matrix::eye(s.rows(), s.cols()))
        .collect();
    let mut factors: Vec<Vec<Matrix>> = vec![Vec::new(); slices.len()];
    let mut total_adds = 0usize;

    for iter in 1..=P_MAX {
        for (idx, slice) in slices.iter().enumerate() {
            let dict = approxes[idx].clone();
            let (w_factor, adds) = find_factor(slice, &dict, e, w, d);
            approxes[idx] = w_factor.matmul(&dict);
            factors[idx].push(w_factor);
            total_adds += adds;
        }

        let concatenated = Matrix::concat_cols(&approxes);
        let db = metrics::sqnr(m, &concatenated);
        if db >= target_db {
            return Some(P2dResult {
                factors,
                final_sqnr: db,
                total_adds,
                iter_count: iter,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_converges_in_one_iteration_with_no_adders() {
        let m = Matrix::identity(1);
        let result = decompose(&m, &[1], 2, 8, 4, 48.0).expect("must converge");
        assert_eq!(result.iter_count, 1);
        assert_eq!(result.total_adds, 0);
        assert!(result.final_sqnr.is_infinite());
    }

    #[test]
    fn converges_within_two_terms_per_entry() {
        let m = Matrix::from_rows(vec![vec![0.5, 0.25], vec![-0.5, 0.75]]);
        let result = decompose(&m, &[2], 2, 8, 4, 48.0).expect("must converge");
        assert!(result.final_sqnr >= 48.0);
    }

    #[test]
    fn find_factor_reproduces_single_power_of_two_exactly() {
        let target = Matrix::from_rows(vec![vec![0.5, 0.0]]);
        let dict = Matrix::identity(2);
        let (factor, adds) = find_factor(&target, &dict, 2, 8, 4);
        assert_eq!(adds, 0);
        let approx = factor.matmul(&dict);
        assert!((approx[(0, 0)] - 0.5).abs() < 1e-9);
        assert_eq!(approx[(0, 1)], 0.0);
    }
}
