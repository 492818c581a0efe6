//! Global (LZD) decomposition: grows a shared dictionary of intermediate
//! signals by repeatedly admitting the pairwise, signed-power-of-two-scaled
//! combination of two existing dictionary entries that best reduces the
//! reconstruction error, then projects every output row onto at most two
//! dictionary entries.
//!
//! Dictionary entries start as the `c` input unit vectors. Shift exponents
//! searched during dictionary growth and final projection both use a fixed
//! internal precision independent of the target matrix's own `W`/`D`,
//! mirroring the original implementation's use of a fixed-precision CSD call
//! to decode factor entries regardless of the surrounding pipeline's width.

use itertools::iproduct;

use crate::csd::Sign;
use crate::matrix::Matrix;
use crate::metrics;

const SHIFT_MIN: i32 = -10;
const SHIFT_MAX: i32 = 1;

fn shift_candidates() -> Vec<(i32, Sign)> {
    iproduct!(SHIFT_MIN..=SHIFT_MAX, [Sign::Pos, Sign::Neg]).collect()
}

fn sign_val(s: Sign) -> f64 {
    match s {
        Sign::Pos => 1.0,
        Sign::Neg => -1.0,
    }
}

fn shift_key(exp: i32, s: Sign) -> i32 {
    exp * 2 + if s == Sign::Pos { 0 } else { 1 }
}

/// One new dictionary node: the combination of exactly two prior nodes
/// (by dictionary index), each scaled by a signed power of two.
#[derive(Debug, Clone, Copy)]
pub struct LzdFactor {
    pub terms: [(usize, i32, Sign); 2],
}

/// One output row's projection onto the final dictionary: up to two
/// `(dict index, shift exponent, sign)` terms.
pub type Projection = Vec<(usize, i32, Sign)>;

#[derive(Debug, Clone)]
pub struct LzdResult {
    /// Number of original input dictionary entries (`c`, the column count).
    pub base_count: usize,
    /// New dictionary nodes introduced, in construction order. Node `i`'s
    /// dictionary index is `base_count + i`.
    pub factors: Vec<LzdFactor>,
    /// Final projection `P_j`, one entry per output row.
    pub projection: Vec<Projection>,
    pub final_sqnr: f64,
    pub total_adds: usize,
}

/// Matching pursuit against `dict`, capped at 2 terms per row, recording the
/// chosen `(dict index, exponent, sign)` terms rather than folding them into
/// a dense matrix — the LZD codegen needs each term's dictionary index to
/// wire up the DAG.
fn project(target: &Matrix, dict: &Matrix) -> (Vec<Projection>, Matrix, usize) {
    let rows = target.rows();
    let cols = target.cols();
    let k = dict.rows();
    let candidates = shift_candidates();

    let mut projections = Vec::with_capacity(rows);
    let mut approx = Matrix::zeros(rows, cols);
    let mut total_adds = 0usize;

    for i in 0..rows {
        let mut residual = target.row(i).to_vec();
        let mut terms: Projection = Vec::new();

        for _ in 0..2 {
            let mut best: Option<(usize, i32, Sign, f64)> = None;
            for j in 0..k {
                let drow = dict.row(j);
                let norm_sq: f64 = drow.iter().map(|v| v * v).sum();
                if norm_sq == 0.0 {
                    continue;
                }
                let dot: f64 = residual.iter().zip(drow).map(|(a, b)| a * b).sum();
                for &(exp, sign) in &candidates {
                    let scale = sign_val(sign) * 2f64.powi(exp);
                    let reduction = 2.0 * scale * dot - scale * scale * norm_sq;
                    let improves = match best {
                        None => reduction > 1e-12,
                        Some((_, _, _, best_reduction)) => reduction > best_reduction + 1e-12,
                    };
                    if improves {
                        best = Some((j, exp, sign, reduction));
                    }
                }
            }
            let Some((j, exp, sign, _)) = best else { break };
            let scale = sign_val(sign) * 2f64.powi(exp);
            let drow = dict.row(j).to_vec();
            for c in 0..cols {
                residual[c] -= scale * drow[c];
            }
            terms.push((j, exp, sign));
            if residual.iter().all(|v| v.abs() < 1e-12) {
                break;
            }
        }

        for &(j, exp, sign) in &terms {
            let scale = sign_val(sign) * 2f64.powi(exp);
            for c in 0..cols {
                approx[(i, c)] += scale * dict[(j, c)];
            }
        }
        total_adds += terms.len().saturating_sub(1);
        projections.push(terms);
    }

    (projections, approx, total_adds)
}

/// Heuristic benefit of adding `candidate_row` to the dictionary: the sum,
/// over every output row's current best-match residual, of the squared
/// projection onto the candidate (the continuous matching-pursuit reduction
/// bound). Cheap to evaluate per candidate, unlike re-running `project`
/// against every enlarged dictionary.
fn candidate_benefit(residuals: &[Vec<f64>], candidate_row: &[f64]) -> f64 {
    let norm_sq: f64 = candidate_row.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return 0.0;
    }
    residuals
        .iter()
        .map(|residual| {
            let dot: f64 = residual.iter().zip(candidate_row).map(|(a, b)| a * b).sum();
            dot * dot / norm_sq
        })
        .sum()
}

/// Runs the LZD pipeline: grow the dictionary by admitting the
/// highest-benefit pairwise combination each round, subject to the adder
/// budget `max_add`, until the final projection's SQNR against `m` reaches
/// `target_db`.
pub fn decompose(m: &Matrix, target_db: f64, max_add: usize) -> Option<LzdResult> {
    let c = m.cols();
    let mut dict = Matrix::eye(c, c);
    let mut factors: Vec<LzdFactor> = Vec::new();
    let mut adds = 0usize;
    let candidates = shift_candidates();
    let max_nodes = max_add + c + 1;

    loop {
        let (projection, approx, proj_adds) = project(m, &dict);
        let db = metrics::sqnr(m, &approx);
        if db >= target_db {
            return Some(LzdResult {
                base_count: c,
                factors,
                projection,
                final_sqnr: db,
                total_adds: adds + proj_adds,
            });
        }
        if dict.rows() >= max_nodes || adds >= max_add {
            return None;
        }

        let residual_rows: Vec<Vec<f64>> = (0..m.rows())
            .map(|i| {
                let mut r = m.row(i).to_vec();
                for &(j, exp, sign) in &projection[i] {
                    let scale = sign_val(sign) * 2f64.powi(exp);
                    for c in 0..r.len() {
                        r[c] -= scale * dict[(j, c)];
                    }
                }
                r
            })
            .collect();

        let k = dict.rows();
        let mut best: Option<(usize, usize, i32, Sign, i32, Sign, f64, Vec<f64>)> = None;
        for i in 0..k {
            for j in i..k {
                for &(e1, s1) in &candidates {
                    for &(e2, s2) in &candidates {
                        if i == j && shift_key(e1, s1) > shift_key(e2, s2) {
                            continue;
                        }
                        let scale1 = sign_val(s1) * 2f64.powi(e1);
                        let scale2 = sign_val(s2) * 2f64.powi(e2);
                        let row: Vec<f64> = (0..c)
                            .map(|col| scale1 * dict[(i, col)] + scale2 * dict[(j, col)])
                            .collect();
                        let benefit = candidate_benefit(&residual_rows, &row);
                        let improves = match &best {
                            None => benefit > 1e-9,
                            Some((.., best_benefit, _)) => benefit > *best_benefit + 1e-9,
                        };
                        if improves {
                            best = Some((i, j, e1, s1, e2, s2, benefit, row));
                        }
                    }
                }
            }
        }

        let Some((i, j, e1, s1, e2, s2, _, row)) = best else {
            return None;
        };
        adds += 1;
        factors.push(LzdFactor {
            terms: [(i, e1, s1), (j, e2, s2)],
        });
        dict.push_row(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_no_new_nodes() {
        let m = Matrix::identity(3);
        let result = decompose(&m, 48.0, 50).expect("must converge");
        assert_eq!(result.factors.len(), 0);
        assert!(result.final_sqnr.is_infinite());
    }

    #[test]
    fn small_matrix_converges_within_budget() {
        let m = Matrix::from_rows(vec![vec![0.5, 0.25], vec![0.25, 0.5]]);
        let result = decompose(&m, 40.0, 40).expect("must converge within budget");
        assert!(result.final_sqnr >= 40.0);
        assert!(result.total_adds <= 40);
    }

    #[test]
    fn zero_budget_fails_on_a_matrix_that_needs_new_nodes() {
        let m = Matrix::from_rows(vec![vec![0.3, 0.3], vec![0.3, -0.3]]);
        assert!(decompose(&m, 96.0, 0).is_none());
    }
}
