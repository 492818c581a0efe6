//! FBlock generator: one combinational module per sparse factor matrix,
//! computing `y = M_factor . v` with shift-add only.

use crate::csd::{self, Sign};
use crate::error::Result;
use crate::hir::{Builder, ModuleId, SignalId};
use crate::matrix::Matrix;

/// Combines CSD-derived `(signal, sign)` terms the way a single output row
/// would: 1 term is a direct wire (sign-adjusted), 2 terms pick Add or Sub
/// by sign pair, 3 terms collapse to one ternary add with a behavior tag
/// chosen by the sign multiset, and anything else falls back to a balanced
/// `acc` tree. Shared between the FBlock and LZD generators.
pub fn combine_terms(builder: &mut Builder, terms: &[(SignalId, Sign)]) -> Result<SignalId> {
    match terms.len() {
        0 => unreachable!("combine_terms called with no terms"),
        1 => {
            let (sig, sign) = terms[0];
            match sign {
                Sign::Pos => Ok(sig),
                Sign::Neg => builder.complement(sig),
            }
        }
        2 => {
            let (s0, sign0) = terms[0];
            let (s1, sign1) = terms[1];
            match (sign0, sign1) {
                (Sign::Pos, Sign::Pos) => builder.add(s0, s1),
                (Sign::Pos, Sign::Neg) => builder.sub(s0, s1),
                (Sign::Neg, Sign::Pos) => builder.sub(s1, s0),
                (Sign::Neg, Sign::Neg) => {
                    let c0 = builder.complement(s0)?;
                    let c1 = builder.complement(s1)?;
                    builder.add(c0, c1)
                }
            }
        }
        3 => {
            let negs = terms.iter().filter(|(_, s)| *s == Sign::Neg).count();
            match negs {
                0 => builder.add3(terms[0].0, terms[1].0, terms[2].0, Sign::Pos, Sign::Pos),
                1 => {
                    let neg_idx = terms.iter().position(|(_, s)| *s == Sign::Neg).unwrap();
                    let pos_idxs: Vec<usize> = (0..3).filter(|&i| i != neg_idx).collect();
                    builder.add3(
                        terms[pos_idxs[0]].0,
                        terms[pos_idxs[1]].0,
                        terms[neg_idx].0,
                        Sign::Pos,
                        Sign::Neg,
                    )
                }
                2 => {
                    let pos_idx = terms.iter().position(|(_, s)| *s == Sign::Pos).unwrap();
                    let neg_idxs: Vec<usize> = (0..3).filter(|&i| i != pos_idx).collect();
                    builder.add3(
                        terms[pos_idx].0,
                        terms[neg_idxs[0]].0,
                        terms[neg_idxs[1]].0,
                        Sign::Neg,
                        Sign::Neg,
                    )
                }
                _ => {
                    let c0 = builder.complement(terms[0].0)?;
                    let c1 = builder.complement(terms[1].0)?;
                    let c2 = builder.complement(terms[2].0)?;
                    builder.add3(c0, c1, c2, Sign::Pos, Sign::Pos)
                }
            }
        }
        _ => {
            let mut signed_ids = Vec::with_capacity(terms.len());
            for &(id, sign) in terms {
                signed_ids.push(match sign {
                    Sign::Pos => id,
                    Sign::Neg => builder.complement(id)?,
                });
            }
            builder.acc(&signed_ids, false)
        }
    }
}

/// `gen_fblock`: a combinational module computing `y = M_factor . v`, `W`
/// total bits and `D` fractional. Every output row's terms are clamped at
/// `-D`: any further right-shift would be discarded downstream anyway.
pub fn gen_fblock(builder: &mut Builder, factor: &Matrix, w: u32, d: u32, suffix: &str) -> Result<ModuleId> {
    builder.new_module(format!("fblock{suffix}"));

    let inputs: Vec<SignalId> = (0..factor.cols())
        .map(|j| builder.declare_input(format!("v{j}"), w))
        .collect::<Result<_>>()?;

    for i in 0..factor.rows() {
        let mut terms = Vec::new();
        for (j, value) in factor.nonzero_entries(i) {
            for (position, sign) in csd::shifts_of(value, w, d)? {
                let clamped = position.max(-(d as i32));
                let shifted = builder.shift(inputs[j], clamped, true)?;
                terms.push((shifted, sign));
            }
        }
        if terms.is_empty() {
            // An all-zero row still needs an output signal so downstream row
            // indexing stays aligned with the factor matrix's row order.
            builder.constant(0.0, w, d)?;
        } else {
            combine_terms(builder, &terms)?;
        }
    }

    builder.end_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::PortDir;

    #[test]
    fn single_entry_row_is_a_bare_shift() {
        let mut builder = Builder::new();
        let factor = Matrix::from_rows(vec![vec![0.5]]);
        let id = gen_fblock(&mut builder, &factor, 8, 4, "_t1").unwrap();
        let module = builder.module(id);
        assert_eq!(module.ports().len(), 2); // v0 input, row0 output
        assert!(module
            .ports()
            .iter()
            .any(|&(sid, dir)| dir == PortDir::In && module.signal(sid).name == "v0"));
    }

    #[test]
    fn two_entry_row_emits_one_add_or_sub() {
        let mut builder = Builder::new();
        let factor = Matrix::from_rows(vec![vec![0.75, 0.0]]);
        let id = gen_fblock(&mut builder, &factor, 8, 4, "_t2").unwrap();
        let module = builder.module(id);
        let has_binary = module
            .blocks
            .iter()
            .any(|b| matches!(b, crate::hir::Block::Add2 { .. } | crate::hir::Block::Sub2 { .. }));
        assert!(has_binary);
    }
}
