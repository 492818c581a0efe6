//! P2D pipeline generator: wires a [`P2dResult`](crate::decomp::p2d::P2dResult)
//! into a top-level module computing the full `y = M . v`.
//!
//! Each slice starts from a `target_rows`-length vector built by placing its
//! raw input columns at the matching output-row index and zero-filling the
//! rest — the circuit counterpart of the solver's `Matrix::eye(target_rows,
//! slice_cols)` starting dictionary — then threads that vector through one
//! `fblock` per refinement iteration, each shaped `target_rows x
//! target_rows`. The per-slice results are finally summed row-wise with one
//! stage of output buffering.

use std::collections::HashMap;

use crate::decomp::p2d::P2dResult;
use crate::error::Result;
use crate::hir::{Builder, ModuleId, SignalId};

use super::fblock::gen_fblock;
use super::instantiate_ordered;

pub fn gen_p2d(
    builder: &mut Builder,
    result: &P2dResult,
    slice_widths: &[usize],
    target_rows: usize,
    w: u32,
    d: u32,
) -> Result<ModuleId> {
    builder.new_module("p2d");

    let total_cols: usize = slice_widths.iter().sum();
    let inputs: Vec<SignalId> = (0..total_cols)
        .map(|i| builder.declare_input(format!("v{i}"), w))
        .collect::<Result<_>>()?;
    for &id in &inputs {
        let cur = builder.current_id()?;
        builder.module_mut(cur).signal_mut(id).buffer = 1;
    }

    let zero = builder.constant(0.0, w, d)?;

    let mut offset = 0usize;
    let mut slice_results: Vec<Vec<SignalId>> = Vec::with_capacity(slice_widths.len());

    for (slice_idx, &slice_cols) in slice_widths.iter().enumerate() {
        let slice_inputs = &inputs[offset..offset + slice_cols];
        offset += slice_cols;

        let mut vp: Vec<SignalId> = (0..target_rows)
            .map(|i| if i < slice_cols { slice_inputs[i] } else { zero })
            .collect();

        for (iter_idx, factor) in result.factors[slice_idx].iter().enumerate() {
            let child = gen_fblock(builder, factor, w, d, &format!("_p2d_s{slice_idx}_i{iter_idx}"))?;
            let bindings: HashMap<String, SignalId> = (0..factor.cols())
                .map(|j| (format!("v{j}"), vp[j]))
                .collect();
            vp = instantiate_ordered(builder, child, bindings)?;
        }

        slice_results.push(vp);
    }

    for row in 0..target_rows {
        let terms: Vec<SignalId> = slice_results.iter().map(|vp| vp[row]).collect();
        let sum = builder.acc(&terms, false)?;
        let cur = builder.current_id()?;
        builder.module_mut(cur).signal_mut(sum).buffer = 1;
    }

    builder.end_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomp::p2d::decompose;
    use crate::matrix::Matrix;

    #[test]
    fn single_slice_identity_wires_straight_through() {
        let m = Matrix::identity(2);
        let result = decompose(&m, &[2], 2, 8, 4, 48.0).expect("must converge");
        let mut builder = Builder::new();
        let id = gen_p2d(&mut builder, &result, &[2], 2, 8, 4).unwrap();
        let module = builder.module(id);
        assert_eq!(module.ports().len(), 4); // 2 inputs, 2 outputs
    }

    #[test]
    fn two_slices_sum_row_wise() {
        let m = Matrix::from_rows(vec![vec![0.5, 0.25], vec![0.25, 0.5]]);
        let result = decompose(&m, &[1, 1], 2, 8, 4, 40.0).expect("must converge");
        let mut builder = Builder::new();
        let id = gen_p2d(&mut builder, &result, &[1, 1], 2, 8, 4).unwrap();
        let module = builder.module(id);
        assert_eq!(
            module
                .ports()
                .iter()
                .filter(|&&(sid, dir)| dir == crate::hir::PortDir::In
                    && module.signal(sid).name.starts_with('v'))
                .count(),
            2
        );
    }
}
