//! LZD pipeline generator: realizes a [`LzdResult`](crate::decomp::lzd::LzdResult)
//! as a layered DAG of two-input adds.
//!
//! Each dictionary node is assigned a layer (`0` for the original inputs,
//! `1 + max(layer of its two sources)` for a grown node). Any node an output
//! row's projection still references below the DAG's deepest layer is
//! brought forward with a same-signal register chain (`buffer_chain`) so
//! every term feeding the final per-row combine arrives on the same cycle.
//!
//! Deliberately redesigned from the source this was distilled from: each
//! two-input combine shifts *each* operand by *its own* edge's exponent
//! before adding, not both operands by the first edge's exponent. The
//! original's shared-shift shortcut only happens to be correct when both
//! edges carry the same exponent; LZD's dictionary growth routinely pairs
//! nodes at different exponents, so that shortcut silently produces the
//! wrong value whenever they differ.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::decomp::lzd::LzdResult;
use crate::error::Result;
use crate::hir::{Builder, ModuleId, SignalId};

use super::fblock::combine_terms;

/// Per-node layer assignment shared by `gen_lzd` and `write_dot`: layer `0`
/// for the original dictionary entries, `1 + max(layer of its two sources)`
/// for a grown node.
fn assign_layers(result: &LzdResult) -> Vec<usize> {
    let mut layers = vec![0usize; result.base_count];
    for factor in &result.factors {
        let to_layer = 1 + factor.terms.iter().map(|&(src, _, _)| layers[src]).max().unwrap();
        layers.push(to_layer);
    }
    layers
}

/// Writes a layered Graphviz DOT description of a decomposition's dictionary
/// DAG: one `rank=same` cluster per layer, inputs and output terminals
/// colored apart from internal combine nodes.
pub fn write_dot(result: &LzdResult, path: &Path) -> Result<()> {
    let layers = assign_layers(result);
    let max_layer = *layers.iter().max().unwrap_or(&0);

    let terminals: HashSet<usize> = result.projection.iter().flatten().map(|&(t, _, _)| t).collect();

    let mut out = String::from("digraph D {\n");
    for node in 0..layers.len() {
        let style = if node < result.base_count || terminals.contains(&node) {
            "shape=invtriangle, style=filled, fillcolor=teal, fontcolor=white"
        } else {
            "style=filled, fillcolor=grey, fontcolor=black"
        };
        out.push_str(&format!("  x{node} [{style}]\n"));
    }
    for layer in 0..=max_layer {
        let nodes: Vec<String> = (0..layers.len()).filter(|&n| layers[n] == layer).map(|n| format!("x{n}")).collect();
        out.push_str(&format!("  {{ rank=same {} }}\n", nodes.join(" ")));
    }
    for (i, factor) in result.factors.iter().enumerate() {
        let to = result.base_count + i;
        for &(src, _, _) in &factor.terms {
            out.push_str(&format!("  x{src} -> x{to}\n"));
        }
    }
    out.push_str("}\n");

    std::fs::write(path, out)?;
    Ok(())
}

/// Delays `source` by `stages` cycles through a chain of same-value,
/// single-stage-buffered signals. `read_name` on the final link in the
/// emitted VHDL resolves to the fully delayed value; `stages == 0` returns
/// `source` unchanged.
fn buffer_chain(builder: &mut Builder, source: SignalId, stages: usize) -> Result<SignalId> {
    let mut cur = source;
    for _ in 0..stages {
        let next = builder.shift(cur, 0, true)?;
        let id = builder.current_id()?;
        builder.module_mut(id).signal_mut(next).buffer = 1;
        cur = next;
    }
    Ok(cur)
}

pub fn gen_lzd(builder: &mut Builder, result: &LzdResult, w: u32, d: u32) -> Result<ModuleId> {
    builder.new_module("lzd");

    let mut node_signal: Vec<SignalId> = (0..result.base_count)
        .map(|i| builder.declare_input(format!("v{i}"), w))
        .collect::<Result<_>>()?;
    let mut node_layer: Vec<usize> = vec![0; result.base_count];
    // Shared across both the per-factor insertion loop and the terminal
    // patch-up below: every `(source node, delay)` pair gets at most one
    // register chain, reused by every factor or output row that needs the
    // same source delayed by the same amount.
    let mut buffer_cache: HashMap<(usize, usize), SignalId> = HashMap::new();

    let mut buffered = |builder: &mut Builder, src: usize, node_signal: &[SignalId], delay: usize| -> Result<SignalId> {
        if let Some(&cached) = buffer_cache.get(&(src, delay)) {
            return Ok(cached);
        }
        let patched = buffer_chain(builder, node_signal[src], delay)?;
        buffer_cache.insert((src, delay), patched);
        Ok(patched)
    };

    for factor in &result.factors {
        let to_layer = 1 + factor
            .terms
            .iter()
            .map(|&(src, _, _)| node_layer[src])
            .max()
            .unwrap();

        let mut terms = Vec::with_capacity(2);
        for &(src, exp, sign) in &factor.terms {
            let delay = to_layer - 1 - node_layer[src];
            let delayed = buffered(builder, src, &node_signal, delay)?;
            let shifted = builder.shift(delayed, exp, true)?;
            terms.push((shifted, sign));
        }
        let out = combine_terms(builder, &terms)?;

        node_signal.push(out);
        node_layer.push(to_layer);
    }

    let max_layer = *node_layer.iter().max().unwrap_or(&0);

    let mut terminal_patch: HashMap<usize, SignalId> = HashMap::new();
    for projection in &result.projection {
        for &(t, _, _) in projection {
            if terminal_patch.contains_key(&t) {
                continue;
            }
            let delay = max_layer - node_layer[t];
            let patched = buffered(builder, t, &node_signal, delay)?;
            terminal_patch.insert(t, patched);
        }
    }

    for projection in &result.projection {
        let terms: Vec<(SignalId, crate::csd::Sign)> = projection
            .iter()
            .map(|&(t, exp, sign)| {
                let base = terminal_patch[&t];
                let shifted = builder.shift(base, exp, true)?;
                Ok((shifted, sign))
            })
            .collect::<Result<_>>()?;

        let row_out = if terms.is_empty() {
            builder.constant(0.0, w, d)?
        } else {
            combine_terms(builder, &terms)?
        };
        let cur = builder.current_id()?;
        builder.module_mut(cur).signal_mut(row_out).buffer = 1;
    }

    builder.end_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomp::lzd::decompose;
    use crate::matrix::Matrix;

    #[test]
    fn identity_has_no_internal_nodes() {
        let m = Matrix::identity(2);
        let result = decompose(&m, 48.0, 10).expect("must converge");
        let mut builder = Builder::new();
        let id = gen_lzd(&mut builder, &result, 8, 4).unwrap();
        let module = builder.module(id);
        assert_eq!(module.ports().len(), 4); // 2 inputs, 2 outputs
    }

    #[test]
    fn write_dot_includes_every_factor_edge() {
        let m = Matrix::from_rows(vec![vec![0.5, 0.125], vec![0.125, 0.5]]);
        let result = decompose(&m, 40.0, 40).expect("must converge");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.dot");
        write_dot(&result, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("digraph D {"));
        for (i, factor) in result.factors.iter().enumerate() {
            let to = result.base_count + i;
            for &(src, _, _) in &factor.terms {
                assert!(text.contains(&format!("x{src} -> x{to}")));
            }
        }
    }

    #[test]
    fn mismatched_exponent_pair_still_combines_both_terms() {
        // Forces a factor whose two edges carry different exponents, the
        // exact case the redesigned per-edge shift exists for.
        let m = Matrix::from_rows(vec![vec![0.5, 0.125], vec![0.125, 0.5]]);
        let result = decompose(&m, 40.0, 40).expect("must converge");
        let mut builder = Builder::new();
        let id = gen_lzd(&mut builder, &result, 8, 4).unwrap();
        let module = builder.module(id);
        assert!(module.blocks.len() >= result.factors.len());
    }
}
