//! Code generators: each turns a [`decomp`](crate::decomp) result into one or
//! more wired [`Module`](crate::hir::Module)s inside a shared [`Builder`].

pub mod fblock;
pub mod lzd;
pub mod p2d;

use std::collections::HashMap;

use crate::error::Result;
use crate::hir::{Builder, ModuleId, PortDir, SignalId};

/// Instantiates `child`, supplying `input_bindings` for its input ports, and
/// returns its output-port signals (newly created in the current module) in
/// the child's own port order. Port order matches signal construction order
/// within the child (inputs first, then each row's final combined signal in
/// row-index order), so this is how callers recover "row i's output" without
/// needing the child's internal signal names.
pub fn instantiate_ordered(
    builder: &mut Builder,
    child: ModuleId,
    input_bindings: HashMap<String, SignalId>,
) -> Result<Vec<SignalId>> {
    let child_ports: Vec<(String, PortDir)> = builder
        .module(child)
        .ports()
        .iter()
        .map(|&(sid, dir)| (builder.module(child).signal(sid).name.clone(), dir))
        .collect();

    let bindings = builder.instantiate(child, input_bindings)?;

    Ok(child_ports
        .iter()
        .filter(|(_, dir)| *dir == PortDir::Out)
        .map(|(name, _)| bindings[name])
        .collect())
}
