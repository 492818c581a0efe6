//! The closed set of hardware primitives a module can contain. Tagged enum
//! dispatch rather than a `dyn Block` trait object: the block set is fixed by
//! this contract and never grows through external implementations, so a
//! closed enum matched exhaustively at emission time is the simpler fit.

use crate::csd::Sign;
use crate::hir::module::ModuleId;
use crate::hir::signal::{PortDir, SignalId};

#[derive(Debug, Clone)]
pub enum Block {
    Add2 { a: SignalId, b: SignalId, out: SignalId },
    Sub2 { a: SignalId, b: SignalId, out: SignalId },
    Mult2 { a: SignalId, b: SignalId, out: SignalId },
    And2 { a: SignalId, b: SignalId, out: SignalId },
    Or2 { a: SignalId, b: SignalId, out: SignalId },
    Xor2 { a: SignalId, b: SignalId, out: SignalId },
    Nand2 { a: SignalId, b: SignalId, out: SignalId },
    Nor2 { a: SignalId, b: SignalId, out: SignalId },
    Not { a: SignalId, out: SignalId },
    Complement { a: SignalId, out: SignalId },
    Shift { a: SignalId, positions: i32, arith: bool, out: SignalId },
    Assign { src: SignalId, dst: SignalId },
    Extend { a: SignalId, delta: u32, signed: bool, out: SignalId },
    Shorten { a: SignalId, hi_drop: u32, lo_drop: u32, out: SignalId },
    /// `out = a (sign_b) b (sign_c) c`, realized by the external ternary
    /// adder primitive with behavior tag `add_addw | add_subw | sub_subw`.
    TernaryAdd {
        a: SignalId,
        b: SignalId,
        c: SignalId,
        sign_b: Sign,
        sign_c: Sign,
        out: SignalId,
    },
    /// A child module instance, port-mapped by name.
    ExternalInstance {
        child: ModuleId,
        port_map: Vec<(String, SignalId, PortDir)>,
    },
}
