//! Netlist emission: turning a determined [`Module`](crate::hir::Module)
//! into a VHDL text file, and parsing an externally-supplied VHDL entity
//! back into the HIR's own port contract.

pub mod vhdl;
pub mod vhdl_parse;

pub use vhdl::emit_module;
