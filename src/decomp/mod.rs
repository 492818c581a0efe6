//! Constant matrix-vector multiplication decomposition: rewriting a dense
//! matrix as a chain of sparse, shift-add-realizable factors.
//!
//! Neither solver here is literally ported from anywhere — the pack has no
//! numerics library to call out to, so `p2d::find_factor` and `lzd::decompose`
//! are original deterministic greedy constructions that satisfy the same
//! contract the distilled spec describes for the externally-consumed `dp2d`
//! and `dlzd` routines.

pub mod lzd;
pub mod p2d;

/// Iteration cap for the P2D solver; exceeding it without reaching the SQNR
/// target is a convergence failure, not an error.
pub const P_MAX: usize = 200;
