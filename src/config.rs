//! Every knob the compiler pipeline takes, gathered in one place so the CLI
//! and any embedding caller construct the same thing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How many CSD-derived terms `find_factor` may combine per row: a direct
/// wire/complement, a two-input add/sub, or a ternary add via `add8_3w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperandCap {
    Two,
    Three,
}

impl OperandCap {
    pub fn as_usize(self) -> usize {
        match self {
            OperandCap::Two => 2,
            OperandCap::Three => 3,
        }
    }
}

/// Every knob constructible from CLI flags or set directly by an embedding
/// caller; also round-trips through JSON for saved run configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Total fixed-point bit width.
    pub w: u32,
    /// Fractional bits. Defaults to `w / 2`.
    pub d: u32,
    /// Column widths for the P2D pipeline's input slicing.
    pub slices: Vec<usize>,
    pub e: OperandCap,
    pub sqnr_target_db: f64,
    pub p_max: usize,
    /// LZD's adder budget.
    pub max_add: usize,
    /// Optional DOT graph output path alongside the netlist.
    pub graph: Option<PathBuf>,
    pub verbose: bool,
    pub out_dir: PathBuf,
}

impl Config {
    pub fn new(w: u32) -> Self {
        Config {
            w,
            d: w / 2,
            slices: Vec::new(),
            e: OperandCap::Two,
            sqnr_target_db: 48.0,
            p_max: crate::decomp::P_MAX,
            max_add: 64,
            graph: None,
            verbose: false,
            out_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fractional_bits_is_half_width() {
        let cfg = Config::new(16);
        assert_eq!(cfg.d, 8);
    }

    #[test]
    fn operand_cap_as_usize_matches_variant() {
        assert_eq!(OperandCap::Two.as_usize(), 2);
        assert_eq!(OperandCap::Three.as_usize(), 3);
    }
}
