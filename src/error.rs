//! The fatal error taxonomy. Every variant halts emission before any file is
//! written; decomposition non-convergence is handled separately as a plain
//! `Option`, not through this enum (see `decomp`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CcError {
    #[error("value {value} is out of range for {int_bits} integer bits (|value| >= 2^{int_bits})")]
    OutOfRange { value: f64, int_bits: i32 },

    #[error("width of signal `{signal}` could not be determined")]
    WidthIndeterminate { signal: String },

    #[error(
        "invalid bit-slice on `{signal}`: [{lower}..={upper}] is not within 0..{width}"
    )]
    InvalidSliceRange {
        signal: String,
        upper: i64,
        lower: i64,
        width: u32,
    },

    #[error("acc() called with no inputs")]
    EmptyAccumulation,

    #[error("signal or block created with no open module")]
    ModuleStackEmpty,

    #[error("no such port `{port}` on module `{module}`")]
    UnknownPort { module: String, port: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed VHDL entity: {0}")]
    VhdlParse(String),
}

pub type Result<T> = std::result::Result<T, CcError>;
