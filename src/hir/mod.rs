//! Hardware Intermediate Representation: signals, blocks, and modules, built
//! through an explicit [`Builder`] rather than ambient global state.

pub mod block;
pub mod builder;
pub mod module;
pub mod signal;

pub use block::Block;
pub use builder::Builder;
pub use module::{Module, ModuleId};
pub use signal::{PortDir, Signal, SignalId};
