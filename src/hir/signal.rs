//! A single named wire within a module's arena.

/// Index into the owning [`Module`](crate::hir::module::Module)'s signal
/// arena. Only valid relative to the module that created it.
pub type SignalId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDir {
    In,
    Out,
}

#[derive(Debug, Clone)]
pub struct Signal {
    pub name: String,
    /// Resolved bit width, once width inference has run (or if pinned at
    /// construction, e.g. a module input or a constant).
    pub width: Option<u32>,
    /// `(other, delta)`: `width(self) = width(other) + delta`. Populated by
    /// operators whose output width is a fixed offset from an operand's.
    pub width_edges: Vec<(SignalId, i32)>,
    /// Register depth: `buffer = k` means `k` pipeline stages between this
    /// signal's combinational value and its current output.
    pub buffer: u32,
    pub accessed: u32,
    pub assigned: u32,
    pub forced: Option<PortDir>,
    pub omitted: bool,
    /// Two's-complement literal value for a `constant()`-declared signal.
    pub const_value: Option<i64>,
    /// Set by `copy()`: this signal is a same-width alias of another, wired
    /// directly by the emitter's own initializer rather than a block.
    pub alias_of: Option<SignalId>,
}

impl Signal {
    pub(crate) fn new(name: String) -> Self {
        Signal {
            name,
            width: None,
            width_edges: Vec::new(),
            buffer: 0,
            accessed: 0,
            assigned: 0,
            forced: None,
            omitted: false,
            const_value: None,
            alias_of: None,
        }
    }

    pub fn mark_accessed(&mut self) {
        self.accessed += 1;
    }

    pub fn mark_assigned(&mut self) {
        self.assigned += 1;
    }
}
