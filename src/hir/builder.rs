//! The explicit builder: an arena of modules plus a stack of "currently
//! open" modules, threaded through every operator call. This replaces the
//! original implementation's process-global module stack with an ordinary
//! owned value — construct one per build, and nothing about it is shared
//! across threads or build runs.

use std::collections::HashMap;

use crate::csd::Sign;
use crate::error::{CcError, Result};
use crate::hir::block::Block;
use crate::hir::module::{Module, ModuleId};
use crate::hir::signal::{PortDir, Signal, SignalId};

pub struct Builder {
    modules: Vec<Module>,
    stack: Vec<ModuleId>,
    next_signal_ordinal: u64,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            modules: Vec::new(),
            stack: Vec::new(),
            next_signal_ordinal: 0,
        }
    }

    fn fresh_name(&mut self, hint: &str) -> String {
        let id = self.next_signal_ordinal;
        self.next_signal_ordinal += 1;
        format!("{hint}_{id}")
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    /// Number of modules created so far, including nested children. Used by
    /// callers that need to emit every module a code generator produced
    /// without tracking child ids themselves.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id]
    }

    pub fn current_id(&self) -> Result<ModuleId> {
        self.stack.last().copied().ok_or(CcError::ModuleStackEmpty)
    }

    fn current_mut(&mut self) -> Result<&mut Module> {
        let id = self.current_id()?;
        Ok(&mut self.modules[id])
    }

    /// Pushes a fresh module onto the stack and returns its id. The module
    /// isn't usable as a child instance until `end_module` pops it back off.
    pub fn new_module(&mut self, name: impl Into<String>) -> ModuleId {
        let id = self.modules.len();
        self.modules.push(Module::new(id, name.into()));
        self.stack.push(id);
        id
    }

    /// Pops the current module, running width inference. Callers still need
    /// to read `module(id).ports()` for the port list used at emission time.
    pub fn end_module(&mut self) -> Result<ModuleId> {
        let id = self.stack.pop().ok_or(CcError::ModuleStackEmpty)?;
        self.modules[id].infer_widths()?;
        self.modules[id].determined = true;
        Ok(id)
    }

    // --- Signal declaration -------------------------------------------------

    pub fn declare_input(&mut self, name: impl Into<String>, width: u32) -> Result<SignalId> {
        let mut signal = Signal::new(name.into());
        signal.width = Some(width);
        let m = self.current_mut()?;
        Ok(m.push_signal(signal))
    }

    pub fn declare_internal(&mut self, hint: &str) -> Result<SignalId> {
        let name = self.fresh_name(hint);
        let m = self.current_mut()?;
        Ok(m.push_signal(Signal::new(name)))
    }

    pub fn force_port(&mut self, signal: SignalId, dir: PortDir) -> Result<()> {
        self.current_mut()?.signal_mut(signal).forced = Some(dir);
        Ok(())
    }

    pub fn omit_port(&mut self, signal: SignalId) -> Result<()> {
        self.current_mut()?.signal_mut(signal).omitted = true;
        Ok(())
    }

    /// An immediate fixed-point literal: `W` total bits, `D` fractional.
    pub fn constant(&mut self, value: f64, w: u32, d: u32) -> Result<SignalId> {
        let scale = 2f64.powi(d as i32);
        let k = (value * scale).round() as i64;
        let name = self.fresh_name("const");
        let mut signal = Signal::new(name);
        signal.width = Some(w);
        signal.const_value = Some(k);
        signal.mark_assigned();
        let m = self.current_mut()?;
        Ok(m.push_signal(signal))
    }

    fn binary_op(
        &mut self,
        a: SignalId,
        b: SignalId,
        hint: &str,
        make: impl FnOnce(SignalId, SignalId, SignalId) -> Block,
    ) -> Result<SignalId> {
        let name = self.fresh_name(hint);
        let m = self.current_mut()?;
        let out = m.push_signal(Signal::new(name));
        m.signal_mut(out).width_edges.push((a, 0));
        m.signal_mut(a).width_edges.push((out, 0));
        m.signal_mut(b).width_edges.push((out, 0));
        m.signal_mut(a).mark_accessed();
        m.signal_mut(b).mark_accessed();
        m.signal_mut(out).mark_assigned();
        m.blocks.push(make(a, b, out));
        Ok(out)
    }

    pub fn add(&mut self, a: SignalId, b: SignalId) -> Result<SignalId> {
        self.binary_op(a, b, "add", |a, b, out| Block::Add2 { a, b, out })
    }

    pub fn sub(&mut self, a: SignalId, b: SignalId) -> Result<SignalId> {
        self.binary_op(a, b, "sub", |a, b, out| Block::Sub2 { a, b, out })
    }

    pub fn and2(&mut self, a: SignalId, b: SignalId) -> Result<SignalId> {
        self.binary_op(a, b, "and", |a, b, out| Block::And2 { a, b, out })
    }

    pub fn or2(&mut self, a: SignalId, b: SignalId) -> Result<SignalId> {
        self.binary_op(a, b, "or", |a, b, out| Block::Or2 { a, b, out })
    }

    pub fn xor2(&mut self, a: SignalId, b: SignalId) -> Result<SignalId> {
        self.binary_op(a, b, "xor", |a, b, out| Block::Xor2 { a, b, out })
    }

    pub fn nand2(&mut self, a: SignalId, b: SignalId) -> Result<SignalId> {
        self.binary_op(a, b, "nand", |a, b, out| Block::Nand2 { a, b, out })
    }

    pub fn nor2(&mut self, a: SignalId, b: SignalId) -> Result<SignalId> {
        self.binary_op(a, b, "nor", |a, b, out| Block::Nor2 { a, b, out })
    }

    /// `2 * width(a)`: unlike the other operators, the output width isn't a
    /// fixed additive offset, so it must be pinned immediately rather than
    /// deferred to union-find inference. `mult` is emitted for contract
    /// completeness but never produced by the shift-add code generators.
    pub fn mult(&mut self, a: SignalId, b: SignalId) -> Result<SignalId> {
        let name = self.fresh_name("mult");
        let m = self.current_mut()?;
        let width_a = m
            .signal(a)
            .width
            .ok_or_else(|| CcError::WidthIndeterminate {
                signal: m.signal(a).name.clone(),
            })?;
        let mut out_signal = Signal::new(name);
        out_signal.width = Some(2 * width_a);
        let out = m.push_signal(out_signal);
        m.signal_mut(a).mark_accessed();
        m.signal_mut(b).mark_accessed();
        m.signal_mut(out).mark_assigned();
        m.blocks.push(Block::Mult2 { a, b, out });
        Ok(out)
    }

    pub fn complement(&mut self, a: SignalId) -> Result<SignalId> {
        let name = self.fresh_name("cmp");
        let m = self.current_mut()?;
        let out = m.push_signal(Signal::new(name));
        m.signal_mut(out).width_edges.push((a, 0));
        m.signal_mut(a).width_edges.push((out, 0));
        m.signal_mut(a).mark_accessed();
        m.signal_mut(out).mark_assigned();
        m.blocks.push(Block::Complement { a, out });
        Ok(out)
    }

    pub fn not(&mut self, a: SignalId) -> Result<SignalId> {
        let name = self.fresh_name("not");
        let m = self.current_mut()?;
        let out = m.push_signal(Signal::new(name));
        m.signal_mut(out).width_edges.push((a, 0));
        m.signal_mut(a).width_edges.push((out, 0));
        m.signal_mut(a).mark_accessed();
        m.signal_mut(out).mark_assigned();
        m.blocks.push(Block::Not { a, out });
        Ok(out)
    }

    /// `add3(a, b, c, sign_b, sign_c) = a (sign_b) b (sign_c) c`, realized
    /// via the external ternary adder with a behavior tag chosen from the
    /// sign pair.
    pub fn add3(&mut self, a: SignalId, b: SignalId, c: SignalId, sign_b: Sign, sign_c: Sign) -> Result<SignalId> {
        let name = self.fresh_name("acc3");
        let m = self.current_mut()?;
        let out = m.push_signal(Signal::new(name));
        m.signal_mut(out).width_edges.push((a, 0));
        m.signal_mut(a).width_edges.push((out, 0));
        m.signal_mut(a).mark_accessed();
        m.signal_mut(b).mark_accessed();
        m.signal_mut(c).mark_accessed();
        m.signal_mut(out).mark_assigned();
        m.blocks.push(Block::TernaryAdd {
            a,
            b,
            c,
            sign_b,
            sign_c,
            out,
        });
        Ok(out)
    }

    /// `a << positions` (arithmetic right-fill with sign when `positions <
    /// 0` and `arith`). `positions == 0` degenerates to a plain `Assign`;
    /// `|positions| >= width(a)` degenerates to a constant-zero assign. Both
    /// degenerate cases need `a`'s width known at call time.
    pub fn shift(&mut self, a: SignalId, positions: i32, arith: bool) -> Result<SignalId> {
        let name = self.fresh_name("shift");
        let m = self.current_mut()?;
        let width_a = m.signal(a).width;

        if positions == 0 {
            let out = m.push_signal(Signal::new(name));
            if let Some(w) = width_a {
                m.signal_mut(out).width = Some(w);
            } else {
                m.signal_mut(out).width_edges.push((a, 0));
                m.signal_mut(a).width_edges.push((out, 0));
            }
            m.signal_mut(a).mark_accessed();
            m.signal_mut(out).mark_assigned();
            m.blocks.push(Block::Assign { src: a, dst: out });
            return Ok(out);
        }

        if let Some(w) = width_a {
            if positions.unsigned_abs() >= w {
                let mut zero = Signal::new(name);
                zero.width = Some(w);
                zero.const_value = Some(0);
                zero.mark_assigned();
                let out = m.push_signal(zero);
                m.signal_mut(a).mark_accessed();
                return Ok(out);
            }
        }

        let out = m.push_signal(Signal::new(name));
        if let Some(w) = width_a {
            m.signal_mut(out).width = Some(w);
        } else {
            m.signal_mut(out).width_edges.push((a, 0));
            m.signal_mut(a).width_edges.push((out, 0));
        }
        m.signal_mut(a).mark_accessed();
        m.signal_mut(out).mark_assigned();
        m.blocks.push(Block::Shift {
            a,
            positions,
            arith,
            out,
        });
        Ok(out)
    }

    pub fn extend(&mut self, a: SignalId, delta: u32, signed: bool) -> Result<SignalId> {
        let name = self.fresh_name("ext");
        let m = self.current_mut()?;
        let out = m.push_signal(Signal::new(name));
        m.signal_mut(out).width_edges.push((a, -(delta as i32)));
        m.signal_mut(a).width_edges.push((out, delta as i32));
        m.signal_mut(a).mark_accessed();
        m.signal_mut(out).mark_assigned();
        m.blocks.push(Block::Extend { a, delta, signed, out });
        Ok(out)
    }

    pub fn shorten(&mut self, a: SignalId, hi_drop: u32, lo_drop: u32) -> Result<SignalId> {
        let delta = (hi_drop + lo_drop) as i32;
        let name = self.fresh_name("shorten");
        let m = self.current_mut()?;
        if let Some(width) = m.signal(a).width {
            if hi_drop + lo_drop >= width {
                return Err(CcError::InvalidSliceRange {
                    signal: m.signal(a).name.clone(),
                    upper: width as i64 - 1 - hi_drop as i64,
                    lower: lo_drop as i64,
                    width,
                });
            }
        }
        let out = m.push_signal(Signal::new(name));
        m.signal_mut(out).width_edges.push((a, delta));
        m.signal_mut(a).width_edges.push((out, -delta));
        m.signal_mut(a).mark_accessed();
        m.signal_mut(out).mark_assigned();
        m.blocks.push(Block::Shorten {
            a,
            hi_drop,
            lo_drop,
            out,
        });
        Ok(out)
    }

    /// Dispatches to `extend`/`shorten`/a no-op alias depending on how
    /// `target_width` compares to `a`'s current width, which must already be
    /// resolved.
    pub fn resize(&mut self, a: SignalId, target_width: u32, signed: bool) -> Result<SignalId> {
        let current = {
            let m = self.current_mut()?;
            m.signal(a).width.ok_or_else(|| CcError::WidthIndeterminate {
                signal: m.signal(a).name.clone(),
            })?
        };
        match target_width.cmp(&current) {
            std::cmp::Ordering::Equal => self.copy(a, None),
            std::cmp::Ordering::Greater => self.extend(a, target_width - current, signed),
            std::cmp::Ordering::Less => self.shorten(a, current - target_width, 0),
        }
    }

    /// A same-width alias of `a`, wired by the emitter's own per-signal
    /// initializer rather than a block.
    pub fn copy(&mut self, a: SignalId, name: Option<String>) -> Result<SignalId> {
        let name = name.unwrap_or_else(|| self.fresh_name("copy"));
        let m = self.current_mut()?;
        let mut signal = Signal::new(name);
        signal.width = m.signal(a).width;
        if signal.width.is_none() {
            signal.width_edges.push((a, 0));
        }
        signal.alias_of = Some(a);
        let out = m.push_signal(signal);
        if m.signal(out).width.is_none() {
            m.signal_mut(a).width_edges.push((out, 0));
        }
        m.signal_mut(a).mark_accessed();
        Ok(out)
    }

    /// Balanced adder tree over `ids`. With `tia` set, a group of exactly
    /// three remaining operands collapses to a single ternary add instead of
    /// two binary ones.
    pub fn acc(&mut self, ids: &[SignalId], tia: bool) -> Result<SignalId> {
        if ids.is_empty() {
            return Err(CcError::EmptyAccumulation);
        }
        if ids.len() == 1 {
            return Ok(ids[0]);
        }
        if tia && ids.len() == 3 {
            return self.add3(ids[0], ids[1], ids[2], Sign::Pos, Sign::Pos);
        }
        if ids.len() == 2 {
            return self.add(ids[0], ids[1]);
        }
        let mid = ids.len() / 2;
        let left = self.acc(&ids[..mid], tia)?;
        let right = self.acc(&ids[mid..], tia)?;
        self.add(left, right)
    }

    /// Instantiates `child` inside the current module, auto-wiring its ports
    /// by name. `bindings` supplies signals (from the current module) for
    /// any ports the caller already has a signal for; every remaining port
    /// gets a fresh same-width signal created in the current module. Returns
    /// the full name -> signal map, including the newly created ones.
    pub fn instantiate(
        &mut self,
        child: ModuleId,
        mut bindings: HashMap<String, SignalId>,
    ) -> Result<HashMap<String, SignalId>> {
        let child_ports = self.modules[child].ports();
        let child_port_names: Vec<(String, PortDir, u32)> = child_ports
            .iter()
            .map(|&(id, dir)| {
                let sig = self.modules[child].signal(id);
                (sig.name.clone(), dir, sig.width.unwrap_or(0))
            })
            .collect();

        for key in bindings.keys() {
            if !child_port_names.iter().any(|(name, ..)| name == key) {
                return Err(CcError::UnknownPort {
                    module: self.modules[child].name.clone(),
                    port: key.clone(),
                });
            }
        }

        let cur = self.current_id()?;
        for (name, dir, width) in &child_port_names {
            if !bindings.contains_key(name) {
                let m = &mut self.modules[cur];
                let mut signal = Signal::new(name.clone());
                signal.width = Some(*width);
                let id = m.push_signal(signal);
                bindings.insert(name.clone(), id);
            }
            let id = bindings[name];
            let m = &mut self.modules[cur];
            match dir {
                PortDir::In => m.signal_mut(id).mark_accessed(),
                PortDir::Out => m.signal_mut(id).mark_assigned(),
            }
        }

        let port_map: Vec<(String, SignalId, PortDir)> = child_port_names
            .iter()
            .map(|(name, dir, _)| (name.clone(), bindings[name], *dir))
            .collect();
        self.modules[cur].children.push(child);
        self.modules[cur].blocks.push(Block::ExternalInstance { child, port_map });

        Ok(bindings)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
