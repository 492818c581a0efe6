//! A module owns its own signal and block arenas. Width inference and port
//! discovery both run once, at `Builder::end_module`, and record their
//! result onto the signals themselves rather than being recomputed by the
//! emitter.

use std::collections::HashMap;

use crate::error::{CcError, Result};
use crate::hir::block::Block;
use crate::hir::signal::{PortDir, Signal, SignalId};

pub type ModuleId = usize;

#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub signals: Vec<Signal>,
    pub blocks: Vec<Block>,
    pub children: Vec<ModuleId>,
    pub determined: bool,
}

impl Module {
    pub(crate) fn new(id: ModuleId, name: String) -> Self {
        Module {
            id,
            name,
            signals: Vec::new(),
            blocks: Vec::new(),
            children: Vec::new(),
            determined: false,
        }
    }

    pub(crate) fn push_signal(&mut self, signal: Signal) -> SignalId {
        self.signals.push(signal);
        self.signals.len() - 1
    }

    pub fn signal(&self, id: SignalId) -> &Signal {
        &self.signals[id]
    }

    pub fn signal_mut(&mut self, id: SignalId) -> &mut Signal {
        &mut self.signals[id]
    }

    pub fn signal_by_name(&self, name: &str) -> Option<SignalId> {
        self.signals.iter().position(|s| s.name == name)
    }

    /// Width inference: a union-find-style propagation over `(signal,
    /// delta)` edges. Every connected component must contain exactly one
    /// consistent pinned width (a signal whose `width` is already `Some`, or
    /// one reachable pin disagreeing with another); otherwise the whole
    /// module fails to determine with `WidthIndeterminate` naming the
    /// offending signal.
    pub fn infer_widths(&mut self) -> Result<()> {
        let n = self.signals.len();
        let mut resolved = vec![None; n];
        let mut visited = vec![false; n];

        for start in 0..n {
            if visited[start] {
                continue;
            }
            // BFS the component, accumulating the delta from `start`.
            let mut component = vec![(start, 0i32)];
            visited[start] = true;
            let mut queue = std::collections::VecDeque::new();
            queue.push_back((start, 0i32));
            while let Some((node, offset)) = queue.pop_front() {
                for &(other, delta) in &self.signals[node].width_edges {
                    if !visited[other] {
                        visited[other] = true;
                        let other_offset = offset + delta;
                        component.push((other, other_offset));
                        queue.push_back((other, other_offset));
                    }
                }
            }

            // Find a pin to anchor the component; verify all other pins agree.
            let mut anchor: Option<(i32, i32)> = None; // (pinned width, its offset)
            for &(node, offset) in &component {
                if let Some(w) = self.signals[node].width {
                    match anchor {
                        None => anchor = Some((w as i32, offset)),
                        Some((anchor_w, anchor_offset)) => {
                            let expected = anchor_w - anchor_offset + offset;
                            if expected != w as i32 {
                                return Err(CcError::WidthIndeterminate {
                                    signal: self.signals[node].name.clone(),
                                });
                            }
                        }
                    }
                }
            }
            let Some((anchor_w, anchor_offset)) = anchor else {
                return Err(CcError::WidthIndeterminate {
                    signal: self.signals[start].name.clone(),
                });
            };
            for &(node, offset) in &component {
                let width = anchor_w - anchor_offset + offset;
                resolved[node] = Some(width);
            }
        }

        for (i, w) in resolved.into_iter().enumerate() {
            if let Some(w) = w {
                if w < 0 {
                    // A chain of `shorten` edges dropped more bits than the
                    // component's pinned width actually has; `shorten`
                    // itself only catches this when the dropped signal's
                    // width is already known at call time.
                    return Err(CcError::WidthIndeterminate {
                        signal: self.signals[i].name.clone(),
                    });
                }
                self.signals[i].width = Some(w as u32);
            }
        }
        Ok(())
    }

    /// Port discovery, run after width inference. Forced ports take
    /// precedence over omission, which in turn removes a signal from the
    /// port list entirely unless forced.
    pub fn ports(&self) -> Vec<(SignalId, PortDir)> {
        let mut out = Vec::new();
        for (idx, signal) in self.signals.iter().enumerate() {
            if let Some(dir) = signal.forced {
                out.push((idx, dir));
            } else if signal.omitted {
                continue;
            } else if signal.assigned == 0 {
                out.push((idx, PortDir::In));
            } else if signal.accessed == 0 {
                out.push((idx, PortDir::Out));
            }
        }
        out
    }

    pub fn port_map_by_name(&self) -> HashMap<String, (SignalId, PortDir)> {
        self.ports()
            .into_iter()
            .map(|(id, dir)| (self.signals[id].name.clone(), (id, dir)))
            .collect()
    }
}
