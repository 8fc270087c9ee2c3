//! # Generator dispatch
//!
//! Maps each leaf variant to the codegen capability that knows how to
//! drive it, and supplies concrete-but-simple implementations of that
//! capability so the decoder can be exercised end-to-end in tests. Real
//! per-leaf codegen bodies are an external collaborator; these emitters
//! are deliberately minimal, not a register-file simulator.

use crate::decoder::LeafEmit;
use crate::error::SynthesisError;
use crate::ir::{Expr, Stmt};
use crate::leaves::Leaf;
use crate::tree::Node;

/// The capability a leaf-kind-specific generator exposes: a register
/// dispatches to a plain register generator, a `Memory` without an
/// `interface` to a RAM generator, a `Memory` with one to a bus-slave
/// generator, and an opaque `Submap` to a foreign-map generator.
pub trait LeafCodegen {
    /// Ports this leaf's interface contributes to the enclosing module.
    fn gen_ports(&self, leaf: &Leaf<'_>) -> Vec<crate::ir::Port>;

    /// Any standalone processes this leaf needs beyond the shared
    /// read/write mux — e.g. a register's own write-enable latch. Most
    /// leaves need none.
    fn gen_processes(&self, _leaf: &Leaf<'_>) -> Vec<crate::ir::Process> {
        Vec::new()
    }

    /// Statements driving a read of this leaf at `word_offset`.
    fn gen_read(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt>;

    /// Statements driving a write to this leaf at `word_offset`.
    fn gen_write(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt>;
}

/// `RegGen`: a single addressable register.
#[derive(Debug, Default)]
pub struct RegisterEmitter;

impl LeafCodegen for RegisterEmitter {
    fn gen_ports(&self, leaf: &Leaf<'_>) -> Vec<crate::ir::Port> {
        let Node::Register(r) = leaf.node else {
            return Vec::new();
        };
        vec![crate::ir::Port {
            name: format!("{}_o", r.name),
            width: r.width,
            input: false,
        }]
    }

    fn gen_read(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt> {
        let Node::Register(r) = leaf.node else {
            return Vec::new();
        };
        vec![Stmt::Assign {
            target: Expr::signal("rd_dat"),
            value: Expr::signal(format!("{}_reg", r.name)).slice(r.width - 1, 0),
        }]
        .into_iter()
        .map(|s| annotate(s, leaf, word_offset))
        .collect()
    }

    fn gen_write(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt> {
        let Node::Register(r) = leaf.node else {
            return Vec::new();
        };
        vec![Stmt::Assign {
            target: Expr::signal(format!("{}_reg", r.name)),
            value: Expr::signal("wr_dat").slice(r.width - 1, 0),
        }]
        .into_iter()
        .map(|s| annotate(s, leaf, word_offset))
        .collect()
    }
}

/// `RamGen`: a plain RAM, with no `interface` attribute.
#[derive(Debug, Default)]
pub struct RamEmitter;

impl LeafCodegen for RamEmitter {
    fn gen_ports(&self, leaf: &Leaf<'_>) -> Vec<crate::ir::Port> {
        let Node::Memory(m) = leaf.node else {
            return Vec::new();
        };
        vec![
            crate::ir::Port {
                name: format!("{}_addr_o", m.name),
                width: m.depth(),
                input: false,
            },
            crate::ir::Port {
                name: format!("{}_data_i", m.name),
                width: m.width(),
                input: true,
            },
        ]
    }

    fn gen_read(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt> {
        vec![annotate(
            Stmt::Assign {
                target: Expr::signal("rd_dat"),
                value: Expr::signal("ram_data_i"),
            },
            leaf,
            word_offset,
        )]
    }

    fn gen_write(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt> {
        vec![annotate(
            Stmt::Assign {
                target: Expr::signal("ram_data_o"),
                value: Expr::signal("wr_dat"),
            },
            leaf,
            word_offset,
        )]
    }
}

/// `BusSlaveGen`: a memory bridged through a generated interface name.
#[derive(Debug, Default)]
pub struct BusSlaveEmitter;

impl LeafCodegen for BusSlaveEmitter {
    fn gen_ports(&self, leaf: &Leaf<'_>) -> Vec<crate::ir::Port> {
        let Node::Memory(m) = leaf.node else {
            return Vec::new();
        };
        let iface = m.interface.as_deref().unwrap_or("bus");
        vec![
            crate::ir::Port {
                name: format!("{iface}_cyc_o"),
                width: 1,
                input: false,
            },
            crate::ir::Port {
                name: format!("{iface}_ack_i"),
                width: 1,
                input: true,
            },
        ]
    }

    fn gen_read(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt> {
        vec![annotate(
            Stmt::Comment("forward read to bus-slave interface".to_string()),
            leaf,
            word_offset,
        )]
    }

    fn gen_write(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt> {
        vec![annotate(
            Stmt::Comment("forward write to bus-slave interface".to_string()),
            leaf,
            word_offset,
        )]
    }
}

/// `ForeignMapGen`: an opaque (non-included) sub-map.
#[derive(Debug, Default)]
pub struct ForeignMapEmitter;

impl LeafCodegen for ForeignMapEmitter {
    fn gen_ports(&self, leaf: &Leaf<'_>) -> Vec<crate::ir::Port> {
        let Node::Submap(s) = leaf.node else {
            return Vec::new();
        };
        vec![crate::ir::Port {
            name: format!("{}_cyc_o", s.name),
            width: 1,
            input: false,
        }]
    }

    fn gen_read(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt> {
        vec![annotate(
            Stmt::Comment("forward read to foreign map".to_string()),
            leaf,
            word_offset,
        )]
    }

    fn gen_write(&self, leaf: &Leaf<'_>, word_offset: u64) -> Vec<Stmt> {
        vec![annotate(
            Stmt::Comment("forward write to foreign map".to_string()),
            leaf,
            word_offset,
        )]
    }
}

fn annotate(stmt: Stmt, leaf: &Leaf<'_>, word_offset: u64) -> Stmt {
    match stmt {
        Stmt::Comment(msg) => Stmt::Comment(format!("{} ({} +{word_offset:#x})", msg, leaf.path)),
        other => other,
    }
}

/// Dispatch a leaf to its codegen capability: `Register` -> `RegisterEmitter`,
/// `Memory` with no `interface` -> `RamEmitter`, `Memory` with an
/// `interface` -> `BusSlaveEmitter`, opaque `Submap` -> `ForeignMapEmitter`.
#[must_use]
pub fn emitter_for(node: &Node) -> Box<dyn LeafCodegen> {
    match node {
        Node::Register(_) => Box::new(RegisterEmitter),
        Node::Memory(m) if m.interface.is_some() => Box::new(BusSlaveEmitter),
        Node::Memory(_) => Box::new(RamEmitter),
        Node::Submap(_) => Box::new(ForeignMapEmitter),
        Node::Root(_) | Node::Block(_) | Node::RepeatBlock(_) | Node::Repeat(_) => {
            Box::new(ForeignMapEmitter)
        }
    }
}

/// Which half of a leaf's capability [`DispatchingEmit`] should call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Dispatch to [`LeafCodegen::gen_read`].
    Read,
    /// Dispatch to [`LeafCodegen::gen_write`].
    Write,
}

/// Adapts [`emitter_for`]'s per-leaf dispatch to the [`LeafEmit`] seam
/// [`crate::decoder::add_block_decoder`] calls into, for one bus direction
/// at a time — the read mux and write mux each build their own decoder
/// tree, one per [`Direction`].
///
/// On the decoder's default (unmapped) branch there is no leaf to dispatch
/// to, so this is also where the write mux's default ack lives: a write
/// direction built with [`DispatchingEmit::write`] drops through to
/// `ack <= req` on that branch, the same ack a mapped write would get once
/// it reaches its own bus-cycle completion. The read direction has no such
/// default statement — its default is the read mux's own all-`X` preamble.
#[derive(Debug)]
pub struct DispatchingEmit {
    direction: Direction,
    /// `(ack signal, request signal)` driven on the default branch, for
    /// the write direction only.
    default_ack: Option<(String, String)>,
}

impl DispatchingEmit {
    /// An emitter that always calls [`LeafCodegen::gen_read`].
    #[must_use]
    pub const fn read() -> Self {
        Self {
            direction: Direction::Read,
            default_ack: None,
        }
    }

    /// An emitter that always calls [`LeafCodegen::gen_write`], driving
    /// `ack` from `req` whenever the decoder falls through to its default
    /// (unmapped) branch.
    #[must_use]
    pub fn write(ack: impl Into<String>, req: impl Into<String>) -> Self {
        Self {
            direction: Direction::Write,
            default_ack: Some((ack.into(), req.into())),
        }
    }
}

impl LeafEmit for DispatchingEmit {
    fn emit(&mut self, leaf: Option<&Leaf<'_>>, word_offset: u64) -> Result<Vec<Stmt>, SynthesisError> {
        let Some(leaf) = leaf else {
            return Ok(match &self.default_ack {
                Some((ack, req)) => vec![Stmt::Assign {
                    target: Expr::signal(ack.clone()),
                    value: Expr::signal(req.clone()),
                }],
                None => Vec::new(),
            });
        };
        let gen = emitter_for(leaf.node);
        Ok(match self.direction {
            Direction::Read => gen.gen_read(leaf, word_offset),
            Direction::Write => gen.gen_write(leaf, word_offset),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout;
    use crate::tree::{Access, Register, Root};

    #[test]
    fn register_emitter_drives_a_port_per_register() {
        let mut root = Root::new("wb-32-be");
        root.children.push(Register::new("ctrl", 32, Access::Rw).into());
        layout(&mut root).unwrap();
        let leaves = crate::leaves::gather_leaves(&root).unwrap();
        let gen = emitter_for(leaves[0].node);
        let ports = gen.gen_ports(&leaves[0]);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name, "ctrl_o");
        assert_eq!(ports[0].width, 32);
    }

    #[test]
    fn dispatching_emit_produces_a_statement_per_leaf() {
        let mut root = Root::new("wb-32-be");
        root.children.push(Register::new("a", 32, Access::Rw).into());
        layout(&mut root).unwrap();
        let mut emit = DispatchingEmit::read();
        let stmts = crate::decoder::add_decoder(&root, &mut emit).unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn read_direction_emits_nothing_for_the_default_branch() {
        let mut emit = DispatchingEmit::read();
        let stmts = emit.emit(None, 0).unwrap();
        assert!(stmts.is_empty());
    }

    #[test]
    fn write_direction_acks_the_default_branch_from_req() {
        let mut emit = DispatchingEmit::write("wb_ack_o", "wb_cyc_i");
        let stmts = emit.emit(None, 0).unwrap();
        assert!(matches!(
            stmts.as_slice(),
            [Stmt::Assign {
                target: Expr::Signal(t),
                value: Expr::Signal(v),
            }] if t == "wb_ack_o" && v == "wb_cyc_i"
        ));
    }
}
