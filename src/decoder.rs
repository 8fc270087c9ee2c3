//! # Recursive decoder synthesis
//!
//! Turns a flat, address-sorted [`Leaf`] list into a hierarchical
//! [`ir::Switch`] tree that dispatches an incoming bus address down to the
//! right leaf, splitting multi-word registers across several windows along
//! the way.
//!
//! The algorithm: partition the remaining leaves by the address bits below
//! the coarsest child alignment, recurse into each bucket, and
//! default-branch anything left over. The bucketing queue is a
//! [`VecDeque`] rather than a plain `Vec`, for the same amortized-O(1)
//! push-front/pop-front reason any FIFO-with-requeue reaches for one.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::SynthesisError;
use crate::ir::{Expr, Stmt, Switch};
use crate::leaves::Leaf;
use crate::tree::{Node, Root, WordEndian};

/// The per-leaf codegen capability decoder synthesis delegates to once it
/// has narrowed a window down to a single leaf. Concrete implementations
/// (`RegisterEmitter`, `RamEmitter`, …) live in [`crate::generator`].
pub trait LeafEmit {
    /// Emit the statements that drive a decoder branch. `leaf` is `Some`
    /// for a branch that resolves to a real leaf, with `word_offset` the
    /// byte offset of the access within that leaf's own addressable range
    /// (already endian-adjusted for registers); `leaf` is `None` for the
    /// default (unmapped) branch of a switch, in which case `word_offset`
    /// carries the branch's window base address and is otherwise unused.
    ///
    /// # Errors
    /// Returns [`SynthesisError`] if the leaf cannot be code-generated
    /// (e.g. an opaque sub-map with no resolved interface).
    fn emit(&mut self, leaf: Option<&Leaf<'_>>, word_offset: u64) -> Result<Vec<Stmt>, SynthesisError>;
}

fn ilog2(v: u64) -> u32 {
    crate::layout::ilog2(v).expect("decoder synthesis only runs on nodes layout already sized")
}

/// Build the decoder for one window of the address space.
///
/// `hi` is the index of the highest address bit still relevant to this
/// window; `off` is the window's own base address, used only to adjust a
/// register's byte offset within its word for endian handling.
///
/// # Errors
/// Returns [`SynthesisError`] propagated from [`LeafEmit::emit`], or if
/// `children` is empty (a caller bug — [`crate::leaves::gather_leaves`]
/// never returns an empty window to synthesis).
pub fn add_block_decoder(
    root: &Root,
    children: &mut VecDeque<Leaf<'_>>,
    hi: u64,
    off: u64,
    emit: &mut dyn LeafEmit,
) -> Result<Vec<Stmt>, SynthesisError> {
    if children.is_empty() {
        return Err(SynthesisError::new(
            format!("/{}", root.name),
            "decoder synthesis invoked on an empty leaf window",
        ));
    }

    if children.len() == 1 {
        let leaf = children.pop_front().expect("checked len == 1 above");
        return add_leaf(root, &leaf, hi, off, emit);
    }

    let maxsz = children
        .iter()
        .map(|l| l.node.computed().align())
        .max()
        .expect("checked len > 1 above");
    partition(root, children, hi, off, maxsz, emit)
}

/// A single leaf fills the whole window: either emit it directly, or — for
/// a register wider than the bus word — re-enter the generic windowing
/// logic over the register's own words, using the window's inherited `hi`
/// rather than a bespoke selector width, so that address bits above the
/// register's word count still default correctly instead of aliasing.
fn add_leaf(
    root: &Root,
    leaf: &Leaf<'_>,
    hi: u64,
    off: u64,
    emit: &mut dyn LeafEmit,
) -> Result<Vec<Stmt>, SynthesisError> {
    let word_size = root.word_size();
    let size = leaf.node.computed().size();

    match leaf.node {
        Node::Register(_) if size <= word_size => {
            let mut foff = off & (word_size - 1);
            if matches!(root.word_endian, WordEndian::Big) {
                foff = (size.wrapping_sub(word_size).wrapping_sub(foff)) & (word_size - 1);
            }
            debug!(path = %leaf.path, foff, "decoder: direct register access");
            emit.emit(Some(leaf), foff)
        }
        Node::Register(_) => {
            // Multi-word register: split across `size / word_size` whole-word
            // windows, one bus cycle per word, keeping the window's own `hi`
            // so unused selector values still reach the default arm.
            debug!(path = %leaf.path, size, word_size, "decoder: splitting multi-word register");
            let word_count = size / word_size;
            let maxszl2 = root.addr_word_bits();
            let base_word = off >> maxszl2;
            let mut switch = Switch::new(Expr::signal("addr").slice(hi, maxszl2));
            for word_index in 0..word_count {
                let logical = if matches!(root.word_endian, WordEndian::Big) {
                    word_count - 1 - word_index
                } else {
                    word_index
                };
                let body = emit.emit(Some(leaf), logical * word_size)?;
                switch.add_choice(base_word + word_index, body);
            }
            switch.add_default(emit.emit(None, off)?);
            Ok(vec![Stmt::Switch(switch)])
        }
        Node::Memory(_) | Node::Submap(_) => {
            debug!(path = %leaf.path, "decoder: direct leaf access");
            emit.emit(Some(leaf), off)
        }
        Node::Root(_) | Node::Block(_) | Node::RepeatBlock(_) | Node::Repeat(_) => {
            Err(SynthesisError::new(
                leaf.path.clone(),
                format!(
                    "{} cannot reach decoder synthesis as a leaf",
                    leaf.node.variant_name()
                ),
            ))
        }
    }
}

/// Partition `children` by the address bits below `maxsz`, recursing into
/// each bucket, greedily bucketing consecutive leaves that share the same
/// masked base address and requeuing a leaf whose footprint spills past
/// the bucket's window.
fn partition(
    root: &Root,
    children: &mut VecDeque<Leaf<'_>>,
    hi: u64,
    off: u64,
    maxsz: u64,
    emit: &mut dyn LeafEmit,
) -> Result<Vec<Stmt>, SynthesisError> {
    let maxszl2 = u64::from(ilog2(maxsz));
    let mask = !(maxsz - 1);
    let mut switch = Switch::new(Expr::signal("addr").slice(hi, maxszl2));

    debug!(maxszl2, hi, remaining = children.len(), "decoder: carving window");

    while let Some(first) = children.pop_front() {
        let base = first.abs_addr & mask;
        let mut bucket = VecDeque::new();
        bucket.push_back(first);
        while let Some(next) = children.front() {
            if next.abs_addr & mask == base {
                bucket.push_back(children.pop_front().expect("front() just succeeded"));
            } else {
                break;
            }
        }
        if let Some(last) = bucket.back() {
            if last.abs_addr + last.node.computed().size() > base + maxsz {
                let overflow = bucket.pop_back().expect("back() just succeeded");
                children.push_front(overflow);
            }
        }
        if bucket.is_empty() {
            // The sole candidate overflowed the window on its own; nothing
            // left to recurse on for this base, move to the next one.
            continue;
        }
        let branch_hi = maxszl2.saturating_sub(1);
        let body = add_block_decoder(root, &mut bucket, branch_hi, off + base, emit)?;
        switch.add_choice(base >> maxszl2, body);
    }

    switch.add_default(emit.emit(None, off)?);
    Ok(vec![Stmt::Switch(switch)])
}

/// Top-level entry point: synthesize the decoder for an entire laid-out
/// tree.
///
/// # Errors
/// Returns [`SynthesisError`] from [`crate::leaves::gather_leaves`] or
/// decoder synthesis itself.
pub fn add_decoder(root: &Root, emit: &mut dyn LeafEmit) -> Result<Vec<Stmt>, SynthesisError> {
    let leaves = crate::leaves::gather_leaves(root)?;
    let mut queue: VecDeque<Leaf<'_>> = leaves.into();
    let hi = root.sel_bits() + root.blk_bits() - 1;
    add_block_decoder(root, &mut queue, hi, 0, emit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout;
    use crate::tree::{Access, Block, Memory, Register, Root, WordEndian};

    struct RecordingEmit {
        calls: Vec<(String, u64)>,
        defaults: u32,
    }

    impl RecordingEmit {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                defaults: 0,
            }
        }
    }

    impl LeafEmit for RecordingEmit {
        fn emit(&mut self, leaf: Option<&Leaf<'_>>, word_offset: u64) -> Result<Vec<Stmt>, SynthesisError> {
            match leaf {
                Some(leaf) => {
                    self.calls.push((leaf.path.clone(), word_offset));
                    Ok(vec![Stmt::Comment(format!("access {}", leaf.path))])
                }
                None => {
                    self.defaults += 1;
                    Ok(vec![Stmt::Comment("unmapped".to_string())])
                }
            }
        }
    }

    #[test]
    fn covers_every_leaf_exactly_once() {
        let mut root = Root::new("wb-32-be");
        root.children.push(
            Block::new("b")
                .with(Register::new("a", 32, Access::Rw))
                .with(Register::new("c", 32, Access::Rw))
                .into(),
        );
        layout(&mut root).unwrap();
        let mut emit = RecordingEmit::new();
        add_decoder(&root, &mut emit).unwrap();
        assert_eq!(emit.calls.len(), 2);
        let mut paths: Vec<_> = emit.calls.iter().map(|(p, _)| p.clone()).collect();
        paths.sort();
        assert_eq!(paths, vec!["/MemoryMap/b/a", "/MemoryMap/b/c"]);
    }

    #[test]
    fn multi_word_register_is_split_into_one_branch_per_word() {
        let mut root = Root::new("wb-32-be");
        root.children.push(Register::new("wide", 64, Access::Rw).into());
        layout(&mut root).unwrap();
        let mut emit = RecordingEmit::new();
        let stmts = add_decoder(&root, &mut emit).unwrap();
        assert_eq!(emit.calls.len(), 2);
        let mut offsets: Vec<_> = emit.calls.iter().map(|(_, o)| *o).collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![0, 4]);

        let Some(Stmt::Switch(switch)) = stmts.first() else {
            panic!("expected a word-select switch over the register's own address bits");
        };
        assert!(matches!(switch.selector, Expr::Slice { hi: 2, lo: 2, .. }));
        assert_eq!(
            switch.choices.iter().map(|c| c.value).collect::<Vec<_>>(),
            vec![Some(0), Some(1), None]
        );
    }

    #[test]
    fn s2_gap_between_leaves_reaches_default_branch() {
        let mut root = Root::new("wb-32-be");
        root.children.push(Register::new("a", 32, Access::Rw).into());
        root.children.push(Register::new("b", 32, Access::Rw).at(8).into());
        layout(&mut root).unwrap();
        let mut emit = RecordingEmit::new();
        let stmts = add_decoder(&root, &mut emit).unwrap();
        assert_eq!(emit.calls.len(), 2);
        assert_eq!(emit.defaults, 1, "the hole at addresses 4..8 must hit the default arm");

        let Some(Stmt::Switch(switch)) = stmts.first() else {
            panic!("expected a single top-level switch spanning both registers and the gap");
        };
        assert_eq!(
            switch.choices.iter().map(|c| c.value).collect::<Vec<_>>(),
            vec![Some(0), Some(2), None],
            "selector value 1 (addresses 4..8) has no leaf and must fall through to default"
        );
    }

    #[test]
    fn big_endian_subword_register_uses_the_size_minus_word_size_formula() {
        let mut root = Root::new("wb-32-be");
        root.word_endian = WordEndian::Big;
        root.children.push(Register::new("flag", 8, Access::Rw).into());
        layout(&mut root).unwrap();
        let mut emit = RecordingEmit::new();
        add_decoder(&root, &mut emit).unwrap();
        // c_size=1, c_word_size=4, foff=0 before the endian adjustment:
        // (1 - 4 - 0) mod 4 = 1.
        assert_eq!(emit.calls, vec![("/MemoryMap/flag".to_string(), 1)]);
    }

    #[test]
    fn s4_big_endian_multi_word_register_keeps_the_inherited_window() {
        let mut root = Root::new("wb-32-be");
        root.word_endian = WordEndian::Big;
        root.children.push(Register::new("wide", 64, Access::Rw).into());
        root.children.push(Memory::new("ram".to_string(), 64, 4).into());
        layout(&mut root).unwrap();
        let mut emit = RecordingEmit::new();
        let stmts = add_decoder(&root, &mut emit).unwrap();

        let Some(Stmt::Switch(outer)) = stmts.first() else {
            panic!("expected the top-level switch splitting the register's 256-byte window from the RAM's");
        };
        assert!(matches!(outer.selector, Expr::Slice { hi: 8, lo: 8, .. }));

        let Some(Stmt::Switch(inner)) = outer.choices[0].body.first() else {
            panic!("expected the register's own word switch nested under the first branch");
        };
        // `hi` is inherited from the outer window (7), not re-derived from
        // `ilog2(word_count)` (which would only reach bit 2) — so the six
        // bits in between correctly default instead of aliasing onto the
        // register's two words.
        assert!(matches!(inner.selector, Expr::Slice { hi: 7, lo: 2, .. }));
        assert_eq!(
            inner.choices.iter().map(|c| c.value).collect::<Vec<_>>(),
            vec![Some(0), Some(1), None]
        );

        // Big-endian word ordering: the lower address (choice 0) carries the
        // more-significant word, so its byte offset within the register is
        // the higher one. The RAM leaf also calls `emit`, so filter down to
        // the register's own calls before checking order.
        let offsets: Vec<_> = emit
            .calls
            .iter()
            .filter(|(path, _)| path == "/MemoryMap/wide")
            .map(|(_, o)| *o)
            .collect();
        assert_eq!(offsets, vec![4, 0]);
    }

    #[test]
    fn single_register_tree_needs_no_switch() {
        let mut root = Root::new("wb-32-be");
        root.children.push(Register::new("only", 32, Access::Rw).into());
        layout(&mut root).unwrap();
        let mut emit = RecordingEmit::new();
        let stmts = add_decoder(&root, &mut emit).unwrap();
        assert_eq!(emit.calls.len(), 1);
        assert!(!stmts.iter().any(|s| matches!(s, Stmt::Switch(_))));
    }
}
