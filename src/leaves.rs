//! # Leaf gathering
//!
//! Flattens a laid-out tree into the ordered list of leaves that decoder
//! synthesis partitions. Each leaf carries its absolute (root-relative)
//! address, since decoder synthesis dispatches on that rather than the
//! parent-relative address layout produces; this module derives it by
//! accumulating parent offsets while walking down to each leaf.

use crate::error::SynthesisError;
use crate::tree::{join_path, Node};

/// A leaf ready for decoder synthesis: a node together with its absolute
/// address and full path.
#[derive(Debug, Clone)]
pub struct Leaf<'a> {
    /// The leaf node itself (`Register`, `Memory`, or an opaque
    /// `Submap`).
    pub node: &'a Node,
    /// Root-relative byte address (`c_abs_addr`).
    pub abs_addr: u64,
    /// '/'-joined path from the root, for diagnostics.
    pub path: String,
}

/// Flatten `root` into its decoder-synthesis leaves.
///
/// `Register`, `Memory` and `Submap` are leaves; `Root`/`Block` recurse;
/// anything else — including `RepeatBlock` and a bare `Repeat` — is a
/// structural error, since this pass assumes `Repeat` expansion has
/// already happened upstream (see `DESIGN.md`).
///
/// # Errors
/// Returns [`SynthesisError`] the first time a `Repeat`/`RepeatBlock` node
/// is encountered.
pub fn gather_leaves(root: &crate::tree::Root) -> Result<Vec<Leaf<'_>>, SynthesisError> {
    let path = format!("/{}", root.name);
    let mut out = Vec::new();
    for child in &root.children {
        gather_node(child, root.computed().address(), &path, &mut out)?;
    }
    Ok(out)
}

fn gather_node<'a>(
    n: &'a Node,
    parent_abs: u64,
    parent_path: &str,
    out: &mut Vec<Leaf<'a>>,
) -> Result<(), SynthesisError> {
    let abs_addr = parent_abs + n.computed().address();
    let path = join_path(parent_path, n.name());
    match n {
        Node::Register(_) | Node::Memory(_) => {
            out.push(Leaf {
                node: n,
                abs_addr,
                path,
            });
            Ok(())
        }
        Node::Submap(s) => {
            if s.include {
                match &s.c_submap {
                    Some(sub) => gather_node(sub, abs_addr, &path, out),
                    None => Err(SynthesisError::new(
                        path,
                        "included submap has no resolved tree",
                    )),
                }
            } else {
                out.push(Leaf {
                    node: n,
                    abs_addr,
                    path,
                });
                Ok(())
            }
        }
        Node::Root(r) => {
            for child in &r.children {
                gather_node(child, abs_addr, &path, out)?;
            }
            Ok(())
        }
        Node::Block(b) => {
            for child in &b.children {
                gather_node(child, abs_addr, &path, out)?;
            }
            Ok(())
        }
        Node::RepeatBlock(_) | Node::Repeat(_) => Err(SynthesisError::new(
            path,
            format!(
                "{} nodes must be expanded before decoder synthesis",
                n.variant_name()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout;
    use crate::tree::{Access, Block, Memory, Register, Repeat, Root};

    #[test]
    fn gathers_registers_in_a_block() {
        let mut root = Root::new("wb-32-be");
        root.children.push(
            Block::new("b")
                .with(Register::new("a", 32, Access::Rw))
                .with(Register::new("c", 32, Access::Rw))
                .into(),
        );
        layout(&mut root).unwrap();
        let leaves = gather_leaves(&root).unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].path, "/MemoryMap/b/a");
        assert_eq!(leaves[1].path, "/MemoryMap/b/c");
    }

    #[test]
    fn absolute_address_accumulates_through_blocks() {
        let mut root = Root::new("wb-32-be");
        root.children.push(
            Block::new("b")
                .at(16)
                .with(Register::new("a", 32, Access::Rw).at(4))
                .into(),
        );
        layout(&mut root).unwrap();
        let leaves = gather_leaves(&root).unwrap();
        assert_eq!(leaves[0].abs_addr, 20);
    }

    #[test]
    fn bare_repeat_is_rejected() {
        let mut root = Root::new("wb-32-be");
        root.children.push(
            Repeat::new("r", 4)
                .with(Register::new("a", 32, Access::Rw))
                .into(),
        );
        layout(&mut root).unwrap();
        let err = gather_leaves(&root).unwrap_err();
        assert!(err.message.contains("Repeat"));
    }

    #[test]
    fn opaque_submap_is_a_single_leaf() {
        let mut root = Root::new("wb-32-be");
        root.children
            .push(crate::tree::Submap::opaque("s", 256, 256).into());
        layout(&mut root).unwrap();
        let leaves = gather_leaves(&root).unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].path, "/MemoryMap/s");
    }

    #[test]
    fn memory_is_a_single_leaf() {
        let mut root = Root::new("wb-32-be");
        root.children.push(Memory::new("m".to_string(), 4, 4).into());
        layout(&mut root).unwrap();
        let leaves = gather_leaves(&root).unwrap();
        assert_eq!(leaves.len(), 1);
    }
}
