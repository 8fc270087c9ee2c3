//! # Tree builder helpers
//!
//! Parsing a description-file format is out of scope: there is no
//! YAML/JSON front end here. What's left is the programmatic
//! construction path — the fluent `.with(...)`/`.at(...)` methods on
//! [`crate::tree`]'s node types are the primary API; this module adds a
//! few convenience assemblies used by the demo binary and by tests that
//! want a realistic-looking map without hand-assembling every register.

use crate::tree::{Access, Block, Field, Register, Root};

/// A typical "control/status" register pair: a read-write control register
/// with a couple of named fields, and a read-only status register.
#[must_use]
pub fn control_status_block(name: impl Into<String>) -> Block {
    Block::new(name)
        .with(
            Register::new("ctrl", 32, Access::Rw)
                .with_field(Field::bit("enable", 0))
                .with_field(Field::range("mode", 1, 3))
                .with_field(Field::range("irq_mask", 8, 15)),
        )
        .with(
            Register::new("status", 32, Access::Ro)
                .with_field(Field::bit("busy", 0))
                .with_field(Field::bit("done", 1))
                .with_field(Field::range("error_code", 8, 15)),
        )
}

/// A minimal demo map: a wishbone root with one [`control_status_block`]
/// and a counter register wide enough to need multi-word splitting.
#[must_use]
pub fn demo_map() -> Root {
    Root::new("wb-32-be").named("demo").with(control_status_block("regs")).with(
        Register::new("counter", 64, Access::Ro),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layout;

    #[test]
    fn demo_map_lays_out_without_error() {
        let mut root = demo_map();
        layout(&mut root).unwrap();
        assert!(root.computed().is_laid_out());
    }

    #[test]
    fn control_status_block_has_two_registers() {
        let block = control_status_block("x");
        assert_eq!(block.children.len(), 2);
    }
}
