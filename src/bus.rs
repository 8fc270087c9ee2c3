//! # Bus registry
//!
//! Resolves a [`crate::tree::Root::bus`] name to the word size it implies.
//! Only one bus is recognized today, `"wb-32-be"` (32-bit, big-endian
//! Wishbone), but the table shape leaves room to register more.
//!
//! `BusRegistry` is a plain value the caller constructs and owns for the
//! duration of one run (the CLI binary, or a test) rather than a
//! process-wide singleton, so there is nothing to reset between runs; see
//! `DESIGN.md` for the reasoning.

use crate::error::{LayoutError, LayoutErrorKind};

/// A single known bus and the word size it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BusDef {
    name: &'static str,
    word_size: u64,
}

/// The reference bus: 32-bit, big-endian Wishbone.
const WB_32_BE: BusDef = BusDef {
    name: "wb-32-be",
    word_size: 4,
};

/// A per-run table of known buses.
///
/// `Default` registers only the reference bus; tests or callers that want
/// to exercise [`LayoutErrorKind::UnknownBus`] deliberately can build an
/// empty one with [`BusRegistry::empty`].
#[derive(Debug, Clone)]
pub struct BusRegistry {
    known: Vec<BusDef>,
}

impl Default for BusRegistry {
    fn default() -> Self {
        Self {
            known: vec![WB_32_BE],
        }
    }
}

impl BusRegistry {
    /// A registry with no known buses at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self { known: Vec::new() }
    }

    /// Resolve `bus` (or the reference bus, when `None`) to its word size,
    /// in bytes.
    ///
    /// # Errors
    /// Returns [`LayoutError`] if `bus` names a bus this registry doesn't
    /// know about.
    pub fn word_size_for(&self, bus: Option<&str>, path: &str) -> Result<u64, LayoutError> {
        let wanted = bus.unwrap_or(WB_32_BE.name);
        self.known
            .iter()
            .find(|b| b.name == wanted)
            .map(|b| b.word_size)
            .ok_or_else(|| {
                LayoutError::new(
                    path,
                    LayoutErrorKind::UnknownBus {
                        bus: wanted.to_string(),
                    },
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_bus_resolves_to_four_bytes() {
        let reg = BusRegistry::default();
        assert_eq!(reg.word_size_for(Some("wb-32-be"), "/root").unwrap(), 4);
    }

    #[test]
    fn absent_bus_name_defaults_to_reference_bus() {
        let reg = BusRegistry::default();
        assert_eq!(reg.word_size_for(None, "/root").unwrap(), 4);
    }

    #[test]
    fn unknown_bus_name_is_rejected() {
        let reg = BusRegistry::default();
        let err = reg.word_size_for(Some("axi4-lite"), "/root").unwrap_err();
        assert!(matches!(err.kind, LayoutErrorKind::UnknownBus { .. }));
    }

    #[test]
    fn empty_registry_rejects_even_the_reference_bus() {
        let reg = BusRegistry::empty();
        assert!(reg.word_size_for(Some("wb-32-be"), "/root").is_err());
    }
}
