//! # Structured errors
//!
//! Layout and synthesis both fail through structured error values rather
//! than bare strings. Every variant carries enough detail to reconstruct a
//! precise message, plus the offending node's '/'-joined path.
//!
//! Errors are `thiserror`-derived rather than hand-rolled `Display` impls,
//! the same shape used elsewhere in this codebase for domain errors.

use thiserror::Error;

/// The taxonomy of layout-phase failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutErrorKind {
    /// A composite or field lacks a name.
    #[error("missing name")]
    MissingName,
    /// Two siblings share a name.
    #[error("duplicate name '{name}'")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },
    /// An explicit address is not a multiple of `c_align`.
    #[error("address {address:#x} is not aligned to {align:#x}")]
    UnalignedAddress {
        /// The requested address.
        address: u64,
        /// The required alignment.
        align: u64,
    },
    /// `width` is not one of 8, 16, 32, 64 (or not 32/64 for a float).
    #[error("incorrect width {width} for register")]
    BadRegisterWidth {
        /// The offending width.
        width: u64,
    },
    /// A register has no `access` attribute.
    #[error("missing access for register")]
    MissingAccess,
    /// `access` is not one of `ro`, `rw`, `wo`, `cst`.
    #[error("incorrect access '{access}' for register")]
    BadAccess {
        /// The offending access string.
        access: String,
    },
    /// A register declares both `type` and `fields`.
    #[error("register has both a type and fields")]
    TypeAndFields,
    /// `type` is not `unsigned`, `signed` or `float`.
    #[error("incorrect type '{type_name}' for register")]
    BadType {
        /// The offending type string.
        type_name: String,
    },
    /// `hi < lo`, or `hi == lo` (single-bit fields must omit `hi`).
    #[error("incorrect range for field (lo={lo}, hi={hi})")]
    BadFieldRange {
        /// The field's `lo`.
        lo: u64,
        /// The field's `hi`.
        hi: u64,
    },
    /// `hi >= 8 * reg.c_size`.
    #[error("field overflows its register size (hi={hi}, register bits={register_bits})")]
    FieldOverflow {
        /// The field's `hi`.
        hi: u64,
        /// The register's size, in bits.
        register_bits: u64,
    },
    /// Two fields of the same register share a bit.
    #[error("field '{field}' overlaps field '{other}' in bit {bit}")]
    FieldOverlap {
        /// The field being laid out.
        field: String,
        /// The field it collided with.
        other: String,
        /// The overlapping bit index.
        bit: u64,
    },
    /// `preset >= 2^width`.
    #[error("preset {preset:#x} does not fit in {width} bits")]
    BadPreset {
        /// The offending preset value.
        preset: u64,
        /// The width it was checked against.
        width: u64,
    },
    /// A composite node has no children.
    #[error("composite has no elements")]
    EmptyComposite,
    /// A [`crate::tree::Repeat`] lacks a count.
    #[error("missing repeat count")]
    MissingRepeatCount,
    /// `count < 1`.
    #[error("repeat count must be at least 1, got {count}")]
    BadRepeatCount {
        /// The offending count.
        count: u64,
    },
    /// A [`crate::tree::Memory`]'s `memdepth` is zero.
    #[error("memory depth must be at least 1, got {memdepth}")]
    BadMemDepth {
        /// The offending depth.
        memdepth: u64,
    },
    /// Two laid-out siblings overlap.
    #[error("element overlaps preceding sibling '{other}'")]
    NodeOverlap {
        /// The name of the overlapping sibling.
        other: String,
    },
    /// `root.bus` does not name a known bus.
    #[error("unknown bus '{bus}'")]
    UnknownBus {
        /// The offending bus name.
        bus: String,
    },
    /// A sub-map has neither a resolved `c_submap` nor a declared
    /// `size`/`align` to lay out against.
    #[error("submap has no resolved tree and no declared size")]
    UnresolvedSubmap,
}

/// A layout-phase failure: a [`LayoutErrorKind`] plus the '/'-joined path
/// (from the root) of the node that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {path}")]
pub struct LayoutError {
    /// What went wrong.
    pub kind: LayoutErrorKind,
    /// The offending node's path.
    pub path: String,
}

impl LayoutError {
    pub(crate) fn new(path: impl Into<String>, kind: LayoutErrorKind) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Decoder synthesis assumes layout already succeeded; a mismatch here is
/// an internal-consistency failure, not a user error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("structural invariant violation at {path}: {message}")]
pub struct SynthesisError {
    /// The offending node's path.
    pub path: String,
    /// What invariant was violated.
    pub message: String,
}

impl SynthesisError {
    pub(crate) fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// `ilog2`/`round_pow2` are only defined for strictly positive inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("domain error: value must be strictly positive, got {0}")]
pub struct DomainError(pub u64);
