//! # Layout engine
//!
//! Assigns addresses, sizes and alignments to every node in a tree and
//! validates every structural invariant along the way. This is the sole
//! source of geometric truth consumed by decoder synthesis
//! ([`crate::decoder`]).
//!
//! The dispatch is a plain exhaustive `match` over [`crate::tree::Node`]
//! rather than a visitor-table/trait object — the language-neutral
//! algorithm this is based on is naturally a function that switches on the
//! node's variant tag, and Rust's `match` expresses that directly.

use tracing::debug;

use crate::error::{DomainError, LayoutError, LayoutErrorKind};
use crate::tree::{
    join_path, Block, Field, Memory, Node, RegisterType, Repeat, RepeatBlock, Root, BYTE_SIZE,
};

/// `ilog2(v)`: the smallest `n` such that `2^n >= v`.
///
/// # Errors
/// Returns [`DomainError`] when `v == 0`.
pub fn ilog2(v: u64) -> Result<u32, DomainError> {
    if v == 0 {
        return Err(DomainError(v));
    }
    let mut n = 0u32;
    let mut p: u64 = 1;
    while p < v {
        p <<= 1;
        n += 1;
    }
    Ok(n)
}

/// `round_pow2(v) = 1 << ilog2(v)`: the smallest power of two `>= v`.
///
/// # Errors
/// Returns [`DomainError`] when `v == 0`.
pub fn round_pow2(v: u64) -> Result<u64, DomainError> {
    Ok(1u64 << ilog2(v)?)
}

/// `align(n, mul) = ceil(n / mul) * mul`.
///
/// # Panics
/// Panics if `mul == 0`.
#[must_use]
pub fn align(n: u64, mul: u64) -> u64 {
    assert!(mul > 0, "alignment must be strictly positive");
    n.div_ceil(mul) * mul
}

/// Run the full layout pass over a root, populating every `c_*` attribute
/// on every descendant, resolving the bus name against `buses`.
///
/// # Errors
/// Returns the first [`LayoutError`] encountered, in declaration order.
pub fn layout_with_buses(
    root: &mut Root,
    buses: &crate::bus::BusRegistry,
) -> Result<(), LayoutError> {
    let path = format!("/{}", root.name);
    let word_size = buses.word_size_for(root.bus.as_deref(), &path)?;
    let addr_word_bits =
        ilog2(word_size).expect("every registered bus has a positive power-of-two word size");
    root.set_bus_computed(word_size, addr_word_bits.into());

    debug!(path = %path, word_size, "starting layout");
    layout_root(root, &path, word_size)
}

/// [`layout_with_buses`] against the default [`crate::bus::BusRegistry`]
/// (just the reference bus). The convenience entry point used throughout
/// this crate's own tests and the demo binary.
///
/// # Errors
/// See [`layout_with_buses`].
pub fn layout(root: &mut Root) -> Result<(), LayoutError> {
    layout_with_buses(root, &crate::bus::BusRegistry::default())
}

/// Per-composite address cursor.
struct Cursor {
    position: u64,
}

impl Cursor {
    const fn new() -> Self {
        Self { position: 0 }
    }

    fn place(
        &mut self,
        address: crate::tree::Address,
        node_align: u64,
        node_size: u64,
        path: &str,
    ) -> Result<u64, LayoutError> {
        use crate::tree::Address as A;
        let addr = match address {
            A::Absent | A::Next => align(self.position, node_align),
            A::Explicit(a) => {
                if a % node_align != 0 {
                    return Err(LayoutError::new(
                        path,
                        LayoutErrorKind::UnalignedAddress {
                            address: a,
                            align: node_align,
                        },
                    ));
                }
                a
            }
        };
        self.position = addr + node_size;
        Ok(addr)
    }
}

fn layout_named(name: &str, path: &str) -> Result<(), LayoutError> {
    if name.is_empty() {
        return Err(LayoutError::new(path, LayoutErrorKind::MissingName));
    }
    Ok(())
}

fn layout_field(
    f: &mut Field,
    path: &str,
    register_size_bytes: u64,
    occupancy: &mut [Option<String>],
) -> Result<(), LayoutError> {
    layout_named(&f.name, path)?;
    let width = match f.hi {
        None => {
            f.set_width(1);
            1
        }
        Some(hi) => {
            if hi < f.lo {
                return Err(LayoutError::new(
                    path,
                    LayoutErrorKind::BadFieldRange { lo: f.lo, hi },
                ));
            }
            if hi == f.lo {
                return Err(LayoutError::new(
                    path,
                    LayoutErrorKind::BadFieldRange { lo: f.lo, hi },
                ));
            }
            f.set_width(hi - f.lo + 1);
            hi - f.lo + 1
        }
    };
    let hi_bit = f.lo + width - 1;
    if hi_bit >= register_size_bytes * BYTE_SIZE {
        return Err(LayoutError::new(
            path,
            LayoutErrorKind::FieldOverflow {
                hi: hi_bit,
                register_bits: register_size_bytes * BYTE_SIZE,
            },
        ));
    }
    for bit in f.lo..=hi_bit {
        let idx = bit as usize;
        match &occupancy[idx] {
            None => occupancy[idx] = Some(f.name.clone()),
            Some(other) => {
                return Err(LayoutError::new(
                    path,
                    LayoutErrorKind::FieldOverlap {
                        field: f.name.clone(),
                        other: other.clone(),
                        bit,
                    },
                ));
            }
        }
    }
    if let Some(preset) = f.preset {
        if width < 64 && preset >= (1u64 << width) {
            return Err(LayoutError::new(
                path,
                LayoutErrorKind::BadPreset { preset, width },
            ));
        }
    }
    Ok(())
}

fn layout_register(
    n: &mut crate::tree::Register,
    path: &str,
    word_size: u64,
) -> Result<(), LayoutError> {
    if !matches!(n.width, 8 | 16 | 32 | 64) {
        return Err(LayoutError::new(
            path,
            LayoutErrorKind::BadRegisterWidth { width: n.width },
        ));
    }
    layout_named(&n.name, path)?;

    // Validating a string that failed to parse into an `Access` lives at
    // the description-file boundary, which this crate doesn't implement.
    // Only absence is checked here.
    n.access
        .ok_or_else(|| LayoutError::new(path, LayoutErrorKind::MissingAccess))?;

    let size = n.width / BYTE_SIZE;
    n.computed.set(0, size, align(size, word_size));

    if !n.fields.is_empty() {
        if n.reg_type.is_some() {
            return Err(LayoutError::new(path, LayoutErrorKind::TypeAndFields));
        }
        let mut occupancy: Vec<Option<String>> = vec![None; n.width as usize];
        let mut names = std::collections::HashSet::new();
        let mut fields = n.fields.clone();
        for f in &mut fields {
            if !names.insert(f.name.clone()) {
                return Err(LayoutError::new(
                    path,
                    LayoutErrorKind::DuplicateName {
                        name: f.name.clone(),
                    },
                ));
            }
            layout_field(f, &join_path(path, &f.name.clone()), size, &mut occupancy)?;
        }
        n.set_type(None);
        n.set_laid_out_fields(fields);
    } else {
        let ty = match n.reg_type {
            None => RegisterType::Unsigned,
            Some(RegisterType::Unsigned) => RegisterType::Unsigned,
            Some(RegisterType::Signed) => RegisterType::Signed,
            Some(RegisterType::Float) => {
                if !matches!(n.width, 32 | 64) {
                    return Err(LayoutError::new(
                        path,
                        LayoutErrorKind::BadRegisterWidth { width: n.width },
                    ));
                }
                RegisterType::Float
            }
        };
        if let Some(preset) = n.preset {
            if n.width < 64 && preset >= (1u64 << n.width) {
                return Err(LayoutError::new(
                    path,
                    LayoutErrorKind::BadPreset {
                        preset,
                        width: n.width,
                    },
                ));
            }
        }
        n.set_type(Some(ty));
        let mut pseudo = Field::range(n.name.clone(), 0, n.width - 1);
        pseudo.set_width(n.width);
        pseudo.preset = n.preset;
        n.set_laid_out_fields(vec![pseudo]);
    }
    Ok(())
}

fn layout_memory(n: &mut Memory, path: &str, word_size: u64) -> Result<(), LayoutError> {
    layout_named(&n.name, path)?;
    let depth = ilog2(n.memdepth).map_err(|_| {
        LayoutError::new(
            path,
            LayoutErrorKind::BadMemDepth {
                memdepth: n.memdepth,
            },
        )
    })?;
    let width = n.elsize * BYTE_SIZE;
    n.set_depth_width(u64::from(depth), width);

    let total = n.memdepth * n.elsize;
    let align_val = round_pow2(total.max(word_size))
        .expect("total memory size is always > 0 given memdepth/elsize > 0");
    n.computed.set(0, total, align_val);
    Ok(())
}

fn layout_submap(n: &mut crate::tree::Submap, path: &str) -> Result<(), LayoutError> {
    layout_named(&n.name, path)?;
    if let Some(sub) = &n.c_submap {
        let c = sub.computed();
        n.computed.set(0, c.size(), c.align());
    } else {
        let size = n.size.ok_or_else(|| LayoutError::new(path, LayoutErrorKind::UnresolvedSubmap))?;
        let align_val = n.align.ok_or_else(|| LayoutError::new(path, LayoutErrorKind::UnresolvedSubmap))?;
        n.computed.set(0, size, align_val);
    }
    Ok(())
}

fn layout_repeat(n: &mut Repeat, path: &str, word_size: u64) -> Result<(), LayoutError> {
    let count = n
        .count
        .ok_or_else(|| LayoutError::new(path, LayoutErrorKind::MissingRepeatCount))?;
    if count < 1 {
        return Err(LayoutError::new(
            path,
            LayoutErrorKind::BadRepeatCount { count },
        ));
    }
    layout_composite(&mut n.children, &mut n.computed, n.name.clone(), path, word_size, true)?;

    let elsize = align(n.computed.size(), n.computed.align());
    let elsize_pow2 = round_pow2(elsize).expect("elsize > 0 once a composite has children");
    n.set_elsize(elsize_pow2);
    let count_pow2 = round_pow2(count).expect("repeat count >= 1 checked above");
    let total = elsize_pow2 * count_pow2;
    n.computed.set(0, total, total);
    Ok(())
}

fn layout_block(n: &mut Block, path: &str, word_size: u64) -> Result<(), LayoutError> {
    layout_composite(&mut n.children, &mut n.computed, n.name.clone(), path, word_size, true)?;
    if let Some(bb) = n.blk_sel_from_composite() {
        n.set_blk_sel_bits(bb.0, bb.1);
    }
    if n.align != Some(false) {
        let size = round_pow2(n.computed.size().max(1)).expect("size is always >= 1 here");
        n.computed.set(0, size, size);
    }
    Ok(())
}

fn layout_repeat_block(n: &mut RepeatBlock, path: &str, word_size: u64) -> Result<(), LayoutError> {
    layout_composite(&mut n.children, &mut n.computed, n.name.clone(), path, word_size, true)?;
    if n.align != Some(false) {
        let size = round_pow2(n.computed.size().max(1)).expect("size is always >= 1 here");
        n.computed.set(0, size, size);
    }
    Ok(())
}

/// Whether `child` participates in alignment promotion. Only `Block`/
/// `RepeatBlock` carry a user-facing `align` attribute, so only those two
/// variants are eligible; see `DESIGN.md` for the reasoning.
fn promotable_align(child: &Node) -> Option<bool> {
    match child {
        Node::Block(b) => Some(b.align != Some(false)),
        Node::RepeatBlock(b) => Some(b.align != Some(false)),
        _ => None,
    }
}

fn force_align(child: &mut Node, align_val: u64) {
    match child {
        Node::Block(b) => b.computed.set(0, b.computed.size(), align_val),
        Node::RepeatBlock(b) => b.computed.set(0, b.computed.size(), align_val),
        _ => {}
    }
}

/// Generic composite layout, shared by Root/Block/RepeatBlock/Repeat.
fn layout_composite(
    children: &mut Vec<Node>,
    computed: &mut crate::tree::Computed,
    name: String,
    path: &str,
    word_size: u64,
    require_named: bool,
) -> Result<(), LayoutError> {
    if children.is_empty() {
        return Err(LayoutError::new(path, LayoutErrorKind::EmptyComposite));
    }
    if require_named {
        layout_named(&name, path)?;
    }

    let mut names = std::collections::HashSet::new();
    for c in children.iter() {
        if !names.insert(c.name().to_string()) {
            return Err(LayoutError::new(
                path,
                LayoutErrorKind::DuplicateName {
                    name: c.name().to_string(),
                },
            ));
        }
    }

    for c in children.iter_mut() {
        let child_path = join_path(path, c.name());
        layout_node(c, &child_path, word_size)?;
    }

    let max_align = children
        .iter()
        .map(|c| c.computed().align())
        .max()
        .unwrap_or(1);

    for c in children.iter_mut() {
        if promotable_align(c) == Some(true) {
            force_align(c, max_align);
        }
    }

    let mut cursor = Cursor::new();
    for c in children.iter_mut() {
        let child_path = join_path(path, c.name());
        let addr = cursor.place(
            requested_address(c),
            c.computed().align(),
            c.computed().size(),
            &child_path,
        )?;
        set_address(c, addr);
    }

    let size = children
        .iter()
        .map(|c| c.computed().address() + c.computed().size())
        .max()
        .unwrap_or(0);
    computed.set(0, size, max_align);

    children.sort_by_key(|c| c.computed().address());

    let mut last_end = 0u64;
    let mut last_name = String::new();
    for c in children.iter() {
        if c.computed().address() < last_end {
            return Err(LayoutError::new(
                path,
                LayoutErrorKind::NodeOverlap {
                    other: last_name.clone(),
                },
            ));
        }
        last_end = c.computed().address() + c.computed().size();
        last_name = c.name().to_string();
    }

    Ok(())
}

fn requested_address(n: &Node) -> crate::tree::Address {
    match n {
        Node::Block(b) => b.address,
        Node::RepeatBlock(b) => b.address,
        Node::Register(r) => r.address,
        _ => crate::tree::Address::Absent,
    }
}

fn set_address(n: &mut Node, addr: u64) {
    match n {
        Node::Root(r) => r.computed.set(addr, r.computed.size(), r.computed.align()),
        Node::Block(b) => b.computed.set(addr, b.computed.size(), b.computed.align()),
        Node::RepeatBlock(b) => b.computed.set(addr, b.computed.size(), b.computed.align()),
        Node::Repeat(r) => r.computed.set(addr, r.computed.size(), r.computed.align()),
        Node::Submap(s) => s.computed.set(addr, s.computed.size(), s.computed.align()),
        Node::Memory(m) => m.computed.set(addr, m.computed.size(), m.computed.align()),
        Node::Register(r) => r.computed.set(addr, r.computed.size(), r.computed.align()),
    }
}

fn layout_node(n: &mut Node, path: &str, word_size: u64) -> Result<(), LayoutError> {
    match n {
        Node::Root(_) => unreachable!("Root only appears at the top of a tree"),
        Node::Block(b) => layout_block(b, path, word_size),
        Node::RepeatBlock(b) => layout_repeat_block(b, path, word_size),
        Node::Repeat(r) => layout_repeat(r, path, word_size),
        Node::Submap(s) => layout_submap(s, path),
        Node::Memory(m) => layout_memory(m, path, word_size),
        Node::Register(r) => layout_register(r, path, word_size),
    }
}

fn layout_root(root: &mut Root, path: &str, word_size: u64) -> Result<(), LayoutError> {
    layout_composite(
        &mut root.children,
        &mut root.computed,
        root.name.clone(),
        path,
        word_size,
        false,
    )?;

    let size = round_pow2(root.computed.size().max(1)).expect("size is always >= 1 here");
    root.computed.set(0, size, size);

    let has_aligned = root
        .children
        .iter()
        .any(|c| promotable_align(c) == Some(true));
    let max_align = root
        .children
        .iter()
        .map(|c| c.computed().align())
        .max()
        .unwrap_or(1);
    if has_aligned {
        let blk_bits = ilog2(max_align).expect("alignment is always > 0");
        let sel_bits = ilog2(size).expect("size is always > 0") - blk_bits;
        root.set_blk_sel_bits(u64::from(blk_bits), u64::from(sel_bits));
    } else {
        let blk_bits = ilog2(size).expect("size is always > 0");
        root.set_blk_sel_bits(u64::from(blk_bits), 0);
    }

    Ok(())
}

impl Block {
    fn blk_sel_from_composite(&self) -> Option<(u64, u64)> {
        let has_aligned = self
            .children
            .iter()
            .any(|c| promotable_align(c) == Some(true));
        let max_align = self
            .children
            .iter()
            .map(|c| c.computed().align())
            .max()
            .unwrap_or(1);
        if has_aligned {
            let blk_bits = ilog2(max_align).ok()?;
            let sel_bits = ilog2(self.computed.size().max(1)).ok()? - blk_bits;
            Some((u64::from(blk_bits), u64::from(sel_bits)))
        } else {
            let blk_bits = ilog2(self.computed.size().max(1)).ok()?;
            Some((u64::from(blk_bits), 0))
        }
    }
}
