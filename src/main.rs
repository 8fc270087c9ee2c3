//! # chebyrs
//!
//! A memory-map compiler core: given a declarative register-map
//! description tree, it lays the tree out (assigning addresses, sizes and
//! alignments) and synthesizes a hierarchical bus-slave address decoder
//! from the result.
//!
//! Parsing a description-file format, the HDL intermediate representation
//! node constructors themselves, concrete per-leaf codegen bodies,
//! CLI description-file wiring, alternative emitters and bus-specific
//! wiring are all treated as external collaborators — this crate supplies
//! minimal, crate-local stand-ins for them ([`ir`], [`generator`],
//! [`builder`]) so the core can be exercised end-to-end, but the
//! interesting work lives in [`tree`], [`layout`], [`leaves`] and
//! [`decoder`].

#![deny(rustdoc::all)]
#![allow(rustdoc::private_doc_tests)]
#![deny(clippy::must_use_candidate)]
#![deny(missing_debug_implementations)]

mod builder;
mod bus;
mod cli;
mod decoder;
mod error;
mod generator;
mod ir;
mod layout;
mod leaves;
mod mux;
mod tree;

use anyhow::{bail, Context, Result};
use bus::BusRegistry;
use clap::Parser;
use cli::Cli;
use generator::DispatchingEmit;
use mux::{add_read_mux_process, add_write_mux_process, Ibus};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let args = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(match args.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set global tracing subscriber")?;

    let mut root = match args.map.as_str() {
        "demo" => builder::demo_map(),
        other => bail!("unknown built-in map '{other}' (only 'demo' is implemented)"),
    };

    layout::layout_with_buses(&mut root, &BusRegistry::default()).context("layout failed")?;
    info!(map = %args.map, size = root.computed().size(), "laid out memory map");

    let bus = Ibus::default();
    let read = add_read_mux_process(&root, &bus, &mut DispatchingEmit::read())
        .context("read-mux synthesis failed")?;
    let write = add_write_mux_process(&root, &bus, &mut DispatchingEmit::write(&bus.ack, &bus.cyc))
        .context("write-mux synthesis failed")?;
    let stmt_count = read.body.len() + write.body.len();

    let summary = format!(
        "synthesized {stmt_count} top-level statements for map '{}' ({} bytes)\n",
        args.map,
        root.computed().size()
    );
    match args.output {
        Some(path) => std::fs::write(&path, summary)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{summary}"),
    }

    Ok(())
}
