//! # Read/write mux drivers
//!
//! Builds the two top-level processes that wrap a decoder switch tree with
//! the bus handshake: a combinational read mux that defaults to all-`X`
//! and an ack'd write mux.

use crate::decoder::LeafEmit;
use crate::error::SynthesisError;
use crate::ir::{Expr, Process, Stmt};
use crate::tree::Root;

/// The bus-facing signal names a mux process is wired to: the same handful
/// of handshake signal names carried across every generated process.
#[derive(Debug, Clone)]
pub struct Ibus {
    /// Address input signal name.
    pub addr: String,
    /// Read-data output signal name.
    pub rd_dat: String,
    /// Write-data input signal name.
    pub wr_dat: String,
    /// Cycle-valid input signal name.
    pub cyc: String,
    /// Acknowledge output signal name.
    pub ack: String,
}

impl Default for Ibus {
    fn default() -> Self {
        Self {
            addr: "wb_adr_i".to_string(),
            rd_dat: "wb_dat_o".to_string(),
            wr_dat: "wb_dat_i".to_string(),
            cyc: "wb_cyc_i".to_string(),
            ack: "wb_ack_o".to_string(),
        }
    }
}

/// Build the combinational read-mux process: default all-`X` on `rd_dat`,
/// then the decoder switch tree overrides it per address.
///
/// # Errors
/// Returns [`SynthesisError`] propagated from decoder synthesis.
pub fn add_read_mux_process(
    root: &Root,
    bus: &Ibus,
    emit: &mut dyn LeafEmit,
) -> Result<Process, SynthesisError> {
    let switch_body = crate::decoder::add_decoder(root, emit)?;
    let mut body = vec![Stmt::Assign {
        target: Expr::signal(&bus.rd_dat),
        value: Expr::DontCare(root.word_bits()),
    }];
    body.extend(switch_body);
    Ok(Process {
        name: "rd_mux".to_string(),
        clocked: false,
        sensitivity: vec![bus.addr.clone()],
        body,
    })
}

/// Build the combinational write-mux process: the decoder switch tree
/// drives `wr_dat` into the selected leaf, and its own default (unmapped)
/// branch is what drives `ack` when nothing was selected — build `emit`
/// with [`crate::generator::DispatchingEmit::write`] to get that ack
/// statement for free. There is no separate ack preamble here; unlike the
/// read mux's all-`X` default, ack has nowhere sensible to default to
/// before the switch commits to a branch.
///
/// # Errors
/// Returns [`SynthesisError`] propagated from decoder synthesis.
pub fn add_write_mux_process(
    root: &Root,
    bus: &Ibus,
    emit: &mut dyn LeafEmit,
) -> Result<Process, SynthesisError> {
    let body = crate::decoder::add_decoder(root, emit)?;
    Ok(Process {
        name: "wr_mux".to_string(),
        clocked: false,
        sensitivity: vec![bus.addr.clone(), bus.wr_dat.clone(), bus.cyc.clone()],
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DispatchingEmit;
    use crate::layout::layout;
    use crate::tree::{Access, Register};

    #[test]
    fn read_mux_defaults_to_dont_care_before_the_switch() {
        let mut root = Root::new("wb-32-be");
        root.children.push(Register::new("a", 32, Access::Rw).into());
        layout(&mut root).unwrap();
        let mut emit = DispatchingEmit::read();
        let process = add_read_mux_process(&root, &Ibus::default(), &mut emit).unwrap();
        assert!(matches!(
            process.body.first(),
            Some(Stmt::Assign {
                value: Expr::DontCare(_),
                ..
            })
        ));
    }

    #[test]
    fn write_mux_drives_ack_from_the_decoders_default_branch() {
        let mut root = Root::new("wb-32-be");
        root.children.push(Register::new("a", 32, Access::Rw).into());
        root.children.push(Register::new("b", 32, Access::Rw).into());
        layout(&mut root).unwrap();
        let bus = Ibus::default();
        let mut emit = DispatchingEmit::write(&bus.ack, &bus.cyc);
        let process = add_write_mux_process(&root, &bus, &mut emit).unwrap();

        let Some(Stmt::Switch(switch)) = process.body.first() else {
            panic!("expected the decoder switch as the sole write-mux statement");
        };
        let default = switch.choices.last().expect("switch has a default arm");
        assert!(default.value.is_none());
        assert!(matches!(
            default.body.as_slice(),
            [Stmt::Assign {
                target: Expr::Signal(t),
                value: Expr::Signal(v),
            }] if t == &bus.ack && v == &bus.cyc
        ));
    }
}
