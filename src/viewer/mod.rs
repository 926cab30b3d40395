//! Publishes the register cache to remote viewers over a websocket.

mod updater;

use anyhow::Result;
use interface::{Command, Register, Registers, Update};
use register_view::DebugRegister;

use updater::{Updater, UpdaterChannel, WebsocketUpdater};

pub struct Viewer {
    updater: WebsocketUpdater,
    channel: UpdaterChannel<Command, Update>,
}

impl Viewer {
    pub fn start(address: &str) -> Result<Self> {
        let mut updater = WebsocketUpdater::new(address);
        let channel = updater.start()?;
        Ok(Self { updater, channel })
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.updater.local_addr()
    }

    /// Returns the next command sent by a viewer, if any.
    pub fn next_command(&mut self) -> Option<Command> {
        self.channel.rx().try_recv().ok()
    }

    pub fn publish(&mut self, snapshot: &[(DebugRegister, u32)]) {
        let _ = self
            .channel
            .tx()
            .send(Update::Registers(to_registers(snapshot)));
    }

    pub fn status(&mut self, message: impl Into<String>) {
        let _ = self.channel.tx().send(Update::Status(message.into()));
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if let Err(error) = self.updater.stop() {
            log::error!("Stopping the viewer websocket failed: {}", error);
        }
    }
}

pub fn to_registers(snapshot: &[(DebugRegister, u32)]) -> Registers {
    Registers {
        registers: snapshot
            .iter()
            .map(|(register, value)| Register {
                name: register.name(),
                spr: register.spr(),
                value: *value,
            })
            .collect(),
    }
}

/// Maps registers received from a viewer onto the debug unit. Unknown SPRs are skipped.
pub fn from_registers(registers: Vec<Register>) -> Vec<(DebugRegister, u32)> {
    registers
        .into_iter()
        .filter_map(|register| match DebugRegister::from_spr(register.spr) {
            Some(debug_register) => Some((debug_register, register.value)),
            None => {
                log::warn!(
                    "Ignoring {} ({:#06x}), it is not a debug unit register",
                    register.name,
                    register.spr
                );
                None
            }
        })
        .collect()
}
