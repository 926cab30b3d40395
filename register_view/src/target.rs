use std::collections::HashMap;

use anyhow::{anyhow, Result};

/// Access to the special purpose registers of a debugged core.
pub trait DebugTarget {
    fn read_spr(&mut self, spr: u16) -> Result<u32>;

    fn write_spr(&mut self, spr: u16, value: u32) -> Result<()>;
}

/// A target which keeps its registers in memory.
///
/// Used when no hardware is attached. Registers which were never written read as zero.
#[derive(Debug, Default, Clone)]
pub struct MemoryTarget {
    registers: HashMap<u16, u32>,
    /// SPRs whose access fails, to mimic a misbehaving stub.
    faulty: Vec<u16>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault(mut self, spr: u16) -> Self {
        self.faulty.push(spr);
        self
    }

    pub fn get(&self, spr: u16) -> u32 {
        self.registers.get(&spr).copied().unwrap_or(0)
    }

    fn check(&self, spr: u16) -> Result<()> {
        if self.faulty.contains(&spr) {
            return Err(anyhow!("Access to SPR {:#06x} failed", spr));
        }
        Ok(())
    }
}

impl DebugTarget for MemoryTarget {
    fn read_spr(&mut self, spr: u16) -> Result<u32> {
        self.check(spr)?;
        Ok(self.get(spr))
    }

    fn write_spr(&mut self, spr: u16, value: u32) -> Result<()> {
        self.check(spr)?;
        log::debug!("SPR {:#06x} <- {:#010x}", spr, value);
        self.registers.insert(spr, value);
        Ok(())
    }
}

impl<T: DebugTarget + ?Sized> DebugTarget for Box<T> {
    fn read_spr(&mut self, spr: u16) -> Result<u32> {
        (**self).read_spr(spr)
    }

    fn write_spr(&mut self, spr: u16, value: u32) -> Result<()> {
        (**self).write_spr(spr, value)
    }
}
