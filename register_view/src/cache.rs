use std::collections::BTreeMap;

use crate::register::{BitRange, DebugRegister};

/// The last known values of the debug unit registers.
///
/// Next to the current values the cache remembers what was last read from or written to the
/// target, so only modified registers have to be written back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterCache {
    values: BTreeMap<DebugRegister, u32>,
    synced: BTreeMap<DebugRegister, u32>,
}

impl RegisterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers which were never loaded read as zero.
    pub fn get(&self, register: DebugRegister) -> u32 {
        self.values.get(&register).copied().unwrap_or(0)
    }

    pub fn set(&mut self, register: DebugRegister, value: u32) {
        self.values.insert(register, value);
    }

    pub fn field(&self, register: DebugRegister, range: BitRange) -> u32 {
        range.extract(self.get(register))
    }

    pub fn set_field(&mut self, register: DebugRegister, range: BitRange, value: u32) {
        let word = range.insert(self.get(register), value);
        self.set(register, word);
    }

    /// Replaces all values with freshly read ones and marks the cache clean.
    pub fn load(&mut self, values: impl IntoIterator<Item = (DebugRegister, u32)>) {
        self.values = values.into_iter().collect();
        self.synced = self.values.clone();
    }

    /// Registers whose value differs from the last synchronisation with the target.
    pub fn dirty(&self) -> Vec<(DebugRegister, u32)> {
        self.values
            .iter()
            .filter(|(register, value)| self.synced.get(register) != Some(value))
            .map(|(register, value)| (*register, *value))
            .collect()
    }

    pub fn mark_clean(&mut self) {
        self.synced = self.values.clone();
    }

    pub fn mark_register_clean(&mut self, register: DebugRegister) {
        self.synced.insert(register, self.get(register));
    }

    pub fn iter(&self) -> impl Iterator<Item = (DebugRegister, u32)> + '_ {
        self.values.iter().map(|(register, value)| (*register, *value))
    }
}
