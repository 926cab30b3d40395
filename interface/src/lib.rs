use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Register {
    pub name: String,
    pub spr: u16,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registers {
    pub registers: Vec<Register>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum Update {
    Registers(Registers),
    Status(String),
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Re-read interval in milliseconds. Zero disables polling.
    UpdateInterval(usize),
    Read,
    Write(Vec<Register>),
}
