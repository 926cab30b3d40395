use thiserror::Error;

/// A GUI-held value could not be converted into the value of its register field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value {input:?} for {field}: {reason}")]
pub struct InvalidFormat {
    pub field: String,
    pub input: String,
    pub reason: String,
}

impl InvalidFormat {
    pub fn new(field: impl Into<String>, input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Errors of a register synchronisation between GUI, cache and target.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Format(#[from] InvalidFormat),
    #[error("Accessing the debug unit failed")]
    Target(#[source] anyhow::Error),
}
