//! Keeps the editors of the OR1200 debug unit registers in sync with a shared register cache.
//!
//! Every widget that shows or edits register values implements [`RegisterObserver`]. The
//! [`RegisterManager`] owns the [`RegisterCache`] and the connection to the target and tells its
//! observers when to push their values into the cache or pull fresh ones out of it.

mod cache;
mod error;
mod field;
mod manager;
mod panel;
pub mod register;
mod target;

pub use cache::RegisterCache;
pub use error::{InvalidFormat, SyncError};
pub use field::{CheckBox, ComboBox, Label, Radix, TextField};
pub use manager::{ObserverId, RegisterManager, SharedObserver};
pub use panel::{CounterPanel, Panel, StatusPanel, WatchpointPanel};
pub use register::{BitRange, DebugRegister};
pub use target::{DebugTarget, MemoryTarget};

/// Which way values flow during a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDirection {
    /// Push the values held by the widget into the cache, ahead of a write to the target.
    GuiToRegisters,
    /// The cache was refreshed, pull the new values into the widget.
    RegistersToGui,
}

/// Implemented by every component that displays or edits register values.
pub trait RegisterObserver {
    /// Synchronises the component with `cache` in the given direction.
    ///
    /// On [`UpdateDirection::GuiToRegisters`] the held values are validated and written into
    /// the cache. A value that does not parse fails with [`InvalidFormat`] and leaves the cache
    /// untouched. [`UpdateDirection::RegistersToGui`] never fails.
    fn notify_register_update(
        &mut self,
        direction: UpdateDirection,
        cache: &mut RegisterCache,
    ) -> Result<(), InvalidFormat>;
}

/// A key press routed to the focused control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Char(char),
    Backspace,
    /// Flip a checkbox or advance a selection.
    Toggle,
}

/// A single editable row of a panel.
pub trait Control: RegisterObserver {
    fn label(&self) -> &str;

    /// Text shown for the current GUI-held state.
    fn display(&self) -> String;

    fn input(&mut self, input: Input);

    fn is_read_only(&self) -> bool {
        false
    }
}
