mod app;
mod event;

pub use app::{App, State};
