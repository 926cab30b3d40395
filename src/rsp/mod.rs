mod client;
mod framing;

pub use client::RspClient;
