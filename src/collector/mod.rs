// src/collector/mod.rs
pub mod codec;
pub mod handler;
pub mod server;

pub use codec::{CdrLineCodec, Frame};
pub use handler::{ConnectionHandler, ConnectionStats, Disconnect, LineOutcome};
pub use server::{shutdown_signal, CdrServer};
