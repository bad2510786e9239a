// src/models/mod.rs
pub mod cdr;

pub use cdr::ParsedCdr;
