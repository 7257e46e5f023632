//! Support code for the `asnmp-agent` binary.
//!
//! Only available with the `cli` feature.

pub mod args;
pub mod system;
