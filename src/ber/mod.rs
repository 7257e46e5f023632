//! BER (Basic Encoding Rules) codec primitives for SNMP.
//!
//! Encoding writes into a reverse buffer so lengths never need to be computed
//! up front. Decoding is permissive in the same places net-snmp is (non-minimal
//! integers and lengths are accepted) and strict everywhere a malformed packet
//! could make the agent misread a request.

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::*;
pub use encode::*;
pub use length::*;
