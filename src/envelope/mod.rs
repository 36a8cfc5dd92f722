//! Response Envelope - the success/error/timing wrapper both relay hops speak
//!
//! This module provides:
//! - The envelope wire type and its builders
//! - The shared error taxonomy

mod codes;
mod response;

pub use codes::{ErrorKey, ErrorKind};
pub use response::{Envelope, EnvelopeError, elapsed_ms, panic_message, timestamp_now};
