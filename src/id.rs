//! ID generation utilities
//!
//! Correlation ids thread one logical request through both relay hops.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a correlation id for a tool call or relay request
///
/// Format: `req-{timestamp_ms}-{random_hex}`
/// Example: `req-1738300800123-a1b2c3d4`
pub fn generate_request_id() -> String {
    let timestamp = now_ms();
    let random: u32 = rand::rng().random();
    format!("req-{}-{:08x}", timestamp, random)
}

/// Derive a fresh id from one that is already in flight
///
/// Format: `{base}-{random_hex}`
pub fn derive_request_id(base: &str) -> String {
    let random: u16 = rand::rng().random();
    format!("{}-{:04x}", base, random)
}
