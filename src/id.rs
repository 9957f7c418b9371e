//! ID generation utilities for Sandloop
//!
//! Provides functions for generating unique identifiers for runs, sandboxes,
//! messages, and fragments.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn prefixed_id(prefix: &str) -> String {
    let random: u64 = rand::rng().random();
    format!("{}-{}-{:016x}", prefix, now_ms(), random)
}

/// Generate a run ID
///
/// Format: `run-{timestamp_ms}-{random_hex}`
/// Example: `run-1738300800123-9f3c2a71b04de658`
pub fn generate_run_id() -> String {
    prefixed_id("run")
}

/// Generate a sandbox ID
///
/// Format: `sbx-{timestamp_ms}-{random_hex}`
pub fn generate_sandbox_id() -> String {
    prefixed_id("sbx")
}

/// Generate a message ID
pub fn generate_message_id() -> String {
    prefixed_id("msg")
}

/// Generate a fragment ID
pub fn generate_fragment_id() -> String {
    prefixed_id("frg")
}

/// Generate a conversation ID
pub fn generate_conversation_id() -> String {
    prefixed_id("conv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        // Should be after 2020-01-01 and before 2100-01-01
        assert!(ts > 1577836800000);
        assert!(ts < 4102444800000);
    }

    #[test]
    fn test_generate_run_id_format() {
        let id = generate_run_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "run");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 16);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_sandbox_id_prefix() {
        assert!(generate_sandbox_id().starts_with("sbx-"));
        assert!(generate_message_id().starts_with("msg-"));
        assert!(generate_fragment_id().starts_with("frg-"));
        assert!(generate_conversation_id().starts_with("conv-"));
    }

    #[test]
    fn test_ids_unique_within_a_millisecond() {
        let ids: std::collections::HashSet<String> = (0..10_000).map(|_| generate_message_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }
}
