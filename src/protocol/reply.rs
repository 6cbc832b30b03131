//! Reply line decoding.
//!
//! Memory reads answer with one line of hex digits, two per byte, no
//! separators. Anything else decodes to an empty block: callers treat
//! empty as "no data yet", never as failure.

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

// ============================================================================
// Decoding
// ============================================================================

/// Decodes a hex reply line into bytes.
///
/// Surrounding whitespace and an optional `0x` prefix are ignored.
/// Empty, odd-length or non-hex input yields an empty vector.
#[must_use]
pub fn decode_hex_reply(line: &str) -> Vec<u8> {
    let trimmed = line.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() {
        return Vec::new();
    }

    match hex::decode(digits) {
        Ok(bytes) => bytes,
        Err(e) => {
            trace!(error = %e, len = digits.len(), "Unparsable reply treated as empty");
            Vec::new()
        }
    }
}

/// Normalizes a title ID reply (`0100ABF008968000`) for comparison.
#[must_use]
pub fn normalize_title_id(line: &str) -> String {
    line.trim().trim_start_matches("0x").to_ascii_uppercase()
}

// ============================================================================
// Tests
// ============================================================================
