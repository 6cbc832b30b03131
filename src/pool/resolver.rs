//! Payload resolution.
//!
//! The pool treats payloads as opaque blocks. A [`PayloadResolver`] turns
//! the [`PayloadRef`] a submitter supplied into the bytes a driver injects.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::driver::Title;
use crate::error::{Error, Result};
use crate::queue::PayloadRef;

// ============================================================================
// PayloadResolver
// ============================================================================

/// Produces the payload block for a work item.
#[async_trait]
pub trait PayloadResolver: Send + Sync {
    /// Resolves `payload` for a device running `title`.
    ///
    /// # Errors
    ///
    /// Any error fails the item with
    /// [`FailureReason::PayloadUnavailable`](crate::queue::FailureReason::PayloadUnavailable).
    async fn resolve(&self, payload: &PayloadRef, title: Title) -> Result<Vec<u8>>;
}

// ============================================================================
// HexResolver
// ============================================================================

/// Reads the descriptor as a hex-encoded block.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexResolver;

#[async_trait]
impl PayloadResolver for HexResolver {
    async fn resolve(&self, payload: &PayloadRef, _title: Title) -> Result<Vec<u8>> {
        let descriptor: String = payload
            .descriptor
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        hex::decode(&descriptor).map_err(|e| {
            Error::resolver(format!("'{}' is not a hex block: {e}", payload.display_name))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hex_descriptor_decodes() {
        let payload = PayloadRef::new("Ditto", "DE AD be ef");
        let bytes = HexResolver.resolve(&payload, Title::LetsGo).await.unwrap();
        assert_eq!(bytes, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[tokio::test]
    async fn test_bad_descriptor_is_resolver_error() {
        let payload = PayloadRef::new("Ditto", "xyz");
        let err = HexResolver.resolve(&payload, Title::LetsGo).await.unwrap_err();
        assert!(matches!(err, Error::Resolver { .. }));
        assert!(err.to_string().contains("Ditto"));
    }
}
