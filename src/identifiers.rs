//! Type-safe identifiers for pool entities.
//!
//! Newtype wrappers keep submitter keys, device handles and work-item IDs
//! from being mixed up at compile time.
//!
//! | Type | Inner | Source |
//! |------|-------|--------|
//! | [`SubmitterId`] | `u64` | Supplied by the front-end (chat user ID) |
//! | [`DeviceId`] | `u32` | Allocated by the pool, never reused |
//! | [`ItemId`] | `Uuid` | Allocated on admission |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// SubmitterId
// ============================================================================

/// Stable identity of whoever submitted a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmitterId(u64);

impl SubmitterId {
    /// Wraps a raw submitter key.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw key.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for SubmitterId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// DeviceId
// ============================================================================

/// Counter for device IDs. Starts at 1 so 0 never names a device.
static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(1);

/// Handle for one registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u32);

impl DeviceId {
    /// Allocates the next unused device ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a device ID from a raw value.
    ///
    /// Returns `None` for 0.
    #[inline]
    #[must_use]
    pub const fn from_u32(id: u32) -> Option<Self> {
        if id == 0 { None } else { Some(Self(id)) }
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev-{}", self.0)
    }
}

// ============================================================================
// ItemId
// ============================================================================

/// Unique identifier of one admitted work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generates a fresh random item ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ids_are_unique() {
        let a = DeviceId::next();
        let b = DeviceId::next();
        assert_ne!(a, b);
        assert!(b.as_u32() > a.as_u32());
    }

    #[test]
    fn test_device_id_rejects_zero() {
        assert!(DeviceId::from_u32(0).is_none());
        assert_eq!(DeviceId::from_u32(7).map(DeviceId::as_u32), Some(7));
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(SubmitterId::new(42).to_string(), "42");
        assert_eq!(DeviceId::from_u32(3).unwrap().to_string(), "dev-3");
    }

    #[test]
    fn test_submitter_serializes_transparently() {
        let json = serde_json::to_string(&SubmitterId::new(9)).unwrap();
        assert_eq!(json, "9");
    }

    #[test]
    fn test_item_ids_differ() {
        assert_ne!(ItemId::generate(), ItemId::generate());
    }
}
