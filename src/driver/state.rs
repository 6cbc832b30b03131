//! Driver states and progress reports.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use tokio::time::Instant;

use crate::identifiers::{DeviceId, ItemId, SubmitterId};

// ============================================================================
// DriverState
// ============================================================================

/// Step of the trade sequence a driver is in.
///
/// ```text
/// Idle → Navigating → AwaitingPartner → Injecting → Confirming
///      → AwaitingCompletion → Succeeded
///
/// any in-progress state ──(timeout / error)──→ Recovering → Failed
/// any in-progress state ──(cancel)──→ Recovering → Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    #[default]
    Idle,
    Navigating,
    AwaitingPartner,
    Injecting,
    Confirming,
    AwaitingCompletion,
    Recovering,
    Succeeded,
    Failed,
    Cancelled,
}

impl DriverState {
    /// Returns `true` while an item is being driven.
    #[inline]
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        !matches!(
            self,
            Self::Idle | Self::Succeeded | Self::Failed | Self::Cancelled
        )
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Navigating => "navigating",
            Self::AwaitingPartner => "awaiting partner",
            Self::Injecting => "injecting",
            Self::Confirming => "confirming",
            Self::AwaitingCompletion => "awaiting completion",
            Self::Recovering => "recovering",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Progress
// ============================================================================

/// One step announcement from a driver.
#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub device: DeviceId,
    pub item_id: ItemId,
    pub submitter: SubmitterId,
    pub state: DriverState,
    /// Human-readable description of the step.
    pub message: String,
    /// When the step began.
    #[serde(skip)]
    pub at: Instant,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress_states() {
        assert!(!DriverState::Idle.is_in_progress());
        assert!(DriverState::AwaitingPartner.is_in_progress());
        assert!(DriverState::Recovering.is_in_progress());
        assert!(!DriverState::Failed.is_in_progress());
        assert!(!DriverState::Cancelled.is_in_progress());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&DriverState::AwaitingCompletion).unwrap();
        assert_eq!(json, "\"awaiting_completion\"");
    }
}
