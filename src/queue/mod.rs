//! Work items and the waiting list.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WorkItem`] | One admitted request |
//! | [`WaitingList`] | Capacity-bounded FIFO keyed by submitter |
//! | [`QueueResult`] | Admission answer |
//! | [`QueueEvent`] | Admission, start and completion notifications |
//! | [`Outcome`] | Terminal result reported by a driver |

// ============================================================================
// Submodules
// ============================================================================

/// Work item model.
pub mod item;

/// Waiting list.
pub mod waiting_list;

// ============================================================================
// Re-exports
// ============================================================================

pub use item::{
    FailureReason, ItemStatus, OperationKind, Outcome, PayloadRef, TradeCode, WorkItem,
};
pub use waiting_list::{CompletionNotice, QueueEvent, QueueResult, WaitingList};
