//! Waiting list for admitted work items.
//!
//! Admission control and fair ordering over concurrent submitters.
//! Every operation runs under one lock, so callers observe them as if
//! executed one at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 WaitingList                  │
//! │  items (admission order, non-terminal only)  │
//! │  ┌──────┐ ┌──────┐ ┌───────┐ ┌───────┐       │
//! │  │ A act│ │ B pnd│ │ C pnd │ │ D pnd │ ...   │
//! │  └──────┘ └──────┘ └───────┘ └───────┘       │
//! │  history (recent terminal items, bounded)    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Status changes are explicit: [`dequeue_next`](WaitingList::dequeue_next)
//! only peeks, [`mark_active`](WaitingList::mark_active) claims, and
//! [`mark_terminal`](WaitingList::mark_terminal) finishes. A claimer that
//! dies between peek and claim leaves the item pending.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::{DeviceId, ItemId, SubmitterId};

use super::item::{FailureReason, ItemStatus, Outcome, WorkItem};

// ============================================================================
// Constants
// ============================================================================

/// Terminal items kept for inspection.
const HISTORY_LIMIT: usize = 100;

/// Buffered queue events per subscriber.
const EVENT_CAPACITY: usize = 256;

// ============================================================================
// QueueResult
// ============================================================================

/// Result of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum QueueResult {
    /// Admitted at the given 1-based position.
    Success { position: usize },
    /// Pending count is at capacity.
    QueueFull,
    /// Submitter already has a non-terminal item.
    AlreadyQueued,
    /// Admission is switched off.
    QueueClosed,
}

impl QueueResult {
    /// Returns `true` if the item was admitted.
    #[inline]
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ============================================================================
// Events
// ============================================================================

/// Terminal notification, fired exactly once per item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionNotice {
    pub item_id: ItemId,
    pub submitter: SubmitterId,
    pub submitter_name: String,
    pub payload_name: Option<String>,
    pub status: ItemStatus,
    pub success: bool,
    pub reason: Option<FailureReason>,
}

/// Waiting-list notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// An item was admitted.
    Admitted {
        item_id: ItemId,
        submitter: SubmitterId,
        position: usize,
    },
    /// A device claimed an item.
    Started {
        item_id: ItemId,
        submitter: SubmitterId,
        device: DeviceId,
    },
    /// An item reached a terminal status.
    Completed(CompletionNotice),
}

// ============================================================================
// WaitingList
// ============================================================================

/// Shared state behind the lock.
struct Inner {
    /// Non-terminal items in admission order.
    items: VecDeque<WorkItem>,
    /// Recently finished items, oldest first.
    history: VecDeque<WorkItem>,
    /// Maximum number of pending items.
    capacity: usize,
    /// Whether new items are admitted.
    open: bool,
}

impl Inner {
    fn pending(&self) -> impl Iterator<Item = &WorkItem> {
        self.items
            .iter()
            .filter(|item| item.status == ItemStatus::Pending)
    }

    fn position_of(&self, submitter: SubmitterId) -> usize {
        self.pending()
            .position(|item| item.submitter == submitter)
            .map_or(0, |index| index + 1)
    }

    fn index_of(&self, item_id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == item_id)
    }

    /// Moves the item at `index` to history with its terminal status.
    fn finish(&mut self, index: usize, status: ItemStatus) -> Option<WorkItem> {
        let mut item = self.items.remove(index)?;
        item.status = status;
        item.finished_at = Some(Utc::now());

        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(item.clone());

        Some(item)
    }
}

/// Ordered, capacity-bounded collection of work items.
///
/// Thread-safe; share it behind an `Arc`.
pub struct WaitingList {
    inner: Mutex<Inner>,
    events: broadcast::Sender<QueueEvent>,
}

impl WaitingList {
    /// Creates an open, empty list.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                history: VecDeque::new(),
                capacity,
                open: true,
            }),
            events,
        }
    }

    /// Subscribes to queue events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Admits an item at the back of the list.
    ///
    /// Duplicates are refused before capacity is checked, so a submitter
    /// who is already queued hears `AlreadyQueued` even when full.
    pub fn enqueue(&self, mut item: WorkItem) -> QueueResult {
        let mut inner = self.inner.lock();

        if !inner.open {
            return QueueResult::QueueClosed;
        }

        if inner.items.iter().any(|i| i.submitter == item.submitter) {
            debug!(submitter = %item.submitter, "Submitter already queued");
            return QueueResult::AlreadyQueued;
        }

        if inner.pending().count() >= inner.capacity {
            debug!(submitter = %item.submitter, capacity = inner.capacity, "Queue full");
            return QueueResult::QueueFull;
        }

        item.status = ItemStatus::Pending;
        item.enqueued_at = Utc::now();
        item.started_at = None;
        item.finished_at = None;
        item.device = None;

        let item_id = item.id;
        let submitter = item.submitter;
        inner.items.push_back(item);
        let position = inner.position_of(submitter);

        info!(%submitter, %item_id, position, "Item admitted");
        self.emit(QueueEvent::Admitted {
            item_id,
            submitter,
            position,
        });

        QueueResult::Success { position }
    }

    /// Returns the earliest-admitted pending item without claiming it.
    #[must_use]
    pub fn dequeue_next(&self) -> Option<WorkItem> {
        self.inner.lock().pending().next().cloned()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Claims a pending item for `device`.
    ///
    /// # Errors
    ///
    /// - [`Error::ItemNotFound`] if the item is unknown or already gone
    /// - [`Error::InvalidTransition`] if it is no longer pending
    pub fn mark_active(&self, item_id: ItemId, device: DeviceId) -> Result<WorkItem> {
        let mut inner = self.inner.lock();

        let index = match inner.index_of(item_id) {
            Some(index) => index,
            None => return Err(Self::missing(&inner, item_id, ItemStatus::Active)),
        };

        let item = &mut inner.items[index];
        if item.status != ItemStatus::Pending {
            return Err(Error::invalid_transition(
                item_id,
                item.status,
                ItemStatus::Active,
            ));
        }

        item.status = ItemStatus::Active;
        item.started_at = Some(Utc::now());
        item.device = Some(device);
        let claimed = item.clone();

        debug!(%item_id, %device, submitter = %claimed.submitter, "Item active");
        self.emit(QueueEvent::Started {
            item_id,
            submitter: claimed.submitter,
            device,
        });

        Ok(claimed)
    }

    /// Records the outcome of an active item and notifies subscribers.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] if the item is not active,
    ///   including when it was already finished
    /// - [`Error::ItemNotFound`] if the item was never admitted
    pub fn mark_terminal(&self, item_id: ItemId, outcome: &Outcome) -> Result<WorkItem> {
        if !outcome.status.is_terminal() {
            return Err(Error::invalid_argument(format!(
                "{} is not a terminal status",
                outcome.status
            )));
        }

        let mut inner = self.inner.lock();

        let index = match inner.index_of(item_id) {
            Some(index) => index,
            None => return Err(Self::missing(&inner, item_id, outcome.status)),
        };

        let current = inner.items[index].status;
        if current != ItemStatus::Active {
            return Err(Error::invalid_transition(item_id, current, outcome.status));
        }

        let finished = inner
            .finish(index, outcome.status)
            .ok_or_else(|| Error::item_not_found(item_id))?;

        info!(
            %item_id,
            submitter = %finished.submitter,
            status = %finished.status,
            reason = ?outcome.reason,
            "Item finished"
        );
        self.emit(QueueEvent::Completed(Self::notice(&finished, outcome.reason)));

        Ok(finished)
    }

    /// Cancels the submitter's pending item.
    ///
    /// Returns `false` if the submitter has nothing pending; an active
    /// item is left alone.
    pub fn remove(&self, submitter: SubmitterId) -> bool {
        let mut inner = self.inner.lock();

        let Some(index) = inner
            .items
            .iter()
            .position(|i| i.submitter == submitter && i.status == ItemStatus::Pending)
        else {
            return false;
        };

        let Some(cancelled) = inner.finish(index, ItemStatus::Cancelled) else {
            return false;
        };

        info!(%submitter, item_id = %cancelled.id, "Pending item cancelled");
        self.emit(QueueEvent::Completed(Self::notice(&cancelled, None)));

        true
    }

    /// Cancels every pending item. Returns how many were cancelled.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut cancelled = Vec::new();

        while let Some(index) = inner
            .items
            .iter()
            .position(|i| i.status == ItemStatus::Pending)
        {
            if let Some(item) = inner.finish(index, ItemStatus::Cancelled) {
                cancelled.push(item);
            }
        }

        for item in &cancelled {
            self.emit(QueueEvent::Completed(Self::notice(item, None)));
        }

        info!(count = cancelled.len(), "Waiting list cleared");
        cancelled.len()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// 1-based rank among pending items, or 0 if none pending.
    #[must_use]
    pub fn position(&self, submitter: SubmitterId) -> usize {
        self.inner.lock().position_of(submitter)
    }

    /// The submitter's non-terminal item, if any.
    #[must_use]
    pub fn get(&self, submitter: SubmitterId) -> Option<WorkItem> {
        self.inner
            .lock()
            .items
            .iter()
            .find(|i| i.submitter == submitter)
            .cloned()
    }

    /// Number of pending items.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending().count()
    }

    /// Number of active items.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner
            .lock()
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Active)
            .count()
    }

    /// Non-terminal items in admission order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WorkItem> {
        self.inner.lock().items.iter().cloned().collect()
    }

    /// Recently finished items, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<WorkItem> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Maximum number of pending items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Returns `true` if new items are admitted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Opens or closes admission. Queued items are unaffected.
    pub fn set_open(&self, open: bool) {
        self.inner.lock().open = open;
        info!(open, "Waiting list admission toggled");
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn notice(item: &WorkItem, reason: Option<FailureReason>) -> CompletionNotice {
        CompletionNotice {
            item_id: item.id,
            submitter: item.submitter,
            submitter_name: item.submitter_name.clone(),
            payload_name: item.payload_name().map(str::to_owned),
            status: item.status,
            success: item.status == ItemStatus::Completed,
            reason,
        }
    }

    /// Error for an ID not among live items.
    fn missing(inner: &Inner, item_id: ItemId, to: ItemStatus) -> Error {
        match inner.history.iter().find(|i| i.id == item_id) {
            Some(done) => Error::invalid_transition(item_id, done.status, to),
            None => Error::item_not_found(item_id),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
