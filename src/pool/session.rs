//! Registered devices and their status snapshots.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::driver::{DeviceDriver, DriverState, Title};
use crate::identifiers::{DeviceId, ItemId, SubmitterId};
use crate::queue::{ItemStatus, Outcome, WorkItem};

// ============================================================================
// Activity
// ============================================================================

/// Counters and the item in flight.
#[derive(Debug, Default)]
struct Activity {
    current: Option<WorkItem>,
    completed: u64,
    failed: u64,
    cancelled: u64,
    last_activity: Option<DateTime<Utc>>,
}

// ============================================================================
// DeviceSession
// ============================================================================

/// One registered device: its driver, loop task and counters.
pub(crate) struct DeviceSession {
    pub(crate) driver: Arc<DeviceDriver>,
    /// Stops the device loop and any execution in flight.
    pub(crate) stop: CancellationToken,
    pub(crate) task: Mutex<Option<JoinHandle<()>>>,
    activity: Mutex<Activity>,
}

impl DeviceSession {
    pub(crate) fn new(driver: Arc<DeviceDriver>, stop: CancellationToken) -> Self {
        Self {
            driver,
            stop,
            task: Mutex::new(None),
            activity: Mutex::new(Activity::default()),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> DeviceId {
        self.driver.id()
    }

    /// Records that `item` was claimed.
    pub(crate) fn begin(&self, item: &WorkItem) {
        let mut activity = self.activity.lock();
        activity.current = Some(item.clone());
        activity.last_activity = Some(Utc::now());
    }

    /// Records the outcome of the item in flight.
    pub(crate) fn finish(&self, outcome: &Outcome) {
        let mut activity = self.activity.lock();
        activity.current = None;
        activity.last_activity = Some(Utc::now());
        match outcome.status {
            ItemStatus::Completed => activity.completed += 1,
            ItemStatus::Failed => activity.failed += 1,
            ItemStatus::Cancelled => activity.cancelled += 1,
            ItemStatus::Pending | ItemStatus::Active => {}
        }
    }

    /// Point-in-time status.
    pub(crate) fn status(&self) -> DeviceStatus {
        let activity = self.activity.lock();
        let current = activity.current.as_ref();

        DeviceStatus {
            id: self.driver.id(),
            name: self.driver.name().to_owned(),
            title: self.driver.title(),
            connected: self.driver.link().is_connected(),
            busy: current.is_some(),
            state: self.driver.state(),
            completed: activity.completed,
            failed: activity.failed,
            cancelled: activity.cancelled,
            last_activity: activity.last_activity,
            current_item: current.map(|item| item.id),
            current_submitter: current.map(|item| item.submitter),
            current_submitter_name: current.map(|item| item.submitter_name.clone()),
        }
    }
}

// ============================================================================
// Status Snapshots
// ============================================================================

/// Status of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub id: DeviceId,
    pub name: String,
    pub title: Title,
    pub connected: bool,
    pub busy: bool,
    pub state: DriverState,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub last_activity: Option<DateTime<Utc>>,
    pub current_item: Option<ItemId>,
    pub current_submitter: Option<SubmitterId>,
    pub current_submitter_name: Option<String>,
}

/// Status of the whole pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub paused: bool,
    pub queue_open: bool,
    pub capacity: usize,
    pub pending: usize,
    pub active: usize,
    pub devices: Vec<DeviceStatus>,
}

// ============================================================================
// Tests
// ============================================================================
