//! Pool scheduler.
//!
//! The [`Pool`] owns the waiting list and one [`DeviceDriver`] per
//! registered device. Each device runs its own loop task:
//!
//! ```text
//! ┌──────────── device loop ────────────┐
//! │ paused or disconnected? → backoff   │
//! │ dequeue_next → none?    → backoff   │
//! │ mark_active  → lost race → retry    │
//! │ resolve payload, execute            │
//! │ mark_terminal, update counters      │
//! │ settle                              │
//! └─────────────────────────────────────┘
//! ```
//!
//! Whichever idle device reaches the list first serves the next item.
//!
//! # Example
//!
//! ```no_run
//! use console_trade_pool::{DeviceConfig, PayloadRef, Pool, SubmitterId, Title, TradeCode};
//!
//! # async fn example() -> console_trade_pool::Result<()> {
//! let pool = Pool::builder().capacity(20).build()?;
//! pool.add_device(DeviceConfig::new("left", "192.168.0.20", Title::SwordShield))
//!     .await?;
//!
//! let result = pool.submit(
//!     SubmitterId::new(42),
//!     "ash",
//!     PayloadRef::new("Pikachu", "..."),
//!     TradeCode::new(1234_5678),
//! );
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{DeviceConfig, PoolConfig, QueueConfig, Timing};
use crate::driver::{DeviceDriver, OffsetTable, Progress, Title};
use crate::error::{Error, Result};
use crate::identifiers::{DeviceId, SubmitterId};
use crate::queue::{
    FailureReason, OperationKind, Outcome, PayloadRef, QueueEvent, QueueResult, TradeCode,
    WaitingList, WorkItem,
};
use crate::transport::{Link, LinkClient};

use super::builder::PoolBuilder;
use super::resolver::PayloadResolver;
use super::session::{DeviceSession, DeviceStatus, PoolStatus};

// ============================================================================
// Constants
// ============================================================================

/// Buffered progress reports per subscriber, across all devices.
const PROGRESS_CAPACITY: usize = 256;

// ============================================================================
// PoolInner
// ============================================================================

/// State shared with the device loops.
struct PoolInner {
    list: WaitingList,
    devices: RwLock<FxHashMap<DeviceId, Arc<DeviceSession>>>,
    paused: AtomicBool,
    timing: Timing,
    resolver: Arc<dyn PayloadResolver>,
    progress: broadcast::Sender<Progress>,
    /// Parent of every device's stop token.
    shutdown: CancellationToken,
}

// ============================================================================
// Pool
// ============================================================================

/// Schedules queued work items across a set of devices.
///
/// Dropping the pool stops every device loop; call
/// [`shutdown`](Self::shutdown) to also wait for them and close links.
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("devices", &self.inner.devices.read().len())
            .field("pending", &self.inner.list.pending_count())
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Pool - Construction
// ============================================================================

impl Pool {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    pub(crate) fn new(queue: QueueConfig, timing: Timing, resolver: Arc<dyn PayloadResolver>) -> Self {
        let list = WaitingList::new(queue.capacity);
        list.set_open(queue.open);
        let (progress, _) = broadcast::channel(PROGRESS_CAPACITY);

        Self {
            inner: Arc::new(PoolInner {
                list,
                devices: RwLock::new(FxHashMap::default()),
                paused: AtomicBool::new(false),
                timing,
                resolver,
                progress,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Builds a pool and registers every configured device.
    ///
    /// # Errors
    ///
    /// Fails on the first device that cannot be registered; devices
    /// registered before it are shut down.
    pub async fn from_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let pool = Self::builder()
            .queue(config.queue)
            .timing(config.timing)
            .build()?;

        for device in config.devices {
            if let Err(err) = pool.add_device(device).await {
                pool.shutdown().await;
                return Err(err);
            }
        }

        Ok(pool)
    }
}

// ============================================================================
// Pool - Devices
// ============================================================================

impl Pool {
    /// Connects to a device and starts serving items on it.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the device is unreachable
    /// - [`Error::TitleMismatch`] if it runs a different title
    /// - [`Error::Config`] if the name is already registered
    pub async fn add_device(&self, config: DeviceConfig) -> Result<DeviceId> {
        self.ensure_unique_name(&config.name)?;

        let client = LinkClient::new(config.address.clone(), config.port)
            .with_command_timeout(self.inner.timing.command_timeout());
        client.connect().await.inspect_err(|e| {
            warn!(name = %config.name, address = %config.address, error = %e, "Device registration failed");
        })?;

        let offsets = config.effective_offsets();
        self.register(config.name, config.title, offsets, Arc::new(client))
            .await
    }

    /// Starts serving items on an already connected link.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the link is down
    /// - [`Error::TitleMismatch`] if it runs a different title
    /// - [`Error::Config`] if the name is already registered
    pub async fn add_device_with_link(
        &self,
        name: impl Into<String>,
        title: Title,
        link: Arc<dyn Link>,
    ) -> Result<DeviceId> {
        let name = name.into();
        self.ensure_unique_name(&name)?;

        if !link.is_connected() {
            return Err(Error::NotConnected);
        }

        self.register(name, title, title.profile().offsets, link)
            .await
    }

    /// Stops a device, cancelling its item in flight, and closes its link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if the ID is not registered.
    pub async fn remove_device(&self, device_id: DeviceId) -> Result<()> {
        let session = self
            .inner
            .devices
            .write()
            .remove(&device_id)
            .ok_or_else(|| Error::device_not_found(device_id))?;

        Self::stop_session(&session).await;
        info!(device = %device_id, name = %session.driver.name(), "Device removed");
        Ok(())
    }

    /// Re-opens a dead link and checks the title again.
    ///
    /// # Errors
    ///
    /// - [`Error::DeviceNotFound`] if the ID is not registered
    /// - [`Error::Connection`] if the device is still unreachable
    /// - [`Error::TitleMismatch`] if it now runs a different title
    pub async fn reconnect_device(&self, device_id: DeviceId) -> Result<()> {
        let session = self.session(device_id)?;
        let driver = &session.driver;

        driver.link().reconnect().await?;
        verify_title(driver.link().as_ref(), driver.title()).await?;

        info!(device = %device_id, name = %driver.name(), "Device reconnected");
        Ok(())
    }

    async fn register(
        &self,
        name: String,
        title: Title,
        offsets: OffsetTable,
        link: Arc<dyn Link>,
    ) -> Result<DeviceId> {
        if let Err(err) = verify_title(link.as_ref(), title).await {
            link.shutdown();
            return Err(err);
        }

        let id = DeviceId::next();
        let driver = DeviceDriver::new(id, name, title, link, self.inner.timing)
            .with_offsets(offsets)
            .with_progress(self.inner.progress.clone());

        let session = Arc::new(DeviceSession::new(
            Arc::new(driver),
            self.inner.shutdown.child_token(),
        ));

        // A concurrent registration may have taken the name meanwhile.
        let mut devices = self.inner.devices.write();
        if let Err(err) = check_unique_name(&devices, session.driver.name()) {
            drop(devices);
            session.driver.link().shutdown();
            return Err(err);
        }

        let task = tokio::spawn(device_loop(Arc::clone(&self.inner), Arc::clone(&session)));
        *session.task.lock() = Some(task);
        devices.insert(id, Arc::clone(&session));
        drop(devices);

        info!(device = %id, name = %session.driver.name(), %title, "Device registered");
        Ok(id)
    }

    fn ensure_unique_name(&self, name: &str) -> Result<()> {
        check_unique_name(&self.inner.devices.read(), name)
    }

    fn session(&self, device_id: DeviceId) -> Result<Arc<DeviceSession>> {
        self.inner
            .devices
            .read()
            .get(&device_id)
            .cloned()
            .ok_or_else(|| Error::device_not_found(device_id))
    }

    async fn stop_session(session: &DeviceSession) {
        session.stop.cancel();

        let task = session.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(device = %session.id(), error = %e, "Device loop ended abnormally");
        }

        session.driver.link().shutdown();
    }
}

// ============================================================================
// Pool - Scheduling Control
// ============================================================================

impl Pool {
    /// Stops new claims. Items in flight run to completion.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        info!("Pool paused");
    }

    /// Allows claims again.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        info!("Pool resumed");
    }

    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Stops every device and closes admission.
    ///
    /// Items in flight end as cancelled; pending items stay queued.
    pub async fn shutdown(&self) {
        info!("Pool shutting down");
        self.inner.list.set_open(false);
        self.inner.shutdown.cancel();

        let sessions: Vec<_> = self.inner.devices.write().drain().map(|(_, s)| s).collect();
        for session in sessions {
            Self::stop_session(&session).await;
        }

        info!("Pool shut down");
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

// ============================================================================
// Pool - Queue Facade
// ============================================================================

impl Pool {
    /// Queues an exchange of `payload` for a submitter.
    pub fn submit(
        &self,
        submitter: SubmitterId,
        submitter_name: impl Into<String>,
        payload: PayloadRef,
        code: TradeCode,
    ) -> QueueResult {
        let item = WorkItem::new(submitter, submitter_name, OperationKind::Exchange, code)
            .with_payload(payload);
        self.submit_item(item)
    }

    /// Queues a prepared item of any kind.
    pub fn submit_item(&self, item: WorkItem) -> QueueResult {
        self.inner.list.enqueue(item)
    }

    /// Cancels the submitter's pending item.
    pub fn cancel(&self, submitter: SubmitterId) -> bool {
        self.inner.list.remove(submitter)
    }

    /// 1-based queue position, or 0 if nothing is pending.
    #[must_use]
    pub fn position(&self, submitter: SubmitterId) -> usize {
        self.inner.list.position(submitter)
    }

    /// The waiting list.
    #[must_use]
    pub fn waiting_list(&self) -> &WaitingList {
        &self.inner.list
    }
}

// ============================================================================
// Pool - Status
// ============================================================================

impl Pool {
    /// Status of every device, in registration order.
    #[must_use]
    pub fn list_device_status(&self) -> Vec<DeviceStatus> {
        let mut statuses: Vec<_> = self
            .inner
            .devices
            .read()
            .values()
            .map(|s| s.status())
            .collect();
        statuses.sort_by_key(|s| s.id);
        statuses
    }

    /// Status of the pool and its devices.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let list = &self.inner.list;
        PoolStatus {
            paused: self.is_paused(),
            queue_open: list.is_open(),
            capacity: list.capacity(),
            pending: list.pending_count(),
            active: list.active_count(),
            devices: self.list_device_status(),
        }
    }

    /// Subscribes to admission, start and completion events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.list.subscribe()
    }

    /// Subscribes to step announcements from every device.
    #[must_use]
    pub fn subscribe_progress(&self) -> broadcast::Receiver<Progress> {
        self.inner.progress.subscribe()
    }
}

// ============================================================================
// Device Loop
// ============================================================================

/// Claims and serves items on one device until stopped.
async fn device_loop(inner: Arc<PoolInner>, session: Arc<DeviceSession>) {
    let device = session.id();
    let stop = session.stop.clone();
    debug!(%device, "Device loop started");

    loop {
        if stop.is_cancelled() {
            break;
        }

        let eligible = !inner.paused.load(Ordering::SeqCst) && session.driver.link().is_connected();
        let next = if eligible { inner.list.dequeue_next() } else { None };

        let Some(next) = next else {
            if idle(&stop, inner.timing.backoff()).await {
                break;
            }
            continue;
        };

        let item = match inner.list.mark_active(next.id, device) {
            Ok(item) => item,
            Err(e) => {
                debug!(%device, item_id = %next.id, error = %e, "Item claimed elsewhere");
                continue;
            }
        };

        session.begin(&item);
        let outcome = serve(&inner, &session, &item, &stop).await;

        if let Err(e) = inner.list.mark_terminal(item.id, &outcome) {
            error!(%device, item_id = %item.id, error = %e, "Could not record outcome");
        }
        session.finish(&outcome);

        if !session.driver.link().is_connected() {
            warn!(%device, name = %session.driver.name(), "Device disconnected; reconnect to resume");
        }

        if idle(&stop, inner.timing.settle()).await {
            break;
        }
    }

    debug!(%device, "Device loop stopped");
}

/// Resolves the payload and executes the item in its own task, so a
/// panic fails the item instead of the loop.
async fn serve(
    inner: &Arc<PoolInner>,
    session: &DeviceSession,
    item: &WorkItem,
    cancel: &CancellationToken,
) -> Outcome {
    let resolver = Arc::clone(&inner.resolver);
    let driver = Arc::clone(&session.driver);
    let item = item.clone();
    let cancel = cancel.clone();
    let item_id = item.id;

    let execution = tokio::spawn(async move {
        let payload = match resolve(resolver.as_ref(), &item, driver.title()).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(device = %driver.id(), item_id = %item.id, error = %e, "Payload unavailable");
                return Outcome::failed(FailureReason::PayloadUnavailable);
            }
        };
        driver.execute(&item, payload.as_deref(), &cancel).await
    });

    match execution.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(device = %session.id(), %item_id, error = %e, "Execution aborted");
            Outcome::failed(FailureReason::Internal)
        }
    }
}

async fn resolve(
    resolver: &dyn PayloadResolver,
    item: &WorkItem,
    title: Title,
) -> Result<Option<Vec<u8>>> {
    if !item.kind.needs_payload() {
        return Ok(None);
    }
    match &item.payload {
        Some(payload) => resolver.resolve(payload, title).await.map(Some),
        None => Ok(None),
    }
}

fn check_unique_name(devices: &FxHashMap<DeviceId, Arc<DeviceSession>>, name: &str) -> Result<()> {
    if devices.values().any(|s| s.driver.name() == name) {
        return Err(Error::config(format!("device name '{name}' is already registered")));
    }
    Ok(())
}

/// Waits for `duration`. Returns `true` if stopped first.
async fn idle(stop: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        () = stop.cancelled() => true,
        () = tokio::time::sleep(duration) => false,
    }
}

/// Rejects a link whose device runs another title.
///
/// An empty reply means the agent cannot tell, which is accepted.
async fn verify_title(link: &dyn Link, title: Title) -> Result<()> {
    let reported = link.title_id().await?;
    if reported.is_empty() {
        debug!(%title, "Device did not report a title; skipping check");
        return Ok(());
    }

    let expected = title.profile().title_id;
    if !reported.eq_ignore_ascii_case(expected) {
        return Err(Error::title_mismatch(expected, reported));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
