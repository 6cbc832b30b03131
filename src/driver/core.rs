//! Per-device trade driver.
//!
//! A [`DeviceDriver`] runs one work item at a time through the trade
//! sequence of its title. Every title shares this skeleton; the
//! [`TitleProfile`] supplies the addresses and button sequences.
//!
//! # Example
//!
//! ```ignore
//! use console_trade_pool::{DeviceDriver, DeviceId, LinkClient, Timing, Title};
//!
//! let link = Arc::new(LinkClient::connect_to("192.168.0.20", 6000).await?);
//! let driver = DeviceDriver::new(DeviceId::next(), "left", Title::SwordShield, link, Timing::default());
//!
//! let outcome = driver.execute(&item, Some(&payload), &CancellationToken::new()).await;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::error::{Error, Result};
use crate::identifiers::DeviceId;
use crate::protocol::Button;
use crate::queue::{FailureReason, OperationKind, Outcome, WorkItem};
use crate::transport::Link;

use super::keypad;
use super::state::{DriverState, Progress};
use super::title::{Address, FLAG_FOUND, FLAG_IDLE, OffsetTable, Step, Title, TitleProfile};

// ============================================================================
// Constants
// ============================================================================

/// Buffered progress reports per subscriber.
const PROGRESS_CAPACITY: usize = 64;

// ============================================================================
// Plan
// ============================================================================

/// Inputs checked before anything is sent to the device.
struct Plan {
    digits: Vec<u8>,
    payload: Option<Vec<u8>>,
}

// ============================================================================
// DeviceDriver
// ============================================================================

/// Drives one device through the trade sequence.
///
/// The caller guarantees a single execution at a time.
pub struct DeviceDriver {
    id: DeviceId,
    name: String,
    title: Title,
    offsets: OffsetTable,
    link: Arc<dyn Link>,
    timing: Timing,
    state: Mutex<DriverState>,
    progress: broadcast::Sender<Progress>,
}

impl fmt::Debug for DeviceDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceDriver")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("title", &self.title)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DeviceDriver - Construction
// ============================================================================

impl DeviceDriver {
    /// Creates an idle driver using the title's built-in offsets.
    #[must_use]
    pub fn new(
        id: DeviceId,
        name: impl Into<String>,
        title: Title,
        link: Arc<dyn Link>,
        timing: Timing,
    ) -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CAPACITY);
        Self {
            id,
            name: name.into(),
            title,
            offsets: title.profile().offsets,
            link,
            timing,
            state: Mutex::new(DriverState::Idle),
            progress,
        }
    }

    /// Replaces the built-in offsets.
    #[must_use]
    pub fn with_offsets(mut self, offsets: OffsetTable) -> Self {
        self.offsets = offsets;
        self
    }

    /// Publishes progress on a shared channel instead of a private one.
    #[must_use]
    pub fn with_progress(mut self, progress: broadcast::Sender<Progress>) -> Self {
        self.progress = progress;
        self
    }
}

// ============================================================================
// DeviceDriver - Accessors
// ============================================================================

impl DeviceDriver {
    #[inline]
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn title(&self) -> Title {
        self.title
    }

    #[inline]
    #[must_use]
    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// The device link.
    #[inline]
    #[must_use]
    pub fn link(&self) -> &Arc<dyn Link> {
        &self.link
    }

    /// Current step.
    #[must_use]
    pub fn state(&self) -> DriverState {
        *self.state.lock()
    }

    /// Subscribes to step announcements.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Progress> {
        self.progress.subscribe()
    }

    fn profile(&self) -> &'static TitleProfile {
        self.title.profile()
    }
}

// ============================================================================
// DeviceDriver - Execution
// ============================================================================

impl DeviceDriver {
    /// Runs `item` to a terminal outcome and returns to `Idle`.
    ///
    /// `payload` is the resolved block for kinds that inject one. Errors
    /// never escape: timeouts become failures, cancellation becomes a
    /// cancelled outcome once recovery input was sent, and a dead link
    /// fails with [`FailureReason::LinkLost`] without recovery.
    pub async fn execute(
        &self,
        item: &WorkItem,
        payload: Option<&[u8]>,
        cancel: &CancellationToken,
    ) -> Outcome {
        info!(
            device = %self.id,
            item_id = %item.id,
            submitter = %item.submitter,
            kind = %item.kind,
            "Execution started"
        );

        let outcome = match self.prepare(item, payload) {
            Ok(plan) => self.drive(item, &plan, cancel).await,
            Err(reason) => {
                warn!(device = %self.id, item_id = %item.id, %reason, "Item rejected before input");
                self.enter(item, DriverState::Failed, reason.to_string());
                Outcome::failed(reason)
            }
        };

        info!(
            device = %self.id,
            item_id = %item.id,
            status = %outcome.status,
            reason = ?outcome.reason,
            "Execution finished"
        );

        *self.state.lock() = DriverState::Idle;
        outcome
    }

    /// Validates the code and payload.
    fn prepare(&self, item: &WorkItem, payload: Option<&[u8]>) -> std::result::Result<Plan, FailureReason> {
        let profile = self.profile();

        let digits = item
            .code
            .digits(profile.code_digits)
            .map_err(|_| FailureReason::InvalidCode)?;

        let payload = if item.kind.needs_payload() {
            let bytes = payload.ok_or(FailureReason::PayloadUnavailable)?;
            if bytes.len() != profile.payload_len {
                debug!(
                    expected = profile.payload_len,
                    actual = bytes.len(),
                    "Payload length mismatch"
                );
                return Err(FailureReason::InvalidPayload);
            }
            Some(bytes.to_vec())
        } else {
            None
        };

        Ok(Plan { digits, payload })
    }

    /// Runs the sequence and maps its error to an outcome.
    async fn drive(&self, item: &WorkItem, plan: &Plan, cancel: &CancellationToken) -> Outcome {
        let err = match self.run(item, plan, cancel).await {
            Ok(extracted) => {
                self.enter(item, DriverState::Succeeded, "Trade finished");
                let outcome = Outcome::succeeded();
                return match extracted {
                    Some(data) => outcome.with_extracted(data),
                    None => outcome,
                };
            }
            Err(err) => err,
        };

        if err.is_link_error() {
            warn!(device = %self.id, item_id = %item.id, error = %err, "Link lost");
            self.enter(item, DriverState::Failed, FailureReason::LinkLost.to_string());
            return Outcome::failed(FailureReason::LinkLost);
        }

        let mut outcome = match &err {
            Error::Cancelled => Outcome::cancelled(),
            Error::SequenceTimeout { reason, .. } => Outcome::failed(*reason),
            _ => Outcome::failed(FailureReason::Internal),
        };

        warn!(device = %self.id, item_id = %item.id, error = %err, "Recovering");
        self.enter(item, DriverState::Recovering, "Returning to the overworld");

        if let Err(recovery_err) = self.recover().await {
            warn!(device = %self.id, error = %recovery_err, "Recovery incomplete");
            if recovery_err.is_link_error() && !outcome.is_cancelled() {
                outcome = Outcome::failed(FailureReason::LinkLost);
            }
        }

        match outcome.reason {
            Some(reason) => self.enter(item, DriverState::Failed, reason.to_string()),
            None => self.enter(item, DriverState::Cancelled, "Cancelled"),
        }

        outcome
    }

    /// The trade sequence. Returns the partner's block for `Extract`.
    async fn run(
        &self,
        item: &WorkItem,
        plan: &Plan,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        let profile = self.profile();
        let found_flag = self.offsets.partner_found_flag;

        // Navigating
        self.advance(item, DriverState::Navigating, "Opening the trade menu", cancel)?;
        self.play(profile.navigation, cancel).await?;
        self.enter_code(&plan.digits, cancel).await?;
        self.wait_for_flag(
            self.offsets.partner_search_flag,
            |flag| flag != FLAG_IDLE,
            self.timing.search_start_timeout(),
            FailureReason::SearchNotStarted,
            cancel,
        )
        .await?;

        // AwaitingPartner
        self.advance(item, DriverState::AwaitingPartner, "Searching for a partner", cancel)?;
        self.wait_for_flag(
            found_flag,
            |flag| flag == FLAG_FOUND,
            self.timing.partner_timeout(),
            FailureReason::PartnerNotFound,
            cancel,
        )
        .await?;
        let partner = self.partner_identity(cancel).await?;
        info!(device = %self.id, item_id = %item.id, %partner, "Partner found");

        let payload = match item.kind {
            OperationKind::Extract => {
                let offer = self.read_offer(cancel).await?;
                self.advance(item, DriverState::Recovering, "Backing out with the offered block", cancel)?;
                self.recover().await?;
                return Ok(Some(offer));
            }
            OperationKind::Duplicate => self.read_offer(cancel).await?,
            _ => plan
                .payload
                .clone()
                .ok_or_else(|| Error::invalid_argument("no payload to inject"))?,
        };

        // Injecting
        self.advance(
            item,
            DriverState::Injecting,
            format!("Partner {partner} found, injecting payload"),
            cancel,
        )?;
        let target = self.offsets.payload;
        self.link
            .write_bytes(target.region, target.offset, &payload)
            .await?;
        self.pause(self.timing.injection_settle(), cancel).await?;

        // Confirming
        self.advance(item, DriverState::Confirming, "Confirming the trade", cancel)?;
        self.play(profile.confirmation, cancel).await?;

        // AwaitingCompletion
        self.advance(
            item,
            DriverState::AwaitingCompletion,
            "Waiting for the trade to finish",
            cancel,
        )?;
        self.wait_for_flag(
            found_flag,
            |flag| flag == FLAG_IDLE,
            self.timing.completion_timeout(),
            FailureReason::ExchangeNotFinished,
            cancel,
        )
        .await?;

        Ok(None)
    }
}

// ============================================================================
// DeviceDriver - Steps
// ============================================================================

impl DeviceDriver {
    /// Enters a step unless cancellation was requested.
    fn advance(
        &self,
        item: &WorkItem,
        state: DriverState,
        message: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.enter(item, state, message);
        Ok(())
    }

    /// Records a state change and announces it.
    fn enter(&self, item: &WorkItem, state: DriverState, message: impl Into<String>) {
        *self.state.lock() = state;

        let message = message.into();
        debug!(device = %self.id, item_id = %item.id, %state, %message, "State change");

        // No subscribers is fine.
        let _ = self.progress.send(Progress {
            device: self.id,
            item_id: item.id,
            submitter: item.submitter,
            state,
            message,
            at: Instant::now(),
        });
    }

    /// Sleeps unless cancelled first.
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Plays a fixed button sequence.
    async fn play(&self, steps: &[Step], cancel: &CancellationToken) -> Result<()> {
        for step in steps {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match *step {
                Step::Click(button, delay_ms) => {
                    self.link.press_button(button).await?;
                    self.pause(Duration::from_millis(delay_ms), cancel).await?;
                }
                Step::Hold(button, duration_ms) => {
                    self.link
                        .hold_button(button, Duration::from_millis(duration_ms), cancel)
                        .await?;
                }
                Step::Wait(duration_ms) => {
                    self.pause(Duration::from_millis(duration_ms), cancel).await?;
                }
            }
        }
        Ok(())
    }

    /// Types the code on the keypad and submits it.
    async fn enter_code(&self, digits: &[u8], cancel: &CancellationToken) -> Result<()> {
        for button in keypad::code_entry(digits) {
            self.link.press_button(button).await?;
            self.pause(self.timing.key_delay(), cancel).await?;
        }
        Ok(())
    }

    /// Reads memory unless cancelled first.
    ///
    /// An abandoned read keeps its reply slot on the link, so later
    /// replies still line up.
    async fn read(
        &self,
        address: Address,
        length: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            bytes = self.link.read_bytes(address.region, address.offset, length) => bytes,
        }
    }

    /// Polls a one-byte flag until `accept` holds or `timeout` elapses.
    ///
    /// Each poll waits one interval first, so a match on poll `n` is seen
    /// `n` intervals after the call.
    async fn wait_for_flag(
        &self,
        address: Address,
        accept: impl Fn(u8) -> bool,
        timeout: Duration,
        reason: FailureReason,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            self.pause(self.timing.poll_interval(), cancel).await?;
            polls += 1;

            let bytes = self.read(address, 1, cancel).await?;
            if bytes.first().copied().is_some_and(&accept) {
                debug!(device = %self.id, polls, "Flag matched");
                return Ok(());
            }

            if started.elapsed() >= timeout {
                debug!(device = %self.id, polls, %reason, "Flag wait timed out");
                return Err(Error::sequence_timeout(reason, millis(timeout)));
            }
        }
    }

    /// Reads the partner identity as hex, or `unknown`.
    async fn partner_identity(&self, cancel: &CancellationToken) -> Result<String> {
        let address = self.offsets.partner_identity;
        let bytes = self
            .read(address, self.offsets.partner_identity_len, cancel)
            .await?;

        if bytes.is_empty() {
            return Ok("unknown".to_owned());
        }
        Ok(hex::encode_upper(bytes))
    }

    /// Reads the block the partner is offering.
    async fn read_offer(&self, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let address = self.offsets.partner_offer;
        let length = self.profile().payload_len;
        let timeout = self.timing.search_start_timeout();
        let started = Instant::now();

        loop {
            let block = self.read(address, length, cancel).await?;
            if !block.is_empty() {
                return Ok(block);
            }

            if started.elapsed() >= timeout {
                return Err(Error::sequence_timeout(
                    FailureReason::PayloadUnavailable,
                    millis(timeout),
                ));
            }
            self.pause(self.timing.poll_interval(), cancel).await?;
        }
    }

    /// Presses back until the device is on the overworld and centers the
    /// sticks. Runs to completion regardless of cancellation.
    async fn recover(&self) -> Result<()> {
        let presses = self.profile().recovery_presses;
        for _ in 0..presses {
            self.link.press_button(Button::B).await?;
            tokio::time::sleep(self.timing.recovery_delay()).await;
        }
        self.link.reset_sticks().await
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
