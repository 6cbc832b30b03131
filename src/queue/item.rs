//! Work items and their outcomes.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::{DeviceId, ItemId, SubmitterId};

// ============================================================================
// OperationKind
// ============================================================================

/// What the device should do for a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Send the submitter's payload.
    #[default]
    Exchange,
    /// Send back a copy of whatever the partner offers.
    Duplicate,
    /// Read what the partner offers and back out without trading.
    Extract,
    /// Send a payload produced by a seeded search.
    SeededSearch,
    /// Send a freshly generated payload.
    RandomGeneration,
}

impl OperationKind {
    /// Returns `true` if a payload must be resolved before driving.
    #[inline]
    #[must_use]
    pub const fn needs_payload(self) -> bool {
        matches!(
            self,
            Self::Exchange | Self::SeededSearch | Self::RandomGeneration
        )
    }

    /// Returns `true` if the partner's offered block is read.
    #[inline]
    #[must_use]
    pub const fn reads_offer(self) -> bool {
        matches!(self, Self::Duplicate | Self::Extract)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exchange => "exchange",
            Self::Duplicate => "duplicate",
            Self::Extract => "extract",
            Self::SeededSearch => "seeded-search",
            Self::RandomGeneration => "random-generation",
        };
        f.write_str(name)
    }
}

// ============================================================================
// TradeCode
// ============================================================================

/// Numeric code both sides enter to find each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeCode(u32);

impl TradeCode {
    /// Wraps a raw code.
    #[inline]
    #[must_use]
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// Returns the raw code.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Splits the code into `count` digits, most significant first,
    /// zero-padded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the code has more digits.
    pub fn digits(self, count: usize) -> Result<Vec<u8>> {
        let mut rest = self.0;
        let mut digits = vec![0u8; count];

        for slot in digits.iter_mut().rev() {
            *slot = (rest % 10) as u8;
            rest /= 10;
        }

        if rest != 0 {
            return Err(Error::invalid_argument(format!(
                "trade code {} does not fit in {count} digits",
                self.0
            )));
        }

        Ok(digits)
    }
}

impl fmt::Display for TradeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

// ============================================================================
// PayloadRef
// ============================================================================

/// External description of the payload a submitter asked for.
///
/// Opaque to the core; a [`PayloadResolver`](crate::pool::PayloadResolver)
/// turns it into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRef {
    /// Name shown in notifications.
    pub display_name: String,
    /// Resolver-specific description.
    pub descriptor: String,
}

impl PayloadRef {
    /// Creates a payload reference.
    #[must_use]
    pub fn new(display_name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            descriptor: descriptor.into(),
        }
    }
}

// ============================================================================
// ItemStatus
// ============================================================================

/// Lifecycle status of a work item.
///
/// `Pending → Active → {Completed, Failed, Cancelled}`; a pending item
/// may also go straight to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl ItemStatus {
    /// Returns `true` for `Completed`, `Failed` and `Cancelled`.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

// ============================================================================
// WorkItem
// ============================================================================

/// One admitted request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,
    pub submitter: SubmitterId,
    pub submitter_name: String,
    pub payload: Option<PayloadRef>,
    pub kind: OperationKind,
    pub code: TradeCode,
    pub status: ItemStatus,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Device that served (or is serving) the item.
    pub device: Option<DeviceId>,
}

impl WorkItem {
    /// Creates a pending item with a fresh ID.
    #[must_use]
    pub fn new(
        submitter: SubmitterId,
        submitter_name: impl Into<String>,
        kind: OperationKind,
        code: TradeCode,
    ) -> Self {
        Self {
            id: ItemId::generate(),
            submitter,
            submitter_name: submitter_name.into(),
            payload: None,
            kind,
            code,
            status: ItemStatus::Pending,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            device: None,
        }
    }

    /// Attaches a payload reference.
    #[must_use]
    pub fn with_payload(mut self, payload: PayloadRef) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Name of the payload for notifications.
    #[must_use]
    pub fn payload_name(&self) -> Option<&str> {
        self.payload.as_ref().map(|p| p.display_name.as_str())
    }
}

// ============================================================================
// FailureReason
// ============================================================================

/// Why an item failed, in words safe to show a submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PartnerNotFound,
    ExchangeNotFinished,
    SearchNotStarted,
    LinkLost,
    InvalidPayload,
    InvalidCode,
    PayloadUnavailable,
    Internal,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PartnerNotFound => "partner not found",
            Self::ExchangeNotFinished => "exchange did not finish",
            Self::SearchNotStarted => "search did not start",
            Self::LinkLost => "link lost",
            Self::InvalidPayload => "payload rejected",
            Self::InvalidCode => "trade code rejected",
            Self::PayloadUnavailable => "payload unavailable",
            Self::Internal => "internal error",
        };
        f.write_str(text)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Terminal result of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// `Completed`, `Failed` or `Cancelled`.
    pub status: ItemStatus,
    /// Set when `status` is `Failed`.
    pub reason: Option<FailureReason>,
    /// Partner's offered block for `Extract`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<Vec<u8>>,
}

impl Outcome {
    #[must_use]
    pub fn succeeded() -> Self {
        Self {
            status: ItemStatus::Completed,
            reason: None,
            extracted: None,
        }
    }

    #[must_use]
    pub fn failed(reason: FailureReason) -> Self {
        Self {
            status: ItemStatus::Failed,
            reason: Some(reason),
            extracted: None,
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            status: ItemStatus::Cancelled,
            reason: None,
            extracted: None,
        }
    }

    /// Attaches an extracted block.
    #[must_use]
    pub fn with_extracted(mut self, data: Vec<u8>) -> Self {
        self.extracted = Some(data);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Completed
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == ItemStatus::Cancelled
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_code_digits_padded() {
        assert_eq!(
            TradeCode::new(1234).digits(8).unwrap(),
            vec![0, 0, 0, 0, 1, 2, 3, 4]
        );
        assert_eq!(TradeCode::new(9051).digits(4).unwrap(), vec![9, 0, 5, 1]);
    }

    #[test]
    fn test_trade_code_too_long() {
        assert!(TradeCode::new(12345).digits(4).is_err());
    }

    #[test]
    fn test_trade_code_display() {
        assert_eq!(TradeCode::new(42).to_string(), "00000042");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ItemStatus::Pending.is_terminal());
        assert!(!ItemStatus::Active.is_terminal());
        assert!(ItemStatus::Completed.is_terminal());
        assert!(ItemStatus::Failed.is_terminal());
        assert!(ItemStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_kind_payload_needs() {
        assert!(OperationKind::Exchange.needs_payload());
        assert!(!OperationKind::Duplicate.needs_payload());
        assert!(OperationKind::Extract.reads_offer());
        assert!(!OperationKind::RandomGeneration.reads_offer());
    }

    #[test]
    fn test_outcome_constructors() {
        assert!(Outcome::succeeded().is_success());
        assert!(Outcome::cancelled().is_cancelled());
        let failed = Outcome::failed(FailureReason::PartnerNotFound);
        assert!(!failed.is_success());
        assert_eq!(failed.reason.unwrap().to_string(), "partner not found");
    }

    #[test]
    fn test_new_item_is_pending() {
        let item = WorkItem::new(SubmitterId::new(1), "ash", OperationKind::Exchange, TradeCode::new(1))
            .with_payload(PayloadRef::new("Pikachu", "0011"));
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.payload_name(), Some("Pikachu"));
        assert!(item.device.is_none());
    }
}
