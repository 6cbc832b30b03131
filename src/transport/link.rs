//! High-level device operations over a debug link.
//!
//! [`Link`] is the seam drivers program against; [`LinkClient`] is the
//! TCP implementation.
//!
//! # Example
//!
//! ```ignore
//! use console_trade_pool::{Button, LinkClient, MemoryRegion};
//!
//! let link = LinkClient::new("192.168.0.20", 6000);
//! link.connect().await?;
//!
//! link.press_button(Button::A).await?;
//! let flag = link.read_bytes(MemoryRegion::Heap, 0x2F7240A0, 1).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{Button, Command, MemoryRegion, Stick, decode_hex_reply, normalize_title_id};

use super::connection::{Connection, DEFAULT_COMMAND_TIMEOUT};

// ============================================================================
// Link Trait
// ============================================================================

/// Memory and input primitives of one remote device.
///
/// One driver issues commands strictly in sequence, so implementations
/// never see overlapping calls from the same owner.
#[async_trait]
pub trait Link: Send + Sync {
    /// Reads `length` bytes at `offset`.
    ///
    /// An empty vector means "no data yet", not failure.
    async fn read_bytes(&self, region: MemoryRegion, offset: u64, length: usize)
    -> Result<Vec<u8>>;

    /// Writes `data` at `offset`. Resolves once the write is flushed.
    async fn write_bytes(&self, region: MemoryRegion, offset: u64, data: &[u8]) -> Result<()>;

    /// Presses and releases a button.
    async fn press_button(&self, button: Button) -> Result<()>;

    /// Presses a button down and leaves it down.
    async fn button_down(&self, button: Button) -> Result<()>;

    /// Releases a button.
    async fn button_up(&self, button: Button) -> Result<()>;

    /// Deflects a stick.
    async fn set_stick(&self, stick: Stick, x: i16, y: i16) -> Result<()>;

    /// Returns the running title ID, or an empty string if unsupported.
    async fn title_id(&self) -> Result<String>;

    /// Returns `true` if commands can currently be issued.
    fn is_connected(&self) -> bool;

    /// Closes the link.
    fn shutdown(&self);

    /// Re-opens a dead link.
    ///
    /// Links that cannot reconnect return [`Error::Connection`].
    async fn reconnect(&self) -> Result<()> {
        Err(Error::connection("link does not support reconnecting"))
    }

    /// Holds a button for `duration`, then releases it.
    ///
    /// Cancellation interrupts the wait but never the release: the
    /// release is attempted first and [`Error::Cancelled`] is returned
    /// afterwards.
    async fn hold_button(
        &self,
        button: Button,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.button_down(button).await?;

        let cancelled = tokio::select! {
            () = tokio::time::sleep(duration) => false,
            () = cancel.cancelled() => true,
        };

        self.button_up(button).await?;

        if cancelled {
            debug!(%button, "Hold interrupted, button released");
            return Err(Error::Cancelled);
        }

        Ok(())
    }

    /// Centers both sticks.
    async fn reset_sticks(&self) -> Result<()> {
        self.set_stick(Stick::Left, 0, 0).await?;
        self.set_stick(Stick::Right, 0, 0).await
    }
}

// ============================================================================
// LinkClient
// ============================================================================

/// TCP client for one remote device.
///
/// Owns at most one [`Connection`]. Connect failures and dead links are
/// reported, never retried; call [`connect`](Self::connect) again to
/// reopen.
pub struct LinkClient {
    /// Remote host.
    address: String,
    /// Remote port.
    port: u16,
    /// Reply timeout.
    command_timeout: Duration,
    /// Current connection, if one was established.
    connection: Mutex<Option<Connection>>,
}

impl LinkClient {
    /// Creates an unconnected client.
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connection: Mutex::new(None),
        }
    }

    /// Sets the reply timeout used by later connections.
    #[must_use]
    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    /// Creates a client and connects it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the device is unreachable.
    pub async fn connect_to(address: impl Into<String>, port: u16) -> Result<Self> {
        let client = Self::new(address, port);
        client.connect().await?;
        Ok(client)
    }

    /// Opens the connection, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the device is unreachable.
    pub async fn connect(&self) -> Result<()> {
        let connection = Connection::open(&self.address, self.port, self.command_timeout).await?;

        if let Some(previous) = self.connection.lock().replace(connection) {
            previous.shutdown();
        }

        info!(address = %self.address, port = self.port, "Link connected");
        Ok(())
    }

    /// Returns `host:port` of the remote device.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Returns a handle to the current connection.
    fn connection(&self) -> Option<Connection> {
        self.connection.lock().clone()
    }

    /// Sends a command that produces no reply.
    async fn send_input(&self, command: Command) -> Result<()> {
        let connection = self.connection().ok_or(Error::NotConnected)?;
        connection.send(command).await.map(|_| ())
    }
}

#[async_trait]
impl Link for LinkClient {
    async fn read_bytes(
        &self,
        region: MemoryRegion,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>> {
        let Some(connection) = self.connection() else {
            debug!(endpoint = %self.endpoint(), "Read on unconnected link returns no data");
            return Ok(Vec::new());
        };

        let reply = connection
            .send(Command::Peek {
                region,
                address: offset,
                length,
            })
            .await?;

        let bytes = reply.as_deref().map(decode_hex_reply).unwrap_or_default();
        if !bytes.is_empty() && bytes.len() != length {
            warn!(
                expected = length,
                actual = bytes.len(),
                "Short read treated as no data"
            );
            return Ok(Vec::new());
        }

        Ok(bytes)
    }

    async fn write_bytes(&self, region: MemoryRegion, offset: u64, data: &[u8]) -> Result<()> {
        self.send_input(Command::Poke {
            region,
            address: offset,
            data: data.to_vec(),
        })
        .await
    }

    async fn press_button(&self, button: Button) -> Result<()> {
        self.send_input(Command::Click(button)).await
    }

    async fn button_down(&self, button: Button) -> Result<()> {
        self.send_input(Command::Press(button)).await
    }

    async fn button_up(&self, button: Button) -> Result<()> {
        self.send_input(Command::Release(button)).await
    }

    async fn set_stick(&self, stick: Stick, x: i16, y: i16) -> Result<()> {
        self.send_input(Command::SetStick { stick, x, y }).await
    }

    async fn title_id(&self) -> Result<String> {
        let connection = self.connection().ok_or(Error::NotConnected)?;
        let reply = connection.send(Command::GetTitleId).await?;
        Ok(reply.as_deref().map(normalize_title_id).unwrap_or_default())
    }

    fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(Connection::is_alive)
    }

    fn shutdown(&self) {
        if let Some(connection) = self.connection.lock().take() {
            connection.shutdown();
            debug!(endpoint = %self.endpoint(), "Link shut down");
        }
    }

    async fn reconnect(&self) -> Result<()> {
        self.connect().await
    }
}

// ============================================================================
// Tests
// ============================================================================
