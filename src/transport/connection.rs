//! TCP connection and I/O loop.
//!
//! This module owns the socket to one remote agent, including reply
//! correlation and connection liveness.
//!
//! # I/O Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Outgoing command lines from the [`LinkClient`](super::LinkClient)
//! - Incoming reply lines from the agent
//! - In-order reply correlation (the protocol carries no request IDs)
//! - Failing outstanding requests when the socket dies

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::Command;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for a reply line.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for the TCP handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Channel a reply line (or its absence) is delivered on.
type ReplySender = oneshot::Sender<Result<Option<String>>>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the I/O loop.
enum ConnectionCommand {
    /// Write a command and report its reply.
    Send {
        command: Command,
        reply_tx: ReplySender,
    },
    /// Close the socket.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// TCP connection to one remote agent.
///
/// Clones share the same socket and I/O loop. The loop exits on
/// [`shutdown`](Self::shutdown), on a socket error, or once every clone
/// is dropped.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the I/O loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Cleared by the I/O loop when it exits.
    alive: Arc<AtomicBool>,
    /// Remote address.
    peer: SocketAddr,
    /// Reply timeout.
    command_timeout: Duration,
}

impl Connection {
    /// Opens a TCP connection and starts the I/O loop.
    ///
    /// Echo is switched off immediately so only data-producing commands
    /// reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the address is unreachable or the
    ///   handshake times out
    pub async fn open(address: &str, port: u16, command_timeout: Duration) -> Result<Self> {
        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::connection(format!("{address}:{port}: {e}")));
            }
            Err(_) => {
                return Err(Error::connection(format!(
                    "{address}:{port}: no answer within {}ms",
                    CONNECT_TIMEOUT.as_millis()
                )));
            }
        };

        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        let connection = Self::from_stream(stream, peer, command_timeout);
        connection.send(Command::ConfigureEcho(false)).await?;

        debug!(%peer, "Link connection established");

        Ok(connection)
    }

    /// Wraps an already connected stream.
    fn from_stream(stream: TcpStream, peer: SocketAddr, command_timeout: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::run_io_loop(
            stream,
            command_rx,
            Arc::clone(&alive),
            peer,
        ));

        Self {
            command_tx,
            alive,
            peer,
            command_timeout,
        }
    }

    /// Returns the remote address.
    #[inline]
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns `true` while the I/O loop is running.
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Sends a command.
    ///
    /// Resolves to `Some(line)` for commands that reply, `None` once
    /// other commands have been flushed.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the loop has exited
    /// - [`Error::ResponseTimeout`] if no reply arrives in time; the
    ///   connection is shut down since later replies can no longer be
    ///   matched to their requests
    /// - [`Error::Connection`] if the write fails
    pub async fn send(&self, command: Command) -> Result<Option<String>> {
        if !self.is_alive() {
            return Err(Error::ConnectionClosed);
        }

        let verb = command.verb();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send { command, reply_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        match timeout(self.command_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                warn!(peer = %self.peer, verb, "Reply timed out, closing link");
                self.shutdown();
                Err(Error::response_timeout(
                    verb,
                    self.command_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Shuts down the connection.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// I/O loop that owns the socket.
    async fn run_io_loop(
        stream: TcpStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        alive: Arc<AtomicBool>,
        peer: SocketAddr,
    ) {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut pending: VecDeque<ReplySender> = VecDeque::new();

        loop {
            tokio::select! {
                // Reply lines from the agent
                line = lines.next_line() => {
                    match line {
                        Ok(Some(text)) => {
                            match pending.pop_front() {
                                Some(tx) => {
                                    let _ = tx.send(Ok(Some(text)));
                                }
                                None => {
                                    warn!(%peer, line = %text, "Unsolicited reply line");
                                }
                            }
                        }

                        Ok(None) => {
                            debug!(%peer, "Link closed by remote");
                            break;
                        }

                        Err(e) => {
                            error!(%peer, error = %e, "Link read error");
                            break;
                        }
                    }
                }

                // Commands from the client
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { command, reply_tx }) => {
                            if let Err(e) = Self::write_command(&mut write_half, &command).await {
                                error!(%peer, error = %e, "Link write error");
                                let _ = reply_tx.send(Err(Error::connection(e.to_string())));
                                break;
                            }

                            trace!(%peer, %command, "Command sent");

                            if command.expects_reply() {
                                pending.push_back(reply_tx);
                            } else {
                                let _ = reply_tx.send(Ok(None));
                            }
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(%peer, "Shutdown command received");
                            let _ = write_half.shutdown().await;
                            break;
                        }

                        None => {
                            debug!(%peer, "All link handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        alive.store(false, Ordering::Release);
        Self::fail_pending(&mut pending);

        debug!(%peer, "I/O loop terminated");
    }

    /// Writes one terminated command line and flushes it.
    async fn write_command(write_half: &mut OwnedWriteHalf, command: &Command) -> std::io::Result<()> {
        write_half.write_all(command.encode().as_bytes()).await?;
        write_half.flush().await
    }

    /// Fails every outstanding reply with `ConnectionClosed`.
    fn fail_pending(pending: &mut VecDeque<ReplySender>) {
        let count = pending.len();

        for tx in pending.drain(..) {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending replies on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use crate::protocol::{Button, MemoryRegion};

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        (listener, port)
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_COMMAND_TIMEOUT.as_secs(), 10);
        assert_eq!(CONNECT_TIMEOUT.as_secs(), 5);
    }

    #[tokio::test]
    async fn test_open_disables_echo_and_correlates_replies() {
        let (listener, port) = listener().await;

        let agent = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();

            let mut seen = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.starts_with("peek") {
                    write.write_all(b"0A0B\r\n").await.expect("reply");
                }
                seen.push(line);
                if seen.len() == 3 {
                    break;
                }
            }
            seen
        });

        let conn = Connection::open("127.0.0.1", port, DEFAULT_COMMAND_TIMEOUT)
            .await
            .expect("open");

        assert_eq!(conn.send(Command::Click(Button::A)).await.expect("click"), None);

        let reply = conn
            .send(Command::Peek {
                region: MemoryRegion::Heap,
                address: 0x100,
                length: 2,
            })
            .await
            .expect("peek");
        assert_eq!(reply.as_deref(), Some("0A0B"));

        let seen = agent.await.expect("agent");
        assert_eq!(
            seen,
            vec!["configure echoCommands 0", "click A", "peek 0x100 2"]
        );
    }

    #[tokio::test]
    async fn test_open_refused() {
        let (listener, port) = listener().await;
        drop(listener);

        let result = Connection::open("127.0.0.1", port, DEFAULT_COMMAND_TIMEOUT).await;
        assert!(matches!(result, Err(Error::Connection { .. })));
    }

    #[tokio::test]
    async fn test_remote_close_fails_pending_and_marks_dead() {
        let (listener, port) = listener().await;

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut lines = BufReader::new(stream).lines();
            // Configure line, then the peek, then hang up without replying.
            let _ = lines.next_line().await;
            let _ = lines.next_line().await;
        });

        let conn = Connection::open("127.0.0.1", port, DEFAULT_COMMAND_TIMEOUT)
            .await
            .expect("open");

        let result = conn
            .send(Command::Peek {
                region: MemoryRegion::Heap,
                address: 0,
                length: 1,
            })
            .await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));

        tokio::task::yield_now().await;
        assert!(!conn.is_alive());
        assert!(matches!(
            conn.send(Command::Click(Button::A)).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_reply_timeout_shuts_down() {
        let (listener, port) = listener().await;

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(_)) = lines.next_line().await {}
        });

        let conn = Connection::open("127.0.0.1", port, Duration::from_millis(50))
            .await
            .expect("open");

        let result = conn.send(Command::GetTitleId).await;
        assert!(matches!(result, Err(Error::ResponseTimeout { .. })));
    }
}
