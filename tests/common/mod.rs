//! Shared utilities for integration tests.
//!
//! Provides a fake console agent speaking the real line protocol:
//! - Records every received line
//! - Answers peeks from per-address scripts
//! - Answers `getTitleID`
//! - Can hang up on demand

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use console_trade_pool::Timing;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber once; `RUST_LOG` overrides the filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("console_trade_pool=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Short waits so a trade finishes in a few seconds of real time.
pub fn fast_timing() -> Timing {
    Timing {
        backoff_ms: 20,
        settle_ms: 50,
        poll_interval_ms: 20,
        partner_timeout_ms: 3_000,
        completion_timeout_ms: 3_000,
        search_start_timeout_ms: 1_000,
        injection_settle_ms: 10,
        key_delay_ms: 1,
        recovery_delay_ms: 1,
        command_timeout_ms: 2_000,
    }
}

// ============================================================================
// FakeConsole
// ============================================================================

#[derive(Default)]
struct State {
    title_id: String,
    lines: Mutex<Vec<String>>,
    scripts: Mutex<FxHashMap<u64, VecDeque<Vec<u8>>>>,
    /// Cancelled to drop the current connection.
    hang_up: Mutex<CancellationToken>,
}

impl State {
    fn reply(&self, line: &str) -> Option<String> {
        let mut parts = line.split_whitespace();
        match parts.next()? {
            "peek" | "peekMain" | "peekAbsolute" => {
                let address = parts
                    .next()
                    .and_then(|a| u64::from_str_radix(a.trim_start_matches("0x"), 16).ok());
                let Some(address) = address else {
                    return Some(String::new());
                };

                let mut scripts = self.scripts.lock();
                let reply = match scripts.get_mut(&address) {
                    Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
                    Some(queue) => queue.front().cloned().unwrap_or_default(),
                    None => Vec::new(),
                };
                Some(hex::encode_upper(reply))
            }
            "getTitleID" => Some(self.title_id.clone()),
            "getVersion" => Some("2.4".to_owned()),
            _ => None,
        }
    }
}

/// In-process stand-in for a console's debug agent.
pub struct FakeConsole {
    pub port: u16,
    state: Arc<State>,
}

impl FakeConsole {
    /// Listens on a random local port.
    pub async fn start(title_id: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let state = Arc::new(State {
            title_id: title_id.to_owned(),
            ..State::default()
        });

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let hang_up = accept_state.hang_up.lock().clone();
                tokio::spawn(serve(stream, Arc::clone(&accept_state), hang_up));
            }
        });

        Self { port, state }
    }

    /// Queues peek replies for `address`; the last one repeats.
    pub fn script(&self, address: u64, replies: Vec<Vec<u8>>) {
        self.state.scripts.lock().insert(address, replies.into());
    }

    /// Every line received so far.
    pub fn lines(&self) -> Vec<String> {
        self.state.lines.lock().clone()
    }

    /// Drops the current connection. Later connections are accepted.
    pub fn hang_up(&self) {
        let mut token = self.state.hang_up.lock();
        token.cancel();
        *token = CancellationToken::new();
    }

    /// Waits until a received line satisfies `pred`.
    pub async fn wait_for_line(&self, pred: impl Fn(&str) -> bool, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.lines().iter().any(|l| pred(l)) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

async fn serve(stream: TcpStream, state: Arc<State>, hang_up: CancellationToken) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => break,
            },
            () = hang_up.cancelled() => break,
        };

        let reply = state.reply(&line);
        state.lines.lock().push(line);

        if let Some(reply) = reply
            && write.write_all(format!("{reply}\r\n").as_bytes()).await.is_err()
        {
            break;
        }
    }
}
