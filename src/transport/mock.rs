//! Scripted [`Link`] used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::protocol::{Button, Command, MemoryRegion, Stick};

use super::Link;

/// Records every command and answers reads from per-offset scripts.
///
/// The last scripted reply for an offset repeats forever; unscripted
/// offsets read as no data.
pub(crate) struct MockLink {
    log: Mutex<Vec<(Instant, Command)>>,
    reads: Mutex<FxHashMap<u64, VecDeque<Vec<u8>>>>,
    /// Offsets whose reads never get an answer.
    stalled: Mutex<FxHashSet<u64>>,
    connected: AtomicBool,
    title: String,
}

impl MockLink {
    pub(crate) fn new() -> Self {
        Self::with_title("")
    }

    pub(crate) fn with_title(title: &str) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            reads: Mutex::new(FxHashMap::default()),
            stalled: Mutex::new(FxHashSet::default()),
            connected: AtomicBool::new(true),
            title: title.to_owned(),
        }
    }

    /// Queues replies for reads at `offset`.
    pub(crate) fn script(&self, offset: u64, replies: Vec<Vec<u8>>) {
        self.reads.lock().insert(offset, replies.into());
    }

    /// Leaves every later read at `offset` unanswered.
    pub(crate) fn stall(&self, offset: u64) {
        self.stalled.lock().insert(offset);
    }

    /// Makes every later command fail as a dead link.
    pub(crate) fn kill(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub(crate) fn commands(&self) -> Vec<Command> {
        self.log.lock().iter().map(|(_, c)| c.clone()).collect()
    }

    pub(crate) fn timed_commands(&self) -> Vec<(Instant, Command)> {
        self.log.lock().clone()
    }

    /// Controller input commands only, rendered as wire lines.
    pub(crate) fn inputs(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    Command::Click(_)
                        | Command::Press(_)
                        | Command::Release(_)
                        | Command::SetStick { .. }
                )
            })
            .map(|c| c.to_string())
            .collect()
    }

    fn record(&self, command: Command) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.log.lock().push((Instant::now(), command));
        Ok(())
    }
}

#[async_trait]
impl Link for MockLink {
    async fn read_bytes(
        &self,
        region: MemoryRegion,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>> {
        self.record(Command::Peek {
            region,
            address: offset,
            length,
        })?;

        let stalled = self.stalled.lock().contains(&offset);
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut reads = self.reads.lock();
        let Some(queue) = reads.get_mut(&offset) else {
            return Ok(Vec::new());
        };
        let reply = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(reply)
    }

    async fn write_bytes(&self, region: MemoryRegion, offset: u64, data: &[u8]) -> Result<()> {
        self.record(Command::Poke {
            region,
            address: offset,
            data: data.to_vec(),
        })
    }

    async fn press_button(&self, button: Button) -> Result<()> {
        self.record(Command::Click(button))
    }

    async fn button_down(&self, button: Button) -> Result<()> {
        self.record(Command::Press(button))
    }

    async fn button_up(&self, button: Button) -> Result<()> {
        self.record(Command::Release(button))
    }

    async fn set_stick(&self, stick: Stick, x: i16, y: i16) -> Result<()> {
        self.record(Command::SetStick { stick, x, y })
    }

    async fn title_id(&self) -> Result<String> {
        self.record(Command::GetTitleId)?;
        // Reply arrives on a later poll, like a real round trip.
        tokio::task::yield_now().await;
        Ok(self.title.clone())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.kill();
    }

    async fn reconnect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ten_second_hold_cancelled_at_four_releases_first() {
        let link = MockLink::new();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            canceller.cancel();
        });

        let result = link
            .hold_button(Button::A, Duration::from_secs(10), &cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));

        let log = link.timed_commands();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].1, Command::Press(Button::A));
        assert_eq!(log[1].1, Command::Release(Button::A));
        assert_eq!(log[1].0 - start, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_hold_releases_on_time() {
        let link = MockLink::new();
        let start = Instant::now();

        link.hold_button(Button::B, Duration::from_millis(750), &CancellationToken::new())
            .await
            .expect("hold");

        let log = link.timed_commands();
        assert_eq!(log[1].1, Command::Release(Button::B));
        assert_eq!(log[1].0 - start, Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_scripted_reads_repeat_last() {
        let link = MockLink::new();
        link.script(0x10, vec![vec![0], vec![1]]);

        assert_eq!(read(&link, 0x10).await, vec![0]);
        assert_eq!(read(&link, 0x10).await, vec![1]);
        assert_eq!(read(&link, 0x10).await, vec![1]);
        assert!(read(&link, 0x20).await.is_empty());
    }

    async fn read(link: &MockLink, offset: u64) -> Vec<u8> {
        link.read_bytes(MemoryRegion::Heap, offset, 1)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_read_never_resolves() {
        let link = MockLink::new();
        link.stall(0x10);

        let read = tokio::time::timeout(
            Duration::from_secs(3600),
            link.read_bytes(MemoryRegion::Heap, 0x10, 1),
        )
        .await;
        assert!(read.is_err());
        assert_eq!(link.commands().len(), 1);
    }
}
