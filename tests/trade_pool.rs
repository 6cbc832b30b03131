//! End-to-end pool tests against a fake console over TCP.

mod common;

use std::time::Duration;

use console_trade_pool::{
    DeviceConfig, Error, FailureReason, PayloadRef, Pool, QueueEvent, SubmitterId, Title,
    TradeCode,
};
use tokio::sync::broadcast;

use common::{FakeConsole, fast_timing, init_logging};

const LETS_GO_ID: &str = "010003F003A34000";

fn pool() -> Pool {
    Pool::builder()
        .capacity(5)
        .timing(fast_timing())
        .build()
        .expect("pool")
}

fn device(console: &FakeConsole) -> DeviceConfig {
    DeviceConfig::new("lgpe", "127.0.0.1", Title::LetsGo).with_port(console.port)
}

async fn completion(
    events: &mut broadcast::Receiver<QueueEvent>,
) -> console_trade_pool::CompletionNotice {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            if let QueueEvent::Completed(notice) = events.recv().await.expect("event") {
                return notice;
            }
        }
    })
    .await
    .expect("no completion within 30s")
}

#[tokio::test]
async fn test_trade_over_tcp() -> anyhow::Result<()> {
    init_logging();
    let offsets = Title::LetsGo.profile().offsets;

    let console = FakeConsole::start(LETS_GO_ID).await;
    console.script(offsets.partner_search_flag.offset, vec![vec![1]]);
    console.script(
        offsets.partner_found_flag.offset,
        vec![vec![0], vec![1], vec![1], vec![0]],
    );
    console.script(offsets.partner_identity.offset, vec![vec![0x12, 0x34, 0x56, 0x78]]);

    let pool = pool();
    pool.add_device(device(&console)).await?;
    let mut events = pool.subscribe();

    let descriptor = "cd".repeat(Title::LetsGo.profile().payload_len);
    let result = pool.submit(
        SubmitterId::new(1),
        "red",
        PayloadRef::new("Mewtwo", descriptor),
        TradeCode::new(4321),
    );
    assert!(result.is_success());

    let notice = completion(&mut events).await;
    assert!(notice.success, "failed: {:?}", notice.reason);
    assert_eq!(notice.payload_name.as_deref(), Some("Mewtwo"));

    let lines = console.lines();
    assert_eq!(lines[0], "configure echoCommands 0");
    assert_eq!(lines[1], "getTitleID");
    assert!(lines.iter().any(|l| l == "click PLUS"));

    let poke_prefix = format!("poke 0x{:X} 0xCDCD", offsets.payload.offset);
    assert!(lines.iter().any(|l| l.starts_with(&poke_prefix)));

    let status = &pool.list_device_status()[0];
    assert_eq!(status.completed, 1);
    assert!(status.connected);

    pool.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_wrong_title_rejected() {
    init_logging();
    let console = FakeConsole::start("0100ABF008968000").await;
    let pool = pool();

    let err = tokio_test::assert_err!(pool.add_device(device(&console)).await);
    assert!(matches!(err, Error::TitleMismatch { .. }));
    assert!(pool.list_device_status().is_empty());
}

#[tokio::test]
async fn test_hang_up_fails_item_until_reconnect() {
    init_logging();
    let offsets = Title::LetsGo.profile().offsets;

    let console = FakeConsole::start(LETS_GO_ID).await;
    console.script(offsets.partner_search_flag.offset, vec![vec![1]]);
    console.script(offsets.partner_found_flag.offset, vec![vec![0]]);

    let pool = pool();
    let id = pool.add_device(device(&console)).await.expect("register");
    let mut events = pool.subscribe();

    pool.submit(
        SubmitterId::new(1),
        "blue",
        PayloadRef::new("Eevee", "ab".repeat(Title::LetsGo.profile().payload_len)),
        TradeCode::new(1),
    );

    assert!(
        console
            .wait_for_line(|l| l == "click PLUS", Duration::from_secs(20))
            .await
    );
    console.hang_up();

    let notice = completion(&mut events).await;
    assert_eq!(notice.reason, Some(FailureReason::LinkLost));
    assert!(!pool.list_device_status()[0].connected);

    tokio_test::assert_ok!(pool.reconnect_device(id).await);
    assert!(pool.list_device_status()[0].connected);

    pool.shutdown().await;
}
