//! End-to-end ticks against a simulated paging network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hallpager_core::config::{BroadcastDelayPolicy, CallConfig, WindowMode};
use hallpager_core::{HallPagerConfig, HallPagerError, Result, TalkEvent, Variant};
use hallpager_dispatch::{
    CallBuilder, DeliveryOutcome, DeliveryQueue, Dispatcher, EntryStatus, Fingerprint,
    FingerprintStore, PagingTransport, QueueSettings, RecipientDirectory, ScheduleSource, SimulatedTransport,
    WindowMatcher,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 12, 27, 10, 0, 0).unwrap()
}

fn grand_opening() -> TalkEvent {
    // now + 10 minutes, published in +01:00.
    TalkEvent::new("t1", "Grand opening", "One", "2026-12-27T11:10:00+01:00")
}

fn settings(inter_message_ms: u64) -> QueueSettings {
    QueueSettings {
        max_retries: 3,
        retry_delay: StdDuration::from_millis(100),
        inter_message_delay: StdDuration::from_millis(inter_message_ms),
        broadcast_extra_delay: StdDuration::ZERO,
        broadcast_policy: BroadcastDelayPolicy::Both,
    }
}

fn dispatcher(
    store_path: &std::path::Path,
    transport: Arc<SimulatedTransport>,
    queue: QueueSettings,
) -> Dispatcher {
    let rooms = HashMap::from([
        ("One".to_string(), "1001".to_string()),
        ("Ground".to_string(), "1002".to_string()),
        ("Zero".to_string(), "1003".to_string()),
        ("Fuse".to_string(), "1004".to_string()),
    ]);
    let transport: Arc<dyn PagingTransport> = transport;
    Dispatcher::new(
        WindowMatcher::new(15, WindowMode::Tolerant, 30),
        CallBuilder::new(RecipientDirectory::new(rooms, "1000"), &CallConfig::default()),
        FingerprintStore::open(store_path, 3 * 3600, 1 << 20),
        DeliveryQueue::new(transport, queue),
        false,
        true,
    )
}

#[tokio::test(start_paused = true)]
async fn test_grand_opening_is_paged_once() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("sent.log");
    let transport = Arc::new(SimulatedTransport::new());

    let mut first = dispatcher(&store_path, transport.clone(), settings(1000));
    let summary = first.run_tick(&[grand_opening()], now()).await;
    assert_eq!(summary.due, 1);
    assert_eq!(summary.enqueued, 2);
    assert_eq!(summary.delivered, 2);

    let attempts = transport.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts.iter().all(|c| c.text == "11:10, One, Grand opening"));
    assert_eq!(attempts[0].recipient_id, "1001");
    assert_eq!(attempts[1].recipient_id, "1000");

    // A fresh process on the next tick sees the persisted fingerprints.
    let mut second = dispatcher(&store_path, transport.clone(), settings(1000));
    let summary = second.run_tick(&[grand_opening()], now()).await;
    assert_eq!(summary.duplicates, 2);
    assert_eq!(summary.delivered, 0);
    assert_eq!(transport.attempt_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_talk_listed_twice_is_paged_once() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(SimulatedTransport::new());
    let mut d = dispatcher(&dir.path().join("sent.log"), transport.clone(), settings(0));
    let summary = d.run_tick(&[grand_opening(), grand_opening()], now()).await;
    assert_eq!(summary.due, 2);
    assert_eq!(summary.enqueued, 2);
    assert_eq!(summary.duplicates, 2);
    assert_eq!(summary.delivered, 2);
    assert_eq!(transport.attempt_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_variants_dedupe_independently() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("sent.log");
    {
        let mut store = FingerprintStore::open(&store_path, 3 * 3600, 1 << 20);
        store.mark_sent(&Fingerprint::compute(&grand_opening(), Variant::Room), now());
    }

    let transport = Arc::new(SimulatedTransport::new());
    let mut d = dispatcher(&store_path, transport.clone(), settings(0));
    let summary = d.run_tick(&[grand_opening()], now()).await;
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.delivered, 1);
    assert_eq!(transport.attempts()[0].recipient_id, "1000");

    // And the other way round.
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("sent.log");
    {
        let mut store = FingerprintStore::open(&store_path, 3 * 3600, 1 << 20);
        store.mark_sent(&Fingerprint::compute(&grand_opening(), Variant::Broadcast), now());
    }
    let transport = Arc::new(SimulatedTransport::new());
    let mut d = dispatcher(&store_path, transport.clone(), settings(0));
    let summary = d.run_tick(&[grand_opening()], now()).await;
    assert_eq!(summary.delivered, 1);
    assert_eq!(transport.attempts()[0].recipient_id, "1001");
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_call_contributes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(SimulatedTransport::with_script(vec![
        DeliveryOutcome::Failure("HTTP 503".into());
        4
    ]));
    let mut d = dispatcher(&dir.path().join("sent.log"), transport.clone(), settings(0));
    let summary = d.run_tick(&[grand_opening()], now()).await;

    // Room call: 1 + 3 retries, all failing. Broadcast call: first try.
    assert_eq!(transport.attempt_count(), 5);
    assert_eq!(summary.delivered, 1);
    assert_eq!(d.store().len(), 1);
    let finished = d.queue().finished();
    assert_eq!(finished[0].status, EntryStatus::Failed);
    assert_eq!(finished[0].retry_count, 3);
    assert_eq!(finished[1].status, EntryStatus::Sent);
}

#[tokio::test(start_paused = true)]
async fn test_expired_fingerprints_page_again() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("sent.log");
    {
        let mut store = FingerprintStore::open(&store_path, 3 * 3600, 1 << 20);
        let old = now() - Duration::hours(4);
        store.mark_sent(&Fingerprint::compute(&grand_opening(), Variant::Room), old);
        store.mark_sent(&Fingerprint::compute(&grand_opening(), Variant::Broadcast), old);
    }
    let transport = Arc::new(SimulatedTransport::new());
    let mut d = dispatcher(&store_path, transport, settings(0));
    let summary = d.run_tick(&[grand_opening()], now()).await;
    assert_eq!(summary.duplicates, 0);
    assert_eq!(summary.delivered, 2);

    let content = std::fs::read_to_string(&store_path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.lines().all(|l| l.ends_with(&format!("|{}", now().timestamp()))));
}

#[tokio::test(start_paused = true)]
async fn test_whole_tick_shares_one_paced_drain() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(SimulatedTransport::new());
    let mut d = dispatcher(&dir.path().join("sent.log"), transport.clone(), settings(1000));
    let talks = [
        grand_opening(),
        TalkEvent::new("t2", "Second", "Zero", "2026-12-27T11:05:00+01:00"),
    ];
    let started = tokio::time::Instant::now();
    let summary = d.run_tick(&talks, now()).await;
    assert_eq!(summary.delivered, 4);
    assert!(started.elapsed() >= StdDuration::from_millis(3 * 1000));
}

struct BrokenSource;

#[async_trait]
impl ScheduleSource for BrokenSource {
    fn describe(&self) -> String {
        "broken".into()
    }

    async fn fetch(&self) -> Result<Vec<TalkEvent>> {
        Err(HallPagerError::Schedule("HTTP 502".into()))
    }
}

#[tokio::test]
async fn test_schedule_failure_aborts_tick() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(SimulatedTransport::new());
    let mut d = dispatcher(&dir.path().join("sent.log"), transport.clone(), settings(0));
    let result = d.run_from_source(&BrokenSource, now()).await;
    assert!(matches!(result, Err(HallPagerError::Schedule(_))));
    assert_eq!(transport.attempt_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_from_config_with_file_source() {
    let dir = tempfile::tempdir().unwrap();
    let schedule = dir.path().join("schedule.json");
    std::fs::write(
        &schedule,
        r#"[{"id": "t1", "title": "Grand opening", "room": "One", "startTime": "2026-12-27T11:10:00+01:00"},
            {"id": "t2", "title": "Side event", "room": "Workshop 3", "startTime": "2026-12-27T11:10:00+01:00"}]"#,
    )
    .unwrap();

    let config = HallPagerConfig::from_toml(&format!(
        r#"
        [schedule]
        file = "{}"

        [delivery]
        inter_message_delay_ms = 10
        broadcast_extra_delay_ms = 0

        [recipients]
        broadcast = "1000"
        [recipients.rooms]
        One = "1001"

        [store]
        path = "{}"
        "#,
        schedule.display(),
        dir.path().join("sent.log").display()
    ))
    .unwrap();
    config.validate().unwrap();

    let transport = Arc::new(SimulatedTransport::new());
    let source = hallpager_dispatch::schedule::source_from_config(&config.schedule).unwrap();
    let mut d = Dispatcher::from_config(&config, transport.clone(), true);
    let summary = d.run_from_source(source.as_ref(), now()).await.unwrap();
    assert_eq!(summary.talks, 2);
    assert_eq!(summary.large_room, 1);
    assert_eq!(summary.delivered, 2);
}
