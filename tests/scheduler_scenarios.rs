// tests/scheduler_scenarios.rs
mod common;

use common::{
    twitch_record, youtube_record, RecordingSink, ScriptedAdapter, StallingSink, Step,
};
use livewatch::scheduler::BackoffPolicy;
use livewatch::{
    AdapterSet, DedupKey, FailureIsolation, Monitor, MonitorSettings, Platform, Retention,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn settings() -> MonitorSettings {
    MonitorSettings::new("Celeste", Duration::from_secs(60))
}

fn tuple(s: &str, t: &str, p: &str) -> (String, String, String) {
    (s.to_string(), t.to_string(), p.to_string())
}

#[tokio::test]
async fn same_record_on_two_ticks_notifies_once() {
    let sink = RecordingSink::new();
    let adapters = AdapterSet::new().with(Box::new(ScriptedAdapter::always(
        Platform::Twitch,
        vec![twitch_record("Ada", "123", "Live!")],
    )));
    let mut monitor = Monitor::new(adapters, sink.clone(), settings());

    let r1 = monitor.run_tick().await;
    let r2 = monitor.run_tick().await;

    assert_eq!(sink.calls(), vec![tuple("Ada", "Live!", "Twitch")]);
    assert_eq!(r1.notified.len(), 1);
    assert_eq!(r2.notified.len(), 0);
    assert_eq!(r2.duplicates, 1);
}

#[tokio::test]
async fn repeated_record_within_one_batch_notifies_once() {
    let sink = RecordingSink::new();
    let rec = twitch_record("Ada", "123", "Live!");
    let adapters = AdapterSet::new().with(Box::new(ScriptedAdapter::always(
        Platform::Twitch,
        vec![rec.clone(), rec.clone(), rec],
    )));
    let mut monitor = Monitor::new(adapters, sink.clone(), settings());

    for _ in 0..5 {
        monitor.run_tick().await;
    }
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn failing_platform_does_not_block_the_other_and_is_retried() {
    let sink = RecordingSink::new();
    let twitch = ScriptedAdapter::new(
        Platform::Twitch,
        vec![Step::Fail, Step::Records(vec![twitch_record("Ada", "1", "back")])],
    );
    let twitch_calls = twitch.call_counter();
    let youtube =
        ScriptedAdapter::always(Platform::YouTube, vec![youtube_record("Chan", "v1", "yt")]);
    let adapters = AdapterSet::new().with(Box::new(twitch)).with(Box::new(youtube));
    let mut monitor = Monitor::new(adapters, sink.clone(), settings());

    let r1 = monitor.run_tick().await;
    assert_eq!(r1.failed.len(), 1);
    assert_eq!(r1.failed[0].0, Platform::Twitch);
    assert_eq!(sink.calls(), vec![tuple("Chan", "yt", "YouTube")]);

    let r2 = monitor.run_tick().await;
    assert_eq!(twitch_calls.load(Ordering::SeqCst), 2);
    assert!(r2.failed.is_empty());
    assert_eq!(r2.notified.len(), 1);
    assert_eq!(r2.notified[0].streamer_name, "Ada");
}

#[tokio::test]
async fn identical_native_ids_on_different_platforms_both_notify() {
    let sink = RecordingSink::new();
    let adapters = AdapterSet::new()
        .with(Box::new(ScriptedAdapter::always(
            Platform::Twitch,
            vec![twitch_record("Ada", "42", "a")],
        )))
        .with(Box::new(ScriptedAdapter::always(
            Platform::YouTube,
            vec![youtube_record("Chan", "42", "b")],
        )));
    let mut monitor = Monitor::new(adapters, sink.clone(), settings());

    let r = monitor.run_tick().await;
    assert_eq!(r.notified.len(), 2);
    assert_eq!(
        sink.calls(),
        vec![tuple("Ada", "a", "Twitch"), tuple("Chan", "b", "YouTube")]
    );
}

#[tokio::test]
async fn empty_result_is_quiet() {
    let sink = RecordingSink::new();
    let adapters =
        AdapterSet::new().with(Box::new(ScriptedAdapter::always(Platform::Twitch, vec![])));
    let mut monitor = Monitor::new(adapters, sink.clone(), settings());

    let r = monitor.run_tick().await;
    assert!(sink.calls().is_empty());
    assert!(r.failed.is_empty());
    assert_eq!(r.observed, 0);
}

#[tokio::test]
async fn failing_sink_still_marks_broadcast_notified() {
    let sink = RecordingSink::failing();
    let adapters = AdapterSet::new().with(Box::new(ScriptedAdapter::always(
        Platform::Twitch,
        vec![twitch_record("Ada", "123", "Live!")],
    )));
    let mut monitor = Monitor::new(adapters, sink.clone(), settings());

    monitor.run_tick().await;
    assert!(monitor
        .store()
        .contains(&DedupKey::scoped(Platform::Twitch, "Ada", "123")));
    monitor.run_tick().await;
    monitor.run_tick().await;
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn malformed_record_is_dropped_alone() {
    let sink = RecordingSink::new();
    let adapters = AdapterSet::new().with(Box::new(ScriptedAdapter::always(
        Platform::Twitch,
        vec![
            serde_json::json!({ "id": "1", "title": "no user" }),
            twitch_record("Bo", "2", "ok"),
        ],
    )));
    let mut monitor = Monitor::new(adapters, sink.clone(), settings());

    let r = monitor.run_tick().await;
    assert_eq!(r.normalization_errors, 1);
    assert_eq!(sink.calls(), vec![tuple("Bo", "ok", "Twitch")]);
}

#[tokio::test]
async fn shared_boundary_skips_remaining_platforms_for_the_tick() {
    let sink = RecordingSink::new();
    let youtube =
        ScriptedAdapter::always(Platform::YouTube, vec![youtube_record("Chan", "v1", "yt")]);
    let yt_calls = youtube.call_counter();
    let adapters = AdapterSet::new()
        .with(Box::new(ScriptedAdapter::new(
            Platform::Twitch,
            vec![Step::Fail, Step::Records(vec![])],
        )))
        .with(Box::new(youtube));
    let mut s = settings();
    s.isolation = FailureIsolation::SharedBoundary;
    let mut monitor = Monitor::new(adapters, sink.clone(), s);

    let r1 = monitor.run_tick().await;
    assert_eq!(r1.skipped, vec![Platform::YouTube]);
    assert_eq!(yt_calls.load(Ordering::SeqCst), 0);
    assert!(sink.calls().is_empty());

    monitor.run_tick().await;
    assert_eq!(yt_calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn backoff_skips_ticks_and_resets_on_success() {
    let sink = RecordingSink::new();
    // fail, fail, fail, then succeed forever
    let twitch = ScriptedAdapter::new(
        Platform::Twitch,
        vec![
            Step::Fail,
            Step::Fail,
            Step::Fail,
            Step::Records(vec![twitch_record("Ada", "1", "x")]),
        ],
    );
    let calls = twitch.call_counter();
    let mut s = settings();
    s.backoff = Some(BackoffPolicy { max_skip_ticks: 8 });
    let mut monitor = Monitor::new(AdapterSet::new().with(Box::new(twitch)), sink.clone(), s);

    // tick1 fail (skip 0) -> tick2 fail (skip 1) -> tick3 skipped -> tick4 fail (skip 3)
    // -> ticks 5..7 skipped -> tick8 success
    let mut queried_on = Vec::new();
    for _ in 0..9 {
        let before = calls.load(Ordering::SeqCst);
        let r = monitor.run_tick().await;
        if calls.load(Ordering::SeqCst) > before {
            queried_on.push(r.tick);
        }
    }
    assert_eq!(queried_on, vec![1, 2, 4, 8, 9]);
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn grace_period_forgets_ended_broadcast() {
    let sink = RecordingSink::new();
    let rec = twitch_record("Ada", "1", "x");
    let twitch = ScriptedAdapter::new(
        Platform::Twitch,
        vec![
            Step::Records(vec![rec.clone()]),
            Step::Records(vec![]),
            Step::Records(vec![]),
            Step::Records(vec![rec]),
        ],
    );
    let mut s = settings();
    s.retention = Retention::GracePeriod { ticks: 1 };
    let mut monitor = Monitor::new(AdapterSet::new().with(Box::new(twitch)), sink.clone(), s);

    monitor.run_tick().await; // seen at 1
    monitor.run_tick().await; // 2: within grace
    assert_eq!(monitor.store().len(), 1);
    let r3 = monitor.run_tick().await; // 3: evicted
    assert_eq!(r3.evicted, 1);
    monitor.run_tick().await; // 4: reappears, alerted again
    assert_eq!(sink.calls().len(), 2);
}

#[tokio::test]
async fn outage_does_not_evict_keys() {
    let sink = RecordingSink::new();
    let rec = twitch_record("Ada", "1", "x");
    let twitch = ScriptedAdapter::new(
        Platform::Twitch,
        vec![
            Step::Records(vec![rec.clone()]),
            Step::Fail,
            Step::Fail,
            Step::Fail,
            Step::Records(vec![rec]),
        ],
    );
    let mut s = settings();
    s.retention = Retention::GracePeriod { ticks: 1 };
    let mut monitor = Monitor::new(AdapterSet::new().with(Box::new(twitch)), sink.clone(), s);

    for _ in 0..5 {
        monitor.run_tick().await;
    }
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn empty_answer_after_outage_is_still_within_grace() {
    let sink = RecordingSink::new();
    let rec = twitch_record("Ada", "1", "x");
    let twitch = ScriptedAdapter::new(
        Platform::Twitch,
        vec![
            Step::Records(vec![rec.clone()]),
            Step::Fail,
            Step::Fail,
            Step::Fail,
            Step::Records(vec![]),
            Step::Records(vec![rec]),
        ],
    );
    let mut s = settings();
    s.retention = Retention::GracePeriod { ticks: 1 };
    let mut monitor = Monitor::new(AdapterSet::new().with(Box::new(twitch)), sink.clone(), s);

    let mut evicted = Vec::new();
    for _ in 0..6 {
        evicted.push(monitor.run_tick().await.evicted);
    }
    assert_eq!(evicted, vec![0; 6]);
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_sink_does_not_hold_up_other_platforms() {
    let sink = StallingSink::new(Duration::from_secs(16));
    let records: Vec<_> = (0..100)
        .map(|i| twitch_record(&format!("user{i}"), &i.to_string(), "x"))
        .collect();
    let youtube =
        ScriptedAdapter::always(Platform::YouTube, vec![youtube_record("Chan", "v1", "yt")]);
    let yt_calls = youtube.call_counter();
    let adapters = AdapterSet::new()
        .with(Box::new(ScriptedAdapter::always(Platform::Twitch, records)))
        .with(Box::new(youtube));
    let mut monitor = Monitor::new(adapters, sink.clone(), settings());

    let started = tokio::time::Instant::now();
    let r = monitor.run_tick().await;
    let took = started.elapsed();

    assert_eq!(yt_calls.load(Ordering::SeqCst), 1);
    assert_eq!(r.notified.len(), 101);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 101);
    assert_eq!(r.pending_deliveries, 0);
    assert!(took < Duration::from_secs(60), "tick took {took:?}");
}

#[tokio::test(start_paused = true)]
async fn hung_sink_is_cut_off_at_delivery_timeout() {
    let sink = StallingSink::new(Duration::from_secs(3600));
    let adapters = AdapterSet::new().with(Box::new(ScriptedAdapter::always(
        Platform::Twitch,
        vec![twitch_record("Ada", "1", "x")],
    )));
    let mut s = settings();
    s.delivery_timeout = Duration::from_secs(10);
    let mut monitor = Monitor::new(adapters, sink.clone(), s);

    let started = tokio::time::Instant::now();
    monitor.run_tick().await;
    assert!(started.elapsed() <= Duration::from_secs(11));

    // the broadcast stays known even though its alert never landed
    monitor.run_tick().await;
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn run_until_finishes_tick_then_stops() {
    let sink = RecordingSink::new();
    let twitch = ScriptedAdapter::always(Platform::Twitch, vec![twitch_record("Ada", "1", "x")]);
    let calls = twitch.call_counter();
    let mut monitor = Monitor::new(
        AdapterSet::new().with(Box::new(twitch)),
        sink.clone(),
        settings(),
    );

    // Stop during the third sleep.
    monitor
        .run_until(tokio::time::sleep(Duration::from_secs(150)))
        .await;

    assert_eq!(monitor.ticks(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn monitors_do_not_share_state() {
    let make = || {
        AdapterSet::new().with(Box::new(ScriptedAdapter::always(
            Platform::Twitch,
            vec![twitch_record("Ada", "1", "x")],
        )))
    };
    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    let mut a = Monitor::new(make(), sink_a.clone(), settings());
    let mut b = Monitor::new(make(), sink_b.clone(), settings());

    a.run_tick().await;
    b.run_tick().await;
    assert_eq!(sink_a.calls().len(), 1);
    assert_eq!(sink_b.calls().len(), 1);
}
