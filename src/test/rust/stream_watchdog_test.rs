use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use stream_watchdog::{
    AttentionEdge, AttentionSignal, AttentionTracker, BackoffPolicy, Config, MetricsReporter,
    RelayClient, RelayHealth, StreamSupervisor, StreamTarget, StreamTransport, SupervisorLifecycle,
    SupervisorOptions, SupervisorState, TransportEvent, ViewSink, WarmupStatus, WatchdogError,
};

// ---- Test doubles ----------------------------------------------------------

#[derive(Clone, Copy)]
enum Outcome {
    Load,
    Fail,
    Silent,
}

/// Transport that replays a script of outcomes, one per start call
#[derive(Clone)]
struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Outcome>>>,
    starts: Arc<Mutex<Vec<(Url, Instant)>>>,
    events: mpsc::Sender<TransportEvent>,
}

impl ScriptedTransport {
    fn new(script: Vec<Outcome>, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            starts: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    fn start_times(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    fn start_urls(&self) -> Vec<Url> {
        self.starts.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }
}

impl StreamTransport for ScriptedTransport {
    fn start(&mut self, url: Url) -> stream_watchdog::Result<()> {
        self.starts.lock().unwrap().push((url, Instant::now()));
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Silent);
        match outcome {
            Outcome::Load => {
                let _ = self.events.try_send(TransportEvent::Loaded);
            }
            Outcome::Fail => {
                let _ = self.events.try_send(TransportEvent::Failed {
                    reason: "connection refused".to_string(),
                });
            }
            Outcome::Silent => {}
        }
        Ok(())
    }

    fn stop(&mut self) {}

    fn is_producing_frames(&self) -> bool {
        false
    }
}

struct FakeRelay {
    warmup_ok: bool,
    health_calls: AtomicUsize,
}

impl FakeRelay {
    fn healthy() -> Arc<Self> {
        Arc::new(Self {
            warmup_ok: true,
            health_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl RelayClient for FakeRelay {
    async fn warm_up(&self, _query: &str) -> stream_watchdog::Result<WarmupStatus> {
        if self.warmup_ok {
            Ok(WarmupStatus {
                status: "success".to_string(),
                message: None,
                running: true,
                has_last_frame: true,
            })
        } else {
            Err(WatchdogError::RelayRequestFailed("warmup down".to_string()))
        }
    }

    async fn health(&self) -> stream_watchdog::Result<RelayHealth> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RelayHealth { active_relays: 1 })
    }
}

#[derive(Clone, Default)]
struct RecordingView {
    shown: Arc<Mutex<Vec<&'static str>>>,
}

impl ViewSink for RecordingView {
    fn show_loading(&self) {
        self.shown.lock().unwrap().push("loading");
    }
    fn show_active(&self) {
        self.shown.lock().unwrap().push("active");
    }
    fn show_error(&self) {
        self.shown.lock().unwrap().push("error");
    }
    fn show_idle(&self) {
        self.shown.lock().unwrap().push("idle");
    }
}

/// Lossless record of reported states; the watch channel only keeps the
/// latest value, so sequence assertions go through here
#[derive(Clone, Default)]
struct RecordingMetrics {
    states: Arc<Mutex<Vec<SupervisorState>>>,
}

impl MetricsReporter for RecordingMetrics {
    fn report_state_change(&self, state: &SupervisorState) {
        self.states.lock().unwrap().push(*state);
    }
    fn report_reconnect_attempt(&self) {}
    fn report_backoff(&self, _delay_secs: f64) {}
    fn report_producing(&self, _producing: bool) {}
    fn report_uptime(&self, _uptime_secs: f64) {}
}

fn build_supervisor(
    script: Vec<Outcome>,
    relay: Arc<FakeRelay>,
    view: RecordingView,
) -> (StreamSupervisor, ScriptedTransport, RecordingMetrics) {
    let (events_tx, events_rx) = StreamSupervisor::event_channel();
    let transport = ScriptedTransport::new(script, events_tx);
    let metrics = RecordingMetrics::default();
    let supervisor = StreamSupervisor::new(
        Box::new(transport.clone()),
        relay,
        Arc::new(view),
        Arc::new(metrics.clone()),
        StreamTarget::new("http://localhost:8443/relay/stream_proxy?host=cam1").unwrap(),
        SupervisorOptions::default(),
        events_rx,
    );
    (supervisor, transport, metrics)
}

// ---- Supervisor scenarios (virtual clock) ----------------------------------

#[tokio::test(start_paused = true)]
async fn test_startup_reaches_active_through_warming_and_loading() {
    let view = RecordingView::default();
    let (supervisor, transport, metrics) =
        build_supervisor(vec![Outcome::Load], FakeRelay::healthy(), view.clone());
    let handle = supervisor.handle();
    let mut states = supervisor.subscribe_state();

    let task = tokio::spawn(supervisor.run());

    states
        .wait_for(|s| *s == SupervisorState::Active)
        .await
        .unwrap();

    assert_eq!(
        metrics.states.lock().unwrap().as_slice(),
        &[
            SupervisorState::Warming,
            SupervisorState::Loading,
            SupervisorState::Active,
        ]
    );

    let urls = transport.start_urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].query_pairs().any(|(k, _)| k == "t"));
    assert!(view.shown.lock().unwrap().contains(&"active"));

    handle.shutdown().await;
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failure_ladder_waits_grow_until_failed() {
    let view = RecordingView::default();
    let (supervisor, transport, _metrics) = build_supervisor(
        vec![Outcome::Fail; 5],
        FakeRelay::healthy(),
        view.clone(),
    );
    let handle = supervisor.handle();
    let mut states = supervisor.subscribe_state();

    let task = tokio::spawn(supervisor.run());

    states
        .wait_for(|s| *s == SupervisorState::Failed)
        .await
        .unwrap();

    let starts = transport.start_times();
    assert_eq!(starts.len(), 5);

    let expected_waits = [2000u64, 3000, 4500, 6750];
    for (i, expected) in expected_waits.iter().enumerate() {
        let gap = starts[i + 1].duration_since(starts[i]);
        assert_eq!(
            gap,
            Duration::from_millis(*expected),
            "wait before start {} should be {}ms",
            i + 2,
            expected
        );
    }

    assert!(view.shown.lock().unwrap().contains(&"error"));

    handle.shutdown().await;
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_load_timeout_schedules_retry() {
    let view = RecordingView::default();
    let (supervisor, transport, _metrics) = build_supervisor(
        vec![Outcome::Silent, Outcome::Load],
        FakeRelay::healthy(),
        view,
    );
    let handle = supervisor.handle();
    let mut states = supervisor.subscribe_state();

    let task = tokio::spawn(supervisor.run());

    states
        .wait_for(|s| matches!(s, SupervisorState::Retrying { attempt: 1 }))
        .await
        .unwrap();
    states
        .wait_for(|s| *s == SupervisorState::Active)
        .await
        .unwrap();

    let starts = transport.start_times();
    assert_eq!(starts.len(), 2);
    // 20s load timeout plus the 2s initial retry delay
    assert_eq!(
        starts[1].duration_since(starts[0]),
        Duration::from_millis(22_000)
    );

    handle.shutdown().await;
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_inattentive_supervisor_never_starts_or_polls() {
    let relay = FakeRelay::healthy();
    let view = RecordingView::default();
    let (supervisor, transport, _metrics) =
        build_supervisor(vec![Outcome::Silent], relay.clone(), view);
    let handle = supervisor.handle();
    let mut states = supervisor.subscribe_state();

    let task = tokio::spawn(supervisor.run());

    // Hide the page before the warm-up delay elapses
    handle.page_visible(false).await;

    // Long enough to cover the warm-up delay and a health poll tick
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(transport.start_times().is_empty());
    assert_eq!(relay.health_calls.load(Ordering::SeqCst), 0);

    // Attention returns: exactly one start
    handle.page_visible(true).await;
    states
        .wait_for(|s| *s == SupervisorState::Loading)
        .await
        .unwrap();
    assert_eq!(transport.start_times().len(), 1);

    handle.shutdown().await;
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_recovers_failed_stream() {
    let view = RecordingView::default();
    let mut script = vec![Outcome::Fail; 5];
    script.push(Outcome::Load);
    let (supervisor, transport, _metrics) = build_supervisor(script, FakeRelay::healthy(), view);
    let handle = supervisor.handle();
    let mut states = supervisor.subscribe_state();

    let task = tokio::spawn(supervisor.run());

    states
        .wait_for(|s| *s == SupervisorState::Failed)
        .await
        .unwrap();

    handle.reconnect().await;
    states
        .wait_for(|s| *s == SupervisorState::Active)
        .await
        .unwrap();

    let urls = transport.start_urls();
    assert_eq!(urls.len(), 6);
    // Every attempt carries its own cache-busting parameter
    let busters: Vec<String> = urls
        .iter()
        .map(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "t")
                .map(|(_, v)| v.into_owned())
                .unwrap()
        })
        .collect();
    let mut unique = busters.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), busters.len());

    handle.shutdown().await;
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_warmup_still_starts_after_longer_delay() {
    let relay = Arc::new(FakeRelay {
        warmup_ok: false,
        health_calls: AtomicUsize::new(0),
    });
    let view = RecordingView::default();
    let (supervisor, transport, _metrics) = build_supervisor(vec![Outcome::Silent], relay, view);
    let handle = supervisor.handle();
    let mut states = supervisor.subscribe_state();

    let start = Instant::now();
    let task = tokio::spawn(supervisor.run());

    states
        .wait_for(|s| *s == SupervisorState::Loading)
        .await
        .unwrap();

    let starts = transport.start_times();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].duration_since(start), Duration::from_millis(1000));

    handle.shutdown().await;
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_goes_idle_from_active() {
    let view = RecordingView::default();
    let (supervisor, _transport, _metrics) =
        build_supervisor(vec![Outcome::Load], FakeRelay::healthy(), view.clone());
    let handle = supervisor.handle();
    let mut states = supervisor.subscribe_state();

    let task = tokio::spawn(supervisor.run());

    states
        .wait_for(|s| *s == SupervisorState::Active)
        .await
        .unwrap();

    handle.shutdown().await;
    task.await.unwrap().unwrap();

    assert!(view.shown.lock().unwrap().contains(&"idle"));
}

// ---- Domain smoke tests ----------------------------------------------------

#[test]
fn test_backoff_policy_default() {
    let policy = BackoffPolicy::default();
    assert_eq!(policy.initial_delay(), Duration::from_secs(2));
    assert_eq!(policy.max_delay(), Duration::from_secs(30));
    assert_eq!(policy.multiplier(), 1.5);
    assert_eq!(policy.max_retries(), 5);
}

#[test]
fn test_backoff_growth_and_cap() {
    let policy = BackoffPolicy::default();

    let mut delay = policy.initial_delay();
    let mut previous = delay;
    for _ in 0..20 {
        delay = policy.next_delay(delay);
        assert!(delay >= previous);
        assert!(delay <= Duration::from_secs(30));
        previous = delay;
    }
    assert_eq!(delay, Duration::from_secs(30));
}

#[test]
fn test_backoff_rejects_invalid_multiplier() {
    let result = BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(30), 1.0, 5);
    assert!(result.is_err());
}

#[test]
fn test_lifecycle_transitions() {
    let mut lifecycle = SupervisorLifecycle::new();
    assert_eq!(*lifecycle.current_state(), SupervisorState::Idle);

    lifecycle.transition_to_warming();
    lifecycle.transition_to_loading(Some("initial start".to_string()));
    lifecycle.transition_to_active();
    assert_eq!(*lifecycle.current_state(), SupervisorState::Active);
    assert_eq!(lifecycle.transition_count(), 3);

    lifecycle.transition_to_retrying(1, Some("connection refused".to_string()));
    assert!(matches!(
        *lifecycle.current_state(),
        SupervisorState::Retrying { attempt: 1 }
    ));
}

#[test]
fn test_attention_tracker_edges() {
    let mut tracker = AttentionTracker::new();
    assert!(tracker.should_be_active());

    assert_eq!(
        tracker.apply(AttentionSignal::WindowFocused(false)),
        Some(AttentionEdge::Lost)
    );
    assert_eq!(tracker.apply(AttentionSignal::PageVisible(false)), None);
    assert_eq!(tracker.apply(AttentionSignal::PageVisible(true)), None);
    assert_eq!(
        tracker.apply(AttentionSignal::WindowFocused(true)),
        Some(AttentionEdge::Regained)
    );

    // Viewport is a trigger, never a gate
    assert_eq!(tracker.apply(AttentionSignal::InViewport(false)), None);
    assert!(tracker.should_be_active());
}

#[test]
fn test_stream_target_validation() {
    assert!(StreamTarget::new("http://localhost:8443/relay/stream_proxy").is_ok());
    assert!(StreamTarget::new("rtsp://localhost:8554/cam1").is_err());
}

// ---- Config validation -----------------------------------------------------

fn base_config() -> Config {
    Config::parse_from(["stream-watchdog"])
}

#[test]
fn test_config_defaults_are_valid() {
    assert!(base_config().validate().is_ok());
}

#[test]
fn test_config_rejects_bad_urls() {
    let mut config = base_config();
    config.stream_url = "rtsp://localhost/cam1".to_string();
    assert!(config.validate().is_err());

    let mut config = base_config();
    config.relay_url = "file:///tmp/relay".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_rejects_bad_backoff() {
    let mut config = base_config();
    config.retry_multiplier = 1.0;
    assert!(config.validate().is_err());

    let mut config = base_config();
    config.retry_initial_delay_ms = 0;
    assert!(config.validate().is_err());

    let mut config = base_config();
    config.retry_max_delay_ms = 100;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_rejects_privileged_metrics_port() {
    let mut config = base_config();
    config.metrics_port = 80;
    assert!(config.validate().is_err());

    let mut config = base_config();
    config.metrics_port = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_converts_to_domain_values() {
    let config = base_config();
    let policy = config.to_backoff_policy().unwrap();
    assert_eq!(policy.initial_delay(), Duration::from_millis(2000));
    assert_eq!(policy.max_retries(), 5);

    let timing = config.to_timing();
    assert_eq!(timing.load_timeout, Duration::from_secs(20));
    assert_eq!(timing.health_interval, Duration::from_secs(45));

    assert!(config.to_stream_target().is_ok());
}
