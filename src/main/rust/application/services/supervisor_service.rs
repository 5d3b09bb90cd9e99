use std::future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::entities::SupervisorLifecycle;
use crate::domain::errors::Result;
use crate::domain::ports::{MetricsReporter, RelayClient, StreamTransport, TransportEvent, ViewSink};
use crate::domain::value_objects::{
    AttentionEdge, AttentionSignal, AttentionState, AttentionTracker, BackoffPolicy,
    HealthSnapshot, RetryState, StreamTarget, SupervisorState, SupervisorTiming,
};

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Tunable knobs for [`StreamSupervisor`]
#[derive(Debug, Clone, Default)]
pub struct SupervisorOptions {
    pub backoff: BackoffPolicy,
    pub timing: SupervisorTiming,
    /// Tear the stream down on attention loss instead of leaving it running
    pub pause_when_hidden: bool,
}

enum Command {
    Attention(AttentionSignal),
    Reconnect,
    Shutdown,
}

/// Cloneable command endpoint for a running supervisor.
///
/// These calls replace the ambient page-lifecycle hooks of a browser
/// embedding: the owner pushes visibility, focus and viewport changes
/// explicitly. All sends are fire-and-forget.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Command>,
}

impl SupervisorHandle {
    pub async fn attention(&self, signal: AttentionSignal) {
        let _ = self.tx.send(Command::Attention(signal)).await;
    }

    pub async fn page_visible(&self, visible: bool) {
        self.attention(AttentionSignal::PageVisible(visible)).await;
    }

    pub async fn window_focused(&self, focused: bool) {
        self.attention(AttentionSignal::WindowFocused(focused)).await;
    }

    pub async fn in_viewport(&self, in_viewport: bool) {
        self.attention(AttentionSignal::InViewport(in_viewport)).await;
    }

    /// UI-initiated retry; also used after a restore-from-cache
    pub async fn reconnect(&self) {
        let _ = self.tx.send(Command::Reconnect).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

/// Application service orchestrating one stream connection.
///
/// Owns the state machine and consumes every signal source through a single
/// mailbox loop: commands, transport events and timers never run
/// concurrently, so no two transitions can race and duplicate `start` calls
/// on the transport are structurally impossible.
pub struct StreamSupervisor {
    transport: Box<dyn StreamTransport>,
    relay: Arc<dyn RelayClient>,
    view: Arc<dyn ViewSink>,
    metrics: Arc<dyn MetricsReporter>,
    target: StreamTarget,
    backoff: BackoffPolicy,
    timing: SupervisorTiming,
    pause_when_hidden: bool,

    lifecycle: SupervisorLifecycle,
    retry: RetryState,
    attention: AttentionTracker,
    last_health: Option<HealthSnapshot>,
    attempt_serial: u64,
    /// Start requested while attention was away; honored on the next regain
    pending_start: bool,

    warm_deadline: Option<Instant>,
    load_deadline: Option<Instant>,
    retry_deadline: Option<Instant>,

    cmd_tx: mpsc::Sender<Command>,
    cmd_rx: mpsc::Receiver<Command>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    state_tx: watch::Sender<SupervisorState>,
}

impl StreamSupervisor {
    pub fn new(
        transport: Box<dyn StreamTransport>,
        relay: Arc<dyn RelayClient>,
        view: Arc<dyn ViewSink>,
        metrics: Arc<dyn MetricsReporter>,
        target: StreamTarget,
        options: SupervisorOptions,
        transport_rx: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(SupervisorState::Idle);
        let retry = RetryState::new(&options.backoff);

        Self {
            transport,
            relay,
            view,
            metrics,
            target,
            backoff: options.backoff,
            timing: options.timing,
            pause_when_hidden: options.pause_when_hidden,
            lifecycle: SupervisorLifecycle::new(),
            retry,
            attention: AttentionTracker::new(),
            last_health: None,
            attempt_serial: 0,
            pending_start: false,
            warm_deadline: None,
            load_deadline: None,
            retry_deadline: None,
            cmd_tx,
            cmd_rx,
            transport_rx,
            state_tx,
        }
    }

    /// Channel pair for wiring a transport implementation to the supervisor
    pub fn event_channel() -> (mpsc::Sender<TransportEvent>, mpsc::Receiver<TransportEvent>) {
        mpsc::channel(EVENT_CHANNEL_CAPACITY)
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.cmd_tx.clone(),
        }
    }

    /// Observe state transitions without coupling to the view sink
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state_tx.subscribe()
    }

    pub fn current_state(&self) -> SupervisorState {
        *self.lifecycle.current_state()
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    pub fn attention_state(&self) -> AttentionState {
        self.attention.state()
    }

    pub fn last_health(&self) -> Option<&HealthSnapshot> {
        self.last_health.as_ref()
    }

    /// Number of armed one-shot timers (load timeout + retry)
    pub fn active_timer_count(&self) -> usize {
        self.load_deadline.iter().count() + self.retry_deadline.iter().count()
    }

    /// Run the supervisor until shutdown.
    ///
    /// All failures are absorbed here; the only externally observable
    /// effects are view-sink calls, metrics and logs.
    pub async fn run(mut self) -> Result<()> {
        self.warm_up().await;

        let mut self_check = time::interval_at(
            Instant::now() + self.timing.self_check_interval,
            self.timing.self_check_interval,
        );
        let mut health_poll = time::interval_at(
            Instant::now() + self.timing.health_interval,
            self.timing.health_interval,
        );
        let mut fallback = time::interval_at(
            Instant::now() + self.timing.fallback_interval,
            self.timing.fallback_interval,
        );
        // Skipped ticks are dropped, never queued up
        self_check.set_missed_tick_behavior(MissedTickBehavior::Skip);
        health_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        fallback.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let warm = self.warm_deadline;
            let load = self.load_deadline;
            let retry = self.retry_deadline;

            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Attention(signal)) => self.on_attention(signal),
                    Some(Command::Reconnect) => self.manual_reconnect("manual retry"),
                    Some(Command::Shutdown) | None => {
                        self.shutdown();
                        return Ok(());
                    }
                },
                Some(event) = self.transport_rx.recv() => self.on_transport_event(event),
                _ = sleep_until_opt(warm), if warm.is_some() => self.on_warm_elapsed(),
                _ = sleep_until_opt(load), if load.is_some() => self.on_load_timeout(),
                _ = sleep_until_opt(retry), if retry.is_some() => self.on_retry_elapsed(),
                _ = self_check.tick() => self.on_self_check(),
                _ = health_poll.tick() => self.on_health_poll().await,
                _ = fallback.tick() => self.on_fallback_check(),
            }
        }
    }

    /// Best-effort relay warm-up; failure only stretches the pre-start delay
    async fn warm_up(&mut self) {
        let delay = match self.relay.warm_up(self.target.query()).await {
            Ok(status) => {
                info!("Relay warm-up: {} (running={})", status.status, status.running);
                self.timing.warm_delay_ok
            }
            Err(e) => {
                warn!("Relay warm-up failed, starting anyway: {}", e);
                self.timing.warm_delay_err
            }
        };

        self.lifecycle.transition_to_warming();
        self.publish_state();
        self.view.show_loading();
        self.warm_deadline = Some(Instant::now() + delay);
    }

    fn on_warm_elapsed(&mut self) {
        self.warm_deadline = None;

        // A manual reconnect may already have started the stream
        if !matches!(self.current_state(), SupervisorState::Warming) {
            return;
        }

        if self.attention.should_be_active() {
            self.begin_attempt("initial start");
        } else {
            debug!("Attention inactive, deferring initial start");
            self.pending_start = true;
        }
    }

    /// Start one transport attempt with a fresh cache-busting URL.
    ///
    /// Cancels any armed load-timeout or retry timer first, so at most one
    /// of each exists and the transport never sees overlapping starts.
    fn begin_attempt(&mut self, reason: &str) {
        if !self.attention.should_be_active() {
            debug!("Attention inactive, deferring start ({})", reason);
            self.pending_start = true;
            return;
        }

        self.pending_start = false;
        self.clear_timers();

        self.attempt_serial += 1;
        let url = self.target.start_url(self.attempt_serial);

        self.retry.record_start();
        self.lifecycle.transition_to_loading(Some(reason.to_string()));
        self.publish_state();
        self.view.show_loading();
        self.load_deadline = Some(Instant::now() + self.timing.load_timeout);

        info!("Starting stream (attempt {}): {}", self.retry.count(), url);
        if let Err(e) = self.transport.start(url) {
            error!("Transport start failed: {}", e);
            self.on_load_failure(e.to_string());
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Loaded => self.on_loaded(),
            TransportEvent::Failed { reason } => self.on_load_failure(reason),
        }
    }

    fn on_loaded(&mut self) {
        self.load_deadline = None;
        // A successful load always clears the retry episode
        self.retry.reset(&self.backoff);

        if !matches!(self.current_state(), SupervisorState::Loading) {
            debug!("Loaded event in state {}, ignoring", self.current_state());
            return;
        }

        info!("Stream loaded");
        self.lifecycle.transition_to_active();
        self.publish_state();
        self.metrics.report_producing(true);
        self.view.show_active();
    }

    fn on_load_timeout(&mut self) {
        self.load_deadline = None;
        warn!("Stream load timed out after {:?}", self.timing.load_timeout);
        self.on_load_failure("load timeout".to_string());
    }

    /// Shared failure path for transport errors and load timeouts
    fn on_load_failure(&mut self, reason: String) {
        self.load_deadline = None;

        let state = self.current_state();
        if !matches!(state, SupervisorState::Loading | SupervisorState::Active) {
            debug!("Failure event in state {}, ignoring: {}", state, reason);
            return;
        }

        self.transport.stop();
        self.metrics.report_producing(false);

        if !self.attention.should_be_active() {
            info!("Attention inactive, not retrying: {}", reason);
            self.lifecycle.transition_to_idle(Some(reason));
            self.publish_state();
            self.view.show_idle();
            return;
        }

        if self.retry.exhausted(&self.backoff) {
            warn!(
                "Giving up after {} attempts: {}",
                self.retry.count(),
                reason
            );
            self.lifecycle.transition_to_failed(Some(reason));
            self.publish_state();
            self.view.show_error();
            return;
        }

        let delay = self.retry.delay();
        self.lifecycle
            .transition_to_retrying(self.retry.count(), Some(reason));
        self.publish_state();
        self.metrics.report_reconnect_attempt();
        self.metrics.report_backoff(delay.as_secs_f64());
        self.view.show_loading();
        self.retry_deadline = Some(Instant::now() + delay);

        info!(
            "Reconnecting in {:?} (attempt {})",
            delay,
            self.retry.count()
        );
    }

    fn on_retry_elapsed(&mut self) {
        self.retry_deadline = None;
        // The wait uses the current delay; growth applies to the next one
        self.retry.advance_delay(&self.backoff);
        self.begin_attempt("scheduled retry");
    }

    /// Reset the retry episode and start over, superseding any pending timers.
    ///
    /// Safe to invoke redundantly from any trigger (UI, attention, health,
    /// self-check, fallback) thanks to the cancel-then-restart discipline.
    fn manual_reconnect(&mut self, reason: &str) {
        info!("Manual reconnect: {}", reason);
        self.retry.reset(&self.backoff);
        self.transport.stop();
        self.metrics.report_producing(false);
        self.begin_attempt(reason);
    }

    fn on_attention(&mut self, signal: AttentionSignal) {
        let was_in_viewport = self.attention.state().in_viewport;
        let edge = self.attention.apply(signal);

        match edge {
            Some(AttentionEdge::Regained) => {
                debug!("Attention regained");
                let state = self.current_state();
                if self.pending_start {
                    self.manual_reconnect("attention regained");
                } else if !state.is_active() && !matches!(state, SupervisorState::Warming) {
                    self.manual_reconnect("attention regained");
                }
            }
            Some(AttentionEdge::Lost) => {
                debug!("Attention lost");
                if self.pause_when_hidden && self.current_state().is_active() {
                    self.pause();
                }
            }
            None => {}
        }

        // Scrolling into view restarts a non-active stream even without an
        // attention edge. Redundant with the handlers above on purpose; the
        // cancel-then-restart discipline keeps it harmless.
        if matches!(signal, AttentionSignal::InViewport(true))
            && !was_in_viewport
            && self.attention.should_be_active()
            && !self.current_state().is_active()
        {
            self.manual_reconnect("scrolled into view");
        }
    }

    /// Attention-loss teardown, only used with the pause-when-hidden policy
    fn pause(&mut self) {
        info!("Pausing stream while unobserved");
        self.clear_timers();
        self.transport.stop();
        self.metrics.report_producing(false);
        self.lifecycle
            .transition_to_idle(Some("attention lost".to_string()));
        self.publish_state();
        self.view.show_idle();
    }

    /// Detect a connection that claims to be loaded but delivers nothing
    fn on_self_check(&mut self) {
        if let Some(uptime) = self.lifecycle.uptime() {
            self.metrics.report_uptime(uptime.as_secs_f64());
        }

        if !self.attention.should_be_active() {
            return;
        }

        if self.current_state().is_active() && !self.transport.is_producing_frames() {
            warn!("Stream loaded but not producing frames, restarting");
            self.manual_reconnect("silent stall");
        }
    }

    /// Poll relay health and react; poll errors never escalate
    async fn on_health_poll(&mut self) {
        if !self.attention.should_be_active() {
            debug!("Attention inactive, skipping health poll");
            return;
        }

        let health = match self.relay.health().await {
            Ok(health) => health,
            Err(e) => {
                warn!("Relay health check failed: {}", e);
                return;
            }
        };

        let snapshot = HealthSnapshot::new(health.active_relays);
        let state = self.current_state();

        if !snapshot.has_active_relays() && state.is_active() {
            warn!("No active relays, restarting stream");
            self.manual_reconnect("no active relays");
        } else if state.is_active() && !self.transport.is_producing_frames() {
            warn!("Stream stalled during health check, restarting");
            self.manual_reconnect("health check stall");
        } else if !state.is_active() {
            info!("Stream should be active but is not, restarting");
            self.manual_reconnect("health check revival");
        }

        self.last_health = Some(snapshot);
    }

    /// Slow independent sweep in case the self-check and poller both miss
    fn on_fallback_check(&mut self) {
        if !self.attention.should_be_active() {
            return;
        }

        if self.current_state().is_active() && !self.transport.is_producing_frames() {
            warn!("Fallback check found a broken stream, restarting");
            self.manual_reconnect("fallback check");
        }
    }

    fn shutdown(&mut self) {
        info!("Supervisor shutting down");
        self.warm_deadline = None;
        self.clear_timers();
        self.transport.stop();
        self.metrics.report_producing(false);
        self.lifecycle
            .transition_to_idle(Some("shutdown".to_string()));
        self.publish_state();
        self.view.show_idle();
    }

    fn clear_timers(&mut self) {
        self.load_deadline = None;
        self.retry_deadline = None;
    }

    fn publish_state(&self) {
        let state = self.current_state();
        self.metrics.report_state_change(&state);
        let _ = self.state_tx.send(state);
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => time::sleep_until(d).await,
        None => future::pending::<()>().await,
    }
}
