//! The session loop tying transport, dispatcher, buffer and renderer together.
//!
//! One [`Session`] owns all mutable dashboard state and runs on a single
//! tokio task. It waits on three things at once: transport events, the flush
//! timer, and a shutdown future. Socket I/O lives on the transport's own task
//! and only reaches the session through the event channel.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use topoview_core::logging::{PerfSpan, span_names, targets};
use topoview_core::{
    Action, CoreError, Dispatcher, FlushReport, Message, Renderer, TimerId, TimerManager,
};
use topoview_net::{NetworkError, Transport, TransportEvent, TransportEvents};

use crate::config::{ConfigError, SessionConfig};
use crate::handlers::{DashboardContext, DashboardStyle, bind_dashboard};

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The transport could not be started.
    #[error("Transport error: {0}")]
    Network(#[from] NetworkError),

    /// A core subsystem failed.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Counters describing what a session has processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames received from the source.
    pub frames_received: u64,
    /// Frames dropped because they could not be decoded.
    pub malformed_frames: u64,
    /// Messages (frames and connectivity events) handed to the dispatcher.
    pub dispatched: u64,
    /// Handler invocations that failed.
    pub handler_failures: u64,
    /// Queries written to the transport.
    pub queries_sent: u64,
    /// Queries that could not be written.
    pub queries_failed: u64,
    /// Flushes that delivered at least one mutation.
    pub flushes: u64,
}

/// A live topology view bound to one source.
pub struct Session {
    config: SessionConfig,
    transport: Transport,
    events: TransportEvents,
    dispatcher: Dispatcher<DashboardContext>,
    ctx: DashboardContext,
    timers: TimerManager,
    flush_timer: Option<TimerId>,
    connected: bool,
    stats: SessionStats,
}

impl Session {
    /// Build a session. Nothing connects until [`run`](Self::run).
    pub fn new(config: SessionConfig, renderer: Arc<dyn Renderer>) -> Result<Self> {
        config.validate()?;

        let (transport, events) = Transport::new(config.transport_config());
        let style = DashboardStyle {
            image_dir: config.image_dir.clone(),
            coordinate_scale: config.coordinate_scale,
        };
        let ctx = DashboardContext::new(config.registry_mode, style, renderer);

        let mut dispatcher = Dispatcher::new();
        bind_dashboard(&mut dispatcher);

        Ok(Self {
            config,
            transport,
            events,
            dispatcher,
            ctx,
            timers: TimerManager::new(),
            flush_timer: None,
            connected: false,
            stats: SessionStats::default(),
        })
    }

    /// The configuration this session was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the source connection is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Processing counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            flushes: self.ctx.flushes(),
            ..self.stats
        }
    }

    /// The handler state.
    pub fn context(&self) -> &DashboardContext {
        &self.ctx
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Arm the periodic flush timer. Replaces a running one.
    pub fn start_flush_timer(&mut self, now: Instant) {
        if let Some(id) = self.flush_timer.take() {
            let _ = self.timers.stop(id);
        }
        self.flush_timer = Some(self.timers.start_repeating(now, self.config.flush_period()));
    }

    /// Cancel the periodic flush timer.
    pub fn stop_flush_timer(&mut self) -> Result<()> {
        if let Some(id) = self.flush_timer.take() {
            self.timers.stop(id)?;
        }
        Ok(())
    }

    /// Drive the session until `shutdown` resolves.
    ///
    /// Opens the transport, then processes events and flush ticks. A due tick
    /// wins over pending events, so flushes keep their period under a
    /// continuous feed. Events already queued when the tick fires are handled
    /// before the flush; later arrivals wait for the next turn. On
    /// shutdown the flush timer is cancelled, pending mutations are flushed
    /// and the transport is closed.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<SessionStats>
    where
        F: Future<Output = ()>,
    {
        self.transport.open()?;
        self.start_flush_timer(Instant::now());
        tracing::info!(target: targets::SESSION, url = %self.config.url, "session started");

        tokio::pin!(shutdown);
        loop {
            let deadline = self
                .timers
                .next_deadline()
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    for _ in 0..self.events.len() {
                        match self.events.try_recv() {
                            Ok(event) => self.handle_event(event),
                            Err(_) => break,
                        }
                    }
                    self.tick(Instant::now());
                }

                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }

        self.stop_flush_timer()?;
        self.flush();
        self.transport.close();
        let stats = self.stats();
        tracing::info!(target: targets::SESSION, stats = ?stats, "session stopped");
        Ok(stats)
    }

    /// Process one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        let message = match event {
            TransportEvent::Opened => {
                self.connected = true;
                Message::connectivity(Action::Insert)
            }
            TransportEvent::Closed { code } => {
                self.connected = false;
                tracing::debug!(target: targets::SESSION, ?code, "source connection closed");
                Message::connectivity(Action::Delete)
            }
            TransportEvent::Frame(text) => {
                self.stats.frames_received += 1;
                match Message::decode(&text) {
                    Ok(message) => message,
                    Err(err) => {
                        self.stats.malformed_frames += 1;
                        tracing::warn!(target: targets::SESSION, error = %err, "dropping frame");
                        return;
                    }
                }
            }
        };
        self.dispatch(&message);
    }

    fn dispatch(&mut self, message: &Message) {
        let _span = PerfSpan::new(span_names::DISPATCH);
        let report = self.dispatcher.dispatch(&mut self.ctx, message);
        self.stats.dispatched += 1;
        self.stats.handler_failures += report.failed as u64;
        if report.is_unmatched() {
            tracing::trace!(target: targets::SESSION, action = %message.action, kind = %message.kind, "no handler");
        }

        for query in self.ctx.take_outbox() {
            match self.transport.send(&query) {
                Ok(()) => self.stats.queries_sent += 1,
                Err(err) => {
                    self.stats.queries_failed += 1;
                    tracing::warn!(
                        target: targets::SESSION,
                        error = %err,
                        object = %query.object_name(),
                        "query not sent"
                    );
                }
            }
        }
    }

    /// Fire due timers. Returns the flush report when the flush timer fired.
    pub fn tick(&mut self, now: Instant) -> Option<FlushReport> {
        let fired = self.timers.process_expired_at(now);
        match self.flush_timer {
            Some(id) if fired.contains(&id) => Some(self.flush()),
            _ => None,
        }
    }

    /// Hand pending mutations to the renderer now.
    pub fn flush(&mut self) -> FlushReport {
        let _span = PerfSpan::new(span_names::FLUSH);
        self.ctx.flush()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport)
            .field("connected", &self.connected)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use topoview_core::{RecordingRenderer, RenderCall};

    fn session() -> (Session, Arc<RecordingRenderer>) {
        let renderer = Arc::new(RecordingRenderer::new());
        let session = Session::new(SessionConfig::default(), renderer.clone()).unwrap();
        (session, renderer)
    }

    fn frame(value: serde_json::Value) -> TransportEvent {
        TransportEvent::Frame(value.to_string())
    }

    #[test]
    fn test_connectivity_tracks_transport_events() {
        let (mut session, _) = session();
        assert!(!session.is_connected());

        session.handle_event(TransportEvent::Opened);
        assert!(session.is_connected());
        // The node query cannot be written without a live connection.
        assert_eq!(session.stats().queries_failed, 1);

        session.handle_event(TransportEvent::Closed { code: None });
        assert!(!session.is_connected());
        assert_eq!(session.stats().dispatched, 2);
    }

    #[test]
    fn test_malformed_frames_are_counted_and_dropped() {
        let (mut session, renderer) = session();
        session.handle_event(TransportEvent::Frame("{broken".into()));
        session.handle_event(frame(json!({"object_name": "node"})));

        let stats = session.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.malformed_frames, 2);
        assert_eq!(stats.dispatched, 0);
        session.flush();
        assert!(renderer.calls().is_empty());
    }

    #[test]
    fn test_flush_only_on_flush_timer() {
        let (mut session, renderer) = session();
        let start = Instant::now();
        session.start_flush_timer(start);

        session.handle_event(frame(json!({
            "action": "update",
            "object_name": "channel",
            "params": {"bw_upstream": 131072, "bw_downstream": 0},
            "filter": [["id", "==", "c1"]],
        })));

        assert_eq!(session.tick(start + Duration::from_millis(499)), None);
        assert!(renderer.calls().is_empty());

        let report = session.tick(start + Duration::from_millis(500)).unwrap();
        assert_eq!(report.edges, 1);
        assert!(matches!(&renderer.calls()[0], RenderCall::Edges(edges) if edges.len() == 1));
        assert_eq!(session.stats().flushes, 1);

        // Nothing pending: the tick fires but the renderer is not called.
        let report = session.tick(start + Duration::from_millis(1000)).unwrap();
        assert!(report.is_empty());
        assert_eq!(renderer.calls().len(), 1);
    }

    #[test]
    fn test_last_page_flush_is_counted() {
        let (mut session, renderer) = session();
        session.handle_event(frame(json!({
            "action": "insert",
            "object_name": "node",
            "params": {"id": 1, "name": "r1", "groups": ["core"]},
            "last": true,
        })));

        assert_eq!(renderer.nodes().len(), 1);
        assert_eq!(session.stats().flushes, 1);

        // Nothing left for the periodic flush.
        assert!(session.flush().is_empty());
        assert_eq!(session.stats().flushes, 1);
    }

    #[test]
    fn test_stopped_flush_timer_never_fires() {
        let (mut session, _) = session();
        let start = Instant::now();
        session.start_flush_timer(start);
        session.stop_flush_timer().unwrap();
        assert_eq!(session.tick(start + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_handler_failures_are_counted() {
        let (mut session, _) = session();
        session.handle_event(frame(json!({
            "action": "insert",
            "object_name": "node",
            "params": {"name": "no-id"},
        })));
        assert_eq!(session.stats().handler_failures, 1);
        assert_eq!(session.stats().dispatched, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let renderer = Arc::new(RecordingRenderer::new());
        let config = SessionConfig::default().flush_interval(Duration::ZERO);
        assert!(matches!(
            Session::new(config, renderer),
            Err(SessionError::Config(_))
        ));
    }
}
