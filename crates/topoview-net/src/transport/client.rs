//! WebSocket client with event-channel delivery and fixed-delay reconnection.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as TungsteniteCloseCode;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use topoview_core::Query;
use topoview_core::logging::targets;

use super::config::TransportConfig;
use super::state::{CloseCode, ConnectionState};
use crate::error::{NetworkError, Result};

/// Something the connection task observed.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is open and `send` will succeed.
    Opened,
    /// An open connection went away.
    Closed {
        /// Close code sent by the source, if any.
        code: Option<CloseCode>,
    },
    /// A text frame, or a binary frame holding valid UTF-8.
    Frame(String),
}

/// Receiving half of the transport's event channel.
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Command sent to the connection task.
enum Command {
    SendText(String),
    Close,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    running: bool,
    // Bumped by every spawn; only the task holding the latest value may
    // touch the fields below or reconnect.
    generation: u64,
    task: Option<JoinHandle<()>>,
    reconnect_attempts: u32,
    command_tx: Option<mpsc::UnboundedSender<Command>>,
    // Present while a reconnection timer is pending.
    wake_tx: Option<mpsc::UnboundedSender<()>>,
}

impl Inner {
    fn owns(&self, generation: u64) -> bool {
        self.generation == generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.running && self.owns(generation)
    }
}

/// A WebSocket connection to the topology source.
///
/// After an unexpected closure or a failed attempt the transport schedules
/// exactly one reconnection after [`TransportConfig::reconnect_delay`], and
/// keeps doing so indefinitely. Calling [`open`](Self::open) while that timer
/// is pending cancels it and reconnects immediately. [`close`](Self::close)
/// stops reconnecting.
///
/// # Example
///
/// ```ignore
/// let (transport, mut events) = Transport::new(TransportConfig::new("ws://127.0.0.1:9000"));
/// transport.open()?;
///
/// while let Some(event) = events.recv().await {
///     if event == TransportEvent::Opened {
///         transport.send(&Query::select("node"))?;
///     }
/// }
/// ```
pub struct Transport {
    config: TransportConfig,
    inner: Arc<Mutex<Inner>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl Transport {
    /// Create a transport and the channel its events arrive on.
    ///
    /// Nothing connects until [`open`](Self::open) is called.
    pub fn new(config: TransportConfig) -> (Self, TransportEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
            events_tx,
        };
        (transport, events_rx)
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Check if the connection is open.
    pub fn is_open(&self) -> bool {
        self.inner.lock().state == ConnectionState::Open
    }

    /// Get the URL this transport connects to.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Number of reconnection timers scheduled so far.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().reconnect_attempts
    }

    /// Start connecting.
    ///
    /// Spawns the connection task on the current tokio runtime. If a
    /// reconnection timer is pending, it is cancelled and the attempt happens
    /// now. While connecting or open this is a no-op. After [`close`](Self::close)
    /// the new connection task waits for the previous one to wind down, so its
    /// `Closed` event always precedes the next `Opened`.
    pub fn open(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.running {
            if let Some(wake) = inner.wake_tx.take() {
                tracing::debug!(target: targets::TRANSPORT, url = %self.config.url, "reconnect timer cancelled by open()");
                let _ = wake.send(());
            }
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| NetworkError::NoRuntime)?;
        let request = build_request(&self.config)?;

        inner.running = true;
        inner.generation += 1;
        inner.state = ConnectionState::Connecting;
        inner.command_tx = None;
        inner.wake_tx = None;
        let previous = inner.task.take();

        tracing::info!(target: targets::TRANSPORT, url = %self.config.url, generation = inner.generation, "opening transport");
        let task = runtime.spawn(run_connection(
            request,
            self.config.clone(),
            self.inner.clone(),
            self.events_tx.clone(),
            inner.generation,
            previous,
        ));
        inner.task = Some(task);
        Ok(())
    }

    /// Serialize `query` and write it to the connection.
    ///
    /// Fails with [`NetworkError::NotConnected`] unless the connection is open.
    /// Nothing is queued for later delivery.
    pub fn send(&self, query: &Query) -> Result<()> {
        let inner = self.inner.lock();
        let Some(tx) = inner.command_tx.as_ref() else {
            return Err(NetworkError::NotConnected);
        };

        let text = query.to_json()?;
        tracing::trace!(target: targets::TRANSPORT, action = %query.action(), object = %query.object_name(), "sending query");
        tx.send(Command::SendText(text))
            .map_err(|_| NetworkError::TransportClosed("connection task has stopped".into()))
    }

    /// Close the connection normally and stop reconnecting.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if !inner.running {
            return;
        }
        inner.running = false;
        if let Some(tx) = inner.command_tx.as_ref() {
            let _ = tx.send(Command::Close);
        }
        if let Some(wake) = inner.wake_tx.take() {
            let _ = wake.send(());
        }
        tracing::info!(target: targets::TRANSPORT, url = %self.config.url, "closing transport");
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish()
    }
}

/// Build the WebSocket request with custom headers.
fn build_request(config: &TransportConfig) -> Result<Request> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;

    let headers = request.headers_mut();
    for (name, value) in &config.headers {
        let header_name = http::header::HeaderName::try_from(name.as_str())?;
        let header_value = http::header::HeaderValue::try_from(value.as_str())?;
        headers.insert(header_name, header_value);
    }

    Ok(request)
}

/// How one connected session ended.
enum SessionEnd {
    /// `close()` was called.
    Local,
    /// The source closed or the socket failed.
    Remote(Option<CloseCode>),
}

async fn run_connection(
    request: Request,
    config: TransportConfig,
    inner: Arc<Mutex<Inner>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    generation: u64,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    loop {
        match tokio_tungstenite::connect_async(request.clone()).await {
            Ok((ws_stream, _response)) => {
                let (tx, rx) = mpsc::unbounded_channel::<Command>();
                let current = {
                    let mut state = inner.lock();
                    let current = state.is_current(generation);
                    if current {
                        state.state = ConnectionState::Open;
                        state.command_tx = Some(tx);
                    } else if state.owns(generation) {
                        state.state = ConnectionState::Closed;
                    }
                    current
                };
                if !current {
                    let mut ws_stream = ws_stream;
                    let _ = ws_stream.close(None).await;
                    return;
                }
                tracing::info!(target: targets::TRANSPORT, url = %config.url, "connection open");
                let _ = events.send(TransportEvent::Opened);

                let end = pump(ws_stream, rx, &events).await;

                {
                    let mut state = inner.lock();
                    if state.owns(generation) {
                        state.command_tx = None;
                        state.state = ConnectionState::Closed;
                    }
                }

                match end {
                    SessionEnd::Local => {
                        tracing::info!(target: targets::TRANSPORT, url = %config.url, "connection closed");
                        let _ = events.send(TransportEvent::Closed {
                            code: Some(CloseCode::Normal),
                        });
                        return;
                    }
                    SessionEnd::Remote(code) => {
                        tracing::info!(target: targets::TRANSPORT, url = %config.url, code = ?code, "connection lost");
                        let _ = events.send(TransportEvent::Closed { code });
                    }
                }
            }
            Err(err) => {
                tracing::warn!(target: targets::TRANSPORT, url = %config.url, error = %err, "connection attempt failed");
                let mut state = inner.lock();
                if state.owns(generation) {
                    state.state = ConnectionState::Closed;
                }
            }
        }

        // Exactly one pending timer; open() may cut it short.
        let (wake_tx, mut wake_rx) = mpsc::unbounded_channel::<()>();
        {
            let mut state = inner.lock();
            if !state.is_current(generation) {
                return;
            }
            state.reconnect_attempts += 1;
            state.wake_tx = Some(wake_tx);
        }
        tracing::debug!(target: targets::TRANSPORT, delay = ?config.reconnect_delay, "reconnection scheduled");

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = wake_rx.recv() => {}
        }

        {
            let mut state = inner.lock();
            if !state.owns(generation) {
                tracing::debug!(target: targets::TRANSPORT, generation, "superseded connection task exiting");
                return;
            }
            state.wake_tx = None;
            if !state.running {
                state.state = ConnectionState::Closed;
                return;
            }
            state.state = ConnectionState::Reconnecting;
        }
        tracing::debug!(target: targets::TRANSPORT, url = %config.url, "reconnecting");
    }
}

/// Move frames between the socket and the owner until either side ends.
async fn pump<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> SessionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::SendText(text)) => {
                        if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                            tracing::warn!(target: targets::TRANSPORT, error = %e, "write failed");
                            return SessionEnd::Remote(None);
                        }
                    }
                    Some(Command::Close) | None => {
                        let frame = CloseFrame {
                            code: TungsteniteCloseCode::Normal,
                            reason: "".into(),
                        };
                        let _ = write.send(WsMessage::Close(Some(frame))).await;
                        return SessionEnd::Local;
                    }
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = events.send(TransportEvent::Frame(text.to_string()));
                    }
                    Some(Ok(WsMessage::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => {
                            let _ = events.send(TransportEvent::Frame(text));
                        }
                        Err(_) => {
                            tracing::warn!(target: targets::TRANSPORT, len = data.len(), "dropping non-UTF-8 binary frame");
                        }
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        return SessionEnd::Remote(frame.map(|f| CloseCode::from_u16(u16::from(f.code))));
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by tungstenite.
                    }
                    Some(Err(e)) => {
                        tracing::warn!(target: targets::TRANSPORT, error = %e, "read failed");
                        return SessionEnd::Remote(Some(CloseCode::Abnormal));
                    }
                    None => return SessionEnd::Remote(Some(CloseCode::Abnormal)),
                }
            }
        }
    }
}
