//! Stream Client
//!
//! Owns the session identifiers, drives the connect handshake and setup
//! sequence, runs the dispatcher loop, and exposes the public control
//! surface: connect, close, add/remove symbol, and quote requests.
//!
//! # Dispatcher model
//!
//! One task per connection owns the transport and processes everything
//! in order: caller commands, inbound packets, and keep-alive echoes.
//! Because packets are handled sequentially on this single task,
//! callback delivery order matches receive order; within one packet,
//! series batches are delivered first (in frame order) and then the
//! deduplicated quote updates.
//!
//! Keep-alive echoes for a packet are written before any of its frames
//! are parsed, so heavy payloads cannot starve the heartbeat deadline.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{SocketError, context};
use crate::protocol::envelope::Envelope;
use crate::protocol::frame;
use crate::protocol::packet;
use crate::protocol::quote::QuoteUpdate;
use crate::protocol::series::SeriesBar;
use crate::session::SessionIds;
use crate::transport::{Transport, TransportMessage, WsTransport};

// =============================================================================
// Callback Types
// =============================================================================

/// Sink for validated, deduplicated quote updates.
pub type QuoteCallback = Arc<dyn Fn(QuoteUpdate) + Send + Sync>;

/// Sink for all reported errors, with a context tag identifying the
/// phase that failed (see [`crate::error::context`]).
pub type ErrorCallback = Arc<dyn Fn(&SocketError, &'static str) + Send + Sync>;

/// Sink for series bars, invoked with the symbol of the originating
/// [`StreamClient::request_quotes`] call.
pub type SeriesCallback = Arc<dyn Fn(&str, &[SeriesBar]) + Send + Sync>;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle of one connection.
///
/// `Closed` and `Failed` are terminal; a new connection requires a fresh
/// [`StreamClient::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection attempt has been made yet.
    #[default]
    Uninitialized,
    /// Dialing the transport.
    Connecting,
    /// Connected; waiting for the server hello.
    AwaitingHandshake,
    /// Setup complete; the dispatcher loop is running.
    Ready,
    /// Closed by the caller. Terminal.
    Closed,
    /// A fatal error terminated the connection. Terminal.
    Failed,
}

impl ConnectionState {
    /// Whether this state ends the connection's lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// The state's name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::AwaitingHandshake => "awaiting handshake",
            Self::Ready => "ready",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Shared Connection State
// =============================================================================

/// A registered series request: the callback plus the symbol it was made
/// for, so series deliveries can be attributed (the wire payload carries
/// no symbol).
#[derive(Clone)]
struct SeriesRequest {
    symbol: String,
    callback: SeriesCallback,
}

/// State shared between the caller-facing handle and the dispatcher task.
struct Shared {
    state: Mutex<ConnectionState>,
    series: RwLock<Option<SeriesRequest>>,
    on_quote: QuoteCallback,
    on_error: ErrorCallback,
}

impl Shared {
    fn new(on_quote: QuoteCallback, on_error: ErrorCallback) -> Self {
        Self {
            state: Mutex::new(ConnectionState::Uninitialized),
            series: RwLock::new(None),
            on_quote,
            on_error,
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn transition(&self, to: ConnectionState) {
        let mut state = self.state.lock();
        tracing::debug!(from = %state, to = %to, "connection state transition");
        *state = to;
    }

    /// Mark the connection failed, unless it already reached a terminal
    /// state (a close racing a read error stays `Closed`).
    fn fail(&self) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = ConnectionState::Failed;
        }
    }

    fn report(&self, err: &SocketError, ctx: &'static str) {
        tracing::warn!(error = %err, context = ctx, "stream error");
        (self.on_error)(err, ctx);
    }
}

/// A caller command awaiting transmission by the dispatcher.
struct Command {
    envelope: Envelope,
    ack: oneshot::Sender<Result<(), SocketError>>,
}

// =============================================================================
// Stream Client
// =============================================================================

/// Handle to one live stream connection.
///
/// Cheap to share behind an `Arc` if multiple tasks need the control
/// surface; all methods take `&self`.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tradingview_stream::{ClientConfig, StreamClient};
///
/// let client = StreamClient::connect(
///     ClientConfig::default(),
///     Arc::new(|quote| println!("{quote}")),
///     Arc::new(|err, ctx| eprintln!("{ctx}: {err}")),
/// )
/// .await?;
///
/// client.add_symbol("NASDAQ:NVDA").await?;
/// ```
pub struct StreamClient {
    shared: Arc<Shared>,
    session: SessionIds,
    cmd_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
}

impl StreamClient {
    /// Connect to the service, perform the handshake and setup sequence,
    /// and start the dispatcher loop.
    ///
    /// On any failure the transport is closed, the error is reported to
    /// `on_error` with the [`context::INIT`] tag (handshake failures are
    /// additionally reported with [`context::HANDSHAKE`] first), and no
    /// half-open connection is left behind.
    ///
    /// # Errors
    ///
    /// Returns the first error of the dial, handshake, or setup phase.
    pub async fn connect(
        config: ClientConfig,
        on_quote: QuoteCallback,
        on_error: ErrorCallback,
    ) -> Result<Self, SocketError> {
        let shared = Arc::new(Shared::new(on_quote, on_error));
        shared.transition(ConnectionState::Connecting);

        tracing::info!(url = %config.url, "connecting to the stream endpoint");
        let transport = match WsTransport::connect(&config.url).await {
            Ok(transport) => transport,
            Err(err) => {
                let err = SocketError::Transport(err);
                shared.fail();
                shared.report(&err, context::INIT);
                return Err(err);
            }
        };

        Self::initialize(transport, config, shared).await
    }

    /// Connect over a caller-supplied [`Transport`].
    ///
    /// The transport must already be connected; this runs the handshake
    /// and setup sequence over it and starts the dispatcher loop.
    ///
    /// # Errors
    ///
    /// Returns the first error of the handshake or setup phase.
    pub async fn connect_with<T: Transport>(
        transport: T,
        config: ClientConfig,
        on_quote: QuoteCallback,
        on_error: ErrorCallback,
    ) -> Result<Self, SocketError> {
        let shared = Arc::new(Shared::new(on_quote, on_error));
        shared.transition(ConnectionState::Connecting);
        Self::initialize(transport, config, shared).await
    }

    async fn initialize<T: Transport>(
        mut transport: T,
        config: ClientConfig,
        shared: Arc<Shared>,
    ) -> Result<Self, SocketError> {
        shared.transition(ConnectionState::AwaitingHandshake);

        if let Err(err) = handshake(&mut transport).await {
            shared.fail();
            let _ = transport.close().await;
            // Phase-specific report first, then the init-level one, so
            // the sink sees both the failing check and the failed
            // operation.
            shared.report(&err, context::HANDSHAKE);
            shared.report(&err, context::INIT);
            return Err(err);
        }

        let session = SessionIds::generate();
        tracing::info!(
            quote_session = %session.quote(),
            chart_session = %session.chart(),
            "stream session established"
        );

        if let Err(err) = send_setup(&mut transport, &config, &session).await {
            shared.fail();
            let _ = transport.close().await;
            shared.report(&err, context::INIT);
            return Err(err);
        }

        shared.transition(ConnectionState::Ready);

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.max(1));
        let cancel = CancellationToken::new();
        tokio::spawn(run_loop(
            transport,
            Arc::clone(&shared),
            cmd_rx,
            cancel.clone(),
        ));

        Ok(Self {
            shared,
            session,
            cmd_tx,
            cancel,
        })
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// The session identifiers this connection runs under.
    #[must_use]
    pub const fn session(&self) -> &SessionIds {
        &self.session
    }

    /// Close the connection.
    ///
    /// Idempotent: closing an already-closed or failed connection is a
    /// successful no-op, and the transport is closed at most once.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` keeps the surface stable.
    pub fn close(&self) -> Result<(), SocketError> {
        {
            let mut state = self.shared.state.lock();
            if state.is_terminal() {
                return Ok(());
            }
            *state = ConnectionState::Closed;
        }
        tracing::info!("closing the stream connection");
        self.cancel.cancel();
        Ok(())
    }

    /// Start streaming quote updates for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::NotReady`] when the connection is not
    /// `Ready`, or the send failure otherwise.
    pub async fn add_symbol(&self, symbol: &str) -> Result<(), SocketError> {
        self.ensure_ready()?;
        self.send(Envelope::quote_add_symbols(self.session.quote(), symbol))
            .await
    }

    /// Stop streaming quote updates for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::NotReady`] when the connection is not
    /// `Ready`, or the send failure otherwise.
    pub async fn remove_symbol(&self, symbol: &str) -> Result<(), SocketError> {
        self.ensure_ready()?;
        self.send(Envelope::quote_remove_symbols(self.session.quote(), symbol))
            .await
    }

    /// Request `bar_count` bars of `interval` resolution for `symbol`,
    /// delivering them to `on_series`.
    ///
    /// Registers the callback, then sends add-symbol, resolve-symbol,
    /// and create-series in order. A send failure aborts the sequence;
    /// commands already sent are not rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::NotReady`] when the connection is not
    /// `Ready`, or the first send failure.
    pub async fn request_quotes(
        &self,
        symbol: &str,
        bar_count: u32,
        interval: &str,
        on_series: SeriesCallback,
    ) -> Result<(), SocketError> {
        self.ensure_ready()?;

        *self.shared.series.write() = Some(SeriesRequest {
            symbol: symbol.to_string(),
            callback: on_series,
        });

        self.send(Envelope::quote_add_symbols(self.session.quote(), symbol))
            .await?;
        self.send(Envelope::resolve_symbol(
            self.session.chart(),
            SessionIds::SYMBOL_ALIAS,
            symbol,
        ))
        .await?;
        self.send(Envelope::create_series(
            self.session.chart(),
            SessionIds::SERIES_NAME,
            SessionIds::SYMBOL_ALIAS,
            interval,
            bar_count,
        ))
        .await
    }

    fn ensure_ready(&self) -> Result<(), SocketError> {
        let state = self.shared.state();
        if state == ConnectionState::Ready {
            Ok(())
        } else {
            Err(SocketError::NotReady(state))
        }
    }

    async fn send(&self, envelope: Envelope) -> Result<(), SocketError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command {
                envelope,
                ack: ack_tx,
            })
            .await
            .map_err(|_| SocketError::ChannelClosed)?;
        ack_rx.await.map_err(|_| SocketError::ChannelClosed)?
    }
}

// =============================================================================
// Connect Phases
// =============================================================================

/// Verify the server hello: the first inbound message must carry a JSON
/// frame with a non-null `session_id`.
async fn handshake<T: Transport>(transport: &mut T) -> Result<(), SocketError> {
    let text = match transport.recv().await? {
        TransportMessage::Text(text) => text,
        _ => {
            return Err(SocketError::Handshake(
                "first message was not a text message".to_string(),
            ));
        }
    };

    let frames = frame::split(&text)?;
    let first = frames.first().ok_or_else(|| {
        SocketError::Handshake("first packet carried no frames".to_string())
    })?;

    let hello: serde_json::Value = serde_json::from_str(first.payload)
        .map_err(|e| SocketError::Handshake(format!("server hello is not valid JSON: {e}")))?;

    if hello
        .get("session_id")
        .is_none_or(serde_json::Value::is_null)
    {
        return Err(SocketError::Handshake(
            "first received message has no session_id".to_string(),
        ));
    }

    tracing::debug!("server hello acknowledged");
    Ok(())
}

/// Send the connection setup sequence.
async fn send_setup<T: Transport>(
    transport: &mut T,
    config: &ClientConfig,
    session: &SessionIds,
) -> Result<(), SocketError> {
    let fields = config.all_quote_fields();
    let setup = [
        Envelope::set_auth_token(&config.auth_token),
        Envelope::chart_create_session(session.chart()),
        Envelope::quote_create_session(session.quote()),
        Envelope::quote_set_fields(session.quote(), &fields),
    ];

    for envelope in &setup {
        send_envelope(transport, envelope).await?;
    }
    Ok(())
}

async fn send_envelope<T: Transport>(
    transport: &mut T,
    envelope: &Envelope,
) -> Result<(), SocketError> {
    let frame = envelope.to_frame()?;
    tracing::debug!(command = %envelope.message, "sending command frame");
    transport.send_text(&frame).await?;
    Ok(())
}

// =============================================================================
// Dispatcher Loop
// =============================================================================

async fn run_loop<T: Transport>(
    mut transport: T,
    shared: Arc<Shared>,
    mut commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("connection closed by the caller");
                let _ = transport.close().await;
                return;
            }
            command = commands.recv() => {
                let Some(Command { envelope, ack }) = command else {
                    // The client handle was dropped without close().
                    let _ = transport.close().await;
                    return;
                };
                match send_envelope(&mut transport, &envelope).await {
                    Ok(()) => {
                        let _ = ack.send(Ok(()));
                    }
                    Err(err) => {
                        shared.fail();
                        shared.report(&err, context::SEND);
                        let _ = transport.close().await;
                        let _ = ack.send(Err(err));
                        return;
                    }
                }
            }
            message = transport.recv() => match message {
                Ok(TransportMessage::Text(packet)) => {
                    if !handle_packet(&mut transport, &shared, &packet).await {
                        let _ = transport.close().await;
                        return;
                    }
                }
                Ok(_) => tracing::trace!("ignoring non-text message"),
                Err(err) => {
                    if shared.state() == ConnectionState::Closed {
                        tracing::debug!("receive unwound after close");
                    } else {
                        shared.fail();
                        shared.report(&SocketError::Transport(err), context::READ);
                    }
                    let _ = transport.close().await;
                    return;
                }
            }
        }
    }
}

/// Handle one inbound packet. Returns `false` when a fatal error means
/// the loop must stop.
async fn handle_packet<T: Transport>(
    transport: &mut T,
    shared: &Shared,
    packet: &str,
) -> bool {
    let frames = match frame::split(packet) {
        Ok(frames) => frames,
        Err(err) => {
            // The packet is unusable; the connection is not.
            shared.report(&SocketError::Framing(err), context::SPLIT);
            return true;
        }
    };
    tracing::trace!(frames = frames.len(), bytes = packet.len(), "processing packet");

    // Heartbeats answer first, before any frame of this packet is
    // decoded.
    for f in frames.iter().filter(|f| f.is_keep_alive()) {
        if let Err(err) = transport.send_text(f.raw).await {
            shared.fail();
            shared.report(&SocketError::Transport(err), context::KEEP_ALIVE);
            return false;
        }
    }

    let parsed = packet::parse_frames(&frames);

    for fault in parsed.faults {
        shared.report(&SocketError::Parse(fault), context::PARSE);
    }

    if !parsed.series.is_empty() {
        let request = shared.series.read().clone();
        if let Some(request) = request {
            for bars in &parsed.series {
                (request.callback)(&request.symbol, bars);
            }
        } else {
            tracing::debug!("series update with no registered series request");
        }
    }

    for quote in parsed.quotes {
        (shared.on_quote)(quote);
    }

    true
}
