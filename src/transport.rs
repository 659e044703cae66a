//! Transport Port
//!
//! The protocol layer only needs a bidirectional text-message stream:
//! send text, receive the next message, close. [`Transport`] is that
//! port; [`WsTransport`] is the production adapter over
//! `tokio-tungstenite`. Tests (and embedders with their own plumbing)
//! can supply any other implementation through
//! [`StreamClient::connect_with`](crate::StreamClient::connect_with).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Errors raised by a transport implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Dialing the remote endpoint failed.
    #[error("failed to connect: {0}")]
    Connect(String),

    /// A write failed.
    #[error("send failed: {0}")]
    Send(String),

    /// A read failed.
    #[error("receive failed: {0}")]
    Recv(String),

    /// The remote end closed the connection (or the local side already
    /// closed it and a blocked receive unwound).
    #[error("connection closed")]
    Closed,
}

/// One message received from the transport.
#[derive(Debug, Clone)]
pub enum TransportMessage {
    /// A text message: one protocol packet.
    Text(String),
    /// A binary message. The protocol is textual; these are ignored.
    Binary(Vec<u8>),
    /// Transport-level control traffic (ping/pong and the like).
    Control,
}

/// A bidirectional text-message stream.
///
/// `recv` has blocking semantics: it resolves with the next message or
/// with an error once the connection is gone. Closing the transport from
/// another task must cause a blocked `recv` to return an error.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text message.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Receive the next message.
    async fn recv(&mut self) -> Result<TransportMessage, TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// WebSocket transport over `tokio-tungstenite`.
pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Dial `url` and complete the WebSocket handshake.
    ///
    /// The upgrade request carries the browser-like headers the service
    /// expects from a web client (`Origin`, `User-Agent`, and friends).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when the URL is invalid or
    /// the dial/upgrade fails.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert("Origin", HeaderValue::from_static("https://www.tradingview.com"));
        headers.insert(
            "User-Agent",
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/86.0.4240.193 Safari/537.36",
            ),
        );
        headers.insert(
            "Accept-Language",
            HeaderValue::from_static("en-US,en;q=0.9,es;q=0.8"),
        );
        headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
        headers.insert("Pragma", HeaderValue::from_static("no-cache"));

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self { inner: stream })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Result<TransportMessage, TransportError> {
        match self.inner.next().await {
            None | Some(Ok(Message::Close(_))) => Err(TransportError::Closed),
            Some(Ok(Message::Text(text))) => Ok(TransportMessage::Text(text.to_string())),
            Some(Ok(Message::Binary(bytes))) => Ok(TransportMessage::Binary(bytes.to_vec())),
            Some(Ok(_)) => Ok(TransportMessage::Control),
            Some(Err(e)) => Err(TransportError::Recv(e.to_string())),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .close(None)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
