//! Error Taxonomy
//!
//! Everything that can go wrong on a connection, in one enum, together
//! with the context tags the error sink receives alongside each report.
//!
//! Fatality is a property of the variant: [`SocketError::Transport`] and
//! [`SocketError::Handshake`] terminate the connection (or abort
//! connect), [`SocketError::Framing`] abandons one packet, and
//! [`SocketError::Parse`] skips one frame. Frame-local errors never stop
//! the read loop.

use thiserror::Error;

use crate::client::ConnectionState;
use crate::protocol::envelope::ParseError;
use crate::protocol::frame::FramingError;
use crate::transport::TransportError;

/// Any error surfaced by the stream client.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Dial, read, or write failure. Fatal; the connection is closed and
    /// a fresh connect is required.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The first inbound message did not carry a `session_id`. Fatal for
    /// the connect attempt.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A packet could not be split into frames. The whole packet is
    /// dropped; the connection continues.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// A single frame could not be decoded or failed validation. The
    /// frame is skipped; the rest of the packet is processed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An outbound command could not be serialized.
    #[error("failed to encode an outbound command: {0}")]
    Encode(#[from] serde_json::Error),

    /// A control operation was called while the connection was not in
    /// the `Ready` state.
    #[error("connection is not ready (state: {0})")]
    NotReady(ConnectionState),

    /// The connection task is no longer running.
    #[error("connection task is no longer running")]
    ChannelClosed,
}

/// Context tags passed to the error sink, identifying the phase in which
/// an error occurred.
pub mod context {
    /// Establishing the connection and running the setup sequence.
    pub const INIT: &str = "initializing the connection";
    /// Verifying the server hello carries a session id.
    pub const HANDSHAKE: &str = "checking the first received message for a session id";
    /// Writing a command frame.
    pub const SEND: &str = "sending a message";
    /// Echoing a keep-alive frame back to the server.
    pub const KEEP_ALIVE: &str = "sending the keep alive message";
    /// Splitting an inbound packet into frames.
    pub const SPLIT: &str = "getting the payload length";
    /// Decoding and parsing a frame payload.
    pub const PARSE: &str = "decoding the JSON message";
    /// Receiving from the transport.
    pub const READ: &str = "reading new messages through the socket connection";
}
