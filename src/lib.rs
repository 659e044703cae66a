#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value
    )
)]

//! TradingView Stream Client
//!
//! A client-side protocol layer for TradingView's real-time market-data
//! WebSocket. Maintains one persistent connection, decodes the service's
//! custom length-prefixed framing, classifies and parses quote and
//! series updates, suppresses in-packet duplicates, and dispatches typed
//! results to caller-supplied callbacks.
//!
//! # Layers (inside → outside)
//!
//! - **Protocol**: pure codecs and parsers, no I/O
//!   - `frame`: `~m~<len>~m~` framing codec and keep-alive detection
//!   - `envelope`: JSON envelope decode and `m`-discriminator dispatch
//!   - `quote` / `series`: typed payload parsers
//!   - `dedup`: in-packet duplicate suppression
//!   - `packet`: whole-packet pipeline
//! - **Session**: random sub-channel identifiers
//! - **Transport**: the text-message port and its tungstenite adapter
//! - **Client**: connection state machine, dispatcher loop, control
//!   surface
//!
//! # Data Flow
//!
//! ```text
//! transport text ──► frame::split ──► envelope::decode ──┬─► quote::parse ──► dedup ──► on_quote
//!                        │                               └─► series::parse ─────────► on_series
//!                        └─► keep-alive frames ── echoed back verbatim
//! ```
//!
//! # Lifecycle
//!
//! There is no reconnection: any fatal error (handshake failure,
//! transport failure) terminates the connection, and callers observing
//! one through the error sink create a fresh client.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Connection state machine, dispatcher loop, and control surface.
pub mod client;

/// Connection configuration and protocol constants.
pub mod config;

/// Error taxonomy and error-sink context tags.
pub mod error;

/// Wire protocol: framing, envelopes, payload parsers, deduplication.
pub mod protocol;

/// Session identifier generation.
pub mod session;

/// Transport port and the WebSocket adapter.
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

// Client surface
pub use client::{
    ConnectionState, ErrorCallback, QuoteCallback, SeriesCallback, StreamClient,
};

// Configuration
pub use config::{
    ClientConfig, DEFAULT_AUTH_TOKEN, DEFAULT_QUOTE_FIELDS, DEFAULT_URL, INTERVALS,
};

// Errors
pub use error::{SocketError, context};
pub use protocol::envelope::ParseError;
pub use protocol::frame::FramingError;
pub use transport::TransportError;

// Protocol types
pub use protocol::envelope::{Envelope, EnvelopeKind};
pub use protocol::quote::{QuoteFields, QuoteUpdate};
pub use protocol::series::SeriesBar;

// Session identifiers
pub use session::SessionIds;

// Transport port (for custom transports and integration tests)
pub use transport::{Transport, TransportMessage, WsTransport};
