//! Message Envelopes
//!
//! Every non-keep-alive frame payload is a JSON envelope of the shape
//! `{"m": "<command-or-event-name>", "p": <array>}`. Inbound envelopes
//! are classified by their `m` discriminator; outbound commands are built
//! through the constructors on [`Envelope`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use super::frame;

/// Errors raised while decoding a single frame payload.
///
/// All of these are frame-local: the offending frame is skipped and the
/// rest of the packet is still processed.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The frame payload is not valid envelope JSON.
    #[error("malformed JSON envelope: {0}")]
    Decode(#[from] serde_json::Error),

    /// The remote reported an `error` or `critical_error` event.
    #[error("remote reported a protocol error: {0}")]
    Protocol(String),

    /// A quote payload was not a two-element array.
    #[error("unexpected quote payload shape: {0}")]
    PayloadShape(String),

    /// A quote record inside the payload could not be decoded.
    #[error("quote record could not be decoded: {0}")]
    FieldDecode(#[source] serde_json::Error),

    /// A series payload did not have the nested `price.s` structure.
    #[error("unexpected series payload shape: {0}")]
    SeriesShape(String),

    /// A quote record decoded but is semantically incomplete.
    #[error("incomplete quote update: {0}")]
    Validation(String),
}

/// Classification of an inbound envelope by its `m` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// `qsd` - an incremental quote update.
    QuoteUpdate,
    /// `timescale_update` - a batch of OHLCV bars.
    SeriesUpdate,
    /// `error` / `critical_error` - the remote reported a failure.
    ProtocolError,
    /// Session-management acknowledgements and anything else; valid but
    /// carries nothing to deliver.
    Ignored,
}

/// The JSON envelope carried inside a frame payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Command or event name.
    #[serde(rename = "m")]
    pub message: String,
    /// Opaque payload, usually an array.
    #[serde(rename = "p", default)]
    pub payload: Value,
}

impl Envelope {
    /// Build an envelope from a message name and a payload value.
    #[must_use]
    pub fn new(message: impl Into<String>, payload: Value) -> Self {
        Self {
            message: message.into(),
            payload,
        }
    }

    /// Classify this envelope by its discriminator.
    #[must_use]
    pub fn kind(&self) -> EnvelopeKind {
        match self.message.as_str() {
            "critical_error" | "error" => EnvelopeKind::ProtocolError,
            "timescale_update" => EnvelopeKind::SeriesUpdate,
            "qsd" => EnvelopeKind::QuoteUpdate,
            _ => EnvelopeKind::Ignored,
        }
    }

    /// Serialize this envelope and wrap it in a wire frame.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails (should not happen
    /// with valid payload values).
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        Ok(frame::encode(&serde_json::to_string(self)?))
    }

    // -------------------------------------------------------------------------
    // Outbound command catalog
    // -------------------------------------------------------------------------

    /// `set_auth_token` - authenticate the connection.
    #[must_use]
    pub fn set_auth_token(token: &str) -> Self {
        Self::new("set_auth_token", json!([token]))
    }

    /// `chart_create_session` - open the chart sub-channel.
    #[must_use]
    pub fn chart_create_session(chart_session: &str) -> Self {
        Self::new("chart_create_session", json!([chart_session, ""]))
    }

    /// `quote_create_session` - open the quote sub-channel.
    #[must_use]
    pub fn quote_create_session(quote_session: &str) -> Self {
        Self::new("quote_create_session", json!([quote_session]))
    }

    /// `quote_set_fields` - select the per-symbol fields the server
    /// includes in `qsd` updates.
    #[must_use]
    pub fn quote_set_fields(quote_session: &str, fields: &[String]) -> Self {
        let mut p = vec![Value::from(quote_session)];
        p.extend(fields.iter().map(|f| Value::from(f.as_str())));
        Self::new("quote_set_fields", Value::Array(p))
    }

    /// `quote_add_symbols` - start streaming updates for a symbol.
    #[must_use]
    pub fn quote_add_symbols(quote_session: &str, symbol: &str) -> Self {
        Self::new("quote_add_symbols", json!([quote_session, symbol]))
    }

    /// `quote_remove_symbols` - stop streaming updates for a symbol.
    #[must_use]
    pub fn quote_remove_symbols(quote_session: &str, symbol: &str) -> Self {
        Self::new("quote_remove_symbols", json!([quote_session, symbol]))
    }

    /// `resolve_symbol` - bind a symbol to an alias within the chart
    /// session. The symbol travels embedded in a literal JSON string
    /// parameter, as the service expects.
    #[must_use]
    pub fn resolve_symbol(chart_session: &str, alias: &str, symbol: &str) -> Self {
        let spec = format!(r#"={{"symbol": "{symbol}"}}"#);
        Self::new("resolve_symbol", json!([chart_session, alias, spec]))
    }

    /// `create_series` - request `bar_count` bars of `interval` resolution
    /// for a previously resolved alias.
    #[must_use]
    pub fn create_series(
        chart_session: &str,
        series_name: &str,
        alias: &str,
        interval: &str,
        bar_count: u32,
    ) -> Self {
        Self::new(
            "create_series",
            json!([chart_session, series_name, series_name, alias, interval, bar_count]),
        )
    }
}

/// Decode a frame payload into an envelope.
///
/// # Errors
///
/// Returns [`ParseError::Decode`] when the payload is not valid JSON of
/// the envelope shape.
pub fn decode(payload: &str) -> Result<Envelope, ParseError> {
    Ok(serde_json::from_str(payload)?)
}
