//! Wire Framing
//!
//! TradingView multiplexes messages over the WebSocket as length-prefixed
//! frames: `~m~<decimal payload length>~m~<payload>`. A single transport
//! message may carry several frames concatenated back to back with no
//! separator beyond each frame's own header.
//!
//! Keep-alive frames carry a payload whose first byte is `~` (for example
//! `~m~4~m~~h~7`). They are not JSON and must be echoed back to the server
//! verbatim instead of being decoded.

use thiserror::Error;

/// The frame header marker. Appears twice per header, around the length.
pub const FRAME_MARKER: &str = "~m~";

/// Header bytes besides the length digits (two three-byte markers).
const MARKER_OVERHEAD: usize = 2 * FRAME_MARKER.len();

/// Errors raised while splitting a packet into frames.
///
/// Any of these aborts the entire packet: once the length prefix cannot
/// be trusted there is no way to find the next frame boundary.
#[derive(Debug, Clone, Error)]
pub enum FramingError {
    /// The packet does not continue with a `~m~` header marker.
    #[error("expected `~m~` frame marker at offset {offset}")]
    MissingMarker {
        /// Byte offset into the packet where the marker was expected.
        offset: usize,
    },

    /// The length prefix is not a decimal integer.
    #[error("invalid frame length prefix {prefix:?}")]
    InvalidLength {
        /// The raw characters found between the header markers.
        prefix: String,
    },

    /// The declared payload length runs past the end of the packet.
    #[error("frame payload of {length} bytes overruns the packet ({remaining} bytes remain)")]
    Overrun {
        /// Declared payload length.
        length: usize,
        /// Bytes remaining in the packet after the header.
        remaining: usize,
    },
}

/// One frame borrowed from a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// The frame exactly as received, header included. Keep-alives are
    /// echoed back from this.
    pub raw: &'a str,
    /// The frame payload (the bytes after the header).
    pub payload: &'a str,
}

impl Frame<'_> {
    /// Whether this frame is a server keep-alive ("heartbeat").
    ///
    /// Keep-alives are identified by the first byte of the payload, not
    /// of the whole frame.
    #[must_use]
    pub fn is_keep_alive(&self) -> bool {
        self.payload.starts_with('~')
    }
}

/// Encode a serialized payload into a single wire frame.
///
/// The length is the payload's byte length in decimal with no leading
/// zeros. No escaping is needed inside the payload because the length is
/// explicit rather than delimiter-based.
#[must_use]
pub fn encode(payload: &str) -> String {
    format!("{FRAME_MARKER}{}{FRAME_MARKER}{payload}", payload.len())
}

/// Split a packet into its frames.
///
/// Applies the header grammar repeatedly until the packet is exhausted:
/// scan past the leading `~m~`, accumulate decimal digits up to the next
/// `~`, and take that many payload bytes after the header (whose total
/// size is six marker bytes plus the digits).
///
/// # Errors
///
/// Returns a [`FramingError`] when a header is malformed or a declared
/// payload would run past the packet end. The whole packet is abandoned
/// in that case; there is no resynchronization.
pub fn split(packet: &str) -> Result<Vec<Frame<'_>>, FramingError> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < packet.len() {
        let rest = &packet[offset..];
        if !rest.starts_with(FRAME_MARKER) {
            return Err(FramingError::MissingMarker { offset });
        }

        let after_marker = &rest[FRAME_MARKER.len()..];
        let prefix = after_marker
            .split('~')
            .next()
            .unwrap_or(after_marker);
        let length: usize = prefix.parse().map_err(|_| FramingError::InvalidLength {
            prefix: prefix.to_string(),
        })?;

        let header_len = MARKER_OVERHEAD + prefix.len();
        // The length prefix is attacker-controlled; an unchecked add can
        // wrap around instead of overrunning.
        let end = offset
            .checked_add(header_len)
            .and_then(|n| n.checked_add(length))
            .ok_or(FramingError::Overrun {
                length,
                remaining: packet.len().saturating_sub(offset + header_len),
            })?;
        let (raw, payload) = match (packet.get(offset..end), packet.get(offset + header_len..end)) {
            (Some(raw), Some(payload)) => (raw, payload),
            _ => {
                return Err(FramingError::Overrun {
                    length,
                    remaining: packet.len().saturating_sub(offset + header_len),
                });
            }
        };

        frames.push(Frame { raw, payload });
        offset = end;
    }

    Ok(frames)
}
