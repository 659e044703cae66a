//! Packet Pipeline
//!
//! One inbound transport message is one packet. This module runs the
//! decode pipeline over its already-split frames: classify and parse
//! each envelope and suppress duplicate quote updates. The result is a
//! [`ParsedPacket`] the dispatcher can act on without further protocol
//! knowledge.
//!
//! Keep-alive frames are skipped here, never decoded; the dispatcher
//! echoes them before this pipeline runs.

use super::dedup;
use super::envelope::{self, EnvelopeKind, ParseError};
use super::frame::Frame;
use super::quote::{self, QuoteUpdate};
use super::series::{self, SeriesBar};

/// Everything extracted from one packet.
#[derive(Debug, Default)]
pub struct ParsedPacket {
    /// Deduplicated quote updates, in delivery order.
    pub quotes: Vec<QuoteUpdate>,
    /// Series batches, one per `timescale_update` frame, in frame order.
    pub series: Vec<Vec<SeriesBar>>,
    /// Frame-local faults. Each one skipped a single frame; the rest of
    /// the packet was still processed.
    pub faults: Vec<ParseError>,
}

/// Run the decode pipeline over one packet's frames.
///
/// Payload-level problems are collected as frame-local
/// [`ParsedPacket::faults`]; they never abort the rest of the packet.
#[must_use]
pub fn parse_frames(frames: &[Frame<'_>]) -> ParsedPacket {
    let mut parsed = ParsedPacket::default();

    for payload in frames.iter().filter(|f| !f.is_keep_alive()).map(|f| f.payload) {
        let env = match envelope::decode(payload) {
            Ok(env) => env,
            Err(fault) => {
                parsed.faults.push(fault);
                continue;
            }
        };

        match env.kind() {
            EnvelopeKind::Ignored => {}
            EnvelopeKind::ProtocolError => {
                parsed.faults.push(ParseError::Protocol(payload.to_string()));
            }
            EnvelopeKind::QuoteUpdate => match quote::parse(&env.payload) {
                Ok(update) => parsed.quotes.push(update),
                Err(fault) => parsed.faults.push(fault),
            },
            EnvelopeKind::SeriesUpdate => match series::parse(&env.payload) {
                Ok(bars) => parsed.series.push(bars),
                Err(fault) => parsed.faults.push(fault),
            },
        }
    }

    parsed.quotes = dedup::suppress_duplicates(parsed.quotes);
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{self, encode};

    fn parse(packet: &str) -> ParsedPacket {
        parse_frames(&frame::split(packet).unwrap())
    }

    fn qsd_frame(symbol: &str, price: f64) -> String {
        encode(&format!(
            r#"{{"m":"qsd","p":["qs_s",{{"n":"{symbol}","s":"ok","v":{{"lp":{price}}}}}]}}"#
        ))
    }

    #[test]
    fn unrecognized_message_produces_nothing() {
        // An envelope with an unknown discriminator is structurally
        // valid, fires no callback, and reports no error.
        let parsed = parse(&encode(r#"{"m":"x","p":[1,2]}"#));
        assert!(parsed.quotes.is_empty());
        assert!(parsed.series.is_empty());
        assert!(parsed.faults.is_empty());
    }

    #[test]
    fn keep_alive_frames_are_skipped_and_never_decoded() {
        // "~h~3" is not JSON; decoding it would register a fault.
        let packet = format!("~m~4~m~~h~3{}", qsd_frame("A", 1.0));
        let parsed = parse(&packet);
        assert_eq!(parsed.quotes.len(), 1);
        assert!(parsed.faults.is_empty());
    }

    #[test]
    fn duplicate_quotes_collapse_to_one_delivery() {
        let packet = format!(
            "{}{}{}",
            qsd_frame("A", 1.0),
            qsd_frame("A", 1.0),
            qsd_frame("A", 1.0)
        );
        let parsed = parse(&packet);
        assert_eq!(parsed.quotes.len(), 1);
        assert_eq!(parsed.quotes[0].symbol, "A");
    }

    #[test]
    fn error_envelope_is_a_fault_and_later_frames_still_parse() {
        let packet = format!(
            "{}{}",
            encode(r#"{"m":"critical_error","p":["boom"]}"#),
            qsd_frame("A", 2.0)
        );
        let parsed = parse(&packet);
        assert_eq!(parsed.faults.len(), 1);
        assert!(matches!(parsed.faults[0], ParseError::Protocol(_)));
        assert_eq!(parsed.quotes.len(), 1);
    }

    #[test]
    fn malformed_json_frame_is_skipped_not_fatal() {
        let packet = format!("{}{}", encode("{broken"), qsd_frame("A", 2.0));
        let parsed = parse(&packet);
        assert_eq!(parsed.faults.len(), 1);
        assert!(matches!(parsed.faults[0], ParseError::Decode(_)));
        assert_eq!(parsed.quotes.len(), 1);
    }

    #[test]
    fn invalid_quote_is_a_validation_fault_with_no_delivery() {
        let packet = encode(r#"{"m":"qsd","p":["qs_s",{"n":"A","s":"error","v":{}}]}"#);
        let parsed = parse(&packet);
        assert!(parsed.quotes.is_empty());
        assert!(matches!(parsed.faults[0], ParseError::Validation(_)));
    }

    #[test]
    fn series_frames_bypass_deduplication() {
        let series_payload =
            r#"{"m":"timescale_update","p":["cs_s",{"price":{"s":[{"v":[1.0,2.0,3.0,1.5,2.5,10.0]}]}}]}"#;
        let packet = format!("{}{}", encode(series_payload), encode(series_payload));
        let parsed = parse(&packet);
        assert_eq!(parsed.series.len(), 2);
        assert_eq!(parsed.series[0][0].volume, 10);
    }
}
