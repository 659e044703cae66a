//! Quote Updates
//!
//! Parses `qsd` envelope payloads into typed [`QuoteUpdate`] records.
//! The payload is a two-element array whose second element carries the
//! symbol (`n`), a status (`s`), and a map of per-field values (`v`).
//! Every field the service streams is optional; an update only carries
//! the fields that changed.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::envelope::ParseError;

/// Per-field values of a quote update. All optional; absent fields did
/// not change in this update.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuoteFields {
    /// Last price.
    #[serde(rename = "lp")]
    pub price: Option<f64>,
    /// Previous session close price.
    pub prev_close_price: Option<f64>,
    /// Regular session close price.
    pub regular_close_price: Option<f64>,
    /// Regular session close time (unix seconds).
    pub regular_close_time: Option<i64>,
    /// Session high.
    pub high_price: Option<f64>,
    /// Session low.
    pub low_price: Option<f64>,
    /// Session open price.
    pub open_price: Option<f64>,
    /// Session open time (unix seconds).
    pub open_time: Option<i64>,
    /// Traded volume.
    pub volume: Option<f64>,
    /// Best bid.
    pub bid: Option<f64>,
    /// Best ask.
    pub ask: Option<f64>,
    /// Price change since previous close.
    #[serde(rename = "ch")]
    pub change: Option<f64>,
    /// Time of the last price update (unix seconds).
    #[serde(rename = "lp_time")]
    pub time: Option<i64>,
}

/// One incremental update to a single symbol's live trading fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteUpdate {
    /// Symbol the update applies to, e.g. `NASDAQ:NVDA`.
    #[serde(rename = "n", default)]
    pub symbol: String,
    /// Update status; only `"ok"` updates are delivered.
    #[serde(rename = "s", default)]
    pub status: String,
    /// The changed fields, when present.
    #[serde(rename = "v")]
    pub fields: Option<QuoteFields>,
}

impl QuoteUpdate {
    /// Canonical serialized representation, used for in-packet duplicate
    /// comparison.
    #[must_use]
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl std::fmt::Display for QuoteUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.symbol)?;
        let Some(v) = &self.fields else {
            return Ok(());
        };
        if let Some(p) = v.open_price {
            write!(f, " open price: {p:7.2} |")?;
        }
        if let Some(p) = v.price {
            write!(f, " price: {p:7.2} |")?;
        }
        if let Some(t) = v.time.and_then(|t| DateTime::from_timestamp(t, 0)) {
            write!(f, " time: {t} |")?;
        }
        if let Some(p) = v.bid {
            write!(f, " bid: {p:7.2} |")?;
        }
        if let Some(p) = v.ask {
            write!(f, " ask: {p:7.2} |")?;
        }
        if let Some(t) = v.open_time.and_then(|t| DateTime::from_timestamp(t, 0)) {
            write!(f, " open time: {t} |")?;
        }
        if let Some(p) = v.regular_close_price {
            write!(f, " regular close price: {p:7.2} |")?;
        }
        if let Some(t) = v.regular_close_time.and_then(|t| DateTime::from_timestamp(t, 0)) {
            write!(f, " regular close time: {t} |")?;
        }
        if let Some(p) = v.high_price {
            write!(f, " high price: {p:7.2} |")?;
        }
        if let Some(p) = v.low_price {
            write!(f, " low price: {p:7.2} |")?;
        }
        if let Some(p) = v.prev_close_price {
            write!(f, " prev close price: {p:7.2} |")?;
        }
        if let Some(p) = v.change {
            write!(f, " change: {p:7.2} |")?;
        }
        if let Some(p) = v.volume {
            write!(f, " volume: {:7.2}M |", p / 1_000_000.0)?;
        }
        Ok(())
    }
}

/// Parse a `qsd` envelope payload into a [`QuoteUpdate`].
///
/// # Errors
///
/// - [`ParseError::PayloadShape`] when the payload is not a two-element
///   array.
/// - [`ParseError::FieldDecode`] when the second element does not decode
///   into a quote record.
/// - [`ParseError::Validation`] when the record decodes but its status is
///   not `"ok"`, its symbol is empty, or it carries no fields.
pub fn parse(payload: &Value) -> Result<QuoteUpdate, ParseError> {
    let Some(entries) = payload.as_array() else {
        return Err(ParseError::PayloadShape("payload is not an array".to_string()));
    };
    if entries.len() != 2 {
        return Err(ParseError::PayloadShape(format!(
            "expected a 2-element array, got {} elements",
            entries.len()
        )));
    }

    let update: QuoteUpdate =
        serde_json::from_value(entries[1].clone()).map_err(ParseError::FieldDecode)?;

    if update.status != "ok" {
        return Err(ParseError::Validation(format!(
            "status is {:?}, not \"ok\"",
            update.status
        )));
    }
    if update.symbol.is_empty() {
        return Err(ParseError::Validation("symbol is empty".to_string()));
    }
    if update.fields.is_none() {
        return Err(ParseError::Validation("no field values present".to_string()));
    }

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok_payload() -> Value {
        json!([
            "qs_session",
            {
                "n": "NASDAQ:NVDA",
                "s": "ok",
                "v": { "lp": 481.25, "ch": -2.5, "lp_time": 1_700_000_000, "volume": 12_000_000.0 }
            }
        ])
    }

    #[test]
    fn parses_a_valid_update() {
        let update = parse(&ok_payload()).unwrap();
        assert_eq!(update.symbol, "NASDAQ:NVDA");
        assert_eq!(update.status, "ok");
        let fields = update.fields.unwrap();
        assert_eq!(fields.price, Some(481.25));
        assert_eq!(fields.change, Some(-2.5));
        assert_eq!(fields.time, Some(1_700_000_000));
        assert_eq!(fields.bid, None);
    }

    #[test]
    fn unknown_field_keys_are_ignored() {
        let payload = json!([
            "qs_session",
            { "n": "X", "s": "ok", "v": { "lp": 1.0, "rtc": 7, "fractional": true } }
        ]);
        let update = parse(&payload).unwrap();
        assert_eq!(update.fields.unwrap().price, Some(1.0));
    }

    #[test]
    fn non_array_payload_is_a_shape_error() {
        assert!(matches!(
            parse(&json!({"n": "X"})),
            Err(ParseError::PayloadShape(_))
        ));
    }

    #[test]
    fn wrong_arity_is_a_shape_error() {
        assert!(matches!(
            parse(&json!(["qs_session"])),
            Err(ParseError::PayloadShape(_))
        ));
        assert!(matches!(
            parse(&json!(["qs_session", {}, {}])),
            Err(ParseError::PayloadShape(_))
        ));
    }

    #[test]
    fn non_object_record_is_a_decode_error() {
        assert!(matches!(
            parse(&json!(["qs_session", 42])),
            Err(ParseError::FieldDecode(_))
        ));
    }

    #[test]
    fn bad_status_fails_validation() {
        let payload = json!(["qs_session", { "n": "X", "s": "error", "v": {} }]);
        assert!(matches!(parse(&payload), Err(ParseError::Validation(_))));
    }

    #[test]
    fn empty_symbol_fails_validation() {
        let payload = json!(["qs_session", { "n": "", "s": "ok", "v": {} }]);
        assert!(matches!(parse(&payload), Err(ParseError::Validation(_))));
    }

    #[test]
    fn missing_fields_fail_validation() {
        let payload = json!(["qs_session", { "n": "X", "s": "ok" }]);
        assert!(matches!(parse(&payload), Err(ParseError::Validation(_))));
    }

    #[test]
    fn display_renders_session_timing_fields() {
        let payload = json!([
            "qs_session",
            {
                "n": "X",
                "s": "ok",
                "v": {
                    "open_time": 1_700_000_000,
                    "regular_close_price": 100.5,
                    "regular_close_time": 1_700_023_400
                }
            }
        ]);
        let rendered = parse(&payload).unwrap().to_string();
        assert!(rendered.contains("open time: 2023-11-14 22:13:20 UTC"));
        assert!(rendered.contains("regular close price:  100.50"));
        assert!(rendered.contains("regular close time: 2023-11-15 04:43:20 UTC"));
    }

    #[test]
    fn display_renders_present_fields_only() {
        let update = parse(&ok_payload()).unwrap();
        let rendered = update.to_string();
        assert!(rendered.contains("price:  481.25"));
        assert!(rendered.contains("volume:   12.00M"));
        assert!(!rendered.contains("bid"));
    }
}
