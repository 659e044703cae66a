//! Series Updates
//!
//! Parses `timescale_update` envelope payloads into ordered sequences of
//! OHLCV bars. The payload is an array whose second element nests the
//! bars under `price.s`, each bar carrying a positional `v` array of
//! `[time, open, high, low, close, volume]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::envelope::ParseError;

/// One OHLCV bar, oldest-to-newest as received from the service.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesBar {
    /// Bar open time (unix seconds).
    pub time: i64,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume.
    pub volume: i64,
}

impl SeriesBar {
    /// The bar open time as a UTC timestamp, when representable.
    #[must_use]
    pub fn time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}

#[derive(Deserialize)]
struct SeriesNode {
    price: PriceNode,
}

#[derive(Deserialize)]
struct PriceNode {
    s: Vec<BarNode>,
}

#[derive(Deserialize)]
struct BarNode {
    #[serde(default)]
    v: Vec<f64>,
}

/// Parse a `timescale_update` envelope payload into its bars.
///
/// Parsing is all-or-nothing per payload: any missing key or wrong shape
/// along the `p[1].price.s` path discards the whole payload with a
/// [`ParseError::SeriesShape`]. Within each bar, positions beyond the
/// sixth are ignored and missing positions are left at zero.
///
/// No symbol is recovered at this layer; the wire payload does not carry
/// one. The client attaches the symbol of the originating series request.
///
/// # Errors
///
/// Returns [`ParseError::SeriesShape`] as described above.
pub fn parse(payload: &Value) -> Result<Vec<SeriesBar>, ParseError> {
    let Some(entries) = payload.as_array() else {
        return Err(ParseError::SeriesShape("payload is not an array".to_string()));
    };
    let Some(node) = entries.get(1) else {
        return Err(ParseError::SeriesShape(
            "payload has fewer than 2 elements".to_string(),
        ));
    };

    let series: SeriesNode = serde_json::from_value(node.clone())
        .map_err(|e| ParseError::SeriesShape(format!("no `price.s` bar array: {e}")))?;

    Ok(series.price.s.iter().map(|bar| bar_from_values(&bar.v)).collect())
}

#[allow(clippy::cast_possible_truncation)]
fn bar_from_values(v: &[f64]) -> SeriesBar {
    SeriesBar {
        time: v.first().copied().unwrap_or_default() as i64,
        open: v.get(1).copied().unwrap_or_default(),
        high: v.get(2).copied().unwrap_or_default(),
        low: v.get(3).copied().unwrap_or_default(),
        close: v.get(4).copied().unwrap_or_default(),
        volume: v.get(5).copied().unwrap_or_default() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_with_bars(bars: Value) -> Value {
        json!(["cs_session", { "price": { "s": bars, "node": "n1" } }])
    }

    #[test]
    fn parses_bars_in_received_order() {
        let payload = payload_with_bars(json!([
            { "i": 0, "v": [1_700_000_000.0, 10.0, 12.0, 9.5, 11.0, 1500.0] },
            { "i": 1, "v": [1_700_003_600.0, 11.0, 13.0, 10.5, 12.5, 900.0] }
        ]));
        let bars = parse(&payload).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0],
            SeriesBar {
                time: 1_700_000_000,
                open: 10.0,
                high: 12.0,
                low: 9.5,
                close: 11.0,
                volume: 1500
            }
        );
        assert_eq!(bars[1].time, 1_700_003_600);
        assert_eq!(bars[1].volume, 900);
    }

    #[test]
    fn extra_value_positions_are_ignored() {
        let payload =
            payload_with_bars(json!([{ "v": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0] }]));
        let bars = parse(&payload).unwrap();
        assert_eq!(bars[0].volume, 6);
    }

    #[test]
    fn short_value_arrays_leave_zero_defaults() {
        let payload = payload_with_bars(json!([{ "v": [1_700_000_000.0, 42.0] }]));
        let bars = parse(&payload).unwrap();
        assert_eq!(bars[0].open, 42.0);
        assert_eq!(bars[0].close, 0.0);
        assert_eq!(bars[0].volume, 0);
    }

    #[test]
    fn empty_bar_list_yields_no_bars() {
        assert!(parse(&payload_with_bars(json!([]))).unwrap().is_empty());
    }

    #[test]
    fn non_array_payload_is_a_shape_error() {
        assert!(matches!(
            parse(&json!({"price": {}})),
            Err(ParseError::SeriesShape(_))
        ));
    }

    #[test]
    fn single_element_payload_is_a_shape_error() {
        assert!(matches!(
            parse(&json!(["cs_session"])),
            Err(ParseError::SeriesShape(_))
        ));
    }

    #[test]
    fn missing_price_key_discards_the_payload() {
        let payload = json!(["cs_session", { "zoffset": 3 }]);
        assert!(matches!(parse(&payload), Err(ParseError::SeriesShape(_))));
    }

    #[test]
    fn malformed_bar_discards_the_whole_payload() {
        // Second bar is broken; the first must not leak through.
        let payload = payload_with_bars(json!([
            { "v": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0] },
            { "v": "not an array" }
        ]));
        assert!(matches!(parse(&payload), Err(ParseError::SeriesShape(_))));
    }

    #[test]
    fn time_utc_converts_the_bar_time() {
        let bar = SeriesBar {
            time: 1_700_000_000,
            ..SeriesBar::default()
        };
        assert_eq!(bar.time_utc().unwrap().timestamp(), 1_700_000_000);
    }
}
