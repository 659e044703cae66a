//! Session Identifiers
//!
//! TradingView scopes quote and chart traffic to logical sub-channels
//! within one physical connection. Each sub-channel is named by a random
//! token generated client-side: `qs_<12 letters>` for the quote session
//! and `cs_<12 letters>` for the chart session.

use rand::Rng;

/// Length of the random part of a session identifier.
pub const SESSION_ID_LEN: usize = 12;

/// Prefix for quote session identifiers.
pub const QUOTE_SESSION_PREFIX: &str = "qs_";

/// Prefix for chart session identifiers.
pub const CHART_SESSION_PREFIX: &str = "cs_";

const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Bits consumed per candidate letter index.
const INDEX_BITS: u32 = 6;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
/// Usable 6-bit chunks in one 64-bit draw.
const INDEX_MAX: u32 = u64::BITS / INDEX_BITS;

/// Generate a random identifier of `length` letters.
///
/// Draws a 64-bit random value and consumes it six bits at a time as a
/// candidate index into the 52-letter alphabet. Chunks whose value falls
/// outside the alphabet are rejected and a fresh chunk is drawn, so every
/// letter is equally likely. The 64-bit cache is refilled once its chunks
/// are exhausted.
#[must_use]
pub fn random_identifier(length: usize) -> String {
    let mut rng = rand::rng();
    let mut out = String::with_capacity(length);

    let mut cache: u64 = rng.random();
    let mut remain = INDEX_MAX;

    while out.len() < length {
        if remain == 0 {
            cache = rng.random();
            remain = INDEX_MAX;
        }
        let idx = (cache & INDEX_MASK) as usize;
        cache >>= INDEX_BITS;
        remain -= 1;

        if let Some(&letter) = ALPHABET.get(idx) {
            out.push(char::from(letter));
        }
    }

    out
}

/// The pair of session identifiers owned by one connection.
///
/// Generated once at connect time and immutable thereafter.
#[derive(Debug, Clone)]
pub struct SessionIds {
    quote: String,
    chart: String,
}

impl SessionIds {
    /// Name of the chart series created by quote requests.
    pub const SERIES_NAME: &'static str = "price";

    /// Alias under which symbols are resolved within the chart session.
    pub const SYMBOL_ALIAS: &'static str = "symbol_1";

    /// Generate a fresh pair of session identifiers.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            quote: format!("{QUOTE_SESSION_PREFIX}{}", random_identifier(SESSION_ID_LEN)),
            chart: format!("{CHART_SESSION_PREFIX}{}", random_identifier(SESSION_ID_LEN)),
        }
    }

    /// The quote session identifier (`qs_`-prefixed).
    #[must_use]
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// The chart session identifier (`cs_`-prefixed).
    #[must_use]
    pub fn chart(&self) -> &str {
        &self.chart
    }
}
