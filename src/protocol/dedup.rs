//! In-Packet Duplicate Suppression
//!
//! The service occasionally repeats the same quote update several times
//! within one packet. Only one copy is delivered to the caller: an entry
//! survives when no later entry in the same packet has a byte-identical
//! canonical serialization, so within a run of identical duplicates the
//! last occurrence is the one kept. Survivors keep their original
//! ascending packet-order positions.

use super::quote::QuoteUpdate;

/// Remove redundant duplicate quote updates from one parsed packet.
///
/// Pairwise comparison is quadratic in the number of quote entries.
/// Packets carry a handful of symbols in practice; revisit this if the
/// connection is ever asked to multiplex many symbols per packet.
#[must_use]
pub fn suppress_duplicates(quotes: Vec<QuoteUpdate>) -> Vec<QuoteUpdate> {
    let canonical: Vec<String> = quotes.iter().map(QuoteUpdate::canonical).collect();

    quotes
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !canonical[i + 1..].contains(&canonical[*i]))
        .map(|(_, quote)| quote)
        .collect()
}
