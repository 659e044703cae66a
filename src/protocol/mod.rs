//! Wire Protocol
//!
//! Everything between raw transport text and typed events: the
//! length-prefixed framing codec, envelope classification, the payload
//! parsers for quote and series updates, in-packet duplicate
//! suppression, and the whole-packet pipeline that ties them together.

pub mod dedup;
pub mod envelope;
pub mod frame;
pub mod packet;
pub mod quote;
pub mod series;
