// Wire protocol: message definitions, binary codec, transcript accumulator.

pub mod messages;
pub mod transcript;

use std::time::{SystemTime, UNIX_EPOCH};

/// Protocol version carried in every [`messages::CommonHeader`].
pub const PROTOCOL_VERSION: u16 = 1;

/// Upper bound on the encoded size of either Hello message.
///
/// Hellos are exchanged before any message-size negotiation has happened, so
/// the protocol itself guarantees they fit a single minimum-size packet at
/// the transport layer, regardless of key algorithm.
pub const MAX_HELLO_MESSAGE_SIZE: usize = 1024;

/// Current unix timestamp in milliseconds (0 if the clock is before epoch).
pub(crate) fn unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
