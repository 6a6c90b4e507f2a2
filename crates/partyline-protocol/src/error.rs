//! Error types for the protocol layer.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages.
///
/// Decode failures are expected in normal operation (a truncated frame
/// from a misbehaving peer, a corrupted length prefix) and must never
/// take down the receive loop: the caller logs the error and drops the
/// frame. An *unknown tag* is deliberately not an error; it decodes to
/// [`Message::Unknown`](crate::Message::Unknown) instead.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame ended before a field could be read in full.
    #[error("truncated frame: tag {tag:#04x} needs {needed} more byte(s)")]
    Truncated { tag: u8, needed: usize },

    /// The frame was empty (not even a tag byte).
    #[error("empty frame")]
    Empty,

    /// A frame exceeded the maximum allowed size.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// A string field did not contain valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A discriminant or flag byte held a value outside its legal set.
    #[error("invalid {what} value {value}")]
    InvalidValue { what: &'static str, value: u32 },

    /// A known message decoded cleanly but left bytes unread, which
    /// means the sender speaks a different layout.
    #[error("frame for tag {tag:#04x} has {extra} trailing byte(s)")]
    TrailingBytes { tag: u8, extra: usize },

    /// A string or list was too long for its length prefix.
    #[error("{what} of length {len} exceeds the wire limit {max}")]
    FieldTooLong {
        what: &'static str,
        len: usize,
        max: usize,
    },
}
