//! Error types for the protocol layer.
//!
//! Decoding and encoding fail for different reasons and are handled by
//! different callers, so each direction gets its own enum. Every decode
//! failure is recoverable: the caller logs it, drops that one buffer, and
//! keeps the session running.

/// Why a buffer could not be turned into a [`Message`](crate::Message).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The leading discriminator byte names no known message kind.
    ///
    /// Usually a newer server speaking a protocol extension, or stray
    /// bytes. Skip the buffer and carry on.
    #[error("unknown message kind {0:#04x}")]
    UnknownKind(u8),

    /// The JSON `"type"` tag names no known message kind.
    #[error("unknown message type tag {0:?}")]
    UnknownTag(String),

    /// The kind is known but its fields don't match the layout: empty or
    /// truncated buffer, invalid boolean, invalid UTF-8, trailing bytes.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Why a [`Message`](crate::Message) could not be turned into bytes.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// A string or byte field is longer than its `u32` length prefix can
    /// describe.
    #[error("field `{field}` is too long to encode ({len} bytes)")]
    FieldTooLong { field: &'static str, len: usize },

    /// JSON serialization failed.
    #[cfg(feature = "json")]
    #[error("json encode failed: {0}")]
    Json(#[from] serde_json::Error),
}
