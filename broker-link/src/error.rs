//! Error types for the broker-link crate.

use std::time::Duration;

use crate::link::LinkRole;

/// Errors raised while encoding or decoding hpfeeds frames.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Declared length is smaller than the fixed header
    #[error("Frame length {0} is shorter than the header")]
    TooShort(usize),

    /// Declared or encoded length exceeds the broker limit
    #[error("Frame length {0} exceeds the 1 MiB limit")]
    TooLarge(usize),

    /// Opcode byte is not part of the protocol
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),

    /// Body ended before a field was complete
    #[error("Frame body truncated while reading {field}")]
    Truncated {
        /// Field being read
        field: &'static str,
    },

    /// A length-prefixed field does not fit in one byte of length
    #[error("Field {field} is {len} bytes, limit is 255")]
    FieldTooLong {
        /// Field being written
        field: &'static str,
        /// Actual length
        len: usize,
    },

    /// A text field is not valid UTF-8
    #[error("Field {field} is not valid UTF-8")]
    InvalidText {
        /// Field being read
        field: &'static str,
    },
}

impl FrameError {
    /// Whether the error is confined to the body of a complete frame.
    ///
    /// The frame has already been consumed, so the stream stays in sync and
    /// only that frame is lost.
    pub fn is_body_error(&self) -> bool {
        matches!(
            self,
            FrameError::Truncated { .. } | FrameError::InvalidText { .. }
        )
    }
}

/// Errors returned by link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// TCP connection could not be established
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        /// host:port of the broker
        endpoint: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Connect or handshake did not finish in time
    #[error("Connection to {endpoint} timed out after {timeout:?}")]
    ConnectTimeout {
        /// host:port of the broker
        endpoint: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// Broker answered the handshake with something unexpected
    #[error("Handshake with {endpoint} failed: {reason}")]
    Handshake {
        /// host:port of the broker
        endpoint: String,
        /// What went wrong
        reason: String,
    },

    /// Broker sent an ERROR frame during the handshake
    #[error("Broker {endpoint} rejected the session: {message}")]
    Rejected {
        /// host:port of the broker
        endpoint: String,
        /// Error text sent by the broker
        message: String,
    },

    /// Wire format error
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Socket error after the connection was established
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation needs a connected link
    #[error("Link is not connected")]
    NotConnected,

    /// connect() called on a link that is already up
    #[error("Link is already connected")]
    AlreadyConnected,

    /// Link was closed and cannot be reused
    #[error("Link is closed")]
    Closed,
}

impl LinkError {
    /// Whether this error happened while establishing the session
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            LinkError::Connect { .. }
                | LinkError::ConnectTimeout { .. }
                | LinkError::Handshake { .. }
                | LinkError::Rejected { .. }
        )
    }
}

/// What kind of protocol-level failure a link observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// The broker sent an ERROR frame
    Broker(String),
    /// The broker closed the connection
    Disconnected,
    /// A frame could not be decoded; the stream is no longer in sync
    Malformed(String),
    /// Reading from or writing to the socket failed
    Io(String),
}

/// Out-of-band notification that a live session failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{role} link: {kind}")]
pub struct ProtocolError {
    /// Which link raised the notification
    pub role: LinkRole,
    /// What happened
    pub kind: ProtocolErrorKind,
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolErrorKind::Broker(message) => write!(f, "broker error: {message}"),
            ProtocolErrorKind::Disconnected => write!(f, "connection closed by broker"),
            ProtocolErrorKind::Malformed(reason) => write!(f, "malformed frame: {reason}"),
            ProtocolErrorKind::Io(reason) => write!(f, "socket error: {reason}"),
        }
    }
}

/// Convenience type alias for Results using LinkError.
pub type Result<T> = std::result::Result<T, LinkError>;
