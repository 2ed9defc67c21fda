//! Error types surfaced by `pgnative`.
//!
//! A single sum type covers every failure mode the wire client can hit:
//! transport, protocol framing, authentication, server-reported errors,
//! and value conversion.

use std::fmt;

/// The result type used throughout `pgnative`.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type for all `pgnative` operations.
#[derive(Debug)]
pub enum Error {
    /// Underlying transport failure (TCP connect/read/write).
    Io(std::io::Error),
    /// TLS handshake or certificate-verification failure.
    Ssl(SslError),
    /// A parsed `ErrorResponse` from the backend.
    Server(ServerError),
    /// Malformed frame, unexpected message, or out-of-order response.
    Protocol(ProtocolError),
    /// SCRAM mismatch, unsupported mechanism, or bad server signature.
    Authentication(String),
    /// `channelBindingPolicy = required` but SCRAM-SHA-256-PLUS is unavailable.
    ChannelBindingRequired,
    /// An operation was attempted after the connection was closed.
    ConnectionClosed,
    /// A value could not be converted to the requested type.
    ValueConversion {
        /// Column index the failing value came from.
        column: usize,
        /// The Rust type the caller requested.
        target_type: &'static str,
        /// Human-readable explanation.
        reason: String,
    },
    /// A non-optional read was attempted on a SQL NULL.
    ValueIsNull {
        /// Column index that was null.
        column: usize,
    },
    /// The statement this handle refers to has already been closed.
    StatementClosed,
    /// The cursor this handle refers to has already been closed.
    CursorClosed,
    /// More than 65535 bind parameters were supplied.
    TooManyParameters(usize),
    /// A socket operation exceeded its configured timeout.
    Timeout,
}

/// TLS handshake or verification failure.
#[derive(Debug)]
pub struct SslError {
    /// Human-readable explanation.
    pub message: String,
    /// Underlying I/O or TLS library error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Malformed frame, unexpected message ordering, or decode failure.
#[derive(Debug)]
pub struct ProtocolError {
    /// Human-readable explanation.
    pub message: String,
    /// Raw bytes involved, when helpful for debugging (e.g. the bad frame header).
    pub raw_data: Option<Vec<u8>>,
    /// Underlying error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// The fields of a parsed backend `ErrorResponse` (or `NoticeResponse`).
///
/// Field letters follow the protocol: `S` severity, `C` SQLSTATE code,
/// `M` message, `D` detail, `H` hint, `P` position.
#[derive(Debug, Clone, Default)]
pub struct ServerError {
    /// Severity (`ERROR`, `FATAL`, `PANIC`, ...).
    pub severity: String,
    /// Five-character SQLSTATE code.
    pub code: String,
    /// Primary human-readable message.
    pub message: String,
    /// Optional secondary message with more detail.
    pub detail: Option<String>,
    /// Optional suggestion for fixing the problem.
    pub hint: Option<String>,
    /// Optional 1-based character index into the original query string.
    pub position: Option<u32>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "socket error: {e}"),
            Error::Ssl(e) => write!(f, "ssl error: {}", e.message),
            Error::Server(e) => write!(f, "server error [{}]: {}", e.code, e.message),
            Error::Protocol(e) => write!(f, "protocol error: {}", e.message),
            Error::Authentication(msg) => write!(f, "authentication error: {msg}"),
            Error::ChannelBindingRequired => {
                write!(f, "channel binding required but SCRAM-SHA-256-PLUS is unavailable")
            }
            Error::ConnectionClosed => write!(f, "operation attempted on a closed connection"),
            Error::ValueConversion {
                column,
                target_type,
                reason,
            } => write!(f, "cannot convert column {column} to {target_type}: {reason}"),
            Error::ValueIsNull { column } => write!(f, "column {column} is null"),
            Error::StatementClosed => write!(f, "statement is closed"),
            Error::CursorClosed => write!(f, "cursor is closed"),
            Error::TooManyParameters(n) => {
                write!(f, "{n} bind parameters exceeds the protocol limit of 65535")
            }
            Error::Timeout => write!(f, "operation timed out"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Ssl(e) => e.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static)),
            Error::Protocol(e) => e.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if matches!(
            e.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ) {
            Error::Timeout
        } else {
            Error::Io(e)
        }
    }
}

impl Error {
    /// Build a protocol error with no raw bytes or source attached.
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(ProtocolError {
            message: message.into(),
            raw_data: None,
            source: None,
        })
    }

    /// Build a protocol error carrying the offending bytes.
    pub fn protocol_with_data(message: impl Into<String>, raw_data: Vec<u8>) -> Self {
        Error::Protocol(ProtocolError {
            message: message.into(),
            raw_data: Some(raw_data),
            source: None,
        })
    }

    /// True when this error poisons the connection (transport/protocol
    /// failures) as opposed to being local/recoverable (server errors,
    /// conversion errors).
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Ssl(_) | Error::Protocol(_) | Error::Authentication(_) | Error::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeout_maps_to_timeout_variant() {
        let e: Error = std::io::Error::new(std::io::ErrorKind::TimedOut, "x").into();
        assert!(matches!(e, Error::Timeout));
    }

    #[test]
    fn io_other_maps_to_io_variant() {
        let e: Error = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "x").into();
        assert!(matches!(e, Error::Io(_)));
    }

    #[test]
    fn poisons_connection_classification() {
        assert!(Error::protocol("bad frame").poisons_connection());
        assert!(!Error::CursorClosed.poisons_connection());
        assert!(!Error::ValueIsNull { column: 0 }.poisons_connection());
    }
}
