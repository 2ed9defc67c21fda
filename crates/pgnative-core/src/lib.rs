//! Shared error, value, and row types for `pgnative`.
//!
//! This crate has no knowledge of the wire protocol itself; it exists so
//! that the value/row/error types can be referenced without depending on
//! the socket and TLS machinery in `pgnative`.

pub mod error;
pub mod row;
pub mod value;

pub use error::{Error, ProtocolError, Result, ServerError, SslError};
pub use row::{ColumnMetadata, FormatCode, Row};
pub use value::{Date, Interval, PostgresValue, Time, TimeTz, Timestamp, TimestampTz};
