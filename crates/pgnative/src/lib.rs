//! A native, blocking PostgreSQL v3 wire-protocol client.
//!
//! This crate implements the frontend/backend protocol directly on top of
//! `std::net::TcpStream` (plus `rustls` for TLS): message framing,
//! SCRAM-SHA-256(-PLUS) authentication with channel binding, the extended
//! query protocol, and a lossless text-based value codec. There is no
//! connection pool, no async runtime, and no ORM layer above it — just the
//! wire.
//!
//! # Example
//!
//! ```rust,ignore
//! use pgnative::{Connection, PgConfig, PostgresValue};
//!
//! let config = PgConfig::new("localhost", "postgres", "mydb").password("secret");
//! let mut conn = Connection::connect(config)?;
//!
//! let mut stmt = conn.prepare("SELECT city, temp_lo FROM weather WHERE date = $1")?;
//! let mut cursor = stmt.execute(&[PostgresValue::Date(date)])?;
//! while let Some(row) = cursor.next() {
//!     let row = row?;
//!     println!("{:?}", row.get(0));
//! }
//! ```

pub mod auth;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod protocol;
pub mod statement;
pub mod tls;
pub mod types;

pub use config::{Credential, PgConfig, SslMode};
pub use connection::{Connection, ConnectionState};
pub use cursor::Cursor;
pub use statement::Statement;

pub use pgnative_core::{
    ColumnMetadata, Date, Error, FormatCode, Interval, PostgresValue, Result, Row, ServerError,
    Time, TimeTz, Timestamp, TimestampTz,
};
pub use protocol::TransactionStatus;
