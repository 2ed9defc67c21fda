//! PostgreSQL connection: transport ownership, startup, and authentication.
//!
//! `Connection` owns the single TCP (optionally TLS) session, the codec's
//! read/write buffers, and the session identity reported by the server.
//! Prepared statements and cursors borrow it for the duration of one
//! extended-query sequence; see [`crate::statement`] and [`crate::cursor`].

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;

use pgnative_core::error::{Error, ProtocolError, Result, ServerError};

use crate::auth::{ScramClient, md5_password};
use crate::config::{Credential, PgConfig};
use crate::protocol::{
    BackendMessage, FrontendMessage, MessageReader, MessageWriter, PROTOCOL_VERSION,
    TransactionStatus,
};
use crate::statement::Statement;
use crate::tls;

enum PgStream {
    Plain(TcpStream),
    Tls(rustls::StreamOwned<rustls::ClientConnection, TcpStream>),
    Closed,
}

impl PgStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            PgStream::Plain(s) => s.read(buf),
            PgStream::Tls(s) => s.read(buf),
            PgStream::Closed => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            )),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            PgStream::Plain(s) => s.read_exact(buf),
            PgStream::Tls(s) => s.read_exact(buf),
            PgStream::Closed => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            )),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            PgStream::Plain(s) => s.write_all(buf),
            PgStream::Tls(s) => s.write_all(buf),
            PgStream::Closed => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection closed",
            )),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            PgStream::Plain(s) => s.flush(),
            PgStream::Tls(s) => s.flush(),
            PgStream::Closed => Ok(()),
        }
    }
}

/// Where the connection sits in the startup/teardown lifecycle described in
/// spec §4.3. `Ready`/`Busy` alternate for the life of the session; a
/// protocol error or explicit close moves it to `Closed` unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    Ready,
    Busy,
    Closed,
}

/// A session to one PostgreSQL backend.
///
/// Owns the transport and codec buffers; at most one [`Statement`] (and,
/// through it, at most one [`crate::cursor::Cursor`]) may be outstanding at a
/// time — enforced by the borrow checker, since `prepare`/`execute` take
/// `&mut Connection`/`&mut Statement` and hand back a value borrowing it.
pub struct Connection {
    stream: PgStream,
    state: ConnectionState,
    transaction_status: TransactionStatus,
    process_id: i32,
    secret_key: i32,
    parameters: HashMap<String, String>,
    config: PgConfig,
    reader: MessageReader,
    writer: MessageWriter,
    read_buf: Vec<u8>,
    next_stmt_id: u64,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("process_id", &self.process_id)
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Establish a new connection: TCP connect, optional SSL negotiation and
    /// TLS handshake, startup message, authentication, and the initial
    /// `DateStyle`/`TimeZone` session setup.
    pub fn connect(config: PgConfig) -> Result<Self> {
        let addr = config
            .socket_addr()
            .parse()
            .map_err(|e| Error::protocol(format!("invalid socket address: {e}")))?;
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)?;
        stream.set_nodelay(true).ok();
        stream.set_read_timeout(Some(config.connect_timeout)).ok();
        stream.set_write_timeout(Some(config.connect_timeout)).ok();

        let mut conn = Self {
            stream: PgStream::Plain(stream),
            state: ConnectionState::Connecting,
            transaction_status: TransactionStatus::Idle,
            process_id: 0,
            secret_key: 0,
            parameters: HashMap::new(),
            config,
            reader: MessageReader::new(),
            writer: MessageWriter::new(),
            read_buf: vec![0u8; 8192],
            next_stmt_id: 0,
        };

        if conn.config.ssl_mode.should_try_ssl() {
            conn.negotiate_ssl()?;
        }

        conn.send_startup()?;
        conn.state = ConnectionState::Authenticating;
        conn.handle_auth()?;
        conn.read_startup_messages()?;

        conn.apply_socket_timeout()?;
        conn.session_setup()?;

        Ok(conn)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True once startup+auth has completed and no protocol error or close
    /// has poisoned the session.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ConnectionState::Ready)
    }

    /// The server's current transaction status, as of the last
    /// `ReadyForQuery`.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    /// Backend process ID, for building a raw cancel request on a separate
    /// connection.
    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    /// Backend secret key, for building a raw cancel request on a separate
    /// connection.
    pub fn secret_key(&self) -> i32 {
        self.secret_key
    }

    /// A server parameter reported via `ParameterStatus` (e.g. `server_version`).
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// All server parameters reported so far.
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// Prepare a statement: `Parse` + `Describe(statement)` + `Sync`.
    ///
    /// Borrows `self` mutably for the life of the returned [`Statement`],
    /// which is how the "at most one active statement" invariant (spec §3)
    /// is enforced — the borrow checker refuses a second `prepare` call
    /// while the first `Statement` (or a `Cursor` derived from it) is alive.
    pub fn prepare(&mut self, sql: &str) -> Result<Statement<'_>> {
        self.check_open()?;

        let name = format!("stmt_{}", self.next_stmt_id);
        self.next_stmt_id += 1;

        self.send(&FrontendMessage::Parse {
            name: name.clone(),
            query: sql.to_string(),
            param_types: Vec::new(),
        })?;
        self.send(&FrontendMessage::Describe {
            kind: crate::protocol::DescribeKind::Statement,
            name: name.clone(),
        })?;
        self.send(&FrontendMessage::Sync)?;

        let mut param_type_oids = Vec::new();
        let mut row_description = None;
        let mut prepare_error = None;

        loop {
            match self.recv()? {
                BackendMessage::ParseComplete => {}
                BackendMessage::ParameterDescription(oids) => param_type_oids = oids,
                BackendMessage::RowDescription(fields) => row_description = Some(fields),
                BackendMessage::NoData => row_description = None,
                BackendMessage::ErrorResponse(e) => prepare_error = Some(Error::Server(e)),
                BackendMessage::NoticeResponse(n) => log_notice(&n),
                BackendMessage::ReadyForQuery(status) => {
                    self.transaction_status = status;
                    self.state = ConnectionState::Ready;
                    break;
                }
                other => return Err(unexpected_message("prepare", &other)),
            }
        }

        if let Some(e) = prepare_error {
            return Err(e);
        }

        Ok(Statement::new(self, name, param_type_oids, row_description))
    }

    /// Close the connection: send `Terminate` and drop the transport.
    /// Idempotent — closing an already-closed connection is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        let _ = self.send(&FrontendMessage::Terminate);
        self.state = ConnectionState::Closed;
        self.stream = PgStream::Closed;
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            Err(Error::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    fn apply_socket_timeout(&mut self) -> Result<()> {
        let timeout = self.config.socket_timeout;
        match &self.stream {
            PgStream::Plain(s) => {
                s.set_read_timeout(timeout)?;
                s.set_write_timeout(timeout)?;
            }
            PgStream::Tls(s) => {
                s.sock.set_read_timeout(timeout)?;
                s.sock.set_write_timeout(timeout)?;
            }
            PgStream::Closed => {}
        }
        Ok(())
    }

    /// `SET DateStyle=ISO, MDY` / `SET TimeZone=UTC` via the simple query
    /// protocol, so every date/time value that crosses the wire is in the
    /// one textual form the type system (spec §4.5) knows how to parse.
    fn session_setup(&mut self) -> Result<()> {
        self.send(&FrontendMessage::Query(
            "SET DateStyle = 'ISO, MDY'; SET TimeZone = 'UTC'".to_string(),
        ))?;

        loop {
            match self.recv()? {
                BackendMessage::CommandComplete(_) | BackendMessage::EmptyQueryResponse => {}
                BackendMessage::ErrorResponse(e) => return Err(Error::Server(e)),
                BackendMessage::NoticeResponse(n) => log_notice(&n),
                BackendMessage::ReadyForQuery(status) => {
                    self.transaction_status = status;
                    self.state = ConnectionState::Ready;
                    return Ok(());
                }
                other => return Err(unexpected_message("session setup", &other)),
            }
        }
    }

    // ==================== SSL Negotiation ====================

    fn negotiate_ssl(&mut self) -> Result<()> {
        self.send(&FrontendMessage::SSLRequest)?;

        let mut buf = [0u8; 1];
        self.stream.read_exact(&mut buf)?;

        match buf[0] {
            b'S' => {
                let plain = match std::mem::replace(&mut self.stream, PgStream::Closed) {
                    PgStream::Plain(s) => s,
                    _ => {
                        return Err(Error::protocol(
                            "TLS upgrade requires a plain TCP stream",
                        ));
                    }
                };

                let client_config = tls::build_client_config(self.config.ssl_mode)?;
                let server_name = tls::server_name(&self.config.host)?;
                let conn =
                    rustls::ClientConnection::new(std::sync::Arc::new(client_config), server_name)
                        .map_err(|e| {
                            Error::Ssl(pgnative_core::error::SslError {
                                message: format!("failed to create TLS connection: {e}"),
                                source: None,
                            })
                        })?;

                let mut tls_stream = rustls::StreamOwned::new(conn, plain);
                while tls_stream.conn.is_handshaking() {
                    tls_stream.conn.complete_io(&mut tls_stream.sock).map_err(|e| {
                        Error::Ssl(pgnative_core::error::SslError {
                            message: format!("TLS handshake failed: {e}"),
                            source: Some(Box::new(e)),
                        })
                    })?;
                }

                self.stream = PgStream::Tls(tls_stream);
                Ok(())
            }
            b'N' => Err(Error::Ssl(pgnative_core::error::SslError {
                message: "server refused SSL (plaintext fallback is not supported)".to_string(),
                source: None,
            })),
            other => Err(Error::protocol(format!(
                "unexpected SSL negotiation response byte 0x{other:02x}"
            ))),
        }
    }

    fn channel_binding_fingerprint(&self) -> Option<[u8; 32]> {
        match &self.stream {
            PgStream::Tls(s) => tls::channel_binding_fingerprint(&s.conn),
            _ => None,
        }
    }

    // ==================== Startup ====================

    fn send_startup(&mut self) -> Result<()> {
        let params = self.config.startup_params();
        self.send(&FrontendMessage::Startup {
            version: PROTOCOL_VERSION,
            params,
        })
    }

    // ==================== Authentication ====================

    fn handle_auth(&mut self) -> Result<()> {
        loop {
            match self.recv()? {
                BackendMessage::AuthenticationOk => return Ok(()),
                BackendMessage::AuthenticationCleartextPassword => {
                    let Credential::CleartextPassword(password) = &self.config.credential else {
                        return Err(Error::Authentication(
                            "server requested a cleartext password but no CleartextPassword credential was configured".into(),
                        ));
                    };
                    let password = password.clone();
                    self.send(&FrontendMessage::PasswordMessage(password))?;
                }
                BackendMessage::AuthenticationMD5Password(salt) => {
                    let Credential::Md5Password(password) = &self.config.credential else {
                        return Err(Error::Authentication(
                            "server requested MD5 authentication but no Md5Password credential was configured".into(),
                        ));
                    };
                    let hash = md5_password(&self.config.user, password, salt);
                    self.send(&FrontendMessage::PasswordMessage(hash))?;
                }
                BackendMessage::AuthenticationSASL(mechanisms) => {
                    self.scram_auth(&mechanisms)?;
                    return Ok(());
                }
                BackendMessage::ErrorResponse(e) => return Err(Error::Server(e)),
                other => return Err(unexpected_message("authentication", &other)),
            }
        }
    }

    fn scram_auth(&mut self, server_mechanisms: &[String]) -> Result<()> {
        let Credential::ScramSha256(password) = &self.config.credential else {
            return Err(Error::Authentication(
                "server requested SCRAM-SHA-256 but no ScramSha256 credential was configured"
                    .into(),
            ));
        };
        let password = password.clone();
        let fingerprint = self.channel_binding_fingerprint();

        let mut client = ScramClient::new(
            &password,
            server_mechanisms,
            self.config.channel_binding_policy,
            fingerprint,
        )?;

        self.send(&FrontendMessage::SASLInitialResponse {
            mechanism: client.mechanism().to_string(),
            data: client.client_first(),
        })?;

        let server_first = match self.recv()? {
            BackendMessage::AuthenticationSASLContinue(data) => data,
            BackendMessage::ErrorResponse(e) => return Err(Error::Server(e)),
            other => return Err(unexpected_message("SASL continue", &other)),
        };

        let client_final = client.process_server_first(&server_first)?;
        self.send(&FrontendMessage::SASLResponse(client_final))?;

        let server_final = match self.recv()? {
            BackendMessage::AuthenticationSASLFinal(data) => data,
            BackendMessage::ErrorResponse(e) => return Err(Error::Server(e)),
            other => return Err(unexpected_message("SASL final", &other)),
        };
        client.verify_server_final(&server_final)?;

        match self.recv()? {
            BackendMessage::AuthenticationOk => Ok(()),
            BackendMessage::ErrorResponse(e) => Err(Error::Server(e)),
            other => Err(unexpected_message("AuthenticationOk", &other)),
        }
    }

    // ==================== Startup Messages ====================

    fn read_startup_messages(&mut self) -> Result<()> {
        loop {
            match self.recv()? {
                BackendMessage::BackendKeyData {
                    process_id,
                    secret_key,
                } => {
                    self.process_id = process_id;
                    self.secret_key = secret_key;
                }
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                BackendMessage::ReadyForQuery(status) => {
                    self.transaction_status = status;
                    return Ok(());
                }
                BackendMessage::ErrorResponse(e) => return Err(Error::Server(e)),
                BackendMessage::NoticeResponse(n) => log_notice(&n),
                other => return Err(unexpected_message("startup", &other)),
            }
        }
    }

    // ==================== Low-Level I/O ====================

    pub(crate) fn send(&mut self, msg: &FrontendMessage) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(Error::ConnectionClosed);
        }
        #[cfg(feature = "trace")]
        log::debug!("-> {msg:?}");
        let data = self.writer.write(msg);
        let result = self.stream.write_all(data).and_then(|()| self.stream.flush());
        result.map_err(|e| {
            self.state = ConnectionState::Closed;
            Error::from(e)
        })
    }

    pub(crate) fn recv(&mut self) -> Result<BackendMessage> {
        loop {
            match self.reader.next_message() {
                Ok(Some(msg)) => {
                    #[cfg(feature = "trace")]
                    log::debug!("<- {msg:?}");
                    return Ok(msg);
                }
                Ok(None) => {
                    let n = self.stream.read(&mut self.read_buf).map_err(|e| {
                        self.state = ConnectionState::Closed;
                        Error::from(e)
                    })?;
                    if n == 0 {
                        self.state = ConnectionState::Closed;
                        return Err(Error::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "server closed the connection",
                        )));
                    }
                    self.reader.feed(&self.read_buf[..n]);
                }
                Err(e) => {
                    self.state = ConnectionState::Closed;
                    return Err(e);
                }
            }
        }
    }

    /// Mark the connection poisoned after a protocol-level failure mid
    /// extended-query sequence (spec §7: protocol errors poison the
    /// connection unconditionally).
    pub(crate) fn poison(&mut self) {
        self.state = ConnectionState::Closed;
    }

    /// Record the transaction status from a `ReadyForQuery` observed by a
    /// [`Statement`] or [`crate::cursor::Cursor`] operation.
    pub(crate) fn note_ready(&mut self, status: TransactionStatus) {
        self.transaction_status = status;
        self.state = ConnectionState::Ready;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

pub(crate) fn unexpected_message(context: &str, msg: &BackendMessage) -> Error {
    Error::Protocol(ProtocolError {
        message: format!("unexpected message during {context}: {msg:?}"),
        raw_data: None,
        source: None,
    })
}

pub(crate) fn log_notice(notice: &ServerError) {
    log::warn!("{}: {}", notice.severity, notice.message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_transitions_are_distinct() {
        assert_ne!(ConnectionState::Ready, ConnectionState::Closed);
        assert_ne!(ConnectionState::Connecting, ConnectionState::Authenticating);
    }
}
