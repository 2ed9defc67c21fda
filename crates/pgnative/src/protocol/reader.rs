//! PostgreSQL message decoder.
//!
//! `MessageReader` buffers raw bytes fed to it by the transport and yields
//! one fully-parsed `BackendMessage` at a time. It never returns a
//! half-message: `next_message` returns `Ok(None)` until a complete frame is
//! buffered.

use pgnative_core::error::{Error, Result, ServerError};

use super::messages::{BackendMessage, FieldDescription, TransactionStatus, backend_type};

/// Incremental backend-message decoder over an internal byte buffer.
#[derive(Debug, Default)]
pub struct MessageReader {
    buf: Vec<u8>,
}

impl MessageReader {
    pub fn new() -> Self {
        MessageReader { buf: Vec::new() }
    }

    /// Append freshly-read transport bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// True when no bytes are buffered (used to decide whether another
    /// transport read is needed before parsing can make progress).
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Parse and remove one message from the buffer, if a complete frame is
    /// present. Returns `Ok(None)` when more bytes are needed.
    pub fn next_message(&mut self) -> Result<Option<BackendMessage>> {
        if self.buf.len() < 5 {
            return Ok(None);
        }
        let tag = self.buf[0];
        let len = i32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]);
        if len < 4 {
            return Err(Error::protocol_with_data(
                format!("frame length {len} is smaller than the length field itself"),
                self.buf[..5].to_vec(),
            ));
        }
        let total = 1 + len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }
        let body = self.buf[5..total].to_vec();
        let message = decode_body(tag, &body)?;
        self.buf.drain(..total);
        Ok(Some(message))
    }
}

fn decode_body(tag: u8, body: &[u8]) -> Result<BackendMessage> {
    match tag {
        backend_type::AUTHENTICATION => decode_authentication(body),
        backend_type::PARAMETER_STATUS => {
            let mut r = Cursor::new(body);
            let name = r.read_cstr()?;
            let value = r.read_cstr()?;
            Ok(BackendMessage::ParameterStatus { name, value })
        }
        backend_type::BACKEND_KEY_DATA => {
            let mut r = Cursor::new(body);
            let process_id = r.read_i32()?;
            let secret_key = r.read_i32()?;
            Ok(BackendMessage::BackendKeyData {
                process_id,
                secret_key,
            })
        }
        backend_type::READY_FOR_QUERY => {
            let status = body.first().copied().ok_or_else(|| {
                Error::protocol("ReadyForQuery message has no transaction-status byte")
            })?;
            let status = TransactionStatus::from_byte(status).ok_or_else(|| {
                Error::protocol(format!("unknown transaction status byte {status:#x}"))
            })?;
            Ok(BackendMessage::ReadyForQuery(status))
        }
        backend_type::ROW_DESCRIPTION => decode_row_description(body),
        backend_type::DATA_ROW => decode_data_row(body),
        backend_type::COMMAND_COMPLETE => {
            let mut r = Cursor::new(body);
            Ok(BackendMessage::CommandComplete(r.read_cstr()?))
        }
        backend_type::EMPTY_QUERY_RESPONSE => Ok(BackendMessage::EmptyQueryResponse),
        backend_type::ERROR_RESPONSE => Ok(BackendMessage::ErrorResponse(decode_fields(body)?)),
        backend_type::NOTICE_RESPONSE => Ok(BackendMessage::NoticeResponse(decode_fields(body)?)),
        backend_type::PARSE_COMPLETE => Ok(BackendMessage::ParseComplete),
        backend_type::BIND_COMPLETE => Ok(BackendMessage::BindComplete),
        backend_type::CLOSE_COMPLETE => Ok(BackendMessage::CloseComplete),
        backend_type::NO_DATA => Ok(BackendMessage::NoData),
        backend_type::PARAMETER_DESCRIPTION => {
            let mut r = Cursor::new(body);
            let count = r.read_i16()?;
            let mut oids = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                oids.push(r.read_u32()?);
            }
            Ok(BackendMessage::ParameterDescription(oids))
        }
        backend_type::PORTAL_SUSPENDED => Ok(BackendMessage::PortalSuspended),
        other => Err(Error::protocol_with_data(
            format!("unrecognized backend message tag {:#x} ({})", other, other as char),
            body.to_vec(),
        )),
    }
}

fn decode_authentication(body: &[u8]) -> Result<BackendMessage> {
    let mut r = Cursor::new(body);
    let kind = r.read_i32()?;
    match kind {
        0 => Ok(BackendMessage::AuthenticationOk),
        3 => Ok(BackendMessage::AuthenticationCleartextPassword),
        5 => {
            let salt_bytes = r.read_exact(4)?;
            let mut salt = [0u8; 4];
            salt.copy_from_slice(salt_bytes);
            Ok(BackendMessage::AuthenticationMD5Password(salt))
        }
        10 => {
            let mut mechanisms = Vec::new();
            loop {
                let s = r.read_cstr()?;
                if s.is_empty() {
                    break;
                }
                mechanisms.push(s);
            }
            Ok(BackendMessage::AuthenticationSASL(mechanisms))
        }
        11 => Ok(BackendMessage::AuthenticationSASLContinue(r.rest().to_vec())),
        12 => Ok(BackendMessage::AuthenticationSASLFinal(r.rest().to_vec())),
        other => Err(Error::protocol(format!(
            "unsupported authentication request type {other}"
        ))),
    }
}

fn decode_row_description(body: &[u8]) -> Result<BackendMessage> {
    let mut r = Cursor::new(body);
    let count = r.read_i16()?;
    let mut fields = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        fields.push(FieldDescription {
            name: r.read_cstr()?,
            table_oid: r.read_u32()?,
            attr_number: r.read_i16()?,
            type_oid: r.read_u32()?,
            type_size: r.read_i16()?,
            type_modifier: r.read_i32()?,
            format_code: r.read_i16()?,
        });
    }
    Ok(BackendMessage::RowDescription(fields))
}

fn decode_data_row(body: &[u8]) -> Result<BackendMessage> {
    let mut r = Cursor::new(body);
    let count = r.read_i16()?;
    let mut columns = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let len = r.read_i32()?;
        if len < 0 {
            columns.push(None);
        } else {
            columns.push(Some(r.read_exact(len as usize)?.to_vec()));
        }
    }
    Ok(BackendMessage::DataRow(columns))
}

fn decode_fields(body: &[u8]) -> Result<ServerError> {
    let mut r = Cursor::new(body);
    let mut fields = ServerError::default();
    loop {
        let code = r.read_u8()?;
        if code == 0 {
            break;
        }
        let value = r.read_cstr()?;
        match code {
            b'S' => fields.severity = value,
            b'C' => fields.code = value,
            b'M' => fields.message = value,
            b'D' => fields.detail = Some(value),
            b'H' => fields.hint = Some(value),
            b'P' => fields.position = value.parse().ok(),
            _ => {}
        }
    }
    Ok(fields)
}

/// A small cursor over a message body, used only within this module.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| Error::protocol("unexpected end of message"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| Error::protocol("message body shorter than declared field"))?;
        self.pos = end;
        Ok(slice)
    }

    fn read_i16(&mut self) -> Result<i16> {
        let b = self.read_exact(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let b = self.read_exact(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_i32()? as u32)
    }

    fn read_cstr(&mut self) -> Result<String> {
        let start = self.pos;
        let nul = self.data[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::protocol("unterminated string field"))?;
        let s = std::str::from_utf8(&self.data[start..start + nul])
            .map_err(|e| Error::protocol(format!("non-UTF-8 string field: {e}")))?
            .to_string();
        self.pos = start + nul + 1;
        Ok(s)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        let len = (body.len() + 4) as i32;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn partial_frame_yields_none() {
        let mut r = MessageReader::new();
        r.feed(&[b'Z', 0, 0]);
        assert!(r.next_message().unwrap().is_none());
    }

    #[test]
    fn ready_for_query_roundtrip() {
        let mut r = MessageReader::new();
        r.feed(&frame(b'Z', b"I"));
        let msg = r.next_message().unwrap().unwrap();
        assert!(matches!(msg, BackendMessage::ReadyForQuery(TransactionStatus::Idle)));
        assert!(r.next_message().unwrap().is_none());
    }

    #[test]
    fn authentication_ok() {
        let mut r = MessageReader::new();
        r.feed(&frame(b'R', &0i32.to_be_bytes()));
        let msg = r.next_message().unwrap().unwrap();
        assert!(matches!(msg, BackendMessage::AuthenticationOk));
    }

    #[test]
    fn authentication_sasl_mechanism_list() {
        let mut body = 10i32.to_be_bytes().to_vec();
        body.extend_from_slice(b"SCRAM-SHA-256-PLUS\0");
        body.extend_from_slice(b"SCRAM-SHA-256\0");
        body.push(0);
        let mut r = MessageReader::new();
        r.feed(&frame(b'R', &body));
        match r.next_message().unwrap().unwrap() {
            BackendMessage::AuthenticationSASL(mechanisms) => {
                assert_eq!(mechanisms, vec!["SCRAM-SHA-256-PLUS", "SCRAM-SHA-256"]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn error_response_fields() {
        let mut body = Vec::new();
        body.push(b'S');
        body.extend_from_slice(b"ERROR\0");
        body.push(b'C');
        body.extend_from_slice(b"42601\0");
        body.push(b'M');
        body.extend_from_slice(b"syntax error\0");
        body.push(0);
        let mut r = MessageReader::new();
        r.feed(&frame(b'E', &body));
        match r.next_message().unwrap().unwrap() {
            BackendMessage::ErrorResponse(fields) => {
                assert_eq!(fields.code, "42601");
                assert_eq!(fields.message, "syntax error");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn data_row_with_null_column() {
        let mut body = 2i16.to_be_bytes().to_vec();
        body.extend_from_slice(&3i32.to_be_bytes());
        body.extend_from_slice(b"abc");
        body.extend_from_slice(&(-1i32).to_be_bytes());
        let mut r = MessageReader::new();
        r.feed(&frame(b'D', &body));
        match r.next_message().unwrap().unwrap() {
            BackendMessage::DataRow(cols) => {
                assert_eq!(cols[0], Some(b"abc".to_vec()));
                assert_eq!(cols[1], None);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn two_frames_in_one_feed() {
        let mut r = MessageReader::new();
        let mut bytes = frame(b'1', &[]);
        bytes.extend(frame(b'2', &[]));
        r.feed(&bytes);
        assert!(matches!(r.next_message().unwrap().unwrap(), BackendMessage::ParseComplete));
        assert!(matches!(r.next_message().unwrap().unwrap(), BackendMessage::BindComplete));
        assert!(r.next_message().unwrap().is_none());
    }

    #[test]
    fn short_length_field_is_protocol_error() {
        let mut r = MessageReader::new();
        r.feed(&[b'Z', 0, 0, 0, 2]);
        assert!(r.next_message().is_err());
    }
}
