//! Lazy row iteration over one portal (spec §4.4): the `Execute`/`Sync` half
//! of the extended query protocol.

use std::sync::Arc;

use pgnative_core::error::{Error, ProtocolError, Result};
use pgnative_core::row::{ColumnMetadata, FormatCode, Row};

use crate::connection::{Connection, log_notice, unexpected_message};
use crate::protocol::{BackendMessage, DescribeKind, FieldDescription, FrontendMessage};
use crate::types::decode_text;

enum CursorState {
    Open,
    Drained,
    Closed,
}

/// A server-side portal's rows, fetched one `DataRow` at a time.
///
/// `next()` never reads ahead: it performs exactly one transport read loop
/// per call, stopping as soon as one row (or the end of the result set) is
/// decoded, which is what gives cursor laziness (spec §8, "reading N rows
/// consumes at most N+O(1) frames").
pub struct Cursor<'stmt> {
    conn: &'stmt mut Connection,
    decode_columns: Option<Arc<Vec<ColumnMetadata>>>,
    public_columns: Option<Arc<Vec<ColumnMetadata>>>,
    row_count: Option<u64>,
    state: CursorState,
}

impl<'stmt> Cursor<'stmt> {
    pub(crate) fn new(conn: &'stmt mut Connection) -> Self {
        Cursor {
            conn,
            decode_columns: None,
            public_columns: None,
            row_count: None,
            state: CursorState::Open,
        }
    }

    /// Seed the columns used to decode `DataRow`s from the statement's
    /// prepare-time `RowDescription`, used even when the caller did not ask
    /// `execute` to retrieve column metadata (the server never repeats a
    /// row's shape mid-portal, so this is the only source of type OIDs in
    /// that case).
    pub(crate) fn with_decode_fields(mut self, fields: Option<Vec<FieldDescription>>) -> Self {
        self.decode_columns = fields.map(|f| Arc::new(f.iter().map(field_to_column).collect()));
        self
    }

    /// Column metadata, present only when `execute_with_column_metadata` was
    /// used to produce this cursor (spec §8 scenario 5).
    pub fn columns(&self) -> Option<&[ColumnMetadata]> {
        self.public_columns.as_deref().map(Vec::as_slice)
    }

    /// Row count from `CommandComplete`'s tag, known once the cursor has
    /// drained (`None` beforehand).
    pub fn row_count(&self) -> Option<u64> {
        self.row_count
    }

    /// The next row, or `None` once drained. If the server sent an
    /// `ErrorResponse` mid-stream, that error is returned exactly once and
    /// every subsequent call returns `None`.
    pub fn next(&mut self) -> Option<Result<Row>> {
        loop {
            if matches!(self.state, CursorState::Drained | CursorState::Closed) {
                return None;
            }

            let msg = match self.conn.recv() {
                Ok(msg) => msg,
                Err(e) => {
                    self.state = CursorState::Closed;
                    return Some(Err(e));
                }
            };

            match msg {
                BackendMessage::BindComplete | BackendMessage::NoData => {}
                BackendMessage::RowDescription(fields) => {
                    let columns = Arc::new(fields.iter().map(field_to_column).collect());
                    self.decode_columns = Some(Arc::clone(&columns));
                    self.public_columns = Some(columns);
                }
                BackendMessage::DataRow(raw_values) => match self.decode_row(raw_values) {
                    Ok(row) => return Some(Ok(row)),
                    Err(e) => return Some(Err(e)),
                },
                BackendMessage::CommandComplete(tag) => {
                    self.row_count = parse_row_count(&tag);
                }
                BackendMessage::EmptyQueryResponse => {
                    self.row_count = Some(0);
                }
                BackendMessage::PortalSuspended => {
                    // Never produced with Execute(max_rows = 0).
                }
                BackendMessage::NoticeResponse(n) => log_notice(&n),
                BackendMessage::ErrorResponse(e) => {
                    let err = Error::Server(e);
                    if let Err(drain_err) = self.drain_to_ready() {
                        self.state = CursorState::Closed;
                        return Some(Err(drain_err));
                    }
                    self.state = CursorState::Drained;
                    return Some(Err(err));
                }
                BackendMessage::ReadyForQuery(status) => {
                    self.conn.note_ready(status);
                    self.state = CursorState::Drained;
                    return None;
                }
                other => {
                    self.conn.poison();
                    self.state = CursorState::Closed;
                    return Some(Err(unexpected_message("cursor", &other)));
                }
            }
        }
    }

    fn decode_row(&self, raw_values: Vec<Option<Vec<u8>>>) -> Result<Row> {
        let columns = self.decode_columns.clone().ok_or_else(|| {
            Error::Protocol(ProtocolError {
                message: "DataRow received with no known column shape".to_string(),
                raw_data: None,
                source: None,
            })
        })?;

        if raw_values.len() != columns.len() {
            return Err(Error::Protocol(ProtocolError {
                message: format!(
                    "DataRow has {} columns, RowDescription declared {}",
                    raw_values.len(),
                    columns.len()
                ),
                raw_data: None,
                source: None,
            }));
        }

        let values = raw_values
            .iter()
            .zip(columns.iter())
            .enumerate()
            .map(|(index, (raw, column))| decode_text(column.type_oid, raw.as_deref(), index))
            .collect::<Result<Vec<_>>>()?;

        Ok(Row::new(columns, values))
    }

    /// Drain remaining response messages until `ReadyForQuery`, as required
    /// after an `ErrorResponse` interrupts the sequence (spec §4.3).
    fn drain_to_ready(&mut self) -> Result<()> {
        loop {
            match self.conn.recv()? {
                BackendMessage::ReadyForQuery(status) => {
                    self.conn.note_ready(status);
                    return Ok(());
                }
                BackendMessage::NoticeResponse(n) => log_notice(&n),
                _ => {}
            }
        }
    }

    /// `Close(portal) + Sync`, discarding any undrained rows. Idempotent;
    /// a no-op if the cursor already drained naturally.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            CursorState::Closed => return Ok(()),
            CursorState::Drained => {
                self.state = CursorState::Closed;
                return Ok(());
            }
            CursorState::Open => {}
        }
        self.state = CursorState::Closed;

        self.conn.send(&FrontendMessage::Close {
            kind: DescribeKind::Portal,
            name: String::new(),
        })?;
        self.conn.send(&FrontendMessage::Sync)?;

        let mut close_error = None;
        loop {
            match self.conn.recv()? {
                BackendMessage::CloseComplete
                | BackendMessage::DataRow(_)
                | BackendMessage::CommandComplete(_)
                | BackendMessage::EmptyQueryResponse
                | BackendMessage::PortalSuspended => {}
                BackendMessage::ErrorResponse(e) => close_error = Some(Error::Server(e)),
                BackendMessage::NoticeResponse(n) => log_notice(&n),
                BackendMessage::ReadyForQuery(status) => {
                    self.conn.note_ready(status);
                    break;
                }
                other => {
                    self.conn.poison();
                    return Err(unexpected_message("cursor close", &other));
                }
            }
        }

        match close_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<'stmt> Drop for Cursor<'stmt> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn field_to_column(field: &FieldDescription) -> ColumnMetadata {
    ColumnMetadata {
        name: field.name.clone(),
        table_oid: field.table_oid,
        attr_number: field.attr_number,
        type_oid: field.type_oid,
        type_size: field.type_size,
        type_modifier: field.type_modifier,
        format: if field.format_code == 0 {
            FormatCode::Text
        } else {
            FormatCode::Binary
        },
    }
}

/// Extract the row count from a `CommandComplete` tag (`SELECT 42`,
/// `UPDATE 17`, `INSERT 0 3`, `FETCH 2`, ...): the last whitespace-delimited
/// token.
fn parse_row_count(tag: &str) -> Option<u64> {
    tag.split_whitespace().last()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_row_count_handles_known_tags() {
        assert_eq!(parse_row_count("SELECT 42"), Some(42));
        assert_eq!(parse_row_count("UPDATE 17"), Some(17));
        assert_eq!(parse_row_count("INSERT 0 3"), Some(3));
        assert_eq!(parse_row_count("DELETE 1000"), Some(1000));
        assert_eq!(parse_row_count(""), None);
    }
}
