//! Prepared statements: the `Parse`/`Describe(statement)` half of the
//! extended query protocol (spec §4.4).

use pgnative_core::error::{Error, Result};
use pgnative_core::PostgresValue;

use crate::connection::{Connection, log_notice, unexpected_message};
use crate::cursor::Cursor;
use crate::protocol::{BackendMessage, DescribeKind, FieldDescription, FrontendMessage};
use crate::types::encode_text;

/// The protocol's 16-bit parameter-count limit (spec §8, "bind limit").
const MAX_PARAMETERS: usize = 65_535;

/// A prepared statement bound to the `Connection` that created it.
///
/// Borrowing `&'conn mut Connection` for its lifetime is the mechanism by
/// which "at most one Statement per Connection has an open Cursor" (spec
/// §3) is enforced: a [`Cursor`] returned by [`Statement::execute`] reborrows
/// the same connection, so neither another `execute` nor a second `prepare`
/// can happen while it is alive.
pub struct Statement<'conn> {
    conn: &'conn mut Connection,
    name: String,
    param_type_oids: Vec<u32>,
    row_description: Option<Vec<FieldDescription>>,
    closed: bool,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn new(
        conn: &'conn mut Connection,
        name: String,
        param_type_oids: Vec<u32>,
        row_description: Option<Vec<FieldDescription>>,
    ) -> Self {
        Statement {
            conn,
            name,
            param_type_oids,
            row_description,
            closed: false,
        }
    }

    /// Parameter type OIDs the server inferred during `Describe(statement)`.
    pub fn param_type_oids(&self) -> &[u32] {
        &self.param_type_oids
    }

    /// The row shape the server reported at prepare time, or `None` for
    /// statements producing no result set (e.g. DDL). This is independent
    /// of whether `execute` is asked to retrieve column metadata.
    pub fn row_description(&self) -> Option<&[FieldDescription]> {
        self.row_description.as_deref()
    }

    /// Bind `params` and run `Bind + Execute(0) + Sync`. Column metadata is
    /// not retrieved; `cursor.columns()` returns `None`.
    pub fn execute(&mut self, params: &[PostgresValue]) -> Result<Cursor<'_>> {
        self.execute_inner(params, false)
    }

    /// As [`Statement::execute`], but also issues `Describe(portal)` first
    /// so `cursor.columns()` is populated even for an empty result set.
    pub fn execute_with_column_metadata(&mut self, params: &[PostgresValue]) -> Result<Cursor<'_>> {
        self.execute_inner(params, true)
    }

    fn execute_inner(
        &mut self,
        params: &[PostgresValue],
        retrieve_column_metadata: bool,
    ) -> Result<Cursor<'_>> {
        if self.closed {
            return Err(Error::StatementClosed);
        }
        if params.len() > MAX_PARAMETERS {
            return Err(Error::TooManyParameters(params.len()));
        }

        let mut encoded = Vec::with_capacity(params.len());
        for param in params {
            if matches!(param, PostgresValue::Null) {
                encoded.push(None);
            } else {
                let (bytes, _type_oid) = encode_text(param)?;
                encoded.push(Some(bytes));
            }
        }
        let param_formats = if encoded.is_empty() { Vec::new() } else { vec![0i16] };

        self.conn.send(&FrontendMessage::Bind {
            portal: String::new(),
            statement: self.name.clone(),
            param_formats,
            params: encoded,
            result_formats: Vec::new(),
        })?;
        if retrieve_column_metadata {
            self.conn.send(&FrontendMessage::Describe {
                kind: DescribeKind::Portal,
                name: String::new(),
            })?;
        }
        self.conn.send(&FrontendMessage::Execute {
            portal: String::new(),
            max_rows: 0,
        })?;
        self.conn.send(&FrontendMessage::Sync)?;

        Ok(Cursor::new(&mut *self.conn).with_decode_fields(self.row_description.clone()))
    }

    /// `Close(statement) + Sync`. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.conn.send(&FrontendMessage::Close {
            kind: DescribeKind::Statement,
            name: self.name.clone(),
        })?;
        self.conn.send(&FrontendMessage::Sync)?;

        let mut close_error = None;
        loop {
            match self.conn.recv()? {
                BackendMessage::CloseComplete => {}
                BackendMessage::ErrorResponse(e) => close_error = Some(Error::Server(e)),
                BackendMessage::NoticeResponse(n) => log_notice(&n),
                BackendMessage::ReadyForQuery(status) => {
                    self.conn.note_ready(status);
                    break;
                }
                other => {
                    self.conn.poison();
                    return Err(unexpected_message("statement close", &other));
                }
            }
        }

        match close_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<'conn> Drop for Statement<'conn> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::MAX_PARAMETERS;

    #[test]
    fn max_parameters_matches_protocol_limit() {
        assert_eq!(MAX_PARAMETERS, 65_535);
    }
}
