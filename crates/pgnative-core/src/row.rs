//! A single result row plus the column metadata describing it.

use std::sync::Arc;

use crate::value::PostgresValue;

/// Format code Postgres uses for a column: `0` text, `1` binary. This crate
/// only ever requests text format, but the field is part of `RowDescription`
/// and kept for completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCode {
    Text,
    Binary,
}

/// One column's shape, as reported by `RowDescription`.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    pub name: String,
    pub table_oid: u32,
    pub attr_number: i16,
    pub type_oid: u32,
    pub type_size: i16,
    pub type_modifier: i32,
    pub format: FormatCode,
}

/// An ordered sequence of column values for one `DataRow` message.
///
/// Column metadata is shared (`Arc`) across every row produced by the same
/// cursor rather than copied per row.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<ColumnMetadata>>,
    values: Vec<PostgresValue>,
}

impl Row {
    /// Build a row from shared column metadata and this row's decoded values.
    pub fn new(columns: Arc<Vec<ColumnMetadata>>, values: Vec<PostgresValue>) -> Self {
        Row { columns, values }
    }

    /// Number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The shared column metadata for this row.
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// The value at `index`, or `None` if out of bounds.
    pub fn get(&self, index: usize) -> Option<&PostgresValue> {
        self.values.get(index)
    }

    /// The value for the first column matching `name`, or `None` if no such
    /// column exists.
    pub fn get_by_name(&self, name: &str) -> Option<&PostgresValue> {
        let index = self.columns.iter().position(|c| c.name == name)?;
        self.values.get(index)
    }

    /// Iterate over this row's values in column order.
    pub fn iter(&self) -> std::slice::Iter<'_, PostgresValue> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Arc<Vec<ColumnMetadata>> {
        Arc::new(vec![
            ColumnMetadata {
                name: "city".into(),
                table_oid: 0,
                attr_number: 1,
                type_oid: 25,
                type_size: -1,
                type_modifier: -1,
                format: FormatCode::Text,
            },
            ColumnMetadata {
                name: "temp_lo".into(),
                table_oid: 0,
                attr_number: 2,
                type_oid: 23,
                type_size: 4,
                type_modifier: -1,
                format: FormatCode::Text,
            },
        ])
    }

    #[test]
    fn get_by_index_and_name() {
        let row = Row::new(
            cols(),
            vec![
                PostgresValue::String("Berkeley".into()),
                PostgresValue::Integer(46),
            ],
        );
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0).unwrap().string(0).unwrap(), "Berkeley");
        assert_eq!(row.get_by_name("temp_lo").unwrap().int(1).unwrap(), 46);
        assert!(row.get_by_name("missing").is_none());
    }

    #[test]
    fn shared_columns_across_rows() {
        let columns = cols();
        let row_a = Row::new(columns.clone(), vec![PostgresValue::Null, PostgresValue::Null]);
        let row_b = Row::new(columns.clone(), vec![PostgresValue::Null, PostgresValue::Null]);
        assert_eq!(row_a.columns().len(), row_b.columns().len());
        assert_eq!(row_a.len(), row_b.len());
    }
}
