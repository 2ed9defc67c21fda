//! The dynamically-typed value Postgres rows and bind parameters carry.
//!
//! Date and time variants store calendar fields (year/month/day/...) rather
//! than an epoch offset, so every legal Postgres text value — including BC
//! dates and values outside the `i64`-microseconds-since-epoch range — round
//! trips losslessly. See `pgnative::types` for the text codec that produces
//! and consumes these values.

use crate::error::{Error, Result};

/// A calendar date. `year` may be zero or negative to represent BC years
/// (Postgres's `4713 BC` is `year = -4712` in the astronomical convention
/// this type uses internally; text rendering adds the `BC` suffix instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Date {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

/// A time of day with nanosecond resolution, no date component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub nanos: u32,
}

/// A time of day plus a UTC offset in seconds (`timetz`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeTz {
    pub time: Time,
    pub utc_offset_seconds: i32,
}

/// A date and time with no associated timezone (`timestamp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub date: Date,
    pub time: Time,
}

/// A date and time with a UTC offset (`timestamptz`). The session always
/// runs with `TimeZone=UTC`, so the offset read back from the server is
/// always zero, but the field is retained for values constructed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimestampTz {
    pub date: Date,
    pub time: Time,
    pub utc_offset_seconds: i32,
}

/// A Postgres `interval`: months and days are kept separate from seconds
/// because they are not a fixed duration (a month is not always 30 days).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

/// A dynamically-typed Postgres value.
#[derive(Debug, Clone, PartialEq)]
pub enum PostgresValue {
    Null,
    String(String),
    Integer(i64),
    Double(f64),
    /// Arbitrary-precision decimal, kept as its canonical text form.
    Decimal(String),
    Bool(bool),
    ByteString(Vec<u8>),
    Date(Date),
    Time(Time),
    TimeTz(TimeTz),
    Timestamp(Timestamp),
    TimestampTz(TimestampTz),
    Interval(Interval),
}

impl PostgresValue {
    /// True for `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, PostgresValue::Null)
    }

    /// The name used in conversion-error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            PostgresValue::Null => "null",
            PostgresValue::String(_) => "string",
            PostgresValue::Integer(_) => "integer",
            PostgresValue::Double(_) => "double",
            PostgresValue::Decimal(_) => "decimal",
            PostgresValue::Bool(_) => "bool",
            PostgresValue::ByteString(_) => "byteString",
            PostgresValue::Date(_) => "date",
            PostgresValue::Time(_) => "time",
            PostgresValue::TimeTz(_) => "timetz",
            PostgresValue::Timestamp(_) => "timestamp",
            PostgresValue::TimestampTz(_) => "timestamptz",
            PostgresValue::Interval(_) => "interval",
        }
    }

    fn conversion_error(&self, column: usize, target_type: &'static str) -> Error {
        Error::ValueConversion {
            column,
            target_type,
            reason: format!("value is {}", self.type_name()),
        }
    }

    /// `row.columns[i].int()`: fails on null or a non-`Integer` value.
    pub fn int(&self, column: usize) -> Result<i64> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::Integer(v) => Ok(*v),
            _ => Err(self.conversion_error(column, "integer")),
        }
    }

    /// `row.columns[i].optional_int()`: null maps to `None`, a non-null
    /// non-integer value is still an error.
    pub fn optional_int(&self, column: usize) -> Result<Option<i64>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::Integer(v) => Ok(Some(*v)),
            _ => Err(self.conversion_error(column, "integer")),
        }
    }

    /// `row.columns[i].double()`.
    pub fn double(&self, column: usize) -> Result<f64> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::Double(v) => Ok(*v),
            _ => Err(self.conversion_error(column, "double")),
        }
    }

    /// `row.columns[i].optional_double()`.
    pub fn optional_double(&self, column: usize) -> Result<Option<f64>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::Double(v) => Ok(Some(*v)),
            _ => Err(self.conversion_error(column, "double")),
        }
    }

    /// `row.columns[i].string()`.
    pub fn string(&self, column: usize) -> Result<&str> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::String(v) => Ok(v),
            _ => Err(self.conversion_error(column, "string")),
        }
    }

    /// `row.columns[i].optional_string()`.
    pub fn optional_string(&self, column: usize) -> Result<Option<&str>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::String(v) => Ok(Some(v)),
            _ => Err(self.conversion_error(column, "string")),
        }
    }

    /// `row.columns[i].decimal()`: the canonical decimal text, unparsed.
    pub fn decimal(&self, column: usize) -> Result<&str> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::Decimal(v) => Ok(v),
            _ => Err(self.conversion_error(column, "decimal")),
        }
    }

    /// `row.columns[i].optional_decimal()`.
    pub fn optional_decimal(&self, column: usize) -> Result<Option<&str>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::Decimal(v) => Ok(Some(v)),
            _ => Err(self.conversion_error(column, "decimal")),
        }
    }

    /// `row.columns[i].bool()`.
    pub fn bool(&self, column: usize) -> Result<bool> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::Bool(v) => Ok(*v),
            _ => Err(self.conversion_error(column, "bool")),
        }
    }

    /// `row.columns[i].optional_bool()`.
    pub fn optional_bool(&self, column: usize) -> Result<Option<bool>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::Bool(v) => Ok(Some(*v)),
            _ => Err(self.conversion_error(column, "bool")),
        }
    }

    /// `row.columns[i].byte_string()`.
    pub fn byte_string(&self, column: usize) -> Result<&[u8]> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::ByteString(v) => Ok(v),
            _ => Err(self.conversion_error(column, "byteString")),
        }
    }

    /// `row.columns[i].optional_byte_string()`.
    pub fn optional_byte_string(&self, column: usize) -> Result<Option<&[u8]>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::ByteString(v) => Ok(Some(v)),
            _ => Err(self.conversion_error(column, "byteString")),
        }
    }

    /// `row.columns[i].date()`.
    pub fn date(&self, column: usize) -> Result<Date> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::Date(v) => Ok(*v),
            _ => Err(self.conversion_error(column, "date")),
        }
    }

    /// `row.columns[i].optional_date()`.
    pub fn optional_date(&self, column: usize) -> Result<Option<Date>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::Date(v) => Ok(Some(*v)),
            _ => Err(self.conversion_error(column, "date")),
        }
    }

    /// `row.columns[i].time()`.
    pub fn time(&self, column: usize) -> Result<Time> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::Time(v) => Ok(*v),
            _ => Err(self.conversion_error(column, "time")),
        }
    }

    /// `row.columns[i].optional_time()`.
    pub fn optional_time(&self, column: usize) -> Result<Option<Time>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::Time(v) => Ok(Some(*v)),
            _ => Err(self.conversion_error(column, "time")),
        }
    }

    /// `row.columns[i].timetz()`.
    pub fn timetz(&self, column: usize) -> Result<TimeTz> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::TimeTz(v) => Ok(*v),
            _ => Err(self.conversion_error(column, "timetz")),
        }
    }

    /// `row.columns[i].optional_timetz()`.
    pub fn optional_timetz(&self, column: usize) -> Result<Option<TimeTz>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::TimeTz(v) => Ok(Some(*v)),
            _ => Err(self.conversion_error(column, "timetz")),
        }
    }

    /// `row.columns[i].timestamp()`.
    pub fn timestamp(&self, column: usize) -> Result<Timestamp> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::Timestamp(v) => Ok(*v),
            _ => Err(self.conversion_error(column, "timestamp")),
        }
    }

    /// `row.columns[i].optional_timestamp()`.
    pub fn optional_timestamp(&self, column: usize) -> Result<Option<Timestamp>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::Timestamp(v) => Ok(Some(*v)),
            _ => Err(self.conversion_error(column, "timestamp")),
        }
    }

    /// `row.columns[i].timestamptz()`.
    pub fn timestamptz(&self, column: usize) -> Result<TimestampTz> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::TimestampTz(v) => Ok(*v),
            _ => Err(self.conversion_error(column, "timestamptz")),
        }
    }

    /// `row.columns[i].optional_timestamptz()`.
    pub fn optional_timestamptz(&self, column: usize) -> Result<Option<TimestampTz>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::TimestampTz(v) => Ok(Some(*v)),
            _ => Err(self.conversion_error(column, "timestamptz")),
        }
    }

    /// `row.columns[i].interval()`.
    pub fn interval(&self, column: usize) -> Result<Interval> {
        match self {
            PostgresValue::Null => Err(Error::ValueIsNull { column }),
            PostgresValue::Interval(v) => Ok(*v),
            _ => Err(self.conversion_error(column, "interval")),
        }
    }

    /// `row.columns[i].optional_interval()`.
    pub fn optional_interval(&self, column: usize) -> Result<Option<Interval>> {
        match self {
            PostgresValue::Null => Ok(None),
            PostgresValue::Interval(v) => Ok(Some(*v)),
            _ => Err(self.conversion_error(column, "interval")),
        }
    }
}

impl From<bool> for PostgresValue {
    fn from(v: bool) -> Self {
        PostgresValue::Bool(v)
    }
}

impl From<i64> for PostgresValue {
    fn from(v: i64) -> Self {
        PostgresValue::Integer(v)
    }
}

impl From<i32> for PostgresValue {
    fn from(v: i32) -> Self {
        PostgresValue::Integer(i64::from(v))
    }
}

impl From<f64> for PostgresValue {
    fn from(v: f64) -> Self {
        PostgresValue::Double(v)
    }
}

impl From<String> for PostgresValue {
    fn from(v: String) -> Self {
        PostgresValue::String(v)
    }
}

impl From<&str> for PostgresValue {
    fn from(v: &str) -> Self {
        PostgresValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for PostgresValue {
    fn from(v: Vec<u8>) -> Self {
        PostgresValue::ByteString(v)
    }
}

impl<T: Into<PostgresValue>> From<Option<T>> for PostgresValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => PostgresValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_null() {
        assert!(PostgresValue::Null.is_null());
        assert!(!PostgresValue::Integer(0).is_null());
    }

    #[test]
    fn int_fails_on_null() {
        let err = PostgresValue::Null.int(3).unwrap_err();
        assert!(matches!(err, Error::ValueIsNull { column: 3 }));
    }

    #[test]
    fn int_fails_on_wrong_type() {
        let err = PostgresValue::String("x".into()).int(0).unwrap_err();
        assert!(matches!(err, Error::ValueConversion { .. }));
    }

    #[test]
    fn optional_int_null_is_none() {
        assert_eq!(PostgresValue::Null.optional_int(0).unwrap(), None);
    }

    #[test]
    fn optional_int_wrong_type_still_errors() {
        assert!(PostgresValue::String("x".into()).optional_int(0).is_err());
    }

    #[test]
    fn date_round_trip_accessor() {
        let d = Date {
            year: -44,
            month: 3,
            day: 15,
        };
        let v = PostgresValue::Date(d);
        assert_eq!(v.date(0).unwrap(), d);
    }

    #[test]
    fn from_option_none_is_null() {
        let v: PostgresValue = Option::<i64>::None.into();
        assert!(v.is_null());
    }
}
