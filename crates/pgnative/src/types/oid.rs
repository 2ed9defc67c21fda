//! PostgreSQL type Object IDs (OIDs).
//!
//! PostgreSQL identifies types by numeric OIDs. This module defines the
//! well-known OIDs for the built-in types this driver converts to and from
//! text.

/// Boolean type
pub const BOOL: u32 = 16;

/// Byte array (bytea)
pub const BYTEA: u32 = 17;

/// Single character (char)
pub const CHAR: u32 = 18;

/// Name type (internal, 63-byte identifier)
pub const NAME: u32 = 19;

/// 8-byte signed integer (int8/bigint)
pub const INT8: u32 = 20;

/// 2-byte signed integer (int2/smallint)
pub const INT2: u32 = 21;

/// 4-byte signed integer (int4/integer)
pub const INT4: u32 = 23;

/// Variable-length text (text)
pub const TEXT: u32 = 25;

/// Single-precision floating point (float4/real)
pub const FLOAT4: u32 = 700;

/// Double-precision floating point (float8/double precision)
pub const FLOAT8: u32 = 701;

/// Variable-length character with limit (varchar)
pub const VARCHAR: u32 = 1043;

/// Fixed-length character (bpchar)
pub const BPCHAR: u32 = 1042;

/// Date (no time)
pub const DATE: u32 = 1082;

/// Time without time zone
pub const TIME: u32 = 1083;

/// Timestamp without time zone
pub const TIMESTAMP: u32 = 1114;

/// Timestamp with time zone
pub const TIMESTAMPTZ: u32 = 1184;

/// Time interval
pub const INTERVAL: u32 = 1186;

/// Time with time zone
pub const TIMETZ: u32 = 1266;

/// Arbitrary precision numeric
pub const NUMERIC: u32 = 1700;

/// Unknown type; used as the parameter type OID when the client lets the
/// server infer a parameter's type, and for NULL with no declared type.
pub const UNKNOWN: u32 = 705;

/// Get a human-readable name for a type OID.
#[must_use]
pub const fn type_name(type_oid: u32) -> &'static str {
    match type_oid {
        BOOL => "bool",
        BYTEA => "bytea",
        CHAR => "char",
        NAME => "name",
        INT8 => "int8",
        INT2 => "int2",
        INT4 => "int4",
        TEXT => "text",
        FLOAT4 => "float4",
        FLOAT8 => "float8",
        VARCHAR => "varchar",
        BPCHAR => "bpchar",
        DATE => "date",
        TIME => "time",
        TIMESTAMP => "timestamp",
        TIMESTAMPTZ => "timestamptz",
        INTERVAL => "interval",
        TIMETZ => "timetz",
        NUMERIC => "numeric",
        UNKNOWN => "unknown",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(INT4), "int4");
        assert_eq!(type_name(TEXT), "text");
        assert_eq!(type_name(TIMESTAMPTZ), "timestamptz");
        assert_eq!(type_name(999_999), "unknown");
    }
}
