//! PostgreSQL type system and text-format conversion.
//!
//! This module provides:
//! - OID constants for the built-in types this driver supports
//! - Text encoding/decoding between [`PostgresValue`] and the wire format
//! - A type registry for runtime type name/category lookup
//!
//! Binary format is out of scope; every value crosses the wire as text.

pub mod decode;
pub mod encode;
pub mod oid;

use std::collections::HashMap;

pub use decode::decode_text;
pub use encode::encode_text;

/// Category of a PostgreSQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    /// Boolean types (bool)
    Boolean,
    /// Numeric types (int2, int4, int8, float4, float8, numeric)
    Numeric,
    /// String types (text, varchar, char, name, bpchar)
    String,
    /// Date/time types (date, time, timetz, timestamp, timestamptz, interval)
    DateTime,
    /// Binary types (bytea)
    Binary,
    /// Unknown or unsupported types
    Unknown,
}

/// Information about a PostgreSQL type.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// The type's OID
    pub oid: u32,
    /// The type's name (e.g., "int4", "text")
    pub name: &'static str,
    /// Type category
    pub category: TypeCategory,
}

/// Registry of the PostgreSQL types this driver understands.
///
/// Provides lookup by OID or name for type information.
pub struct TypeRegistry {
    by_oid: HashMap<u32, TypeInfo>,
    by_name: HashMap<&'static str, u32>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a new type registry with all supported built-in types.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            by_oid: HashMap::new(),
            by_name: HashMap::new(),
        };
        registry.register_builtins();
        registry
    }

    /// Look up type info by OID.
    #[must_use]
    pub fn get(&self, oid: u32) -> Option<&TypeInfo> {
        self.by_oid.get(&oid)
    }

    /// Look up type info by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&TypeInfo> {
        self.by_name.get(name).and_then(|oid| self.by_oid.get(oid))
    }

    /// Get the type category for an OID.
    #[must_use]
    pub fn category(&self, oid: u32) -> TypeCategory {
        self.get(oid).map_or(TypeCategory::Unknown, |t| t.category)
    }

    fn register(&mut self, info: TypeInfo) {
        self.by_name.insert(info.name, info.oid);
        self.by_oid.insert(info.oid, info);
    }

    fn register_builtins(&mut self) {
        let builtins = [
            (oid::BOOL, "bool", TypeCategory::Boolean),
            (oid::INT2, "int2", TypeCategory::Numeric),
            (oid::INT4, "int4", TypeCategory::Numeric),
            (oid::INT8, "int8", TypeCategory::Numeric),
            (oid::FLOAT4, "float4", TypeCategory::Numeric),
            (oid::FLOAT8, "float8", TypeCategory::Numeric),
            (oid::NUMERIC, "numeric", TypeCategory::Numeric),
            (oid::TEXT, "text", TypeCategory::String),
            (oid::VARCHAR, "varchar", TypeCategory::String),
            (oid::BPCHAR, "bpchar", TypeCategory::String),
            (oid::CHAR, "char", TypeCategory::String),
            (oid::NAME, "name", TypeCategory::String),
            (oid::BYTEA, "bytea", TypeCategory::Binary),
            (oid::DATE, "date", TypeCategory::DateTime),
            (oid::TIME, "time", TypeCategory::DateTime),
            (oid::TIMETZ, "timetz", TypeCategory::DateTime),
            (oid::TIMESTAMP, "timestamp", TypeCategory::DateTime),
            (oid::TIMESTAMPTZ, "timestamptz", TypeCategory::DateTime),
            (oid::INTERVAL, "interval", TypeCategory::DateTime),
            (oid::UNKNOWN, "unknown", TypeCategory::Unknown),
        ];

        for (oid, name, category) in builtins {
            self.register(TypeInfo { oid, name, category });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_registry_creation() {
        let registry = TypeRegistry::new();

        assert!(registry.get(oid::BOOL).is_some());
        assert!(registry.get(oid::INT4).is_some());
        assert!(registry.get(oid::TEXT).is_some());

        assert!(registry.by_name("int4").is_some());
        assert!(registry.by_name("text").is_some());
    }

    #[test]
    fn test_type_categories() {
        let registry = TypeRegistry::new();

        assert_eq!(registry.category(oid::BOOL), TypeCategory::Boolean);
        assert_eq!(registry.category(oid::INT4), TypeCategory::Numeric);
        assert_eq!(registry.category(oid::TEXT), TypeCategory::String);
        assert_eq!(registry.category(oid::DATE), TypeCategory::DateTime);
        assert_eq!(registry.category(oid::BYTEA), TypeCategory::Binary);
    }

    #[test]
    fn test_unknown_type() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.category(999_999), TypeCategory::Unknown);
    }
}
