//! Database-agnostic type mappings.
//!
//! Converts sqlx rows into [`Row`]s of [`Value`]s.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction

use crate::models::{DatabaseType, Row, Value};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower == "text" {
        return TypeCategory::Text;
    }

    // Dates, times and anything else are read as text
    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Raw DECIMAL/NUMERIC value, kept as its exact textual form.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Row conversion
// =============================================================================

/// Convert a driver row into a [`Row`].
pub trait ToRow {
    fn to_row(&self) -> Row;
}

impl ToRow for MySqlRow {
    fn to_row(&self) -> Row {
        let (columns, values) = self
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::MySQL);
                let value = mysql::decode_column(self, idx, type_name, category);
                (col.name().to_string(), value)
            })
            .unzip();
        Row::new(columns, values)
    }
}

impl ToRow for PgRow {
    fn to_row(&self) -> Row {
        let (columns, values) = self
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                let value = postgres::decode_column(self, idx, category);
                (col.name().to_string(), value)
            })
            .unzip();
        Row::new(columns, values)
    }
}

impl ToRow for SqliteRow {
    fn to_row(&self) -> Row {
        let (columns, values) = self
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::SQLite);
                let value = sqlite::decode_column(self, idx, type_name, category);
                (col.name().to_string(), value)
            })
            .unzip();
        Row::new(columns, values)
    }
}

fn float_value(v: f64) -> Value {
    Value::Float(v)
}

fn json_text(text: String, type_name: &str) -> Value {
    if type_name.to_lowercase().contains("json") {
        if let Ok(json) = serde_json::from_str::<JsonValue>(&text) {
            return Value::Json(json);
        }
    }
    Value::String(text)
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Value {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            _ => decode_text(row, idx, type_name),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Value {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => Value::String(v.0),
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::error!("Failed to decode DECIMAL: {:?}", e);
                Value::Null
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Int(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<u8>, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u16>, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u32>, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            // values beyond i64 keep their exact text
            return i64::try_from(v)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::String(v.to_string()));
        }
        Value::Null
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        Value::Null
    }

    fn decode_binary(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null)
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> Value {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null)
    }

    fn decode_text(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(|v| json_text(v, type_name))
            .unwrap_or(Value::Null)
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> Value {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Uuid => decode_uuid(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> Value {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(Some(v)) => Value::String(v.0),
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::error!("Failed to decode NUMERIC: {:?}", e);
                Value::Null
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Value {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return Value::Int(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return Value::Int(v);
        }
        Value::Null
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &PgRow, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        Value::Null
    }

    fn decode_binary(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null)
    }

    fn decode_json(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null)
    }

    fn decode_uuid(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<uuid::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|v| Value::String(v.hyphenated().to_string()))
            .unwrap_or(Value::Null)
    }

    fn decode_text(row: &PgRow, idx: usize) -> Value {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> Value {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => decode_binary(row, idx),
            // Expression columns (COUNT(*), literals) carry the NULL type name
            _ if type_name.eq_ignore_ascii_case("null") => decode_dynamic(row, idx),
            _ => decode_text(row, idx, type_name),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> Value {
        row.try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null)
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> Value {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> Value {
        row.try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(float_value)
            .unwrap_or(Value::Null)
    }

    fn decode_binary(row: &SqliteRow, idx: usize) -> Value {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null)
    }

    fn decode_dynamic(row: &SqliteRow, idx: usize) -> Value {
        if let Ok(Some(v)) = row.try_get_unchecked::<Option<i64>, _>(idx) {
            return Value::Int(v);
        }
        if let Ok(Some(v)) = row.try_get_unchecked::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get_unchecked::<Option<String>, _>(idx) {
            return Value::String(v);
        }
        Value::Null
    }

    fn decode_text(row: &SqliteRow, idx: usize, type_name: &str) -> Value {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(|v| json_text(v, type_name))
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("SERIAL", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_text_and_binary() {
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("bytea", DatabaseType::PostgreSQL),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("jsonb", DatabaseType::PostgreSQL),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("TIMESTAMP", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_json_text() {
        assert_eq!(
            json_text("{\"a\":1}".into(), "JSON"),
            Value::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(
            json_text("{\"a\":1}".into(), "TEXT"),
            Value::String("{\"a\":1}".into())
        );
    }
}
