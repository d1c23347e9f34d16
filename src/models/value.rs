//! Argument and result values.
//!
//! `Value` is the single cell type that flows between the query builder, the
//! bulk insert engine and the native drivers. `ToValue` / `FromValue` convert
//! to and from Rust types.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A bound parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// Structured JSON document
    Json(JsonValue),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }

    /// Borrow the text of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Conversions
// =============================================================================

macro_rules! impl_from_for_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    value.to_value()
                }
            }
        )*
    };
}

impl_from_for_value!(bool, i32, i64, f64, &str, String, JsonValue);

/// Convert a Rust value into a bindable `Value`.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Convert a decoded `Value` back into a Rust value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> DbResult<Self>;
}

fn mismatch(expected: &str, actual: &Value) -> DbError {
    DbError::invalid_input(format!(
        "Expected {} value, got {}",
        expected,
        actual.type_name()
    ))
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> DbResult<Self> {
        Ok(value.clone())
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Bool(v) => Ok(*v),
            // SQLite and MySQL store booleans as integers
            Value::Int(v) => Ok(*v != 0),
            other => Err(mismatch("bool", other)),
        }
    }
}

macro_rules! impl_integer_value {
    ($($ty:ty),+) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> DbResult<Self> {
                    match value {
                        Value::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            DbError::invalid_input(format!(
                                "Integer {} out of range for {}",
                                v,
                                stringify!($ty)
                            ))
                        }),
                        Value::Bool(v) => Ok(<$ty>::from(*v)),
                        other => Err(mismatch(stringify!($ty), other)),
                    }
                }
            }
        )+
    };
}

impl_integer_value!(i16, i32, i64, u8, u16, u32);

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            // DECIMAL/NUMERIC columns decode as text to keep their precision
            Value::String(s) => s.parse().map_err(|_| mismatch("float", value)),
            other => Err(mismatch("float", other)),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> DbResult<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::String(v) => Ok(v.clone()),
            Value::Json(v) => Ok(v.to_string()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Bytes(v) => Ok(v.clone()),
            Value::String(v) => Ok(v.as_bytes().to_vec()),
            other => Err(mismatch("bytes", other)),
        }
    }
}

impl ToValue for JsonValue {
    fn to_value(&self) -> Value {
        Value::Json(self.clone())
    }
}

impl FromValue for JsonValue {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::String(s) => serde_json::from_str(s).map_err(|_| mismatch("json", value)),
            Value::Null => Ok(JsonValue::Null),
            other => Err(mismatch("json", other)),
        }
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::String(self.to_rfc3339())
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> DbResult<Self> {
        let text = value.as_str().ok_or_else(|| mismatch("datetime", value))?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| mismatch("datetime", value))
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::String(self.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> DbResult<Self> {
        DateTime::<Utc>::from_value(value).map(|dt| dt.naive_utc())
    }
}

impl ToValue for Uuid {
    fn to_value(&self) -> Value {
        Value::String(self.hyphenated().to_string())
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::String(s) => Uuid::parse_str(s).map_err(|_| mismatch("uuid", value)),
            Value::Bytes(b) => Uuid::from_slice(b).map_err(|_| mismatch("uuid", value)),
            other => Err(mismatch("uuid", other)),
        }
    }
}
