use std::fmt::Write as _;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Values that can be bound as statement parameters or read back from a row.
///
/// Anything interpolated into `sql!` / `raw!` is converted into this enum first:
/// ```rust
/// use sql_guard::prelude::*;
///
/// let params = vec![
///     RowValues::from(1),
///     RowValues::from("alice"),
///     RowValues::from(vec![1, 2, 3]),
/// ];
/// assert!(matches!(params[2], RowValues::Array(_)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// Sequence bound as a single array parameter (`= ANY($1)`)
    Array(Vec<RowValues>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[RowValues]> {
        if let RowValues::Array(items) = self {
            Some(items)
        } else {
            None
        }
    }

    /// Textual form spliced into raw fragments.
    ///
    /// No quoting or escaping happens here: `Text("desc")` renders as `desc`.
    /// Only feed trusted values (identifiers, enum-like keywords) through raw mode.
    #[must_use]
    pub fn to_literal(&self) -> String {
        let mut out = String::new();
        self.write_literal(&mut out);
        out
    }

    fn write_literal(&self, out: &mut String) {
        match self {
            RowValues::Int(i) => {
                let _ = write!(out, "{i}");
            }
            RowValues::Float(f) => {
                let _ = write!(out, "{f}");
            }
            RowValues::Text(s) => out.push_str(s),
            RowValues::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            RowValues::Timestamp(dt) => {
                let _ = write!(out, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f"));
            }
            RowValues::Null => out.push_str("NULL"),
            RowValues::JSON(json) => out.push_str(&json.to_string()),
            RowValues::Blob(bytes) => {
                out.push_str("\\x");
                for b in bytes {
                    let _ = write!(out, "{b:02x}");
                }
            }
            RowValues::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    item.write_literal(out);
                }
            }
        }
    }
}

macro_rules! row_values_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for RowValues {
                fn from(value: $ty) -> Self {
                    RowValues::Int(i64::from(value))
                }
            }
        )*
    };
}

row_values_from_int!(i8, i16, i32, i64, u16, u32);

impl From<f32> for RowValues {
    fn from(value: f32) -> Self {
        RowValues::Float(f64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<&String> for RowValues {
    fn from(value: &String) -> Self {
        RowValues::Text(value.clone())
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        RowValues::JSON(value)
    }
}

impl From<&[u8]> for RowValues {
    fn from(value: &[u8]) -> Self {
        RowValues::Blob(value.to_vec())
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

impl<T: Into<RowValues>> From<Vec<T>> for RowValues {
    fn from(value: Vec<T>) -> Self {
        RowValues::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RowValues>, const N: usize> From<[T; N]> for RowValues {
    fn from(value: [T; N]) -> Self {
        RowValues::Array(value.into_iter().map(Into::into).collect())
    }
}
