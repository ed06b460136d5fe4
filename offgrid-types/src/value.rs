//! Tagged cell values.
//!
//! Replicated columns are dynamically typed; a cell holds exactly one of
//! these variants. Coders to and from the storage engine's native types
//! live at the storage boundary, and the encryption envelope handles the
//! network boundary — the core only ever sees this enum.

use serde::{Deserialize, Serialize};

/// The value of one replicated cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum CellValue {
    /// No value (distinct from an empty string or zero).
    Absent,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl CellValue {
    /// Returns true if this is the absent marker.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns a short name for the variant, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for CellValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}
