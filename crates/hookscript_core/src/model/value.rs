//! Value model crossing the host/script boundary.
//!
//! # Responsibility
//! - Carry intercepted call arguments and results into extension handlers.
//! - Convert handler results back into host-native types with explicit checks.
//!
//! # Invariants
//! - Host pointers are opaque: scripts observe them as integers only.
//! - Narrowing conversions (`i64 -> i32`) never truncate silently.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// One argument or result value exchanged with extension handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum HookValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Opaque host object address.
    Pointer(usize),
}

impl HookValue {
    /// Wraps a host object pointer without dereferencing it.
    pub fn pointer<T>(ptr: *const T) -> Self {
        Self::Pointer(ptr as usize)
    }

    /// Stable kind label used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Pointer(_) => "pointer",
        }
    }

    /// Parses a CLI-style literal: `true|false`, integer, float, or text.
    pub fn parse_literal(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "" | "()" => Self::Unit,
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => {
                if let Ok(value) = trimmed.parse::<i64>() {
                    Self::Int(value)
                } else if let Ok(value) = trimmed.parse::<f64>() {
                    Self::Float(value)
                } else {
                    Self::Text(trimmed.to_string())
                }
            }
        }
    }
}

impl Display for HookValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
            Self::Pointer(value) => write!(f, "{value:#x}"),
        }
    }
}

impl From<()> for HookValue {
    fn from(_: ()) -> Self {
        Self::Unit
    }
}

impl From<bool> for HookValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for HookValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for HookValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for HookValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for HookValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for HookValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Conversion failure from [`HookValue`] into a host-native type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueConversionError {
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
    OutOfRange {
        expected: &'static str,
        value: i64,
    },
}

impl Display for ValueConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mismatch { expected, found } => {
                write!(f, "expected {expected} value, found {found}")
            }
            Self::OutOfRange { expected, value } => {
                write!(f, "value {value} does not fit into {expected}")
            }
        }
    }
}

impl Error for ValueConversionError {}

impl TryFrom<HookValue> for () {
    type Error = ValueConversionError;

    fn try_from(value: HookValue) -> Result<Self, Self::Error> {
        match value {
            HookValue::Unit => Ok(()),
            other => Err(ValueConversionError::Mismatch {
                expected: "unit",
                found: other.kind(),
            }),
        }
    }
}

impl TryFrom<HookValue> for bool {
    type Error = ValueConversionError;

    fn try_from(value: HookValue) -> Result<Self, Self::Error> {
        match value {
            HookValue::Bool(value) => Ok(value),
            other => Err(ValueConversionError::Mismatch {
                expected: "bool",
                found: other.kind(),
            }),
        }
    }
}

impl TryFrom<HookValue> for i64 {
    type Error = ValueConversionError;

    fn try_from(value: HookValue) -> Result<Self, Self::Error> {
        match value {
            HookValue::Int(value) => Ok(value),
            other => Err(ValueConversionError::Mismatch {
                expected: "int",
                found: other.kind(),
            }),
        }
    }
}

impl TryFrom<HookValue> for i32 {
    type Error = ValueConversionError;

    fn try_from(value: HookValue) -> Result<Self, Self::Error> {
        let wide = i64::try_from(value)?;
        i32::try_from(wide).map_err(|_| ValueConversionError::OutOfRange {
            expected: "i32",
            value: wide,
        })
    }
}

impl TryFrom<HookValue> for f64 {
    type Error = ValueConversionError;

    fn try_from(value: HookValue) -> Result<Self, Self::Error> {
        match value {
            HookValue::Float(value) => Ok(value),
            other => Err(ValueConversionError::Mismatch {
                expected: "float",
                found: other.kind(),
            }),
        }
    }
}

impl TryFrom<HookValue> for String {
    type Error = ValueConversionError;

    fn try_from(value: HookValue) -> Result<Self, Self::Error> {
        match value {
            HookValue::Text(value) => Ok(value),
            other => Err(ValueConversionError::Mismatch {
                expected: "text",
                found: other.kind(),
            }),
        }
    }
}
