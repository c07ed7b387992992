//! Typed extraction of Rust values from decoded [`Value`]s.
//!
//! Integer targets accept any narrower integer kind and widen it losslessly;
//! `Char` counts as an unsigned 16-bit integer. Unsigned targets reject
//! negative values, except `u8`, which reinterprets a `Byte` as its raw bits.
//! `f64` also accepts `Float`. Nothing narrows.

use crate::error::CastError;
use crate::model::{ArrayRef, CollectionRef, EnumConstant, RecordRef, Value};

/// Conversion from a [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, CastError>;
}

impl Value {
    /// Extracts a typed value.
    ///
    /// ```
    /// use objgraph::Value;
    ///
    /// assert_eq!(Value::Short(7).cast::<i64>(), Ok(7));
    /// assert!(Value::Long(7).cast::<i32>().is_err());
    /// ```
    pub fn cast<T: FromValue>(&self) -> Result<T, CastError> {
        T::from_value(self)
    }
}

impl RecordRef {
    /// Extracts the named field as a typed value.
    pub fn get_as<T: FromValue>(&self, field: &str) -> Result<T, CastError> {
        let value = self.field(field).ok_or_else(|| CastError::MissingField {
            type_name: self.type_name().to_string(),
            field: field.to_string(),
        })?;
        T::from_value(&value)
    }
}

fn mismatch(expected: &'static str, value: &Value) -> CastError {
    CastError::TypeMismatch {
        expected,
        found: value.kind_name(),
    }
}

/// Integer kinds no wider than `max_width` bytes, widened to i64.
fn integer(value: &Value, max_width: usize) -> Option<i64> {
    match *value {
        Value::Byte(v) => Some(i64::from(v)),
        Value::Short(v) if max_width >= 2 => Some(i64::from(v)),
        Value::Char(v) if max_width >= 4 => Some(i64::from(v)),
        Value::Int(v) if max_width >= 4 => Some(i64::from(v)),
        Value::Long(v) if max_width >= 8 => Some(v),
        _ => None,
    }
}

macro_rules! impl_integer {
    ($($ty:ty => $width:expr, $name:expr;)*) => {$(
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self, CastError> {
                let wide = integer(value, $width).ok_or_else(|| mismatch($name, value))?;
                <$ty>::try_from(wide).map_err(|_| CastError::OutOfRange {
                    expected: $name,
                    value: wide,
                })
            }
        }
    )*};
}

impl_integer! {
    i8 => 1, "i8";
    i32 => 4, "i32";
    i64 => 8, "i64";
    u32 => 4, "u32";
    u64 => 8, "u64";
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match *value {
            Value::Byte(v) => Ok(i16::from(v)),
            Value::Short(v) => Ok(v),
            _ => Err(mismatch("i16", value)),
        }
    }
}

impl FromValue for u8 {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match *value {
            Value::Byte(v) => Ok(v as u8),
            _ => Err(mismatch("u8", value)),
        }
    }
}

impl FromValue for u16 {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        let wide = match *value {
            Value::Char(v) => return Ok(v),
            Value::Byte(v) => i64::from(v),
            Value::Short(v) => i64::from(v),
            _ => return Err(mismatch("u16", value)),
        };
        u16::try_from(wide).map_err(|_| CastError::OutOfRange {
            expected: "u16",
            value: wide,
        })
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match *value {
            Value::Bool(v) => Ok(v),
            _ => Err(mismatch("bool", value)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match *value {
            Value::Float(v) => Ok(v),
            _ => Err(mismatch("f32", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match *value {
            Value::Double(v) => Ok(v),
            Value::Float(v) => Ok(f64::from(v)),
            _ => Err(mismatch("f64", value)),
        }
    }
}

impl FromValue for char {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match value {
            Value::Char(v) => value.as_char().ok_or(CastError::OutOfRange {
                expected: "char",
                value: i64::from(*v),
            }),
            _ => Err(mismatch("char", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            _ => Err(mismatch("text", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        Ok(value.clone())
    }
}

impl FromValue for EnumConstant {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match value {
            Value::Enum(e) => Ok(e.clone()),
            _ => Err(mismatch("enum", value)),
        }
    }
}

impl FromValue for RecordRef {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match value {
            Value::Record(r) => Ok(r.clone()),
            _ => Err(mismatch("record", value)),
        }
    }
}

impl FromValue for ArrayRef {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match value {
            Value::Array(a) => Ok(a.clone()),
            _ => Err(mismatch("array", value)),
        }
    }
}

impl FromValue for CollectionRef {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match value {
            Value::Collection(c) => Ok(c.clone()),
            _ => Err(mismatch("collection", value)),
        }
    }
}

/// `Null` becomes `None`; anything else must convert to `T`.
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Reads arrays, collections and byte sequences (each byte as a `Byte`).
impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, CastError> {
        let items = match value {
            Value::Array(a) => a.try_slots().ok_or(CastError::Borrowed)?,
            Value::Collection(c) => c.try_slots().ok_or(CastError::Borrowed)?,
            Value::Bytes(bytes) => {
                return bytes
                    .iter()
                    .map(|&b| T::from_value(&Value::Byte(b as i8)))
                    .collect();
            }
            _ => return Err(mismatch("sequence", value)),
        };
        items.iter().map(T::from_value).collect()
    }
}
