use std::fmt;

use crate::error::ValueError;

/// The closed set of scalar kinds a record field may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    /// Signed integer, widened to `i64`.
    Int,
    /// Unsigned integer, widened to `u64`.
    UInt,
    /// Floating point, widened to `f64`.
    Float,
    Text,
    Bytes,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::UInt => write!(f, "uint"),
            Self::Float => write!(f, "float"),
            Self::Text => write!(f, "text"),
            Self::Bytes => write!(f, "bytes"),
        }
    }
}

/// A single scalar field value, detached from the record it was read from.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// The kind tag of this value.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::Int(_) => ScalarKind::Int,
            Self::UInt(_) => ScalarKind::UInt,
            Self::Float(_) => ScalarKind::Float,
            Self::Text(_) => ScalarKind::Text,
            Self::Bytes(_) => ScalarKind::Bytes,
        }
    }

    fn mismatch(&self, expected: ScalarKind) -> ValueError {
        ValueError::KindMismatch {
            expected,
            found: self.kind(),
        }
    }
}

/// A Rust type that can be stored as a scalar record field.
///
/// Implemented for `bool`, the fixed-width integers, `f32`/`f64`, `String`
/// and `Vec<u8>`. Narrower integer types are widened on write and checked on
/// read, so a stored value that no longer fits yields
/// [`ValueError::OutOfRange`] rather than a silent truncation.
pub trait ScalarValue: Sized + Send + Sync + 'static {
    /// The kind this type is stored as.
    const KIND: ScalarKind;

    /// Capture the field as a detached [`Value`].
    fn to_value(&self) -> Value;

    /// Rebuild the field from a decoded [`Value`].
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl ScalarValue for bool {
    const KIND: ScalarKind = ScalarKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl ScalarValue for String {
    const KIND: ScalarKind = ScalarKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl ScalarValue for Vec<u8> {
    const KIND: ScalarKind = ScalarKind::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl ScalarValue for f64 {
    const KIND: ScalarKind = ScalarKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl ScalarValue for f32 {
    const KIND: ScalarKind = ScalarKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(v) => {
                let narrowed = v as f32;
                if v.is_finite() && narrowed.is_infinite() {
                    return Err(ValueError::OutOfRange {
                        kind: Self::KIND,
                        target: "f32",
                    });
                }
                Ok(narrowed)
            }
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

macro_rules! integer_scalar {
    ($variant:ident, $wide:ty, $kind:expr, $($t:ty),+) => {
        $(
            impl ScalarValue for $t {
                const KIND: ScalarKind = $kind;

                fn to_value(&self) -> Value {
                    Value::$variant(<$wide>::from(*self))
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::$variant(v) => <$t>::try_from(v).map_err(|_| ValueError::OutOfRange {
                            kind: Self::KIND,
                            target: stringify!($t),
                        }),
                        other => Err(other.mismatch(Self::KIND)),
                    }
                }
            }
        )+
    };
}

integer_scalar!(Int, i64, ScalarKind::Int, i8, i16, i32, i64);
integer_scalar!(UInt, u64, ScalarKind::UInt, u8, u16, u32, u64);
