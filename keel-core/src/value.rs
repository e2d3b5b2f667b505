use crate::Error;
use std::{
    any,
    fmt::{self, Display, Formatter},
};

/// Dynamically typed value used for statement parameters and row cells.
///
/// Every typed variant carries an `Option` so that a NULL still remembers which type
/// it was meant to have, `Null` is the untyped NULL.
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Boolean(None)
                | Value::Int64(None)
                | Value::Float64(None)
                | Value::Varchar(None)
                | Value::Blob(None)
        )
    }

    pub fn same_type(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            _ => self.is_null() && other.is_null(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            v if v.is_null() => f.write_str("NULL"),
            Value::Boolean(Some(v)) => write!(f, "{}", v),
            Value::Int64(Some(v)) => write!(f, "{}", v),
            Value::Float64(Some(v)) => write!(f, "{}", v),
            Value::Varchar(Some(v)) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Blob(Some(v)) => write!(f, "<{} bytes>", v.len()),
            _ => unreachable!(),
        }
    }
}

macro_rules! impl_from_value {
    ($source:ty, $variant:ident, $convert:expr) => {
        impl From<$source> for Value {
            fn from(value: $source) -> Self {
                Value::$variant(Some($convert(value)))
            }
        }
    };
}

impl_from_value!(bool, Boolean, |v| v);
impl_from_value!(i32, Int64, |v: i32| v as i64);
impl_from_value!(i64, Int64, |v| v);
impl_from_value!(u32, Int64, |v: u32| v as i64);
impl_from_value!(f64, Float64, |v| v);
impl_from_value!(String, Varchar, |v| v);
impl_from_value!(&str, Varchar, |v: &str| v.to_owned());
impl_from_value!(Vec<u8>, Blob, |v: Vec<u8>| v.into_boxed_slice());
impl_from_value!(&[u8], Blob, |v: &[u8]| v.into());

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert `{}` into `{}`",
        value,
        any::type_name::<T>()
    ))
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            Value::Int64(Some(v @ (0 | 1))) => Ok(v == 1),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int64(Some(v)) => Ok(v),
            Value::Boolean(Some(v)) => Ok(v as i64),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float64(Some(v)) => Ok(v),
            Value::Int64(Some(v)) => Ok(v as f64),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Blob(Some(v)) => Ok(v.into_vec()),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}
