use crate::functions::FunctionArg;
use crate::{Map, Value};

pub type Result<T> = std::result::Result<T, Error>;

pub struct Error {
    /// Expected
    pub expected: &'static str,
    /// Got
    pub found: &'static str,
}

fn type_error<T>(expected: &'static str, v: &Value) -> Result<T> {
    Err(Error {
        expected,
        found: v.human(),
    })
}

impl FunctionArg for Value {
    fn from_value(v: Value) -> Result<Self> {
        Ok(v)
    }
}

impl FunctionArg for bool {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Bool(b) => Ok(b),
            v => type_error("bool", &v),
        }
    }
}

impl FunctionArg for i64 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Integer(i) => Ok(i),
            v => type_error("integer", &v),
        }
    }
}

impl FunctionArg for f64 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            v => type_error("float", &v),
        }
    }
}

impl FunctionArg for String {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::String(s) => Ok(s),
            v => type_error("string", &v),
        }
    }
}

impl FunctionArg for Vec<Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::List(list) => Ok(list),
            v => type_error("list", &v),
        }
    }
}

impl FunctionArg for Map<String, Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Map(map) => Ok(map),
            v => type_error("map", &v),
        }
    }
}

impl<T> FunctionArg for Option<T>
where
    T: FunctionArg,
{
    const OPTIONAL: bool = true;

    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::None => Ok(None),
            v => T::from_value(v).map(Some),
        }
    }
}
