use std::fmt::{self, Debug, Display, Formatter};

use crate::{heap::Heap, object::ObjRef};

#[derive(Clone, Copy, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Obj(ObjRef),
}

impl Default for Value {
    fn default() -> Value {
        Value::Null
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Obj(obj) => write!(f, "{:?}", obj),
        }
    }
}

impl Value {
    pub fn type_name(self, heap: &Heap) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Obj(obj) => heap.get(obj).expect("stale handle").type_name(),
        }
    }

    pub fn display(self, heap: &Heap) -> ValueDisplay<'_> {
        ValueDisplay { value: self, heap }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_obj(&self) -> Option<ObjRef> {
        match self {
            Value::Obj(obj) => Some(*obj),
            _ => None,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(f)
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Value::Obj(obj)
    }
}

pub struct ValueDisplay<'a> {
    value: Value,
    heap: &'a Heap,
}

impl Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.value {
            Value::Obj(obj) => self
                .heap
                .get(obj)
                .expect("stale handle")
                .fmt_with(obj, self.heap, f),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Formats a float with 14 significant digits, the way `%.14g` does.
pub fn format_number(n: f64) -> String {
    const PRECISION: i32 = 14;

    if n.is_nan() {
        return "nan".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0".into() } else { "0".into() };
    }

    // Round to the target precision first; rounding can bump the exponent.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, n);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= PRECISION {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, n)).to_owned()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Append-only sequence of values backing constant pools.
#[derive(Debug, Default, Clone)]
pub struct ValueArray {
    values: Vec<Value>,
}

impl ValueArray {
    const MIN_CAPACITY: usize = 8;

    pub fn new() -> ValueArray {
        ValueArray { values: Vec::new() }
    }

    pub fn write(&mut self, value: Value) -> usize {
        if self.values.len() == self.values.capacity() {
            let target = (self.values.capacity() * 2).max(ValueArray::MIN_CAPACITY);
            self.values.reserve_exact(target - self.values.len());
        }

        self.values.push(value);
        self.values.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.values.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_type_then_payload() {
        assert_ne!(Value::Integer(2), Value::Number(2.0));
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::Bool(true), Value::Bool(true));
        assert_ne!(Value::Bool(true), Value::Null);
        assert_eq!(Value::Integer(-7), Value::Integer(-7));
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let nan = Value::Number(f64::NAN);
        assert_ne!(nan, nan);
    }

    #[test]
    fn numbers_format_like_printf_g() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-2.25), "-2.25");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(1.0 / 3.0), "0.33333333333333");
        assert_eq!(format_number(123456789.0), "123456789");
        assert_eq!(format_number(1e14), "1e+14");
        assert_eq!(format_number(1.5e-7), "1.5e-07");
        assert_eq!(format_number(0.0001), "0.0001");
        assert_eq!(format_number(f64::INFINITY), "inf");
        assert_eq!(format_number(f64::NAN), "nan");
    }

    #[test]
    fn value_array_grows_from_minimum_capacity() {
        let mut array = ValueArray::new();
        assert_eq!(array.capacity(), 0);

        assert_eq!(array.write(Value::Integer(0)), 0);
        assert_eq!(array.capacity(), 8);

        for i in 1..9 {
            array.write(Value::Integer(i));
        }
        assert_eq!(array.len(), 9);
        assert!(array.capacity() >= 16);
        assert_eq!(array.get(8), Some(Value::Integer(8)));
        assert_eq!(array.get(9), None);
    }
}
