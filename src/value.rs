//! The dynamic scalar value type that flows between blocks.
//!
//! Every block input and report is a [`Value`]. Conversions between the three
//! shapes are defined for all inputs (casts never fail), and follow the loose
//! coercion rules block authors expect: `"5" + 2` is `7`, `"apple" * 2` is
//! `0`, and `"Hello" = "hello"` is true.

use std::cmp::Ordering;
use std::fmt;

use compact_str::{format_compact, CompactString, ToCompactString};
use serde_json::Value as Json;
use unicase::UniCase;

/// An error from a failed conversion of raw project json into a [`Value`].
#[derive(Debug)]
pub enum FromJsonError {
    Null,
    Array,
    Object,
}
impl fmt::Display for FromJsonError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FromJsonError::Null => write!(f, "cannot create a value from json null"),
            FromJsonError::Array => write!(f, "cannot create a value from a json array"),
            FromJsonError::Object => write!(f, "cannot create a value from a json object"),
        }
    }
}
impl std::error::Error for FromJsonError {}

/// A scalar value stored in a variable, passed as a block argument, or
/// reported by a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Str(CompactString),
}

impl Default for Value {
    fn default() -> Self {
        Value::Number(0.0)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Number(v) }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Number(v as f64) }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Number(v as f64) }
}
impl From<usize> for Value {
    fn from(v: usize) -> Self { Value::Number(v as f64) }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Str(v.into()) }
}
impl From<String> for Value {
    fn from(v: String) -> Self { Value::Str(v.into()) }
}
impl From<CompactString> for Value {
    fn from(v: CompactString) -> Self { Value::Str(v) }
}

impl TryFrom<&Json> for Value {
    type Error = FromJsonError;
    fn try_from(v: &Json) -> Result<Self, Self::Error> {
        Ok(match v {
            Json::Bool(x) => Value::Bool(*x),
            Json::Number(x) => Value::Number(x.as_f64().unwrap_or(0.0)),
            Json::String(x) => Value::Str(x.as_str().into()),
            Json::Null => return Err(FromJsonError::Null),
            Json::Array(_) => return Err(FromJsonError::Array),
            Json::Object(_) => return Err(FromJsonError::Object),
        })
    }
}

impl Value {
    /// Converts the value into a number. Strings that do not parse as a
    /// number become `0`, as do NaN results.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Bool(x) => if *x { 1.0 } else { 0.0 },
            Value::Number(x) => if x.is_nan() { 0.0 } else { *x },
            Value::Str(x) => {
                let v = parse_number(x).unwrap_or(0.0);
                if v.is_nan() { 0.0 } else { v }
            }
        }
    }
    /// Converts the value into a number, or `None` if it is a string that
    /// does not look like one. Comparisons use this to decide between
    /// numeric and textual ordering.
    pub fn as_number_checked(&self) -> Option<f64> {
        match self {
            Value::Bool(x) => Some(if *x { 1.0 } else { 0.0 }),
            Value::Number(x) => if x.is_nan() { None } else { Some(*x) },
            Value::Str(x) => parse_number(x).filter(|v| !v.is_nan()),
        }
    }
    /// Converts the value into a bool. The strings `""`, `"0"`, and
    /// `"false"` (any casing) are false; every other string is true.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(x) => *x,
            Value::Number(x) => *x != 0.0 && !x.is_nan(),
            Value::Str(x) => !x.is_empty() && x != "0" && !x.eq_ignore_ascii_case("false"),
        }
    }
    /// Converts the value into its text form.
    pub fn as_text(&self) -> CompactString {
        match self {
            Value::Bool(x) => if *x { "true".into() } else { "false".into() },
            Value::Number(x) => number_to_string(*x),
            Value::Str(x) => x.clone(),
        }
    }
    /// Converts the value into an index usable for 1-based list and string
    /// access, truncating any fractional part.
    pub fn as_index(&self) -> f64 {
        self.as_number().trunc()
    }
    /// Converts the value back into raw json, as stored in a project file.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Bool(x) => Json::Bool(*x),
            Value::Number(x) => match serde_json::Number::from_f64(*x) {
                Some(v) => Json::Number(v),
                None => Json::String(number_to_string(*x).into()),
            },
            Value::Str(x) => Json::String(x.to_string()),
        }
    }
    /// Compares two values. Both are compared as numbers when both look
    /// numeric, and as case-insensitive text otherwise. Whitespace-only
    /// strings compare as text even though they cast to `0`.
    pub fn compare(&self, other: &Value) -> Ordering {
        let n1 = self.as_number_checked().filter(|_| !self.is_whitespace_str());
        let n2 = other.as_number_checked().filter(|_| !other.is_whitespace_str());
        match (n1, n2) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => UniCase::new(self.as_text()).cmp(&UniCase::new(other.as_text())),
        }
    }
    fn is_whitespace_str(&self) -> bool {
        match self {
            Value::Str(x) => x.chars().all(char::is_whitespace),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// Formats a number the way a block reports it: integral values in range
/// print without a fraction, non-finite values spell out as `Infinity`,
/// `-Infinity`, and `NaN`, and everything else uses the shortest round-trip
/// decimal form.
pub fn number_to_string(v: f64) -> CompactString {
    if v.is_nan() {
        return "NaN".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity".into() } else { "-Infinity".into() };
    }
    if v == v.trunc() && v.abs() < 9.007199254740992e15 {
        return format_compact!("{}", v as i64);
    }
    ryu::Buffer::new().format(v).to_compact_string()
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    if let Some(oct) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        return i64::from_str_radix(oct, 8).ok().map(|v| v as f64);
    }
    if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        return i64::from_str_radix(bin, 2).ok().map(|v| v as f64);
    }
    match s {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => (),
    }
    // reject forms rust accepts but the project text format does not
    if s.contains(|ch: char| ch.is_ascii_alphabetic() && ch != 'e' && ch != 'E') {
        return None;
    }
    s.parse::<f64>().ok()
}
