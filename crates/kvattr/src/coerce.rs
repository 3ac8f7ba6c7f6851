//! Attribute kinds, values and coercion
//!
//! Backend values are text. Coercion turns a raw value into the logical kind
//! of its attribute: any value renders as text for `string`, and text parses
//! permissively for `integer` (`"12abc"` is 12, `"abc"` is 0).

use kvattr_common::{KvAttrError, Result};
use std::fmt;
use std::str::FromStr;

use crate::schema::AttrDefinition;

/// Logical type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    String,
    Integer,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::String => "string",
            AttrKind::Integer => "integer",
        }
    }

    /// Value a getter falls back to when neither the backend nor a default has one
    pub fn zero(&self) -> AttrValue {
        match self {
            AttrKind::String => AttrValue::Text(String::new()),
            AttrKind::Integer => AttrValue::Int(0),
        }
    }
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttrKind {
    type Err = KvAttrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches(':').to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(AttrKind::String),
            "integer" | "int" => Ok(AttrKind::Integer),
            _ => Err(KvAttrError::UnsupportedType(s.to_string())),
        }
    }
}

/// A present attribute value. Absence is `None` at every API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrValue {
    Text(String),
    Int(i64),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            AttrValue::Text(_) => None,
        }
    }

    /// Text form, as written to the backend
    pub fn to_text(&self) -> String {
        match self {
            AttrValue::Text(s) => s.clone(),
            AttrValue::Int(i) => i.to_string(),
        }
    }

    /// Integer form, parsing text permissively
    pub fn to_int(&self) -> i64 {
        match self {
            AttrValue::Int(i) => *i,
            AttrValue::Text(s) => parse_int(s),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        AttrValue::Int(i64::from(i))
    }
}

/// Coerce a raw value to `kind`. `None` stays `None`.
pub fn coerce(raw: Option<&AttrValue>, kind: AttrKind) -> Option<AttrValue> {
    raw.map(|value| match kind {
        AttrKind::String => AttrValue::Text(value.to_text()),
        AttrKind::Integer => AttrValue::Int(value.to_int()),
    })
}

/// Coerce backend text to `kind`
pub fn decode(raw: Option<String>, kind: AttrKind) -> Option<AttrValue> {
    coerce(raw.map(AttrValue::Text).as_ref(), kind)
}

/// Coerce with a kind given by name, failing for kinds other than `string` and `integer`
pub fn coerce_as(raw: Option<&AttrValue>, kind: &str) -> Result<Option<AttrValue>> {
    Ok(coerce(raw, kind.parse()?))
}

/// Declared default of `def`, coerced like a stored value
pub fn default_for(def: &AttrDefinition) -> Option<AttrValue> {
    coerce(def.default.as_ref(), def.kind)
}

/// Parse the leading integer of `s`
///
/// Leading whitespace and one sign are accepted, underscores may separate
/// digits, and parsing stops at the first other character. No digits gives 0.
/// Out-of-range values saturate.
pub fn parse_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value: i64 = 0;
    let mut prev_digit = false;
    for b in digits.bytes() {
        match b {
            b'0'..=b'9' => {
                let d = i64::from(b - b'0');
                value = if negative {
                    value.saturating_mul(10).saturating_sub(d)
                } else {
                    value.saturating_mul(10).saturating_add(d)
                };
                prev_digit = true;
            }
            b'_' if prev_digit => prev_digit = false,
            _ => break,
        }
    }
    value
}

/// Conversion of host values into an assignable attribute value
///
/// `None` (and JSON `null`) is the nil assignment, which removes the backend
/// key on the next save.
pub trait IntoAttr {
    fn into_attr(self) -> Option<AttrValue>;
}

impl IntoAttr for AttrValue {
    fn into_attr(self) -> Option<AttrValue> {
        Some(self)
    }
}

impl IntoAttr for &AttrValue {
    fn into_attr(self) -> Option<AttrValue> {
        Some(self.clone())
    }
}

impl IntoAttr for &str {
    fn into_attr(self) -> Option<AttrValue> {
        Some(AttrValue::from(self))
    }
}

impl IntoAttr for String {
    fn into_attr(self) -> Option<AttrValue> {
        Some(AttrValue::Text(self))
    }
}

impl IntoAttr for &String {
    fn into_attr(self) -> Option<AttrValue> {
        Some(AttrValue::Text(self.clone()))
    }
}

macro_rules! impl_into_attr_int {
    ($($t:ty),*) => {
        $(
            impl IntoAttr for $t {
                fn into_attr(self) -> Option<AttrValue> {
                    Some(AttrValue::Int(i64::from(self)))
                }
            }
        )*
    };
}

impl_into_attr_int!(i8, i16, i32, i64, u8, u16, u32);

impl IntoAttr for u64 {
    fn into_attr(self) -> Option<AttrValue> {
        Some(AttrValue::Int(i64::try_from(self).unwrap_or(i64::MAX)))
    }
}

impl IntoAttr for usize {
    fn into_attr(self) -> Option<AttrValue> {
        Some(AttrValue::Int(i64::try_from(self).unwrap_or(i64::MAX)))
    }
}

impl IntoAttr for bool {
    fn into_attr(self) -> Option<AttrValue> {
        Some(AttrValue::Text(self.to_string()))
    }
}

impl<T: IntoAttr> IntoAttr for Option<T> {
    fn into_attr(self) -> Option<AttrValue> {
        self.and_then(IntoAttr::into_attr)
    }
}

impl IntoAttr for &serde_json::Value {
    fn into_attr(self) -> Option<AttrValue> {
        use serde_json::Value;

        match self {
            Value::Null => None,
            Value::String(s) => Some(AttrValue::Text(s.clone())),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => AttrValue::Text(n.to_string()),
            }),
            other => Some(AttrValue::Text(other.to_string())),
        }
    }
}

impl IntoAttr for serde_json::Value {
    fn into_attr(self) -> Option<AttrValue> {
        (&self).into_attr()
    }
}
