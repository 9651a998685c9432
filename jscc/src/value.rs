use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A compile-time value stored in the variable environment
///
/// The variants follow the loosely typed values an expression can produce.
/// Objects keep their keys sorted, so serialized output is deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// The value of a variable declared with a bare `#set _NAME`
    #[default]
    Undefined,
    /// Explicit `null`
    Null,
    /// Boolean value
    Bool(bool),
    /// Every number is a double, as in the host language
    Number(f64),
    /// String value
    String(String),
    /// Ordered list of values
    Array(Vec<Value>),
    /// Key/value map
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Truthiness used by `#if`, `#elif`, `&&`, `||` and `!`
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Result of the `typeof` operator
    #[must_use]
    pub const fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
        }
    }

    /// `true` for arrays and objects
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// Numeric conversion with the host language coercion rules
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(_) => parse_number(&self.to_js_string()),
            Value::Object(_) => f64::NAN,
        }
    }

    /// String conversion used for concatenation and `#error` messages
    #[must_use]
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Text inserted in place of a `$_NAME` reference
    ///
    /// Arrays and objects are serialized as JSON, scalars use their natural form.
    #[must_use]
    pub fn to_source_text(&self) -> String {
        if self.is_structured() {
            self.to_json_string()
        } else {
            self.to_js_string()
        }
    }

    /// Serialize as compact JSON
    #[must_use]
    pub fn to_json_string(&self) -> String {
        // serializing a serde_json::Value cannot fail
        serde_json::to_string(&self.to_json()).unwrap_or_default()
    }

    /// Convert into a `serde_json::Value`
    ///
    /// `undefined` members of objects are dropped; `undefined`, `NaN` and
    /// infinities elsewhere become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => json_number(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .filter(|(_, v)| !matches!(v, Value::Undefined))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Look up a property by name, `None` when the value has no such member
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => map.get(key).cloned(),
            Value::Array(items) => {
                if key == "length" {
                    return Some(Value::Number(items.len() as f64));
                }
                key.parse::<usize>().ok().and_then(|i| items.get(i).cloned())
            }
            Value::String(s) => {
                if key == "length" {
                    return Some(Value::Number(s.encode_utf16().count() as f64));
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
            }
            _ => None,
        }
    }

    /// Parse a command-line style value: JSON when it parses, a plain string otherwise
    #[must_use]
    pub fn parse_literal(text: &str) -> Value {
        let trimmed = text.trim();
        match trimmed {
            "undefined" => Value::Undefined,
            "NaN" => Value::Number(f64::NAN),
            "Infinity" => Value::Number(f64::INFINITY),
            "-Infinity" => Value::Number(f64::NEG_INFINITY),
            _ => serde_json::from_str::<serde_json::Value>(trimmed)
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(text.to_string())),
        }
    }

    /// Strict equality (`===`), arrays and objects compare by content
    #[must_use]
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// Loose equality (`==`)
    #[must_use]
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::String(a), Value::Array(_)) => *a == other.to_js_string(),
            (Value::Array(_), Value::String(b)) => self.to_js_string() == *b,
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

/// Format a number the way the host language prints it
///
/// Integers below 1e21 print in full, magnitudes from 1e21 up or below 1e-6
/// switch to exponent form (`1e+21`, `1.5e-7`).
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        // also folds -0 into "0"
        return "0".to_string();
    }

    // shortest round-trip digits, e.g. "1.2345e3"
    let sci = format!("{:e}", n.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let exp: i32 = exp.parse().unwrap_or(0);
    let k = digits.len() as i32;
    let point = exp + 1;

    let body = if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let (first, rest) = digits.split_at(1);
        let sign = if exp < 0 { '-' } else { '+' };
        let frac = if rest.is_empty() {
            String::new()
        } else {
            format!(".{rest}")
        };
        format!("{first}{frac}e{sign}{}", exp.abs())
    };
    if n < 0.0 { format!("-{body}") } else { body }
}

/// Value of a run of hex digits, without a length limit
pub(crate) fn parse_hex(digits: &str) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0.0, |acc, c| {
        c.to_digit(16).map(|d| acc * 16.0 + f64::from(d))
    })
}

fn json_number(n: f64) -> serde_json::Value {
    if n.is_finite() && n == n.trunc() && n.abs() < 9.007_199_254_740_992e15 {
        serde_json::Value::Number(serde_json::Number::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return parse_hex(hex).unwrap_or(f64::NAN);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if t.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) => {
            t.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting() {
        assert_eq!(Value::Number(1.0).to_js_string(), "1");
        assert_eq!(Value::Number(-0.0).to_js_string(), "0");
        assert_eq!(Value::Number(1.5).to_js_string(), "1.5");
        assert_eq!(Value::Number(f64::NAN).to_js_string(), "NaN");
        assert_eq!(Value::Number(f64::INFINITY).to_js_string(), "Infinity");
    }

    #[test]
    fn exponent_form_for_extreme_magnitudes() {
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e300), "1.5e+300");
        assert_eq!(format_number(123_456_789_012_345_680_000.0), "123456789012345680000");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(-2.5e-10), "-2.5e-10");
        assert_eq!(format_number(0.000_001), "0.000001");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-123.456), "-123.456");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn hex_strings_of_any_width() {
        assert_eq!(parse_hex("ff"), Some(255.0));
        assert_eq!(parse_hex("FFFFFFFFFFFFFFFFF"), Some(16f64.powi(17) - 1.0));
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("fg"), None);
        assert_eq!(Value::from("0x1F").to_number(), 31.0);
        assert!(Value::from("0x").to_number().is_nan());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::String("0".into()).is_truthy());
        assert!(Value::Array(Vec::new()).is_truthy());
    }

    #[test]
    fn structured_values_serialize_as_json() {
        let v = Value::parse_literal(r#"{"b": [1, 2.5, null], "a": "x"}"#);
        assert_eq!(v.to_source_text(), r#"{"a":"x","b":[1,2.5,null]}"#);
    }

    #[test]
    fn undefined_members_are_dropped_from_json() {
        let mut map = BTreeMap::new();
        map.insert("gone".to_string(), Value::Undefined);
        map.insert("kept".to_string(), Value::Bool(true));
        assert_eq!(Value::Object(map).to_json_string(), r#"{"kept":true}"#);
    }

    #[test]
    fn literal_fallback_is_plain_string() {
        assert_eq!(Value::parse_literal("hello"), Value::String("hello".into()));
        assert_eq!(Value::parse_literal("42"), Value::Number(42.0));
        assert_eq!(Value::parse_literal("true"), Value::Bool(true));
    }

    #[test]
    fn loose_equality_coerces() {
        assert!(Value::Number(1.0).loose_equals(&Value::String("1".into())));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
    }
}
