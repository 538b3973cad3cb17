//! Tagged values passed between the input parser, callables and renderers.
//!
//! JSON output: integral numbers have no fractional part, non-finite numbers
//! become `null`, and mapping keys keep their insertion order. Numbers print
//! the way JavaScript's `JSON.stringify` prints them: positional notation
//! below 1e21, `1e+21` style exponents above.

use std::fmt;
use std::io;

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};

use crate::page::ElementRef;

/// Largest integer an f64 holds exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Sequence(Vec<Value>),
    /// Key/value pairs in insertion order. Keys are unique.
    Mapping(Vec<(String, Value)>),
    Element(ElementRef),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Build a mapping, later duplicates replacing earlier keys in place.
    pub fn mapping<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut entries: Vec<(String, Value)> = Vec::new();
        for (key, value) in pairs {
            let key = key.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Value::Mapping(entries)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key in a mapping. Returns None for non-mappings.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in shape errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Element(_) => "element",
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Mapping(entries) => {
                let mut map = serde_json::Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
            Value::Element(el) => el.to_json(),
        }
    }

    /// Compact JSON, used for structural equality.
    pub fn to_json_string(&self) -> String {
        write_json(&self.to_json(), CompactFormatter)
    }

    /// Two-space indented JSON, used for display.
    pub fn to_pretty_json(&self) -> String {
        write_json(&self.to_json(), PrettyFormatter::new())
    }

    /// Equality by serialized form: two values are equal when they print
    /// the same compact JSON.
    pub fn structurally_eq(&self, other: &Value) -> bool {
        self.to_json_string() == other.to_json_string()
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::Number(serde_json::Number::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Below this, integral numbers print every digit.
const EXPONENT_THRESHOLD: f64 = 1e21;

fn write_json<F: Formatter>(json: &serde_json::Value, formatter: F) -> String {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, JsNumbers(formatter));
    if json.serialize(&mut ser).is_err() {
        return "null".to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| "null".to_string())
}

/// Wraps a formatter, changing only how floats are written.
struct JsNumbers<F>(F);

impl<F: Formatter> Formatter for JsNumbers<F> {
    fn write_f64<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        if value.fract() == 0.0 && value.abs() < EXPONENT_THRESHOLD {
            return write!(writer, "{value:.0}");
        }
        let mut plain = Vec::new();
        CompactFormatter.write_f64(&mut plain, value)?;
        let plain = String::from_utf8_lossy(&plain);
        match plain.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => write!(writer, "{mantissa}e+{exp}"),
            _ => writer.write_all(plain.as_bytes()),
        }
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.0.begin_object_key(writer, first)
    }

    fn end_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_key(writer)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.0.end_object_value(writer)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            other => write!(f, "{}", other.to_json_string()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

// ============================================================================
// Shapes
// ============================================================================

/// Declared kind of value a parameter expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Any,
    Number,
    Text,
    Bool,
    Sequence,
    Mapping,
    Element,
}

impl Shape {
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Shape::Any, _) => true,
            (Shape::Number, Value::Number(_)) => true,
            (Shape::Text, Value::Text(_)) => true,
            (Shape::Bool, Value::Bool(_)) => true,
            (Shape::Sequence, Value::Sequence(_)) => true,
            (Shape::Mapping, Value::Mapping(_)) => true,
            (Shape::Element, Value::Element(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Any => "any",
            Shape::Number => "number",
            Shape::Text => "text",
            Shape::Bool => "boolean",
            Shape::Sequence => "sequence",
            Shape::Mapping => "mapping",
            Shape::Element => "element",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_print_without_fraction() {
        assert_eq!(Value::Number(5.0).to_json_string(), "5");
        assert_eq!(Value::Number(-0.0).to_json_string(), "0");
        assert_eq!(Value::Number(2.5).to_json_string(), "2.5");
    }

    #[test]
    fn large_numbers_print_like_javascript() {
        assert_eq!(Value::Number(1e20).to_json_string(), "100000000000000000000");
        assert_eq!(Value::Number(-1e20).to_json_string(), "-100000000000000000000");
        assert_eq!(Value::Number(2f64.powi(60)).to_json_string(), "1152921504606846976");
        assert_eq!(Value::Number(1e21).to_json_string(), "1e+21");
        assert_eq!(Value::Number(1.5e300).to_json_string(), "1.5e+300");
        assert_eq!(Value::Number(1e-7).to_json_string(), "1e-7");
        assert_eq!(Value::Sequence(vec![Value::Number(1e20)]).to_pretty_json(), "[\n  100000000000000000000\n]");
    }

    #[test]
    fn non_finite_numbers_print_as_null() {
        assert_eq!(Value::Number(f64::NAN).to_json_string(), "null");
        assert_eq!(Value::Number(f64::INFINITY).to_json_string(), "null");
    }

    #[test]
    fn mapping_keeps_insertion_order() {
        let v = Value::mapping([("b", Value::Number(1.0)), ("a", Value::Number(2.0))]);
        assert_eq!(v.to_json_string(), r#"{"b":1,"a":2}"#);
    }

    #[test]
    fn mapping_duplicate_key_replaces_in_place() {
        let v = Value::mapping([
            ("x", Value::Number(1.0)),
            ("y", Value::Number(2.0)),
            ("x", Value::Number(3.0)),
        ]);
        assert_eq!(v.to_json_string(), r#"{"x":3,"y":2}"#);
    }

    #[test]
    fn structural_equality_ignores_float_representation() {
        assert!(Value::Number(5.0).structurally_eq(&Value::Number(5.0)));
        let a = Value::Sequence(vec![Value::Number(1.0), Value::text("x")]);
        let b = Value::from_json(&serde_json::json!([1, "x"]));
        assert!(a.structurally_eq(&b));
        assert!(!a.structurally_eq(&Value::Sequence(vec![])));
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let v = Value::Sequence(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(v.to_pretty_json(), "[\n  1,\n  2\n]");
    }

    #[test]
    fn shape_accepts_matching_kind_only() {
        assert!(Shape::Number.accepts(&Value::Number(1.0)));
        assert!(!Shape::Number.accepts(&Value::text("1")));
        assert!(Shape::Any.accepts(&Value::Null));
        assert!(!Shape::Sequence.accepts(&Value::Null));
    }
}
