//=====================================================
// File: value/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Script value model shared by both execution engines
// Objective: Represent script data, closures and capability handles with
//            total deep equality, deep copy and JSON wire conversion
//=====================================================

mod scope;

pub use scope::{Captures, Scope};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::capability::CapabilityHandle;
use crate::compiler::Step;
use crate::errors::{ScriptError, ScriptResult};

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<IndexMap<String, Value>>>;

//==================================================
// Section 1.0 - Value Types
//==================================================

/// Script value. Lists and objects are shared, mutable containers so
/// opcodes such as `list.push` mutate in place; `deep_copy` snapshots.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(ListRef),
    Object(ObjectRef),
    Closure(Rc<Closure>),
    Capability(Rc<CapabilityHandle>),
}

/// Callable produced by `lambda`. The captured scope is the live frame
/// chain at creation time, so later `set`s on captured names are visible.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Value,
    pub scope: Scope,
    pub(crate) compiled: Option<Step>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body", &self.body)
            .field("compiled", &self.compiled.is_some())
            .finish()
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(entries)))
    }

    pub fn empty_object() -> Self {
        Value::object(IndexMap::new())
    }

    pub fn string(text: impl Into<String>) -> Self {
        Value::String(text.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Closure(_) => "closure",
            Value::Capability(_) => "capability",
        }
    }

    /// Only `false` and `null` are falsy; `0`, `""` and `[]` are truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// True for a non-empty list headed by a string, i.e. an operation node.
    pub fn is_operation(&self) -> bool {
        match self {
            Value::List(items) => matches!(items.borrow().first(), Some(Value::String(_))),
            _ => false,
        }
    }

    //==================================================
    // Section 2.0 - Copy & Identity
    //==================================================

    /// Recursively copy lists and objects. Closures and capability
    /// handles are immutable and stay shared.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::List(items) => {
                Value::list(items.borrow().iter().map(Value::deep_copy).collect())
            }
            Value::Object(entries) => Value::object(
                entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.deep_copy()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Whether `self` is, or transitively holds, the container `target`.
    /// Mutating opcodes use this to refuse cyclic structures.
    pub fn references(&self, target: &Value) -> bool {
        if same_container(self, target) {
            return true;
        }
        match self {
            Value::List(items) => items.borrow().iter().any(|item| item.references(target)),
            Value::Object(entries) => entries
                .borrow()
                .values()
                .any(|value| value.references(target)),
            _ => false,
        }
    }

    //==================================================
    // Section 3.0 - Wire Conversion
    //==================================================

    pub fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            JsonValue::String(s) => Value::String(s.clone()),
            JsonValue::Array(items) => Value::list(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(entries) => Value::object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Canonical wire form. Integral numbers serialize as JSON integers so
    /// capability filters compare equal regardless of origin.
    pub fn to_json(&self) -> ScriptResult<JsonValue> {
        match self {
            Value::Null => Ok(JsonValue::Null),
            Value::Bool(b) => Ok(JsonValue::Bool(*b)),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Ok(JsonValue::String(s.clone())),
            Value::List(items) => items
                .borrow()
                .iter()
                .map(Value::to_json)
                .collect::<ScriptResult<Vec<_>>>()
                .map(JsonValue::Array),
            Value::Object(entries) => {
                let mut map = JsonMap::new();
                for (key, value) in entries.borrow().iter() {
                    map.insert(key.clone(), value.to_json()?);
                }
                Ok(JsonValue::Object(map))
            }
            Value::Closure(_) => Err(ScriptError::type_mismatch(
                "closures cannot be serialized",
            )),
            Value::Capability(handle) => Ok(handle.view()),
        }
    }

    pub fn to_canonical_string(&self) -> ScriptResult<String> {
        let json = self.to_json()?;
        serde_json::to_string(&json).map_err(|err| ScriptError::Internal(err.to_string()))
    }

    /// Human-facing rendering: strings unquoted, everything else canonical.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Closure(closure) => format!("<closure/{}>", closure.params.len()),
            other => other
                .to_canonical_string()
                .unwrap_or_else(|_| format!("<{}>", other.type_name())),
        }
    }
}

fn same_container(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn number_to_json(n: f64) -> ScriptResult<JsonValue> {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return Ok(JsonValue::from(n as i64));
    }
    JsonNumber::from_f64(n)
        .map(JsonValue::Number)
        .ok_or_else(|| ScriptError::type_mismatch(format!("non-finite number {n}")))
}

pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

//==================================================
// Section 4.0 - Equality
//==================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Capability(a), Value::Capability(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(entries) => f.debug_map().entries(entries.borrow().iter()).finish(),
            Value::Closure(closure) => write!(f, "<closure {:?}>", closure.params),
            Value::Capability(handle) => write!(f, "<capability {}>", handle.id()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

//==================================================
// Section 5.0 - Conversions
//==================================================

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::list(value)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::from_json(&value)
    }
}

impl From<&JsonValue> for Value {
    fn from(value: &JsonValue) -> Self {
        Value::from_json(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_copy_detaches_nested_containers() {
        let original = Value::from(json!({"tags": ["a", "b"], "n": 1}));
        let copy = original.deep_copy();
        if let Value::Object(entries) = &copy {
            if let Some(Value::List(tags)) = entries.borrow().get("tags") {
                tags.borrow_mut().push(Value::from("c"));
            }
        }
        assert_ne!(original, copy);
        assert_eq!(original.to_json().unwrap(), json!({"tags": ["a", "b"], "n": 1}));
    }

    #[test]
    fn integral_numbers_serialize_as_integers() {
        assert_eq!(Value::Number(5.0).to_json().unwrap(), json!(5));
        assert_eq!(Value::Number(2.5).to_json().unwrap(), json!(2.5));
        assert!(Value::Number(f64::INFINITY).to_json().is_err());
    }

    #[test]
    fn truthiness_only_rejects_false_and_null() {
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(Value::list(Vec::new()).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }

    #[test]
    fn references_detects_self_containment() {
        let inner = Value::list(vec![Value::Number(1.0)]);
        let outer = Value::list(vec![inner.clone()]);
        assert!(outer.references(&inner));
        assert!(!inner.references(&outer));
    }

    #[test]
    fn display_formats_integers_without_fraction() {
        assert_eq!(Value::Number(15.0).display_string(), "15");
        assert_eq!(Value::Number(-0.0).display_string(), "0");
        assert_eq!(Value::Number(0.5).display_string(), "0.5");
    }
}
