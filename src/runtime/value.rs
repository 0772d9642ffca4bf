//! Script value types
//!
//! This module defines the runtime representation of script values and the
//! Node-style inspection routine used when values are shown to learners.

use super::scope::ScopeRef;
use super::Runtime;
use crate::ast::FunctionRef;
use crate::error::{ErrorKind, Result};
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Nesting depth past which `inspect` summarizes objects as `[Object]`
pub const INSPECT_DEPTH: usize = 2;

/// Arguments handed to a native function
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    /// The receiver (`this`) of the call
    pub this: Value,
    /// Evaluated argument values
    pub values: Vec<Value>,
    /// Verbatim source text of the argument list, when called from script code
    pub source: Option<String>,
}

impl CallArgs {
    /// Arguments with no receiver and no source text
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            this: Value::Undefined,
            values,
            source: None,
        }
    }

    /// The argument at `index`, or `undefined` when absent
    pub fn get(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or(Value::Undefined)
    }

    /// The argument at `index` converted to a number
    pub fn number(&self, index: usize) -> f64 {
        self.values
            .get(index)
            .map(|v| v.to_number())
            .unwrap_or(f64::NAN)
    }

    /// Number of arguments passed
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no argument was passed
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Type alias for native function implementations
pub type NativeFn = Rc<dyn Fn(&mut Runtime, CallArgs) -> Result<Value>>;

/// Shared handle to a heap object
pub type ObjectRef = Rc<RefCell<Object>>;

/// A script value
#[derive(Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Object (includes arrays, functions, errors)
    Object(ObjectRef),
}

impl Value {
    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is nullish (null or undefined)
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Whether the value can be called
    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(
                obj.borrow().kind,
                ObjectKind::Function(_) | ObjectKind::Native { .. }
            ),
            _ => false,
        }
    }

    /// Whether the value is an array
    pub fn is_array(&self) -> bool {
        match self {
            Value::Object(obj) => matches!(obj.borrow().kind, ObjectKind::Array(_)),
            _ => false,
        }
    }

    /// Convert to boolean (truthiness)
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Convert to number
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => {
                if self.is_array() {
                    string_to_number(&self.to_js_string())
                } else {
                    f64::NAN
                }
            }
        }
    }

    /// Convert to the string a script `String(value)` would produce
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(true) => "true".to_string(),
            Value::Boolean(false) => "false".to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
            Value::Object(obj) => {
                let obj = obj.borrow();
                match &obj.kind {
                    ObjectKind::Array(arr) => arr
                        .iter()
                        .map(|v| {
                            if v.is_nullish() {
                                String::new()
                            } else {
                                v.to_js_string()
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    ObjectKind::Function(closure) => closure.function.source.clone(),
                    ObjectKind::Native { name, .. } => {
                        format!("function {}() {{ [native code] }}", name)
                    }
                    ObjectKind::Error { kind, message } => {
                        if message.is_empty() {
                            kind.name().to_string()
                        } else {
                            format!("{}: {}", kind.name(), message)
                        }
                    }
                    ObjectKind::Ordinary => "[object Object]".to_string(),
                }
            }
        }
    }

    /// Get the typeof string
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // Historical quirk
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) if self.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Abstract equality (==)
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => true,
            (Value::Number(_), Value::String(_)) => {
                self.strict_equals(&Value::Number(other.to_number()))
            }
            (Value::String(_), Value::Number(_)) => {
                Value::Number(self.to_number()).strict_equals(other)
            }
            (Value::Boolean(b), _) => Value::Number(if *b { 1.0 } else { 0.0 }).equals(other),
            (_, Value::Boolean(b)) => self.equals(&Value::Number(if *b { 1.0 } else { 0.0 })),
            (Value::Object(_), Value::String(_) | Value::Number(_)) => {
                Value::String(self.to_js_string()).equals(other)
            }
            (Value::String(_) | Value::Number(_), Value::Object(_)) => {
                self.equals(&Value::String(other.to_js_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Structural equality: same primitives, or arrays/objects with deeply equal members
    ///
    /// A pair of objects met again while comparing it is taken as equal, so
    /// cyclic structures with the same shape compare equal.
    pub fn deep_equals(&self, other: &Value) -> bool {
        let mut comparing = Vec::new();
        self.deep_equals_inner(other, &mut comparing)
    }

    fn deep_equals_inner(
        &self,
        other: &Value,
        comparing: &mut Vec<(*const RefCell<Object>, *const RefCell<Object>)>,
    ) -> bool {
        let (Value::Object(a), Value::Object(b)) = (self, other) else {
            return match (self, other) {
                (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
                _ => self.strict_equals(other),
            };
        };
        if Rc::ptr_eq(a, b) {
            return true;
        }
        let pair = (Rc::as_ptr(a), Rc::as_ptr(b));
        if comparing.contains(&pair) {
            return true;
        }

        let (a, b) = (a.borrow(), b.borrow());
        comparing.push(pair);
        let equal = match (&a.kind, &b.kind) {
            (ObjectKind::Array(x), ObjectKind::Array(y)) => {
                x.len() == y.len()
                    && x.iter().zip(y).all(|(l, r)| l.deep_equals_inner(r, comparing))
            }
            (ObjectKind::Ordinary, ObjectKind::Ordinary) => {
                a.properties.len() == b.properties.len()
                    && a.properties.iter().all(|(key, value)| {
                        b.properties
                            .get(key)
                            .is_some_and(|other| value.deep_equals_inner(other, comparing))
                    })
            }
            (
                ObjectKind::Error { kind, message },
                ObjectKind::Error {
                    kind: other_kind,
                    message: other_message,
                },
            ) => kind == other_kind && message == other_message,
            _ => false,
        };
        comparing.pop();
        equal
    }

    /// Create a new object value
    pub fn new_object() -> Value {
        Value::from_object(Object::new(ObjectKind::Ordinary))
    }

    /// Create a new object value with properties, kept in the given order
    pub fn new_object_with_properties<K: Into<String>>(
        properties: impl IntoIterator<Item = (K, Value)>,
    ) -> Value {
        let mut object = Object::new(ObjectKind::Ordinary);
        for (key, value) in properties {
            object.properties.set(key.into(), value);
        }
        Value::from_object(object)
    }

    /// Create a new array value
    pub fn new_array(elements: Vec<Value>) -> Value {
        Value::from_object(Object::new(ObjectKind::Array(elements)))
    }

    /// Create an error object
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Value {
        Value::from_object(Object::new(ObjectKind::Error {
            kind,
            message: message.into(),
        }))
    }

    /// Create a native function value
    pub fn native<F>(name: &str, func: F) -> Value
    where
        F: Fn(&mut Runtime, CallArgs) -> Result<Value> + 'static,
    {
        Value::from_object(Object::new(ObjectKind::Native {
            name: name.to_string(),
            func: Rc::new(func),
        }))
    }

    /// Create a script closure
    pub fn closure(function: FunctionRef, scope: ScopeRef) -> Value {
        Value::from_object(Object::new(ObjectKind::Function(Closure { function, scope })))
    }

    fn from_object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    /// Get an own property of an object value; primitives have none
    pub fn get_property(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.borrow().get_property(key),
            _ => None,
        }
    }

    /// Set a property on an object value, returning false for primitives
    pub fn set_property(&self, key: &str, value: Value) -> bool {
        match self {
            Value::Object(obj) => {
                obj.borrow_mut().set_property(key, value);
                true
            }
            _ => false,
        }
    }

    /// A copy of the elements when this is an array
    pub fn array_elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Array(arr) => Some(arr.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Render the value the way Node's `util.inspect` does
    pub fn inspect(&self) -> String {
        let mut seen = Vec::new();
        self.inspect_inner(0, &mut seen)
    }

    fn inspect_inner(&self, depth: usize, seen: &mut Vec<*const RefCell<Object>>) -> String {
        let obj = match self {
            Value::String(s) => return quote_string(s),
            Value::Number(n) if *n == 0.0 && n.is_sign_negative() => return "-0".to_string(),
            Value::Object(obj) => obj,
            other => return other.to_js_string(),
        };

        let ptr = Rc::as_ptr(obj);
        if seen.contains(&ptr) {
            return "[Circular]".to_string();
        }

        let object = obj.borrow();
        match &object.kind {
            ObjectKind::Function(closure) => {
                let name = closure.function.display_name();
                if name.is_empty() {
                    "[Function (anonymous)]".to_string()
                } else {
                    format!("[Function: {}]", name)
                }
            }
            ObjectKind::Native { name, .. } => format!("[Function: {}]", name),
            ObjectKind::Error { .. } => format!("[{}]", self.to_js_string()),
            ObjectKind::Array(elements) => {
                if elements.is_empty() {
                    return "[]".to_string();
                }
                if depth > INSPECT_DEPTH {
                    return "[Array]".to_string();
                }
                seen.push(ptr);
                let parts: Vec<String> = elements
                    .iter()
                    .map(|e| e.inspect_inner(depth + 1, seen))
                    .collect();
                seen.pop();
                format!("[ {} ]", parts.join(", "))
            }
            ObjectKind::Ordinary => {
                if object.properties.is_empty() {
                    return "{}".to_string();
                }
                if depth > INSPECT_DEPTH {
                    return "[Object]".to_string();
                }
                seen.push(ptr);
                let parts: Vec<String> = object
                    .properties
                    .iter()
                    .map(|(key, value)| {
                        format!(
                            "{}: {}",
                            inspect_key(key),
                            value.inspect_inner(depth + 1, seen)
                        )
                    })
                    .collect();
                seen.pop();
                format!("{{ {} }}", parts.join(", "))
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

/// `==` on values is the script's `===`
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
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

/// Format a number the way scripts print it
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let formatted = format!("{:e}", n);
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => formatted,
        }
    } else {
        format!("{}", n)
    }
}

/// Parse a string the way `Number(string)` does
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    let radix = match unsigned.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0b") | Some("0B") => Some(2),
        Some("0o") | Some("0O") => Some(8),
        _ => None,
    };
    if let Some(radix) = radix {
        if sign < 0.0 {
            return f64::NAN;
        }
        return i64::from_str_radix(&unsigned[2..], radix)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    // Rust accepts "inf" and "nan" spellings that scripts do not
    if unsigned.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    unsigned.parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn inspect_key(key: &str) -> String {
    let mut chars = key.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric());
    if is_identifier {
        key.to_string()
    } else {
        quote_string(key)
    }
}

/// Insertion-ordered property storage
#[derive(Clone, Default)]
pub struct PropertyMap {
    index: HashMap<String, usize>,
    entries: Vec<(String, Value)>,
}

impl PropertyMap {
    /// Look up a property value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Insert or overwrite a property, keeping first-insertion order
    pub fn set(&mut self, key: String, value: Value) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Whether the key is present
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Iterate properties in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Property names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no properties
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A script object
#[derive(Clone)]
pub struct Object {
    /// Object kind
    pub kind: ObjectKind,
    /// Properties
    pub properties: PropertyMap,
}

impl Object {
    /// Create an object of the given kind with no properties
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            properties: PropertyMap::default(),
        }
    }

    /// Get a property
    pub fn get_property(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.properties.get(key) {
            return Some(value.clone());
        }

        match &self.kind {
            ObjectKind::Array(arr) => {
                if key == "length" {
                    return Some(Value::Number(arr.len() as f64));
                }
                key.parse::<usize>().ok().and_then(|i| arr.get(i).cloned())
            }
            ObjectKind::Error { kind, message } => match key {
                "name" => Some(Value::String(kind.name().to_string())),
                "message" => Some(Value::String(message.clone())),
                _ => None,
            },
            ObjectKind::Function(closure) => match key {
                "name" => Some(Value::String(closure.function.display_name().to_string())),
                "length" => Some(Value::Number(closure.function.params.len() as f64)),
                _ => None,
            },
            ObjectKind::Native { name, .. } => match key {
                "name" => Some(Value::String(name.clone())),
                _ => None,
            },
            ObjectKind::Ordinary => None,
        }
    }

    /// Set a property; numeric keys on arrays write elements
    pub fn set_property(&mut self, key: &str, value: Value) {
        if let ObjectKind::Array(arr) = &mut self.kind {
            if let Ok(index) = key.parse::<usize>() {
                if index >= arr.len() {
                    arr.resize(index + 1, Value::Undefined);
                }
                arr[index] = value;
                return;
            }
            if key == "length" {
                let len = value.to_number();
                if len >= 0.0 && len.fract() == 0.0 {
                    arr.resize(len as usize, Value::Undefined);
                }
                return;
            }
        }
        self.properties.set(key.to_string(), value);
    }
}

/// A script function together with the scope it closes over
#[derive(Clone)]
pub struct Closure {
    /// The function node
    pub function: FunctionRef,
    /// The defining scope
    pub scope: ScopeRef,
}

/// Object kind
#[derive(Clone)]
pub enum ObjectKind {
    /// Ordinary object
    Ordinary,
    /// Array object
    Array(Vec<Value>),
    /// Script function
    Function(Closure),
    /// Native function
    Native { name: String, func: NativeFn },
    /// Error object
    Error { kind: ErrorKind, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(f64::NAN), "NaN");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("12abc").is_nan());
        assert!(string_to_number("inf").is_nan());
    }

    #[test]
    fn test_inspect_primitives() {
        assert_eq!(Value::Undefined.inspect(), "undefined");
        assert_eq!(Value::from("it's").inspect(), "'it\\'s'");
        assert_eq!(Value::Number(-0.0).inspect(), "-0");
        assert_eq!(Value::Boolean(true).inspect(), "true");
    }

    #[test]
    fn test_inspect_collections() {
        let arr = Value::new_array(vec![Value::Number(1.0), Value::from("a")]);
        assert_eq!(arr.inspect(), "[ 1, 'a' ]");
        assert_eq!(Value::new_array(vec![]).inspect(), "[]");

        let obj = Value::new_object_with_properties([("b", Value::Number(2.0)), ("a-b", Value::Null)]);
        assert_eq!(obj.inspect(), "{ b: 2, 'a-b': null }");
    }

    #[test]
    fn test_inspect_depth_limit() {
        let deepest = Value::new_object_with_properties([("d", Value::Number(1.0))]);
        let c = Value::new_object_with_properties([("c", deepest)]);
        let b = Value::new_object_with_properties([("b", c)]);
        let a = Value::new_object_with_properties([("a", b)]);
        assert_eq!(a.inspect(), "{ a: { b: { c: [Object] } } }");
    }

    #[test]
    fn test_inspect_circular() {
        let obj = Value::new_object();
        obj.set_property("self", obj.clone());
        assert_eq!(obj.inspect(), "{ self: [Circular] }");
    }

    #[test]
    fn test_error_value_text() {
        let err = Value::error(ErrorKind::TypeError, "boom");
        assert_eq!(err.to_js_string(), "TypeError: boom");
        assert_eq!(err.inspect(), "[TypeError: boom]");
        assert_eq!(err.get_property("message").unwrap().to_js_string(), "boom");
    }

    #[test]
    fn test_equality() {
        assert!(Value::Number(1.0).equals(&Value::from("1")));
        assert!(!Value::Number(1.0).strict_equals(&Value::from("1")));
        assert!(Value::Null.equals(&Value::Undefined));
        let a = Value::new_array(vec![Value::Number(1.0)]);
        let b = Value::new_array(vec![Value::Number(1.0)]);
        assert!(!a.strict_equals(&b));
        assert!(a.deep_equals(&b));
    }

    #[test]
    fn test_deep_equals_cyclic() {
        let cyclic = || {
            let obj = Value::new_object_with_properties([("n", Value::Number(1.0))]);
            obj.set_property("self", obj.clone());
            obj
        };
        assert!(cyclic().deep_equals(&cyclic()));

        let other = Value::new_object_with_properties([("n", Value::Number(2.0))]);
        other.set_property("self", other.clone());
        assert!(!cyclic().deep_equals(&other));
    }

    #[test]
    fn test_array_length_write_truncates() {
        let arr = Value::new_array(vec![Value::Number(1.0), Value::Number(2.0)]);
        arr.set_property("length", Value::Number(1.0));
        assert_eq!(arr.array_elements().unwrap().len(), 1);
        arr.set_property("3", Value::Null);
        assert_eq!(arr.array_elements().unwrap().len(), 4);
    }
}
