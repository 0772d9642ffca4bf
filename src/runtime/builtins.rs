//! Built-in functions and objects
//!
//! This module provides the standard globals (console, Math, JSON, the error
//! constructors, conversion functions), the `require` module registry
//! entries, and the methods scripts can call on arrays, strings and numbers.

use super::value::{number_to_string, CallArgs, Object, ObjectKind, ObjectRef, Value};
use super::Runtime;
use crate::error::{Error, ErrorKind, Result};
use std::cell::RefCell;
use std::rc::Rc;

/// Register all built-in globals
pub fn register_globals(rt: &mut Runtime) {
    rt.define_global("undefined", Value::Undefined);
    rt.define_global("NaN", Value::Number(f64::NAN));
    rt.define_global("Infinity", Value::Number(f64::INFINITY));
    rt.define_global("this", Value::Undefined);

    register_console(rt);
    register_math(rt);
    register_json(rt);
    register_error(rt);
    register_global_functions(rt);
    register_modules(rt);
}

/// Format console arguments the way Node does: strings raw, everything else inspected
fn format_console_args(args: &CallArgs) -> String {
    args.values
        .iter()
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.inspect(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Register console object
fn register_console(rt: &mut Runtime) {
    let console = Value::new_object();
    for name in ["log", "info", "warn", "error"] {
        console.set_property(
            name,
            Value::native(name, |rt, args| {
                rt.log(format_console_args(&args));
                Ok(Value::Undefined)
            }),
        );
    }
    rt.define_global("console", console);
}

/// Register Math object
fn register_math(rt: &mut Runtime) {
    let math = Value::new_object();
    math.set_property("PI", Value::Number(std::f64::consts::PI));
    math.set_property("E", Value::Number(std::f64::consts::E));

    let unary: [(&str, fn(f64) -> f64); 6] = [
        ("abs", f64::abs),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("sqrt", f64::sqrt),
        ("trunc", f64::trunc),
        // Halves round towards +Infinity
        ("round", |n| (n + 0.5).floor()),
    ];
    for (name, op) in unary {
        math.set_property(
            name,
            Value::native(name, move |_, args| Ok(Value::Number(op(args.number(0))))),
        );
    }

    math.set_property(
        "pow",
        Value::native("pow", |_, args| {
            Ok(Value::Number(args.number(0).powf(args.number(1))))
        }),
    );
    math.set_property(
        "min",
        Value::native("min", |_, args| {
            Ok(Value::Number(fold_numbers(&args, f64::INFINITY, f64::min)))
        }),
    );
    math.set_property(
        "max",
        Value::native("max", |_, args| {
            Ok(Value::Number(fold_numbers(&args, f64::NEG_INFINITY, f64::max)))
        }),
    );
    math.set_property(
        "random",
        Value::native("random", |_, _| Ok(Value::Number(rand::random::<f64>()))),
    );

    rt.register_module("math", math.clone());
    rt.define_global("Math", math);
}

/// Fold numeric arguments, propagating NaN like Math.min/Math.max
fn fold_numbers(args: &CallArgs, init: f64, op: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in &args.values {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = op(acc, n);
    }
    acc
}

/// Register JSON object
fn register_json(rt: &mut Runtime) {
    let json = Value::new_object();
    json.set_property(
        "stringify",
        Value::native("stringify", |_, args| {
            let mut seen = Vec::new();
            let Some(tree) = to_json(&args.get(0), &mut seen)? else {
                return Ok(Value::Undefined);
            };
            let pretty = match args.get(2) {
                Value::Number(n) => n > 0.0,
                Value::String(s) => !s.is_empty(),
                _ => false,
            };
            let text = if pretty {
                serde_json::to_string_pretty(&tree)
            } else {
                serde_json::to_string(&tree)
            }
            .map_err(|e| Error::InternalError(e.to_string()))?;
            Ok(Value::String(text))
        }),
    );
    rt.define_global("JSON", json);
}

/// Convert a value to a JSON tree; `None` for values JSON leaves out
fn to_json(value: &Value, seen: &mut Vec<*const RefCell<Object>>) -> Result<Option<serde_json::Value>> {
    let obj = match value {
        Value::Undefined => return Ok(None),
        Value::Null => return Ok(Some(serde_json::Value::Null)),
        Value::Boolean(b) => return Ok(Some(serde_json::Value::Bool(*b))),
        Value::Number(n) => {
            let json = if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
                serde_json::Value::from(*n as i64)
            } else {
                serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            };
            return Ok(Some(json));
        }
        Value::String(s) => return Ok(Some(serde_json::Value::String(s.clone()))),
        Value::Object(obj) => obj,
    };

    let ptr = Rc::as_ptr(obj);
    if seen.contains(&ptr) {
        return Err(Error::type_error("Converting circular structure to JSON"));
    }
    seen.push(ptr);

    let object = obj.borrow();
    let tree = match &object.kind {
        ObjectKind::Function(_) | ObjectKind::Native { .. } => None,
        ObjectKind::Array(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(to_json(element, seen)?.unwrap_or(serde_json::Value::Null));
            }
            Some(serde_json::Value::Array(items))
        }
        ObjectKind::Ordinary | ObjectKind::Error { .. } => {
            let mut map = serde_json::Map::new();
            for (key, member) in object.properties.iter() {
                if let Some(json) = to_json(member, seen)? {
                    map.insert(key.clone(), json);
                }
            }
            Some(serde_json::Value::Object(map))
        }
    };

    seen.pop();
    Ok(tree)
}

/// Register the error constructors
fn register_error(rt: &mut Runtime) {
    for kind in [
        ErrorKind::GenericError,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
    ] {
        let constructor = Value::native(kind.name(), move |_, args| {
            let message = match args.get(0) {
                Value::Undefined => String::new(),
                other => other.to_js_string(),
            };
            Ok(Value::error(kind, message))
        });
        rt.define_global(kind.name(), constructor);
    }
}

/// Register conversion functions and `Array`
fn register_global_functions(rt: &mut Runtime) {
    rt.define_global(
        "String",
        Value::native("String", |_, args| {
            Ok(Value::String(if args.is_empty() {
                String::new()
            } else {
                args.get(0).to_js_string()
            }))
        }),
    );
    rt.define_global(
        "Number",
        Value::native("Number", |_, args| {
            Ok(Value::Number(if args.is_empty() { 0.0 } else { args.number(0) }))
        }),
    );
    rt.define_global(
        "Boolean",
        Value::native("Boolean", |_, args| Ok(Value::Boolean(args.get(0).to_boolean()))),
    );
    rt.define_global(
        "isNaN",
        Value::native("isNaN", |_, args| Ok(Value::Boolean(args.number(0).is_nan()))),
    );
    rt.define_global(
        "parseInt",
        Value::native("parseInt", |_, args| {
            let radix = match args.get(1) {
                Value::Undefined => None,
                other => Some(other.to_number() as u32),
            };
            Ok(Value::Number(parse_int(&args.get(0).to_js_string(), radix)))
        }),
    );
    rt.define_global(
        "parseFloat",
        Value::native("parseFloat", |_, args| {
            Ok(Value::Number(parse_float(&args.get(0).to_js_string())))
        }),
    );

    let array = Value::native("Array", |_, args| Ok(Value::new_array(args.values)));
    array.set_property(
        "isArray",
        Value::native("isArray", |_, args| Ok(Value::Boolean(args.get(0).is_array()))),
    );
    rt.define_global("Array", array);

    rt.define_global(
        "require",
        Value::native("require", |rt, args| {
            let name = args.get(0).to_js_string();
            rt.module(&name)
                .ok_or_else(|| Error::generic(format!("Cannot find module '{}'", name)))
        }),
    );
}

/// Populate the module registry beyond `math`
fn register_modules(rt: &mut Runtime) {
    let util = Value::new_object();
    util.set_property(
        "inspect",
        Value::native("inspect", |_, args| Ok(Value::String(args.get(0).inspect()))),
    );
    rt.register_module("util", util);
}

/// `parseInt` semantics: leading whitespace, optional sign, longest digit prefix
pub fn parse_int(text: &str, radix: Option<u32>) -> f64 {
    let trimmed = text.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (radix, digits) = match radix {
        None | Some(0) | Some(16) => match rest.get(..2) {
            Some("0x") | Some("0X") => (16, &rest[2..]),
            _ => (radix.filter(|&r| r != 0).unwrap_or(10), rest),
        },
        Some(r) if (2..=36).contains(&r) => (r, rest),
        Some(_) => return f64::NAN,
    };

    let mut value = 0.0;
    let mut any = false;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                value = value * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    if any {
        sign * value
    } else {
        f64::NAN
    }
}

/// `parseFloat` semantics: the longest prefix that reads as a decimal literal
pub fn parse_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") {
        return if trimmed.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mut seen_dot = false;
    let mut seen_exp = false;
    let mut last_valid = 0;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => last_valid = end + 1,
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if !seen_exp && last_valid > 0 => {
                seen_exp = true;
                if matches!(bytes.get(end + 1), Some(b'+') | Some(b'-')) {
                    end += 1;
                }
            }
            _ => break,
        }
        end += 1;
    }
    trimmed[..last_valid].parse::<f64>().unwrap_or(f64::NAN)
}

// ========== Array methods ==========

fn this_array(args: &CallArgs) -> Result<ObjectRef> {
    match &args.this {
        Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Array(_)) => Ok(obj.clone()),
        other => Err(Error::type_error(format!(
            "{} is not an array",
            other.inspect()
        ))),
    }
}

fn elements(array: &ObjectRef) -> Vec<Value> {
    match &array.borrow().kind {
        ObjectKind::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn with_elements<T>(array: &ObjectRef, f: impl FnOnce(&mut Vec<Value>) -> T) -> Option<T> {
    match &mut array.borrow_mut().kind {
        ObjectKind::Array(items) => Some(f(items)),
        _ => None,
    }
}

/// Resolve a relative index argument (negative counts from the end)
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn callback(args: &CallArgs, method: &str) -> Result<Value> {
    let cb = args.get(0);
    if cb.is_callable() {
        Ok(cb)
    } else {
        Err(Error::type_error(format!(
            "{} is not a function (in Array.prototype.{})",
            cb.inspect(),
            method
        )))
    }
}

/// Look up a built-in array method by name
pub fn array_method(name: &str) -> Option<Value> {
    let method: fn(&mut Runtime, CallArgs) -> Result<Value> = match name {
        "push" => array_push,
        "pop" => array_pop,
        "join" => array_join,
        "indexOf" => array_index_of,
        "includes" => array_includes,
        "slice" => array_slice,
        "concat" => array_concat,
        "map" => array_map,
        "filter" => array_filter,
        "forEach" => array_for_each,
        "reduce" => array_reduce,
        "some" => array_some,
        "every" => array_every,
        "reverse" => array_reverse,
        _ => return None,
    };
    Some(Value::native(name, method))
}

fn array_push(_: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let len = with_elements(&array, |items| {
        items.extend(args.values.iter().cloned());
        items.len()
    })
    .unwrap_or(0);
    Ok(Value::Number(len as f64))
}

fn array_pop(_: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    Ok(with_elements(&array, |items| items.pop())
        .flatten()
        .unwrap_or_default())
}

fn array_join(_: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let separator = match args.get(0) {
        Value::Undefined => ",".to_string(),
        other => other.to_js_string(),
    };
    let parts: Vec<String> = elements(&array)
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
        .collect();
    Ok(Value::String(parts.join(&separator)))
}

fn array_index_of(_: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let needle = args.get(0);
    let position = elements(&array).iter().position(|v| v.strict_equals(&needle));
    Ok(Value::Number(position.map(|p| p as f64).unwrap_or(-1.0)))
}

fn array_includes(_: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let needle = args.get(0);
    let found = elements(&array).iter().any(|v| match (v, &needle) {
        (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
        _ => v.strict_equals(&needle),
    });
    Ok(Value::Boolean(found))
}

fn array_slice(_: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let items = elements(&array);
    let start = relative_index(&args.get(0), items.len(), 0);
    let end = relative_index(&args.get(1), items.len(), items.len());
    let slice = if start < end {
        items[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(Value::new_array(slice))
}

fn array_concat(_: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let mut items = elements(&array);
    for value in &args.values {
        match value.array_elements() {
            Some(more) => items.extend(more),
            None => items.push(value.clone()),
        }
    }
    Ok(Value::new_array(items))
}

fn array_map(rt: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let cb = callback(&args, "map")?;
    let mut mapped = Vec::new();
    for (i, item) in elements(&array).into_iter().enumerate() {
        mapped.push(rt.call(&cb, vec![item, Value::Number(i as f64), args.this.clone()])?);
    }
    Ok(Value::new_array(mapped))
}

fn array_filter(rt: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let cb = callback(&args, "filter")?;
    let mut kept = Vec::new();
    for (i, item) in elements(&array).into_iter().enumerate() {
        let keep = rt.call(&cb, vec![item.clone(), Value::Number(i as f64), args.this.clone()])?;
        if keep.to_boolean() {
            kept.push(item);
        }
    }
    Ok(Value::new_array(kept))
}

fn array_for_each(rt: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let cb = callback(&args, "forEach")?;
    for (i, item) in elements(&array).into_iter().enumerate() {
        rt.call(&cb, vec![item, Value::Number(i as f64), args.this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn array_reduce(rt: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let cb = callback(&args, "reduce")?;
    let mut items = elements(&array).into_iter().enumerate();
    let mut acc = if args.len() >= 2 {
        args.get(1)
    } else {
        match items.next() {
            Some((_, first)) => first,
            None => {
                return Err(Error::type_error(
                    "Reduce of empty array with no initial value",
                ))
            }
        }
    };
    for (i, item) in items {
        acc = rt.call(
            &cb,
            vec![acc, item, Value::Number(i as f64), args.this.clone()],
        )?;
    }
    Ok(acc)
}

fn array_some(rt: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let cb = callback(&args, "some")?;
    for (i, item) in elements(&array).into_iter().enumerate() {
        if rt
            .call(&cb, vec![item, Value::Number(i as f64), args.this.clone()])?
            .to_boolean()
        {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn array_every(rt: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    let cb = callback(&args, "every")?;
    for (i, item) in elements(&array).into_iter().enumerate() {
        if !rt
            .call(&cb, vec![item, Value::Number(i as f64), args.this.clone()])?
            .to_boolean()
        {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(true))
}

fn array_reverse(_: &mut Runtime, args: CallArgs) -> Result<Value> {
    let array = this_array(&args)?;
    with_elements(&array, |items| items.reverse());
    Ok(args.this)
}

// ========== String and number methods ==========

/// Look up a built-in string method by name
pub fn string_method(name: &str) -> Option<Value> {
    let method: fn(&mut Runtime, CallArgs) -> Result<Value> = match name {
        "charAt" => |_, args| {
            let s = args.this.to_js_string();
            let index = relative_index(&args.get(0), usize::MAX, 0);
            Ok(Value::String(
                s.chars().nth(index).map(String::from).unwrap_or_default(),
            ))
        },
        "indexOf" => |_, args| {
            let s = args.this.to_js_string();
            let needle = args.get(0).to_js_string();
            let position = s
                .find(&needle)
                .map(|byte| s[..byte].chars().count() as f64)
                .unwrap_or(-1.0);
            Ok(Value::Number(position))
        },
        "includes" => |_, args| {
            let s = args.this.to_js_string();
            Ok(Value::Boolean(s.contains(&args.get(0).to_js_string())))
        },
        "startsWith" => |_, args| {
            let s = args.this.to_js_string();
            Ok(Value::Boolean(s.starts_with(&args.get(0).to_js_string())))
        },
        "endsWith" => |_, args| {
            let s = args.this.to_js_string();
            Ok(Value::Boolean(s.ends_with(&args.get(0).to_js_string())))
        },
        "slice" => |_, args| {
            let chars: Vec<char> = args.this.to_js_string().chars().collect();
            let start = relative_index(&args.get(0), chars.len(), 0);
            let end = relative_index(&args.get(1), chars.len(), chars.len());
            let slice: String = if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            };
            Ok(Value::String(slice))
        },
        "split" => |_, args| {
            let s = args.this.to_js_string();
            let parts: Vec<Value> = match args.get(0) {
                Value::Undefined => vec![Value::String(s)],
                separator => {
                    let separator = separator.to_js_string();
                    if separator.is_empty() {
                        s.chars().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str()).map(Value::from).collect()
                    }
                }
            };
            Ok(Value::new_array(parts))
        },
        "toUpperCase" => |_, args| Ok(Value::String(args.this.to_js_string().to_uppercase())),
        "toLowerCase" => |_, args| Ok(Value::String(args.this.to_js_string().to_lowercase())),
        "trim" => |_, args| Ok(Value::String(args.this.to_js_string().trim().to_string())),
        "repeat" => |_, args| {
            let count = args.number(0);
            if count < 0.0 || count.is_infinite() {
                return Err(Error::range_error(format!(
                    "Invalid count value: {}",
                    number_to_string(count)
                )));
            }
            let count = if count.is_nan() { 0 } else { count as usize };
            Ok(Value::String(args.this.to_js_string().repeat(count)))
        },
        _ => return None,
    };
    Some(Value::native(name, method))
}

/// Look up a built-in number method by name
pub fn number_method(name: &str) -> Option<Value> {
    let method: fn(&mut Runtime, CallArgs) -> Result<Value> = match name {
        "toFixed" => |_, args| {
            let digits = match args.get(0) {
                Value::Undefined => 0,
                other => other.to_number().clamp(0.0, 100.0) as usize,
            };
            Ok(Value::String(format!("{:.*}", digits, args.this.to_number())))
        },
        "toString" => |_, args| Ok(Value::String(number_to_string(args.this.to_number()))),
        _ => return None,
    };
    Some(Value::native(name, method))
}
