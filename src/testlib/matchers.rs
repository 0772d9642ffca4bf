//! Matchers returned by `expect(actual)`

use super::{ExpectationId, TestLibrary};
use crate::error::{Error, Result};
use crate::runtime::{CallArgs, Runtime, Value};
use std::rc::Rc;

/// Names of the matchers available on every `expect` result
pub const MATCHERS: &[&str] = &[
    "toBe",
    "toEqual",
    "toBeTruthy",
    "toBeFalsy",
    "toBeDefined",
    "toBeUndefined",
    "toBeNull",
    "toBeGreaterThan",
    "toBeLessThan",
    "toBeCloseTo",
    "toContain",
    "toThrow",
];

type MatchFn = fn(&mut Runtime, &Value, &CallArgs) -> Result<bool>;

fn lookup(name: &str) -> Option<MatchFn> {
    let matcher: MatchFn = match name {
        "toBe" => |_, actual, args| Ok(same_value(actual, &args.get(0))),
        "toEqual" => |_, actual, args| Ok(actual.deep_equals(&args.get(0))),
        "toBeTruthy" => |_, actual, _| Ok(actual.to_boolean()),
        "toBeFalsy" => |_, actual, _| Ok(!actual.to_boolean()),
        "toBeDefined" => |_, actual, _| Ok(!actual.is_undefined()),
        "toBeUndefined" => |_, actual, _| Ok(actual.is_undefined()),
        "toBeNull" => |_, actual, _| Ok(actual.is_null()),
        "toBeGreaterThan" => |_, actual, args| Ok(actual.to_number() > args.number(0)),
        "toBeLessThan" => |_, actual, args| Ok(actual.to_number() < args.number(0)),
        "toBeCloseTo" => |_, actual, args| {
            let digits = match args.get(1) {
                Value::Undefined => 2.0,
                other => other.to_number(),
            };
            let tolerance = 10f64.powf(-digits) / 2.0;
            Ok((actual.to_number() - args.number(0)).abs() < tolerance)
        },
        "toContain" => |_, actual, args| {
            let item = args.get(0);
            match actual {
                Value::String(s) => Ok(s.contains(&item.to_js_string())),
                other => match other.array_elements() {
                    Some(elements) => Ok(elements.iter().any(|e| same_value(e, &item))),
                    None => Err(Error::type_error(format!(
                        "{} is not a string or an array",
                        other.inspect()
                    ))),
                },
            }
        },
        "toThrow" => |rt, actual, args| {
            if !actual.is_callable() {
                return Err(Error::type_error(format!(
                    "{} is not a function",
                    actual.inspect()
                )));
            }
            match rt.call(actual, Vec::new()) {
                Ok(_) => Ok(false),
                Err(error) => Ok(match args.get(0) {
                    Value::Undefined => true,
                    expected => error.exception_text().contains(&expected.to_js_string()),
                }),
            }
        },
        _ => return None,
    };
    Some(matcher)
}

/// `Object.is`: strict equality where NaN equals itself
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

/// Build the matcher object for expectation `id`
pub(super) fn matcher_object(library: &Rc<TestLibrary>, id: ExpectationId) -> Value {
    let properties = MATCHERS.iter().filter_map(|name| {
        let matcher = lookup(name)?;
        let library = Rc::clone(library);
        let native = Value::native(name, move |rt, args| {
            library.fire(|hooks, nodes| hooks.expectation_match(nodes, id));
            let actual = library.actual(id);
            let outcome = matcher(rt, &actual, &args);
            library.resolve(id, outcome);
            Ok(Value::Undefined)
        });
        Some((*name, native))
    });
    Value::new_object_with_properties(properties)
}
