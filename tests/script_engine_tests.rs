//! Integration tests for the script engine

mod common;
use common::{run_js, run_js_string};
use gradx::{Runtime, Value};

mod functions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arrow_function_basic() {
        let result = run_js("let add = (a, b) => a + b; add(2, 3)").unwrap();
        assert_eq!(result, Value::Number(5.0));
    }

    #[test]
    fn test_arrow_function_with_block() {
        let result = run_js("let calc = (a, b) => { let sum = a + b; return sum * 2; }; calc(3, 4)").unwrap();
        assert_eq!(result, Value::Number(14.0));
    }

    #[test]
    fn test_function_expression_as_callback() {
        let result = run_js("
            let apply = function (fn, x) { return fn(x); };
            apply(x => x * x, 5)
        ").unwrap();
        assert_eq!(result, Value::Number(25.0));
    }

    #[test]
    fn test_recursion() {
        let result = run_js("
            function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }
            fact(5)
        ").unwrap();
        assert_eq!(result, Value::Number(120.0));
    }

    #[test]
    fn test_missing_arguments_are_undefined() {
        assert_eq!(run_js_string("function f(a, b) { return typeof b; } f(1)"), "undefined");
    }
}

mod control_flow {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_do_while() {
        let result = run_js("let n = 0; do { n += 2; } while (n < 7); n").unwrap();
        assert_eq!(result, Value::Number(8.0));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        assert_eq!(run_js_string("let hit = false; false && (hit = true); hit"), "false");
        assert_eq!(run_js_string("null ?? 'fallback'"), "fallback");
        assert_eq!(run_js_string("0 || 'zero'"), "zero");
    }

    #[test]
    fn test_equality() {
        assert_eq!(run_js_string("1 == '1'"), "true");
        assert_eq!(run_js_string("1 === '1'"), "false");
        assert_eq!(run_js_string("null == undefined"), "true");
        assert_eq!(run_js_string("NaN === NaN"), "false");
    }

    #[test]
    fn test_finally_runs_after_return() {
        let result = run_js("
            let log = [];
            function f() { try { return 1; } finally { log.push('done'); } }
            f() + log.length
        ").unwrap();
        assert_eq!(result, Value::Number(2.0));
    }
}

mod objects_and_arrays {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_object_literal_and_member_access() {
        assert_eq!(run_js_string("const o = { a: 1, b: { c: 'deep' } }; o.b.c"), "deep");
        assert_eq!(run_js_string("const o = { a: 1 }; o['a'] + 1"), "2");
    }

    #[test]
    fn test_array_index_and_length() {
        let result = run_js("const a = [1, 2, 3]; a[1] = 5; a[0] + a[1] + a.length").unwrap();
        assert_eq!(result, Value::Number(9.0));
    }

    #[test]
    fn test_inspect_formats() {
        assert_eq!(run_js("[1, 'a', null]").unwrap().inspect(), "[ 1, 'a', null ]");
        assert_eq!(run_js("({ a: [] })").unwrap().inspect(), "{ a: [] }");
    }

    #[test]
    fn test_method_this() {
        let result = run_js("
            const counter = { n: 1, next: function () { this.n = this.n + 1; return this.n; } };
            counter.next(); counter.next()
        ").unwrap();
        assert_eq!(result, Value::Number(3.0));
    }
}

mod errors {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_text_of_uncaught_throws() {
        assert_eq!(run_js_string("throw new RangeError('too far')"), "RangeError: too far");
        assert_eq!(run_js_string("undefinedName + 1"), "ReferenceError: undefinedName is not defined");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        assert!(run_js_string("let = ;").starts_with("SyntaxError: "));
    }

    #[test]
    fn test_caught_error_properties() {
        assert_eq!(
            run_js_string("let r; try { throw new TypeError('bad'); } catch (e) { r = e.name + '/' + e.message; } r"),
            "TypeError/bad"
        );
    }

    #[test]
    fn test_calling_non_function() {
        assert_eq!(run_js_string("const x = 3; x()"), "TypeError: x is not a function");
    }
}

mod isolation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_isolated_evaluation_does_not_touch_globals() {
        let mut runtime = Runtime::new();
        let names = vec!["square".to_string()];
        let bindings = runtime
            .eval_isolated("function square(x) { return x * x; } let cache = {};", &names)
            .unwrap();
        assert_eq!(bindings.len(), 1);
        assert!(runtime.eval("typeof cache").unwrap().to_js_string() == "undefined");

        let result = runtime.eval_with_bindings("square(7)", &bindings).unwrap();
        assert_eq!(result, Value::Number(49.0));
    }

    #[test]
    fn test_bindings_close_over_their_own_scope() {
        let mut runtime = Runtime::new();
        let names = vec!["next".to_string()];
        let bindings = runtime
            .eval_isolated("let n = 10; function next() { n = n + 1; return n; }", &names)
            .unwrap();
        runtime.eval_with_bindings("next()", &bindings).unwrap();
        let result = runtime.eval_with_bindings("next()", &bindings).unwrap();
        assert_eq!(result, Value::Number(12.0));
    }

    #[test]
    fn test_console_output_is_collected() {
        let mut runtime = Runtime::new();
        runtime.eval("console.log('one'); console.warn('two', 2)").unwrap();
        assert_eq!(runtime.take_console_output(), vec!["one".to_string(), "two 2".to_string()]);
        assert!(runtime.console_output().is_empty());
    }
}
