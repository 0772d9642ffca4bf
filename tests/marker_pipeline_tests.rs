//! Integration tests for the marking pipeline

mod common;
use common::{config, mark};
use gradx::marker::{mark_files, mark_sources, MarkerConfig};
use gradx::Error;
use std::fs;

const DOUBLE: &str = "function double(x) { return 2 * x; }";

const DOUBLE_TESTS: &str = "
describe('double', () => {
    it('doubles', () => {
        expect(double(2)).toBe(4);
    });
});
";

mod learner_code {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_required_functions_present() {
        let marked = mark(config(&["double"]), DOUBLE, DOUBLE_TESTS);
        assert_eq!(
            marked.report(),
            [
                "+ Let's start to evaluate your code.",
                "+ <code>double</code> exists and is a function.",
                "+ Your code has been correctly loaded.",
                "+ I'm going to check your code with my tests.",
                "+ I'm going to check function <code>double</code>",
                "+ doubles",
                "+ Evaluating <code>double(2)</code>",
                "++ OK",
                "+ You pass 1 of my 1 tests.",
            ]
        );
        assert_eq!(marked.outcome.exit_code, 0);
        assert!(marked.outcome.completed);
        assert!(marked.outcome.passed());
    }

    #[test]
    fn test_failing_self_test_voids_bindings() {
        let code = "
            function double(x) { return x + x + 1; }
            describe('mine', () => {
                it('checks', () => { expect(double(1)).toBe(2); });
            });
        ";
        let marked = mark(config(&["double"]), code, DOUBLE_TESTS);
        let report = marked.report();
        assert!(report.contains(&"-- Your code does not pass your own tests!"));
        assert_eq!(report.last(), Some(&"- I stop here!"));
        assert!(!report.contains(&"+ I'm going to check your code with my tests."));
        assert!(!report.contains(&"+ doubles"));
        assert_eq!(marked.outcome.exit_code, 1);
        assert!(!marked.outcome.completed);
    }

    #[test]
    fn test_passing_self_tests_are_reported() {
        let code = "
            function double(x) { return 2 * x; }
            describe('mine', () => {
                it('checks', () => { expect(double(1)).toBe(2); });
            });
        ";
        let marked = mark(config(&["double"]), code, DOUBLE_TESTS);
        let report = marked.report();
        assert!(report.contains(&"+ I'm going to check function <code>mine</code>"));
        assert!(report.contains(&"+ Your code has been correctly loaded."));
        assert_eq!(marked.counter("ATTEMPTEDEXPECTATIONSCOUNT"), 2);
        assert_eq!(marked.counter("SUCCEEDEDEXPECTATIONSCOUNT"), 2);
        assert_eq!(marked.outcome.exit_code, 0);
    }

    #[test]
    fn test_missing_function_is_reported_per_name() {
        let marked = mark(config(&["double", "triple"]), DOUBLE, DOUBLE_TESTS);
        let report = marked.report();
        assert!(report.contains(&"+ <code>double</code> exists and is a function."));
        assert!(report.contains(&"- <code>triple</code> is not a function!"));
        assert_eq!(report.last(), Some(&"- I stop here!"));
        assert_eq!(marked.outcome.exit_code, 1);
    }

    #[test]
    fn test_non_callable_binding_counts_as_missing() {
        let marked = mark(config(&["double"]), "var double = 2;", DOUBLE_TESTS);
        assert!(marked
            .report()
            .contains(&"- <code>double</code> is not a function!"));
        assert_eq!(marked.outcome.exit_code, 1);
    }

    #[test]
    fn test_syntax_error_in_learner_code() {
        let marked = mark(config(&["double"]), "function double(x { return x; }", DOUBLE_TESTS);
        let report = marked.report();
        assert!(report[1].starts_with("-- Your code is not correct, it raises: <code>SyntaxError: "));
        assert_eq!(report.last(), Some(&"- I stop here!"));
        assert_eq!(marked.outcome.exit_code, 1);
    }

    #[test]
    fn test_uncaught_exception_in_learner_code() {
        let marked = mark(config(&["double"]), "throw new TypeError('nope');", DOUBLE_TESTS);
        assert_eq!(
            marked.report()[1],
            "-- Your code is not correct, it raises: <code>TypeError: nope</code>"
        );
    }

    #[test]
    fn test_function_check_disabled_with_no_functions() {
        let mut config = config(&["double"]);
        config.dont_check_functions = true;
        let tests = "
            describe('nothing', () => {
                it('is defined', () => { expect(typeof double).toBe('undefined'); });
            });
        ";
        let marked = mark(config, "var unrelated = 1;", tests);
        let report = marked.report();
        assert!(!report.iter().any(|line| line.contains("is not a function")));
        assert!(report.contains(&"+ Your code has been correctly loaded."));
        assert_eq!(marked.outcome.exit_code, 0);
    }

    #[test]
    fn test_learner_globals_do_not_leak_into_instructor_tests() {
        let code = "function double(x) { return 2 * x; } var helper = 5;";
        let tests = "
            describe('isolation', () => {
                it('hides helpers', () => { expect(typeof helper).toBe('undefined'); });
            });
        ";
        let marked = mark(config(&["double"]), code, tests);
        assert_eq!(marked.outcome.exit_code, 0);
    }
}

mod instructor_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stop_on_failure_skips_later_descriptions() {
        let tests = "
            describe('first', () => {
                it('a', () => { expect(double(1)).toBe(3); });
            }, { stopOnFailure: true });
            describe('second', () => {
                it('b', () => { expect(double(2)).toBe(4); });
            });
        ";
        let marked = mark(config(&["double"]), DOUBLE, tests);
        let report = marked.report();
        assert!(report.contains(&"+ I'm going to check function <code>first</code>"));
        assert!(!report.iter().any(|line| line.contains("second")));
        assert!(!report.contains(&"+ b"));
        assert_eq!(report.last(), Some(&"- I stop here!"));
        assert_eq!(marked.outcome.exit_code, 1);
        assert!(!marked.outcome.completed);
    }

    #[test]
    fn test_failure_without_stop_runs_everything() {
        let tests = "
            describe('first', () => {
                it('a', () => { expect(double(1)).toBe(3); });
            });
            describe('second', () => {
                it('b', () => { expect(double(2)).toBe(4); });
            });
        ";
        let marked = mark(config(&["double"]), DOUBLE, tests);
        let report = marked.report();
        let first = report.iter().position(|l| l.ends_with("<code>first</code>")).unwrap();
        let second = report.iter().position(|l| l.ends_with("<code>second</code>")).unwrap();
        assert!(first < second);
        assert_eq!(report.last(), Some(&"- I stop here!"));
        assert_eq!(marked.outcome.exit_code, 1);
        assert!(marked.outcome.completed);
    }

    #[test]
    fn test_syntax_error_in_instructor_tests() {
        let tests = "describe('broken', () => { it('x', () => { expect(1).toBe(1); });";
        let marked = mark(config(&["double"]), DOUBLE, tests);
        let journal = marked.journal();
        assert!(journal
            .iter()
            .any(|line| line.starts_with("##") && line.contains("catch after evalStudentTests: SyntaxError")));
        assert!(!journal.iter().any(|line| line.contains("I'm going to check function")));
        assert_eq!(marked.outcome.exit_code, 1);
        assert!(!marked.outcome.completed);
    }

    #[test]
    fn test_exception_in_description_body() {
        let tests = "describe('boom', () => { throw new Error('authoring'); });";
        let marked = mark(config(&["double"]), DOUBLE, tests);
        assert!(marked
            .report()
            .contains(&"-- Your code is not correct, it raises: <code>Error: authoring</code>"));
        assert_eq!(marked.outcome.exit_code, 1);
    }

    #[test]
    fn test_exception_in_it_body_is_failed_expectation() {
        let tests = "
            describe('double', () => {
                it('calls missing', () => { expect(triple(2)).toBe(6); });
            });
        ";
        let marked = mark(config(&["double"]), DOUBLE, tests);
        let report = marked.report();
        assert!(report.contains(
            &"-- Failed expectation #1: Exception is: <code>ReferenceError: triple is not defined</code>"
        ));
        assert!(report.contains(&"- You only pass 0 of my 1 tests."));
    }

    #[test]
    fn test_intended_expectation_count() {
        let tests = "
            describe('double', () => {
                it('short', () => { expect(double(1)).toBe(2); }, { expectations: 3 });
            });
        ";
        let marked = mark(config(&["double"]), DOUBLE, tests);
        assert!(marked.report().contains(&"- You only pass 1 of my 3 tests."));
        assert_eq!(marked.outcome.exit_code, 1);
    }

    #[test]
    fn test_learner_recursion_is_bounded() {
        let code = "function loop(n) { return loop(n + 1); }";
        let tests = "
            describe('loop', () => {
                it('terminates', () => { expect(loop(0)).toBe(1); });
            });
        ";
        let marked = mark(config(&["loop"]), code, tests);
        assert!(marked
            .record
            .contains("RangeError: Maximum call stack size exceeded"));
        assert_eq!(marked.report().last(), Some(&"- I stop here!"));
    }

    #[test]
    fn test_deep_learner_recursion_passes() {
        let code = "function sum(n) { return n === 0 ? 0 : n + sum(n - 1); }";
        let tests = "
            describe('sum', () => {
                it('adds up', () => {
                    expect(sum(100)).toBe(5050);
                    expect(sum(900)).toBe(405450);
                });
            });
        ";
        let marked = mark(config(&["sum"]), code, tests);
        assert!(marked.report().contains(&"+ You pass 2 of my 2 tests."));
        assert_eq!(marked.outcome.exit_code, 0);
    }

    #[test]
    fn test_cyclic_values_compare_without_crashing() {
        let code = "function mk() { const a = { n: 1 }; a.self = a; return a; }";
        let tests = "
            describe('mk', () => {
                it('builds a cycle', () => {
                    const b = { n: 1 };
                    b.self = b;
                    expect(mk()).toEqual(b);
                    expect(mk()).toEqual({ n: 1, self: {} });
                });
            });
        ";
        let marked = mark(config(&["mk"]), code, tests);
        let report = marked.report();
        assert_eq!(report.iter().filter(|l| **l == "++ OK").count(), 1);
        assert!(report.iter().any(|l| l.starts_with("-- Failed expectation #2:")));
        assert_eq!(report.last(), Some(&"- I stop here!"));
    }

    #[test]
    fn test_learner_cannot_replace_test_primitives() {
        let code = "
            function double(x) { return 2 * x; }
            expect = 3;
            fail = false;
            it = null;
            Math.abs = null;
        ";
        let tests = "
            describe('double', () => {
                it('doubles', () => {
                    expect(double(2)).toBe(4);
                    expect(Math.abs(-1)).toBe(1);
                });
            });
        ";
        let marked = mark(config(&["double"]), code, tests);
        assert!(marked.report().contains(&"+ You pass 2 of my 2 tests."));
        assert_eq!(marked.outcome.exit_code, 0);
    }

    #[test]
    fn test_deeply_nested_learner_code_is_a_syntax_error() {
        let code = format!(
            "function double(x) {{ return 2 * x; }} var x = {}1{};",
            "(".repeat(20_000),
            ")".repeat(20_000)
        );
        let marked = mark(config(&["double"]), &code, DOUBLE_TESTS);
        let report = marked.report();
        assert!(report[1].starts_with("-- Your code is not correct, it raises: <code>SyntaxError: Too much nesting"));
        assert_eq!(report.last(), Some(&"- I stop here!"));
        assert_eq!(marked.outcome.exit_code, 1);
    }
}

mod result_record {
    use super::*;
    use pretty_assertions::assert_eq;

    const MIXED_TESTS: &str = "
        describe('double', () => {
            it('mixed', () => {
                expect(double(1)).toBe(2);
                expect(double(2)).toBe(5);
                expect(double(3)).toEqual(6);
            });
            it('more', () => {
                fail('not implemented');
            });
        });
    ";

    #[test]
    fn test_counters_match_journal_markers() {
        let mut config = config(&["double"]);
        config.total_expectations_count = 10;
        let marked = mark(config, DOUBLE, MIXED_TESTS);
        let report = marked.report();
        let successes = report.iter().filter(|l| **l == "++ OK").count() as u64;
        let failures = report
            .iter()
            .filter(|l| l.starts_with("-- Failed expectation"))
            .count() as u64;

        assert_eq!(marked.counter("ATTEMPTEDEXPECTATIONSCOUNT"), successes + failures);
        assert_eq!(marked.counter("SUCCEEDEDEXPECTATIONSCOUNT"), successes);
        assert_eq!(marked.counter("TOTALEXPECTATIONSCOUNT"), 10);
        assert_eq!((successes, failures), (2, 2));
    }

    #[test]
    fn test_each_expectation_has_one_outcome_line() {
        let marked = mark(config(&["double"]), DOUBLE, MIXED_TESTS);
        for index in 1..=4 {
            let prefix = format!("-- Failed expectation #{}:", index);
            let count = marked.report().iter().filter(|l| l.starts_with(&prefix)).count();
            assert!(count <= 1, "expectation {} reported {} times", index, count);
        }
        assert_eq!(
            marked.report().iter().filter(|l| l.starts_with("++ ")).count(),
            2
        );
    }

    #[test]
    fn test_record_layout() {
        let marked = mark(config(&["double"]), DOUBLE, DOUBLE_TESTS);
        let lines: Vec<&str> = marked.record.lines().collect();
        assert_eq!(lines[0], "ATTEMPTEDEXPECTATIONSCOUNT=1");
        assert_eq!(lines[1], "SUCCEEDEDEXPECTATIONSCOUNT=1");
        assert_eq!(lines[2], "TOTALEXPECTATIONSCOUNT=0");
        assert!(lines[3..].iter().all(|line| line.starts_with("# ")));
        assert!(marked.record.ends_with('\n'));
        assert!(lines[3].starts_with("# ## "));
        assert!(lines[3].ends_with("before evalStudentCode"));
    }

    #[test]
    fn test_french_is_the_default_language() {
        let config = MarkerConfig {
            functions: [("double".to_string(), serde_json::Value::Bool(true))]
                .into_iter()
                .collect(),
            ..MarkerConfig::default()
        };
        let marked = mark(config, DOUBLE, DOUBLE_TESTS);
        let report = marked.report();
        assert_eq!(report[0], "+ Je vais évaluer votre code.");
        assert!(report.contains(&"+ <code>double</code> est bien une fonction"));
        assert!(report.contains(&"+ Vous avez réussi 1 de mes 1 tests."));
    }

    #[test]
    fn test_verbose_journals_traces_and_indices() {
        let mut config = config(&["double"]);
        config.verbose = true;
        let marked = mark(config, DOUBLE, DOUBLE_TESTS);
        let journal = marked.journal();
        assert!(journal.contains(&"+ Test #1 Evaluating <code>double(2)</code>"));
        assert!(journal
            .iter()
            .any(|l| l.starts_with("## ") && l.ends_with("Checking extraction double")));
    }

    #[test]
    fn test_missing_result_file_is_config_error() {
        let err = mark_sources(config(&[]), DOUBLE, DOUBLE_TESTS).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_mark_files_with_missing_code_file() {
        let dir = tempfile::tempdir().unwrap();
        let tests = dir.path().join("tests.js");
        fs::write(&tests, DOUBLE_TESTS).unwrap();
        let sink = dir.path().join("result.txt");
        let mut config = config(&["double"]);
        config.result_file = Some(sink.clone());

        let outcome = mark_files(config, &dir.path().join("absent.js"), &tests).unwrap();
        assert_eq!(outcome.exit_code, 1);
        let record = fs::read_to_string(&sink).unwrap();
        assert!(record.contains("catch after evalStudentCode"));
        assert!(record.ends_with("# - I stop here!\n"));
    }

    #[test]
    fn test_mark_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let code = dir.path().join("student.js");
        let tests = dir.path().join("tests.js");
        fs::write(&code, DOUBLE).unwrap();
        fs::write(&tests, DOUBLE_TESTS).unwrap();
        let mut config = config(&["double"]);
        config.result_file = Some(dir.path().join("result.txt"));

        let outcome = mark_files(config, &code, &tests).unwrap();
        assert!(outcome.passed());
        assert!(outcome.completed);
    }
}
