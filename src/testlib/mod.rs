//! Expectation library for graded scripts
//!
//! Scripts declare groups of tests with `describe`, test cases with `it` and
//! assertions with `expect(actual).toBe(expected)`. The library keeps the
//! resulting tree of [`Description`] → [`Specification`] → [`Expectation`]
//! nodes in an arena ([`Nodes`]) and notifies a registered
//! [`LifecycleHooks`] observer as nodes begin, match and end.
//!
//! Declaring a description does not run it: the caller decides when (and
//! whether) each one runs through [`TestLibrary::run_description`].
//!
//! # Example
//!
//! ```no_run
//! use gradx::runtime::Runtime;
//! use gradx::testlib::TestLibrary;
//!
//! let library = TestLibrary::new();
//! let mut runtime = Runtime::new();
//! library.install(&mut runtime);
//! runtime.eval("describe('sum', () => { it('adds', () => { expect(1 + 1).toBe(2); }); })").unwrap();
//! for id in library.declared() {
//!     assert!(library.run_description(&mut runtime, id).unwrap());
//! }
//! ```

mod matchers;

use crate::error::{Error, Result};
use crate::runtime::{CallArgs, Runtime, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use matchers::MATCHERS;

// ---------------------------------------------------------------------------
// Node identifiers
// ---------------------------------------------------------------------------

/// Index of a [`Description`] in its library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptionId(pub usize);

/// Index of a [`Specification`] in its library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecificationId(pub usize);

/// Index of an [`Expectation`] in its library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpectationId(pub usize);

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Expectation counters of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Expectations created so far.
    pub attempted: usize,
    /// Expectations that passed.
    pub successful: usize,
    /// Expectations the test author announced.
    pub intended: usize,
}

impl std::ops::Add for Counts {
    type Output = Counts;

    fn add(self, other: Counts) -> Counts {
        Counts {
            attempted: self.attempted + other.attempted,
            successful: self.successful + other.successful,
            intended: self.intended + other.intended,
        }
    }
}

impl std::iter::Sum for Counts {
    fn sum<I: Iterator<Item = Counts>>(iter: I) -> Counts {
        iter.fold(Counts::default(), |acc, c| acc + c)
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A `describe` block.
#[derive(Debug, Clone)]
pub struct Description {
    /// Message given to `describe`.
    pub message: String,
    /// Abort the remaining descriptions when this one fails.
    pub stop_on_failure: bool,
    /// Test cases, in the order they ran.
    pub specifications: Vec<SpecificationId>,
    /// Text of the exception that escaped the body, if any.
    pub exception: Option<String>,
    /// Whether the description ran to its end.
    pub done: bool,
    /// Outcome, meaningful once `done`.
    pub pass: bool,
    body: Value,
}

/// An `it` block.
#[derive(Debug, Clone)]
pub struct Specification {
    /// Owning description.
    pub description: DescriptionId,
    /// Message given to `it`.
    pub message: String,
    /// Assertions, in creation order.
    pub expectations: Vec<ExpectationId>,
    /// Expectation count announced with `{ expectations: n }`.
    pub intended: Option<usize>,
    /// Outcome, meaningful once the test case ended.
    pub pass: bool,
}

/// A single assertion.
#[derive(Debug, Clone)]
pub struct Expectation {
    /// Owning test case.
    pub specification: SpecificationId,
    /// 1-based position among all expectations of the library.
    pub index: usize,
    /// Source text of the `expect` argument.
    pub code: Option<String>,
    /// Value under test; absent for `fail()` and escaped exceptions.
    pub actual: Option<Value>,
    /// Whether a matcher (or `fail`) settled the expectation.
    pub resolved: bool,
    /// Outcome, meaningful once resolved.
    pub pass: bool,
    /// Exception text when the expectation failed by raising.
    pub exception: Option<String>,
}

/// Arena holding every node a library created
#[derive(Debug, Default)]
pub struct Nodes {
    descriptions: Vec<Description>,
    specifications: Vec<Specification>,
    expectations: Vec<Expectation>,
}

impl Nodes {
    pub fn description(&self, id: DescriptionId) -> &Description {
        &self.descriptions[id.0]
    }

    pub fn specification(&self, id: SpecificationId) -> &Specification {
        &self.specifications[id.0]
    }

    pub fn expectation(&self, id: ExpectationId) -> &Expectation {
        &self.expectations[id.0]
    }

    /// Counters of a test case
    pub fn specification_counts(&self, id: SpecificationId) -> Counts {
        let spec = self.specification(id);
        let attempted = spec.expectations.len();
        let successful = spec
            .expectations
            .iter()
            .filter(|e| {
                let expectation = self.expectation(**e);
                expectation.resolved && expectation.pass
            })
            .count();
        Counts {
            attempted,
            successful,
            intended: spec.intended.unwrap_or(attempted),
        }
    }

    /// Counters of a description: the sum over its test cases
    pub fn description_counts(&self, id: DescriptionId) -> Counts {
        self.description(id)
            .specifications
            .iter()
            .map(|spec| self.specification_counts(*spec))
            .sum()
    }

    /// The expectation created just before `id` in the same test case
    pub fn previous_sibling(&self, id: ExpectationId) -> Option<ExpectationId> {
        let siblings = &self.specification(self.expectation(id).specification).expectations;
        let position = siblings.iter().position(|e| *e == id)?;
        position.checked_sub(1).map(|p| siblings[p])
    }

    /// Number of descriptions declared so far
    pub fn description_count(&self) -> usize {
        self.descriptions.len()
    }
}

// ---------------------------------------------------------------------------
// Lifecycle hooks
// ---------------------------------------------------------------------------

/// Observer of node lifecycles.
///
/// Every method defaults to a no-op. `expectation_end` fires for each
/// expectation when its test case ends, and may also have been triggered
/// by the observer itself earlier, so implementations must tolerate
/// repeated notifications.
pub trait LifecycleHooks {
    fn description_begin(&mut self, _nodes: &Nodes, _id: DescriptionId) {}
    fn description_end(&mut self, _nodes: &Nodes, _id: DescriptionId) {}
    fn specification_begin(&mut self, _nodes: &Nodes, _id: SpecificationId) {}
    fn specification_end(&mut self, _nodes: &Nodes, _id: SpecificationId) {}
    fn expectation_begin(&mut self, _nodes: &Nodes, _id: ExpectationId) {}
    /// A matcher is about to evaluate the expectation
    fn expectation_match(&mut self, _nodes: &Nodes, _id: ExpectationId) {}
    fn expectation_end(&mut self, _nodes: &Nodes, _id: ExpectationId) {}
}

/// Observer used when none is registered
struct NoHooks;

impl LifecycleHooks for NoHooks {}

// ---------------------------------------------------------------------------
// TestLibrary
// ---------------------------------------------------------------------------

/// The expectation library shared by the script globals it installs
pub struct TestLibrary {
    nodes: RefCell<Nodes>,
    hooks: RefCell<Box<dyn LifecycleHooks>>,
    /// Description whose body is running
    current_description: Cell<Option<DescriptionId>>,
    /// Test case whose body is running
    current_specification: Cell<Option<SpecificationId>>,
}

impl TestLibrary {
    /// Create a new library with no observer.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            nodes: RefCell::new(Nodes::default()),
            hooks: RefCell::new(Box::new(NoHooks)),
            current_description: Cell::new(None),
            current_specification: Cell::new(None),
        })
    }

    /// Register the lifecycle observer, replacing the previous one.
    pub fn set_hooks(&self, hooks: Box<dyn LifecycleHooks>) {
        *self.hooks.borrow_mut() = hooks;
    }

    /// Drop the registered observer.
    pub fn clear_hooks(&self) {
        self.set_hooks(Box::new(NoHooks));
    }

    /// Read access to the node arena.
    pub fn with_nodes<T>(&self, f: impl FnOnce(&Nodes) -> T) -> T {
        f(&self.nodes.borrow())
    }

    /// A snapshot of one description.
    pub fn description(&self, id: DescriptionId) -> Description {
        self.nodes.borrow().description(id).clone()
    }

    /// Every description declared so far, in declaration order.
    pub fn declared(&self) -> Vec<DescriptionId> {
        (0..self.nodes.borrow().description_count())
            .map(DescriptionId)
            .collect()
    }

    /// Install `describe`, `it`, `expect` and `fail` as globals of `rt`.
    pub fn install(self: &Rc<Self>, rt: &mut Runtime) {
        let library = Rc::clone(self);
        rt.define_global(
            "describe",
            Value::native("describe", move |_, args| {
                let (_, handle) = library.describe(&args)?;
                Ok(handle)
            }),
        );

        let library = Rc::clone(self);
        rt.define_global(
            "it",
            Value::native("it", move |rt, args| library.it(rt, &args)),
        );

        let library = Rc::clone(self);
        rt.define_global(
            "expect",
            Value::native("expect", move |_, args| library.expect(args)),
        );

        let library = Rc::clone(self);
        rt.define_global(
            "fail",
            Value::native("fail", move |_, args| {
                library.fail(&args)?;
                Ok(Value::Undefined)
            }),
        );
    }

    fn fire(&self, f: impl FnOnce(&mut dyn LifecycleHooks, &Nodes)) {
        let nodes = self.nodes.borrow();
        let mut hooks = self.hooks.borrow_mut();
        f(hooks.as_mut(), &nodes);
    }

    // ========== describe ==========

    /// Declare a description from the arguments of a script `describe` call.
    ///
    /// Returns the new node and the handle object handed back to the script.
    pub fn describe(&self, args: &CallArgs) -> Result<(DescriptionId, Value)> {
        let message = args.get(0).to_js_string();
        let body = args.get(1);
        if !body.is_callable() {
            return Err(Error::type_error(format!(
                "describe('{}') expects a function",
                message
            )));
        }
        let stop_on_failure = args
            .get(2)
            .get_property("stopOnFailure")
            .is_some_and(|v| v.to_boolean());

        let id = self.declare(message.clone(), body, stop_on_failure);
        tracing::trace!(id = id.0, %message, "description declared");

        let handle = Value::new_object_with_properties([
            ("message", Value::String(message)),
            ("stopOnFailure", Value::Boolean(stop_on_failure)),
        ]);
        Ok((id, handle))
    }

    /// Declare a description directly.
    pub fn declare(&self, message: String, body: Value, stop_on_failure: bool) -> DescriptionId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.descriptions.push(Description {
            message,
            stop_on_failure,
            specifications: Vec::new(),
            exception: None,
            done: false,
            pass: false,
            body,
        });
        DescriptionId(nodes.descriptions.len() - 1)
    }

    /// Run a declared description to completion and report whether it passed.
    ///
    /// Exceptions escaping the body are kept on the node and make it fail;
    /// only harness errors are returned as `Err`.
    pub fn run_description(&self, rt: &mut Runtime, id: DescriptionId) -> Result<bool> {
        let body = {
            let nodes = self.nodes.borrow();
            if id.0 >= nodes.descriptions.len() {
                return Err(Error::InternalError(format!("unknown description #{}", id.0)));
            }
            nodes.description(id).body.clone()
        };

        self.fire(|hooks, nodes| hooks.description_begin(nodes, id));

        let outer = self.current_description.replace(Some(id));
        let result = rt.call(&body, Vec::new());
        self.current_description.set(outer);

        let pass = {
            let mut nodes = self.nodes.borrow_mut();
            let specs_pass = nodes
                .description(id)
                .specifications
                .iter()
                .all(|spec| nodes.specification(*spec).pass);
            let description = &mut nodes.descriptions[id.0];
            if let Err(error) = result {
                tracing::debug!(id = id.0, error = %error, "description body raised");
                description.exception = Some(error.exception_text());
            }
            description.pass = specs_pass && description.exception.is_none();
            description.done = true;
            description.pass
        };

        self.fire(|hooks, nodes| hooks.description_end(nodes, id));
        Ok(pass)
    }

    // ========== it ==========

    fn it(&self, rt: &mut Runtime, args: &CallArgs) -> Result<Value> {
        let Some(description) = self.current_description.get() else {
            return Err(Error::generic("it() must be called inside describe()"));
        };
        let message = args.get(0).to_js_string();
        let body = args.get(1);
        let intended = args
            .get(2)
            .get_property("expectations")
            .map(|v| v.to_number())
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as usize);

        let id = {
            let mut nodes = self.nodes.borrow_mut();
            nodes.specifications.push(Specification {
                description,
                message,
                expectations: Vec::new(),
                intended,
                pass: false,
            });
            let id = SpecificationId(nodes.specifications.len() - 1);
            nodes.descriptions[description.0].specifications.push(id);
            id
        };
        self.fire(|hooks, nodes| hooks.specification_begin(nodes, id));

        let outer = self.current_specification.replace(Some(id));
        let result = if body.is_callable() {
            rt.call(&body, Vec::new())
        } else {
            Err(Error::type_error(format!(
                "it() expects a function, got {}",
                body.inspect()
            )))
        };
        if let Err(error) = result {
            tracing::debug!(id = id.0, error = %error, "specification body raised");
            self.record_failure(id, error.exception_text());
        }
        self.current_specification.set(outer);

        let expectations = self.nodes.borrow().specification(id).expectations.clone();
        for expectation in expectations {
            self.fire(|hooks, nodes| hooks.expectation_end(nodes, expectation));
        }

        {
            let mut nodes = self.nodes.borrow_mut();
            let counts = nodes.specification_counts(id);
            let all_pass = nodes
                .specification(id)
                .expectations
                .iter()
                .all(|e| nodes.expectation(*e).pass);
            nodes.specifications[id.0].pass = all_pass && counts.attempted >= counts.intended;
        }
        self.fire(|hooks, nodes| hooks.specification_end(nodes, id));
        Ok(Value::Undefined)
    }

    // ========== expect / fail ==========

    fn current_specification(&self, caller: &str) -> Result<SpecificationId> {
        self.current_specification
            .get()
            .ok_or_else(|| Error::generic(format!("{}() must be called inside it()", caller)))
    }

    fn create_expectation(&self, specification: SpecificationId, code: Option<String>, actual: Option<Value>) -> ExpectationId {
        let id = {
            let mut nodes = self.nodes.borrow_mut();
            let index = nodes.expectations.len() + 1;
            nodes.expectations.push(Expectation {
                specification,
                index,
                code,
                actual,
                resolved: false,
                pass: false,
                exception: None,
            });
            let id = ExpectationId(nodes.expectations.len() - 1);
            nodes.specifications[specification.0].expectations.push(id);
            id
        };
        self.fire(|hooks, nodes| hooks.expectation_begin(nodes, id));
        id
    }

    fn expect(self: &Rc<Self>, args: CallArgs) -> Result<Value> {
        let specification = self.current_specification("expect")?;
        let code = args.source.clone().filter(|s| !s.is_empty());
        let actual = args.get(0);
        let id = self.create_expectation(specification, code, Some(actual));
        Ok(matchers::matcher_object(self, id))
    }

    fn fail(&self, args: &CallArgs) -> Result<()> {
        let specification = self.current_specification("fail")?;
        let reason = match args.get(0) {
            Value::Undefined => "fail()".to_string(),
            other => other.to_js_string(),
        };
        self.record_failure(specification, reason);
        Ok(())
    }

    /// Record an expectation that failed by raising `exception`
    fn record_failure(&self, specification: SpecificationId, exception: String) {
        let id = self.create_expectation(specification, None, None);
        let mut nodes = self.nodes.borrow_mut();
        let expectation = &mut nodes.expectations[id.0];
        expectation.exception = Some(exception);
        expectation.resolved = true;
        expectation.pass = false;
    }

    /// Settle an expectation with the outcome of a matcher
    fn resolve(&self, id: ExpectationId, outcome: Result<bool>) {
        let mut nodes = self.nodes.borrow_mut();
        let expectation = &mut nodes.expectations[id.0];
        match outcome {
            Ok(pass) => expectation.pass = pass,
            Err(error) => {
                expectation.pass = false;
                expectation.exception = Some(error.exception_text());
            }
        }
        expectation.resolved = true;
    }

    fn actual(&self, id: ExpectationId) -> Value {
        self.nodes
            .borrow()
            .expectation(id)
            .actual
            .clone()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_with(source: &str) -> (Rc<TestLibrary>, Runtime) {
        let library = TestLibrary::new();
        let mut rt = Runtime::new();
        library.install(&mut rt);
        rt.eval(source).unwrap();
        (library, rt)
    }

    #[test]
    fn test_describe_does_not_run_body() {
        let (library, mut rt) = library_with("var ran = false; describe('d', () => { ran = true; });");
        assert_eq!(library.declared(), vec![DescriptionId(0)]);
        assert!(!rt.eval("ran").unwrap().to_boolean());
        library.run_description(&mut rt, DescriptionId(0)).unwrap();
        assert!(rt.eval("ran").unwrap().to_boolean());
    }

    #[test]
    fn test_counts_aggregate_upward() {
        let (library, mut rt) = library_with(
            "describe('d', () => {
                it('a', () => { expect(1).toBe(1); expect(2).toBe(3); });
                it('b', () => { expect(true).toBeTruthy(); }, { expectations: 2 });
            });",
        );
        assert!(!library.run_description(&mut rt, DescriptionId(0)).unwrap());
        let counts = library.with_nodes(|nodes| nodes.description_counts(DescriptionId(0)));
        assert_eq!(
            counts,
            Counts {
                attempted: 3,
                successful: 2,
                intended: 4
            }
        );
        library.with_nodes(|nodes| {
            assert!(!nodes.specification(SpecificationId(1)).pass);
            assert_eq!(nodes.expectation(ExpectationId(2)).index, 3);
        });
    }

    #[test]
    fn test_exception_in_it_becomes_failed_expectation() {
        let (library, mut rt) = library_with(
            "describe('d', () => { it('boom', () => { null.x; }); });",
        );
        assert!(!library.run_description(&mut rt, DescriptionId(0)).unwrap());
        library.with_nodes(|nodes| {
            let expectation = nodes.expectation(ExpectationId(0));
            assert!(expectation.exception.as_deref().unwrap().starts_with("TypeError"));
            assert!(nodes.description(DescriptionId(0)).exception.is_none());
        });
    }

    #[test]
    fn test_exception_in_describe_is_kept() {
        let (library, mut rt) = library_with("describe('d', () => { throw new Error('bad'); });");
        assert!(!library.run_description(&mut rt, DescriptionId(0)).unwrap());
        assert_eq!(
            library.description(DescriptionId(0)).exception.as_deref(),
            Some("Error: bad")
        );
    }

    #[test]
    fn test_expect_outside_it_throws() {
        let library = TestLibrary::new();
        let mut rt = Runtime::new();
        library.install(&mut rt);
        let err = rt.eval("expect(1).toBe(1)").unwrap_err();
        assert_eq!(err.exception_text(), "Error: expect() must be called inside it()");
    }

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl LifecycleHooks for Recorder {
        fn description_begin(&mut self, _: &Nodes, id: DescriptionId) {
            self.0.borrow_mut().push(format!("d+{}", id.0));
        }
        fn description_end(&mut self, _: &Nodes, id: DescriptionId) {
            self.0.borrow_mut().push(format!("d-{}", id.0));
        }
        fn specification_begin(&mut self, _: &Nodes, id: SpecificationId) {
            self.0.borrow_mut().push(format!("s+{}", id.0));
        }
        fn specification_end(&mut self, _: &Nodes, id: SpecificationId) {
            self.0.borrow_mut().push(format!("s-{}", id.0));
        }
        fn expectation_begin(&mut self, _: &Nodes, id: ExpectationId) {
            self.0.borrow_mut().push(format!("e+{}", id.0));
        }
        fn expectation_match(&mut self, _: &Nodes, id: ExpectationId) {
            self.0.borrow_mut().push(format!("e?{}", id.0));
        }
        fn expectation_end(&mut self, _: &Nodes, id: ExpectationId) {
            self.0.borrow_mut().push(format!("e-{}", id.0));
        }
    }

    #[test]
    fn test_hook_order() {
        let (library, mut rt) = library_with(
            "describe('d', () => { it('s', () => { expect(1).toBe(1); fail('no'); }); });",
        );
        let events = Rc::new(RefCell::new(Vec::new()));
        library.set_hooks(Box::new(Recorder(Rc::clone(&events))));
        library.run_description(&mut rt, DescriptionId(0)).unwrap();
        assert_eq!(
            *events.borrow(),
            ["d+0", "s+0", "e+0", "e?0", "e+1", "e-0", "e-1", "s-0", "d-0"]
        );
    }
}
