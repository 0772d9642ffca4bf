//! Execution context shared by learner code and instructor tests
//!
//! One [`ExecutionContext`] lives for one marking run. Learner code and
//! instructor tests both run in it, one phase after the other. Each phase
//! gets its own `describe`, installed for the phase and removed afterwards,
//! which records the descriptions that phase declares. Built-ins and the test
//! primitives are reinstalled before each phase, so whatever learner code
//! reassigns does not carry over into the instructor tests.
//!
//! Scripts also see `message(key, ...args)`, which renders a catalog message
//! in the run's language.

use super::messages::{render_key, Locale};
use crate::runtime::{Runtime, Value};
use crate::testlib::{DescriptionId, TestLibrary};
use std::cell::RefCell;
use std::rc::Rc;

pub struct ExecutionContext {
    runtime: Runtime,
    library: Rc<TestLibrary>,
    locale: Locale,
}

impl ExecutionContext {
    /// Create a context whose globals expose `library` and messages in `locale`
    pub fn new(library: Rc<TestLibrary>, locale: Locale) -> Self {
        let mut context = Self {
            runtime: Runtime::new(),
            library,
            locale,
        };
        context.install_library();
        context
    }

    fn install_library(&mut self) {
        self.library.install(&mut self.runtime);
        // `describe` only exists while a phase runs
        self.runtime.remove_global("describe");

        let locale = self.locale;
        self.runtime.define_global(
            "message",
            Value::native("message", move |_, args| {
                let key = args.get(0).to_js_string();
                let rest = args.values.get(1..).unwrap_or_default();
                Ok(Value::String(render_key(locale, &key, rest).into_text()))
            }),
        );
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    pub fn library(&self) -> &Rc<TestLibrary> {
        &self.library
    }

    /// Run `phase` with a `describe` that records what it declares.
    ///
    /// Returns the phase's result and the declared descriptions in order.
    pub fn collect_descriptions<T>(
        &mut self,
        phase: impl FnOnce(&mut Runtime) -> T,
    ) -> (T, Vec<DescriptionId>) {
        self.runtime.restore_builtins();
        self.install_library();
        let declared = Rc::new(RefCell::new(Vec::new()));

        let library = Rc::clone(&self.library);
        let sink = Rc::clone(&declared);
        self.runtime.define_global(
            "describe",
            Value::native("describe", move |_, args| {
                let (id, handle) = library.describe(&args)?;
                sink.borrow_mut().push(id);
                Ok(handle)
            }),
        );

        let result = phase(&mut self.runtime);
        self.runtime.remove_global("describe");

        let declared = declared.take();
        (result, declared)
    }

    /// Run one declared description
    pub fn run_description(&mut self, id: DescriptionId) -> crate::Result<bool> {
        self.library.run_description(&mut self.runtime, id)
    }
}
