//! Journaling of test lifecycle events
//!
//! [`MarkerHooks`] is the observer registered on the test library. It turns
//! each event into journal entries and checkpoints after every one of them.

use super::journal::Kind;
use super::messages::Message;
use super::session::Session;
use crate::testlib::{DescriptionId, ExpectationId, LifecycleHooks, Nodes, SpecificationId};
use rustc_hash::FxHashSet as HashSet;
use std::rc::Rc;

pub struct MarkerHooks {
    session: Rc<Session>,
    /// Expectations whose outcome is journaled
    finalized: HashSet<ExpectationId>,
    /// Expectations whose code is announced
    announced: HashSet<ExpectationId>,
}

impl MarkerHooks {
    pub fn new(session: Rc<Session>) -> Self {
        Self {
            session,
            finalized: HashSet::default(),
            announced: HashSet::default(),
        }
    }

    /// Journal the outcome of an expectation once
    fn finalize(&mut self, nodes: &Nodes, id: ExpectationId) {
        if !self.finalized.insert(id) {
            return;
        }
        let expectation = nodes.expectation(id);
        if expectation.pass {
            self.session.say(Kind::Success, Message::Bravo);
        } else if let Some(exception) = &expectation.exception {
            self.session.say(
                Kind::Error,
                Message::FailException {
                    index: expectation.index,
                    exception,
                },
            );
        } else {
            self.session.say(
                Kind::Error,
                Message::Fail {
                    index: expectation.index,
                    actual: expectation.actual.as_ref(),
                },
            );
        }
    }

    fn announce(&mut self, nodes: &Nodes, id: ExpectationId) {
        if !self.announced.insert(id) {
            return;
        }
        let expectation = nodes.expectation(id);
        let mut text = String::new();
        if self.session.config().verbose {
            text.push_str(&format!("Test #{} ", expectation.index));
        }
        if let Some(code) = &expectation.code {
            text.push_str(&self.session.message(Message::StartEval { code }));
        }
        if !text.is_empty() {
            self.session.verbalize(Kind::Info, [text]);
        }
    }
}

impl LifecycleHooks for MarkerHooks {
    fn description_begin(&mut self, nodes: &Nodes, id: DescriptionId) {
        self.session
            .trace(format!("running Description.beginHook id={}", id.0));
        self.session.register_description(id);
        let message = &nodes.description(id).message;
        self.session.say(Kind::Info, Message::CheckFunction { message });
    }

    fn description_end(&mut self, nodes: &Nodes, id: DescriptionId) {
        self.session
            .trace(format!("running Description.endHook id={}", id.0));
        if let Some(exception) = &nodes.description(id).exception {
            self.session
                .say(Kind::Error, Message::NotSatisfying { exception });
        }
        self.session.checkpoint();
    }

    fn specification_begin(&mut self, nodes: &Nodes, id: SpecificationId) {
        self.session
            .trace(format!("running Specification.beginHook id={}", id.0));
        let message = nodes.specification(id).message.clone();
        self.session.verbalize(Kind::Info, [message]);
    }

    fn specification_end(&mut self, nodes: &Nodes, id: SpecificationId) {
        self.session
            .trace(format!("running Specification.endHook id={}", id.0));
        let counts = nodes.specification_counts(id);
        if nodes.specification(id).pass {
            self.session.say(
                Kind::Info,
                Message::FullSuccess {
                    successful: counts.successful,
                    attempted: counts.attempted,
                },
            );
        } else {
            let attempted = if counts.intended > 0 {
                counts.intended
            } else {
                counts.attempted
            };
            self.session.say(
                Kind::Warning,
                Message::PartialSuccess {
                    successful: counts.successful,
                    attempted,
                },
            );
        }
    }

    fn expectation_begin(&mut self, nodes: &Nodes, id: ExpectationId) {
        self.session
            .trace(format!("running Expectation.beginHook id={}", id.0));
        self.session.init_exit_code();
        self.announced.remove(&id);
        if let Some(previous) = nodes.previous_sibling(id) {
            self.finalize(nodes, previous);
        }
        self.session.checkpoint();
    }

    fn expectation_match(&mut self, nodes: &Nodes, id: ExpectationId) {
        self.session
            .trace(format!("running Expectation.matchHook id={}", id.0));
        self.announce(nodes, id);
        self.session.checkpoint();
    }

    fn expectation_end(&mut self, nodes: &Nodes, id: ExpectationId) {
        self.session.trace(format!(
            "running Expectation.endHook id={} pass={}",
            id.0,
            nodes.expectation(id).pass
        ));
        self.finalize(nodes, id);
        self.session.checkpoint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::config::MarkerConfig;
    use crate::marker::messages::Locale;
    use crate::runtime::Runtime;
    use crate::testlib::TestLibrary;
    use pretty_assertions::assert_eq;

    fn run(source: &str, verbose: bool) -> (Rc<Session>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let library = TestLibrary::new();
        let config = MarkerConfig {
            lang: Locale::En,
            verbose,
            ..MarkerConfig::default()
        };
        let session = Rc::new(Session::new(
            config,
            dir.path().join("result.txt"),
            Rc::clone(&library),
        ));
        library.set_hooks(Box::new(MarkerHooks::new(Rc::clone(&session))));

        let mut rt = Runtime::new();
        library.install(&mut rt);
        rt.eval(source).unwrap();
        for id in library.declared() {
            library.run_description(&mut rt, id).unwrap();
        }
        (session, dir)
    }

    #[test]
    fn test_journal_for_passing_and_failing_expectations() {
        let (session, _dir) = run(
            "describe('double', () => {
                it('doubles', () => { expect(2 * 2).toBe(4); expect(2 * 3).toBe(7); });
            });",
            false,
        );
        assert_eq!(
            session.entries(),
            [
                "+ I'm going to check function <code>double</code>",
                "+ doubles",
                "+ Evaluating <code>2 * 2</code>",
                "++ OK",
                "+ Evaluating <code>2 * 3</code>",
                "-- Failed expectation #2: I was not expecting your result: <code>6</code>",
                "- You only pass 1 of my 2 tests.",
            ]
        );
    }

    #[test]
    fn test_expectation_outcome_journaled_once() {
        let library = TestLibrary::new();
        let dir = tempfile::tempdir().unwrap();
        let session = Rc::new(Session::new(
            MarkerConfig::default(),
            dir.path().join("result.txt"),
            Rc::clone(&library),
        ));
        let mut hooks = MarkerHooks::new(Rc::clone(&session));
        let mut rt = Runtime::new();
        library.install(&mut rt);
        rt.eval("describe('d', () => { it('s', () => { expect(1).toBe(1); }); });")
            .unwrap();
        library.run_description(&mut rt, DescriptionId(0)).unwrap();

        library.with_nodes(|nodes| {
            hooks.expectation_end(nodes, ExpectationId(0));
            hooks.expectation_end(nodes, ExpectationId(0));
        });
        assert_eq!(session.entries(), ["++ OK"]);
    }

    #[test]
    fn test_verbose_announces_index_and_traces() {
        let (session, _dir) = run(
            "describe('d', () => { it('s', () => { expect(1).toBe(1); }); });",
            true,
        );
        let entries = session.entries();
        assert!(entries.contains(&"+ Test #1 Evaluating <code>1</code>".to_string()));
        assert!(entries.iter().any(|e| e.starts_with("## ")));
    }

    #[test]
    fn test_description_exception_is_reported() {
        let (session, _dir) = run("describe('d', () => { undefinedThing(); });", false);
        assert_eq!(
            session.entries().last().map(String::as_str),
            Some("-- Your code is not correct, it raises: <code>ReferenceError: undefinedThing is not defined</code>")
        );
    }

    #[test]
    fn test_fail_and_escaped_exception() {
        let (session, _dir) = run(
            "describe('d', () => { it('s', () => { fail('<nope>'); }); });",
            false,
        );
        assert!(session
            .entries()
            .contains(&"-- Failed expectation #1: Exception is: <code>&lt;nope&gt;</code>".to_string()));
    }
}
