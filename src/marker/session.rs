//! Per-run marking state

use super::config::MarkerConfig;
use super::journal::{Fragment, Journal, Kind};
use super::messages::Message;
use crate::testlib::{Counts, DescriptionId, TestLibrary};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

/// State shared by the pipeline stages and the lifecycle hooks of one run
pub struct Session {
    config: MarkerConfig,
    journal: RefCell<Journal>,
    library: Rc<TestLibrary>,
    /// Descriptions whose counters feed the result record
    descriptions: RefCell<Vec<DescriptionId>>,
    /// Unset until the first expectation begins
    exit_code: Cell<Option<i32>>,
}

impl Session {
    pub fn new(config: MarkerConfig, sink: PathBuf, library: Rc<TestLibrary>) -> Self {
        let journal = Journal::new(sink, config.total_expectations_count);
        Self {
            config,
            journal: RefCell::new(journal),
            library,
            descriptions: RefCell::new(Vec::new()),
            exit_code: Cell::new(None),
        }
    }

    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    pub fn library(&self) -> &Rc<TestLibrary> {
        &self.library
    }

    /// Render `message` in the configured language
    pub fn message(&self, message: Message<'_>) -> String {
        message.render(self.config.lang)
    }

    /// Journal one entry, then checkpoint
    pub fn verbalize<I, F>(&self, kind: Kind, fragments: I)
    where
        I: IntoIterator<Item = F>,
        F: Into<Fragment>,
    {
        self.journal.borrow_mut().record(kind, fragments);
        self.checkpoint();
    }

    /// Journal a rendered message, then checkpoint
    pub fn say(&self, kind: Kind, message: Message<'_>) {
        let text = self.message(message);
        self.verbalize(kind, [text]);
    }

    /// Journal an internal trace when running verbose
    pub fn trace(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::trace!("{}", text);
        if self.config.verbose {
            self.verbalize(Kind::Trace, [text]);
        }
    }

    /// Journal a pipeline milestone regardless of verbosity
    pub fn milestone(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!("{}", text);
        self.verbalize(Kind::Trace, [text]);
    }

    /// Make a description count towards the result record
    pub fn register_description(&self, id: DescriptionId) {
        let mut descriptions = self.descriptions.borrow_mut();
        if !descriptions.contains(&id) {
            descriptions.push(id);
        }
    }

    /// Sum of the counters of every registered description
    pub fn counts(&self) -> Counts {
        let descriptions = self.descriptions.borrow();
        self.library.with_nodes(|nodes| {
            descriptions
                .iter()
                .map(|id| nodes.description_counts(*id))
                .sum()
        })
    }

    /// Recompute the counters and rewrite the result record
    pub fn checkpoint(&self) {
        let counts = self.counts();
        self.journal.borrow_mut().checkpoint(counts);
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code.get()
    }

    pub fn set_exit_code(&self, code: i32) {
        self.exit_code.set(Some(code));
    }

    /// Start from a passing exit code unless one is already set
    pub fn init_exit_code(&self) {
        if self.exit_code.get().is_none() {
            self.exit_code.set(Some(0));
        }
    }

    /// Journal entries written so far
    pub fn entries(&self) -> Vec<String> {
        self.journal.borrow().entries().to_vec()
    }

    /// The result record as last written
    pub fn record(&self) -> String {
        self.journal.borrow().render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::messages::Locale;
    use crate::runtime::Runtime;

    fn session(verbose: bool) -> (Session, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = MarkerConfig {
            verbose,
            lang: Locale::En,
            ..MarkerConfig::default()
        };
        let sink = dir.path().join("result.txt");
        (Session::new(config, sink, TestLibrary::new()), dir)
    }

    #[test]
    fn test_trace_is_gated_by_verbose() {
        let (quiet, _dir) = session(false);
        quiet.trace("hidden");
        quiet.milestone("shown");
        let entries = quiet.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with("shown"));

        let (verbose, _dir) = session(true);
        verbose.trace("visible");
        assert_eq!(verbose.entries().len(), 1);
    }

    #[test]
    fn test_counts_sum_registered_descriptions() {
        let (session, _dir) = session(false);
        let library = Rc::clone(session.library());
        let mut rt = Runtime::new();
        library.install(&mut rt);
        rt.eval(
            "describe('a', () => { it('x', () => { expect(1).toBe(1); }); });
             describe('b', () => { it('y', () => { expect(1).toBe(2); }); });",
        )
        .unwrap();
        for id in library.declared() {
            library.run_description(&mut rt, id).unwrap();
        }

        assert_eq!(session.counts(), Counts::default());
        session.register_description(DescriptionId(0));
        session.register_description(DescriptionId(0));
        assert_eq!(session.counts().attempted, 1);
        session.register_description(DescriptionId(1));
        let counts = session.counts();
        assert_eq!((counts.attempted, counts.successful), (2, 1));
    }

    #[test]
    fn test_exit_code_initialized_once() {
        let (session, _dir) = session(false);
        assert_eq!(session.exit_code(), None);
        session.init_exit_code();
        assert_eq!(session.exit_code(), Some(0));
        session.set_exit_code(1);
        session.init_exit_code();
        assert_eq!(session.exit_code(), Some(1));
    }

    #[test]
    fn test_say_renders_in_configured_language() {
        let (session, dir) = session(false);
        session.say(Kind::Warning, Message::StopEval);
        assert_eq!(session.entries(), ["- I stop here!"]);
        let written = std::fs::read_to_string(dir.path().join("result.txt")).unwrap();
        assert!(written.ends_with("# - I stop here!\n"));
    }
}
