//! The marking pipeline
//!
//! ```text
//! learner code ──► extract_bindings ──► run_instructor_tests ──► Outcome
//!                        │                       │
//!                        └──── MarkerHooks ◄─────┘ (journal + checkpoint)
//! ```
//!
//! Every failure is journaled and turned into a failing [`Outcome`]; nothing
//! escapes [`mark_files`] or [`mark_sources`].

use super::config::MarkerConfig;
use super::context::ExecutionContext;
use super::extractor::extract_bindings;
use super::hooks::MarkerHooks;
use super::journal::Kind;
use super::messages::Message;
use super::runner::run_instructor_tests;
use super::session::Session;
use crate::error::{Error, Result};
use crate::runtime::STACK_SIZE;
use crate::testlib::TestLibrary;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;

/// Result of a marking run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// The instructor suite ran through every description
    pub completed: bool,
    /// 0 when every description passed, 1 otherwise
    pub exit_code: i32,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Where the two sources of a run come from
enum Sources<'a> {
    Files { code: &'a Path, tests: &'a Path },
    Text { code: &'a str, tests: &'a str },
}

impl Sources<'_> {
    fn code(&self) -> Result<String> {
        match self {
            Sources::Files { code, .. } => read_source(code),
            Sources::Text { code, .. } => Ok(code.to_string()),
        }
    }

    fn tests(&self) -> Result<String> {
        match self {
            Sources::Files { tests, .. } => read_source(tests),
            Sources::Text { tests, .. } => Ok(tests.to_string()),
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::InternalError(format!("cannot read '{}': {}", path.display(), e))
    })
}

/// Mark the learner code in `code` against the instructor tests in `tests`
pub fn mark_files(config: MarkerConfig, code: &Path, tests: &Path) -> Result<Outcome> {
    mark(config, Sources::Files { code, tests })
}

/// Mark learner code given as text against instructor tests given as text
pub fn mark_sources(config: MarkerConfig, code: &str, tests: &str) -> Result<Outcome> {
    mark(config, Sources::Text { code, tests })
}

/// Scripts run on a dedicated thread with a [`STACK_SIZE`] stack. Past the
/// result file check, every script failure ends up in the result record; only
/// a thread that cannot start or that panics is an error.
fn mark(config: MarkerConfig, sources: Sources<'_>) -> Result<Outcome> {
    let sink: PathBuf = config.result_file()?.to_path_buf();
    let sources = &sources;
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("gradx-marker".to_string())
            .stack_size(STACK_SIZE)
            .spawn_scoped(scope, move || mark_in_place(config, sink, sources))?;
        worker
            .join()
            .map_err(|_| Error::InternalError("marking thread panicked".to_string()))
    })
}

fn mark_in_place(config: MarkerConfig, sink: PathBuf, sources: &Sources<'_>) -> Outcome {
    let library = TestLibrary::new();
    let session = Rc::new(Session::new(config, sink, Rc::clone(&library)));
    library.set_hooks(Box::new(MarkerHooks::new(Rc::clone(&session))));
    let mut context = ExecutionContext::new(Rc::clone(&library), session.config().lang);

    session.milestone("before evalStudentCode");
    let completed = match run(&session, &mut context, sources) {
        Ok(completed) => completed,
        Err(error) => {
            tracing::warn!(%error, "marking aborted");
            session.milestone(format!("catchRemains: {}", error.exception_text()));
            session.set_exit_code(1);
            false
        }
    };

    let exit_code = session.exit_code().unwrap_or(0);
    session.checkpoint();
    library.clear_hooks();
    tracing::info!(completed, exit_code, "marking finished");
    Outcome {
        completed,
        exit_code,
    }
}

fn run(session: &Session, context: &mut ExecutionContext, sources: &Sources<'_>) -> Result<bool> {
    let bindings = match sources.code() {
        Ok(code) => extract_bindings(session, context, &code),
        Err(error) => {
            session.milestone(format!("catch after evalStudentCode {}", error.exception_text()));
            None
        }
    };
    session.milestone(format!("after evalStudentCode: {}", bindings.is_some()));

    let Some(bindings) = bindings else {
        session.say(Kind::Warning, Message::StopEval);
        session.set_exit_code(1);
        return Ok(false);
    };
    session.say(Kind::Info, Message::FinishEval);

    let completed = match sources
        .tests()
        .and_then(|tests| run_instructor_tests(session, context, &tests, &bindings))
    {
        Ok(completed) => completed,
        Err(error) => {
            tracing::debug!(%error, "instructor tests rejected");
            session.milestone(format!("catch after evalStudentTests: {}", error.exception_text()));
            session.set_exit_code(1);
            false
        }
    };
    session.milestone(format!("after evalStudentTests: {}", completed));

    if session.exit_code().unwrap_or(0) != 0 {
        session.say(Kind::Warning, Message::StopEval);
    }
    Ok(completed)
}
