//! Marking learner code against instructor tests
//!
//! A run loads the learner's code, checks it against the learner's own
//! `describe` blocks, extracts the functions the exercise asks for, then
//! runs the instructor's descriptions one by one, stopping early when a
//! failing description says so. Everything that happens is written to a
//! bilingual journal, and the result record on disk is rewritten after every
//! step so that a killed process still leaves an honest partial report.
//!
//! # Example
//!
//! ```no_run
//! use gradx::marker::{mark_files, MarkerConfig};
//! use std::path::Path;
//!
//! let config = MarkerConfig::from_file("config.json")?;
//! let outcome = mark_files(config, Path::new("student.js"), Path::new("tests.js"))?;
//! std::process::exit(outcome.exit_code);
//! # Ok::<(), gradx::Error>(())
//! ```

mod config;
mod context;
mod extractor;
mod hooks;
mod journal;
mod messages;
mod pipeline;
mod runner;
mod session;

pub use config::MarkerConfig;
pub use context::ExecutionContext;
pub use extractor::extract_bindings;
pub use hooks::MarkerHooks;
pub use journal::{Fragment, Journal, Kind};
pub use messages::{escape_html, render_key, Locale, Message, Rendered};
pub use pipeline::{mark_files, mark_sources, Outcome};
pub use runner::run_instructor_tests;
pub use session::Session;
