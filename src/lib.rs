//! gradx: an automated grading harness for programming exercises
//!
//! gradx loads a learner's submission, checks it against the learner's own
//! embedded tests, extracts the functions an exercise requires and runs an
//! instructor test suite against them. The outcome is a bilingual report,
//! rewritten to disk after every step, plus a pass/fail exit code for the
//! hosting platform.
//!
//! # Quick Start
//!
//! ```no_run
//! use gradx::marker::{mark_sources, MarkerConfig};
//!
//! fn main() -> gradx::Result<()> {
//!     let config = MarkerConfig::from_json(
//!         r#"{ "functions": { "double": true }, "lang": "en", "resultFile": "result.txt" }"#,
//!     )?;
//!     let outcome = mark_sources(
//!         config,
//!         "function double(x) { return 2 * x; }",
//!         "describe('double', () => { it('doubles', () => { expect(double(2)).toBe(4); }); });",
//!     )?;
//!     println!("exit code: {}", outcome.exit_code);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! Scripts flow: Source → [`lexer`] → [`parser`] → [`ast`] → [`runtime`] → Value
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Script engine** | [`lexer`], [`parser`], [`ast`], [`runtime`], [`error`](Error) |
//! | **Testing** | [`testlib`] |
//! | **Marking** | [`marker`] |
// Clippy configuration for gradx.
//
// - enum_variant_names: AST and error variants follow JS naming conventions
// - new_without_default: `TestLibrary::new` hands out an `Rc`
#![allow(clippy::enum_variant_names)]
#![allow(clippy::new_without_default)]

pub mod ast;
pub mod lexer;
pub mod marker;
pub mod parser;
pub mod prelude;
pub mod runtime;
pub mod testlib;

mod error;

pub use error::{Error, ErrorKind, Result, SourceLocation};
pub use runtime::{Runtime, Value, ObjectKind};

/// gradx version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
