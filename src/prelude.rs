//! Prelude module for convenient imports
//!
//! ```no_run
//! use gradx::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut runtime = Runtime::new();
//!     let result = runtime.eval("[1, 2, 3].map(x => x * 2)")?;
//!     println!("{}", result.inspect());
//!     Ok(())
//! }
//! ```

// Script engine
pub use crate::runtime::{Bindings, CallArgs, ObjectKind, Runtime, Value};

// Error handling
pub use crate::error::{Error, ErrorKind, Result, SourceLocation};

// Test library
pub use crate::testlib::{Counts, DescriptionId, LifecycleHooks, Nodes, TestLibrary};

// Marking
pub use crate::marker::{mark_files, mark_sources, Locale, MarkerConfig, Outcome};
