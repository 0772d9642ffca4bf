//! Progress journal and result record
//!
//! The journal is the learner report: an ordered list of lines, each tagged
//! with a [`Kind`]. On every checkpoint the whole record (counters followed
//! by the journal) is rewritten to the result file, so a process killed at
//! any instant leaves a complete snapshot behind.

use super::messages::escape_html;
use crate::runtime::Value;
use crate::testlib::Counts;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Severity marker of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// `++` a passed expectation
    Success,
    /// `+` positive information
    Info,
    /// `-` warning
    Warning,
    /// `--` error
    Error,
    /// `##` internal trace
    Trace,
}

impl Kind {
    pub fn marker(&self) -> &'static str {
        match self {
            Kind::Success => "++",
            Kind::Info => "+",
            Kind::Warning => "-",
            Kind::Error => "--",
            Kind::Trace => "##",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// A piece of a journal entry
#[derive(Debug, Clone)]
pub enum Fragment {
    /// Text appended as is
    Text(String),
    /// Value appended through `inspect`, then escaped
    Inspect(Value),
}

impl From<String> for Fragment {
    fn from(text: String) -> Self {
        Fragment::Text(text)
    }
}

impl From<&str> for Fragment {
    fn from(text: &str) -> Self {
        Fragment::Text(text.to_string())
    }
}

impl From<Value> for Fragment {
    fn from(value: Value) -> Self {
        Fragment::Inspect(value)
    }
}

/// Ordered journal plus the counters written with it
#[derive(Debug)]
pub struct Journal {
    entries: Vec<String>,
    counts: Counts,
    total: u64,
    sink: PathBuf,
    opened: Instant,
}

impl Journal {
    /// Open a journal checkpointed to `sink`; `total` is the announced expectation count
    pub fn new(sink: impl Into<PathBuf>, total: u64) -> Self {
        Self {
            entries: Vec::new(),
            counts: Counts::default(),
            total,
            sink: sink.into(),
            opened: Instant::now(),
        }
    }

    /// Append one entry
    pub fn record<I, F>(&mut self, kind: Kind, fragments: I)
    where
        I: IntoIterator<Item = F>,
        F: Into<Fragment>,
    {
        let mut line = format!("{} ", kind);
        if kind == Kind::Trace {
            line.push_str(&format!("{:.3} ", self.opened.elapsed().as_secs_f64()));
        }
        for fragment in fragments {
            match fragment.into() {
                Fragment::Text(text) => line.push_str(&text),
                Fragment::Inspect(value) => line.push_str(&escape_html(&value.inspect())),
            }
        }
        tracing::trace!(target: "gradx::journal", "{}", line);
        self.entries.push(line);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn sink(&self) -> &Path {
        &self.sink
    }

    /// The result record as it would be written now
    pub fn render(&self) -> String {
        let mut record = format!(
            "ATTEMPTEDEXPECTATIONSCOUNT={}\nSUCCEEDEDEXPECTATIONSCOUNT={}\nTOTALEXPECTATIONSCOUNT={}\n",
            self.counts.attempted, self.counts.successful, self.total
        );
        for entry in &self.entries {
            record.push_str("# ");
            record.push_str(&entry.replace('\n', "\n# "));
            record.push('\n');
        }
        record
    }

    /// Replace the counters and rewrite the result record.
    ///
    /// Write failures are logged; the run goes on with an in-memory journal.
    pub fn checkpoint(&mut self, counts: Counts) {
        self.counts = counts;
        if let Err(error) = self.write() {
            tracing::error!(sink = %self.sink.display(), %error, "cannot write result record");
        }
    }

    fn write(&self) -> io::Result<()> {
        let mut temporary = self.sink.clone().into_os_string();
        temporary.push(".tmp");
        let temporary = PathBuf::from(temporary);
        fs::write(&temporary, self.render())?;
        fs::rename(&temporary, &self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_formats_fragments() {
        let mut journal = Journal::new("unused", 0);
        journal.record(Kind::Info, ["hello"]);
        journal.record(
            Kind::Error,
            [Fragment::from("got "), Fragment::from(Value::from("<b>"))],
        );
        assert_eq!(journal.entries(), ["+ hello", "-- got &#x27;&lt;b&gt;&#x27;"]);
    }

    #[test]
    fn test_trace_carries_elapsed_seconds() {
        let mut journal = Journal::new("unused", 0);
        journal.record(Kind::Trace, ["milestone"]);
        let entry = &journal.entries()[0];
        let parts: Vec<&str> = entry.splitn(3, ' ').collect();
        assert_eq!(parts[0], "##");
        assert!(parts[1].parse::<f64>().is_ok());
        assert_eq!(parts[2], "milestone");
    }

    #[test]
    fn test_render_prefixes_every_line() {
        let mut journal = Journal::new("unused", 7);
        journal.record(Kind::Warning, ["two\nlines"]);
        journal.counts = Counts {
            attempted: 2,
            successful: 1,
            intended: 2,
        };
        assert_eq!(
            journal.render(),
            "ATTEMPTEDEXPECTATIONSCOUNT=2\nSUCCEEDEDEXPECTATIONSCOUNT=1\nTOTALEXPECTATIONSCOUNT=7\n# - two\n# lines\n"
        );
    }

    #[test]
    fn test_checkpoint_rewrites_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = dir.path().join("result.txt");
        let mut journal = Journal::new(&sink, 0);
        journal.record(Kind::Info, ["first"]);
        journal.checkpoint(Counts::default());
        journal.record(Kind::Info, ["second"]);
        journal.checkpoint(Counts {
            attempted: 1,
            successful: 1,
            intended: 1,
        });

        let written = fs::read_to_string(&sink).unwrap();
        assert_eq!(written, journal.render());
        assert!(written.starts_with("ATTEMPTEDEXPECTATIONSCOUNT=1\n"));
        assert!(!dir.path().join("result.txt.tmp").exists());
    }

    #[test]
    fn test_checkpoint_survives_unwritable_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = Journal::new(dir.path().join("missing").join("result.txt"), 0);
        journal.record(Kind::Info, ["kept"]);
        journal.checkpoint(Counts::default());
        assert_eq!(journal.entries(), ["+ kept"]);
    }
}
