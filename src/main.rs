//! gradx CLI
//!
//! A command-line interface for marking learner submissions.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use gradx::marker::{mark_files, Locale, MarkerConfig};
use gradx::{Runtime, VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gradx")]
#[command(author, version, about = "Mark learner code against instructor test suites", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbosity: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark learner code against instructor tests
    Mark {
        /// Learner code
        code: PathBuf,
        /// Instructor tests
        tests: PathBuf,
        /// JSON configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Required function (repeatable)
        #[arg(short, long = "function", value_name = "NAME")]
        functions: Vec<String>,
        /// Report language (fr or en)
        #[arg(long)]
        lang: Option<String>,
        /// Journal internal traces and expectation numbers
        #[arg(long)]
        verbose: bool,
        /// Where to write the result record
        #[arg(short, long, value_name = "PATH")]
        result_file: Option<PathBuf>,
        /// Do not check that required functions exist
        #[arg(long)]
        dont_check_functions: bool,
        /// Expectation count announced by the exercise
        #[arg(long, value_name = "N")]
        total: Option<u64>,
    },

    /// Evaluate a script and print its value and console output
    Run {
        /// The file to run
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    setup_logging(cli.verbosity);
    tracing::debug!(version = VERSION, "gradx starting");

    let result = match cli.command {
        Commands::Mark {
            code,
            tests,
            config,
            functions,
            lang,
            verbose,
            result_file,
            dont_check_functions,
            total,
        } => {
            let overrides = Overrides {
                functions,
                lang,
                verbose,
                result_file,
                dont_check_functions,
                total,
            };
            run_mark(&code, &tests, config.as_deref(), overrides)
        }
        Commands::Run { file } => run_file(&file).map(|_| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn setup_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line settings that take precedence over the configuration file
struct Overrides {
    functions: Vec<String>,
    lang: Option<String>,
    verbose: bool,
    result_file: Option<PathBuf>,
    dont_check_functions: bool,
    total: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut MarkerConfig) {
        for name in self.functions {
            config.functions.insert(name, serde_json::Value::Bool(true));
        }
        if let Some(lang) = self.lang {
            config.lang = Locale::from_tag(&lang);
        }
        config.verbose |= self.verbose;
        if let Some(path) = self.result_file {
            config.result_file = Some(path);
        }
        config.dont_check_functions |= self.dont_check_functions;
        if let Some(total) = self.total {
            config.total_expectations_count = total;
        }
    }
}

fn run_mark(code: &Path, tests: &Path, config: Option<&Path>, overrides: Overrides) -> anyhow::Result<i32> {
    let mut config = match config {
        Some(path) => MarkerConfig::from_file(path).map_err(|e| anyhow!(e.to_string()))?,
        None => MarkerConfig::default(),
    };
    overrides.apply(&mut config);

    let outcome = mark_files(config, code, tests).map_err(|e| anyhow!(e.to_string()))?;
    tracing::info!(completed = outcome.completed, "run finished");
    Ok(outcome.exit_code)
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Error reading '{}'", path.display()))?;

    let mut runtime = Runtime::new();
    // Script values are not Send, so errors are carried as text
    let result = runtime.eval(&source);
    for line in runtime.take_console_output() {
        println!("{}", line);
    }
    let value = result.map_err(|e| anyhow!(e.to_string()))?;
    if !value.is_undefined() {
        println!("{}", value.inspect());
    }
    Ok(())
}
