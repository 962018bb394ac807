//! Command line arguments

use crate::error::CliResult;
use clap::{ArgAction, Parser};
use core_types::{RunMode, WorkerOptions};

/// Run JavaScript inside a synchronously driven worker
#[derive(Debug, Clone, Parser)]
#[command(name = "sync-worker", version, about)]
pub struct Cli {
    /// JavaScript file to execute
    #[arg(short, long, conflicts_with = "eval")]
    pub file: Option<String>,

    /// Inline JavaScript to execute
    #[arg(short, long)]
    pub eval: Option<String>,

    /// Start an interactive REPL
    #[arg(short, long)]
    pub repl: bool,

    /// Give the worker its own event loop
    #[arg(long)]
    pub own_loop: bool,

    /// Give the worker its own microtask queue
    #[arg(long)]
    pub own_microtask_queue: bool,

    /// Shorthand for --own-loop --own-microtask-queue
    #[arg(long)]
    pub isolated: bool,

    /// Worker options as JSON, e.g. '{"ownLoop":true}'
    #[arg(long, value_name = "JSON")]
    pub options: Option<String>,

    /// How to step the loop after the script ran: default, once or nowait
    #[arg(short, long, default_value = "default")]
    pub mode: String,

    /// Run the script in the host realm with the SynchronousWorker API
    #[arg(long)]
    pub host: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Arguments for running `file` with default settings.
    pub fn with_file(file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            ..Self::empty()
        }
    }

    /// Arguments for evaluating `code` with default settings.
    pub fn with_eval(code: impl Into<String>) -> Self {
        Self {
            eval: Some(code.into()),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            file: None,
            eval: None,
            repl: false,
            own_loop: false,
            own_microtask_queue: false,
            isolated: false,
            options: None,
            mode: RunMode::Default.to_string(),
            host: false,
            verbose: 0,
        }
    }

    /// Worker options from `--options` JSON, then the flags on top.
    pub fn worker_options(&self) -> CliResult<WorkerOptions> {
        let mut options = match &self.options {
            Some(json) => serde_json::from_str::<WorkerOptions>(json)?,
            None => WorkerOptions::default(),
        };
        if self.isolated {
            options = WorkerOptions::isolated();
        }
        if self.own_loop {
            options.own_loop = true;
        }
        if self.own_microtask_queue {
            options.own_microtask_queue = true;
        }
        Ok(options)
    }

    /// The parsed `--mode`.
    pub fn run_mode(&self) -> CliResult<RunMode> {
        Ok(self.mode.parse()?)
    }

    /// Log filter directive for the verbosity level.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
