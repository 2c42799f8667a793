use std::path::PathBuf;
use clap::{Parser, ValueEnum};

use crate::events::Op;
use crate::render::DEFAULT_TEMPLATE;

#[derive(Parser, Debug)]
#[command(name = "on")]
#[command(version)]
#[command(about = "Print a line for every filesystem change under the given paths")]
#[command(long_about = "Watches files and directory trees and prints one templated line per change event. \
Paths can mix folders and files; the default is '.'. The usual use is to react to changes from a pipeline:\n\n    \
on | xargs -n1 -I{} <program>")]
pub struct Cli {
    /// Files or directories to watch
    #[arg(value_name = "PATH", help = "Paths to watch (defaults to current directory)")]
    pub paths: Vec<PathBuf>,

    /// Output template rendered for each event
    #[arg(short, long, default_value = DEFAULT_TEMPLATE, help = "Output template, fields: {{.Name}} and {{.Op}}")]
    pub template: String,

    /// Event kinds to report
    #[arg(
        short,
        long,
        default_value = "15",
        value_parser = parse_mask,
        help = "Event bitmask (create=1, write=2, remove=4, rename=8, chmod=16) or names like create|write"
    )]
    pub mask: Op,

    /// Emit JSON lines instead of the template
    #[arg(long, conflicts_with = "template", help = "Print each event as a JSON object")]
    pub json: bool,

    /// Watch backend
    #[arg(long, value_enum, default_value = "native", help = "File watching mode")]
    pub mode: WatchMode,

    /// Polling interval in milliseconds (for polling mode)
    #[arg(long, default_value = "1000", help = "Polling interval in ms")]
    pub poll_interval: u64,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable debug logging on stderr")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchMode {
    /// Use native file system events
    Native,
    /// Use polling-based watching
    Polling,
}

fn parse_mask(s: &str) -> Result<Op, String> {
    s.parse::<Op>().map_err(|err| err.to_string())
}

impl Cli {
    /// Positional paths, or the current directory when none were given.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        if self.paths.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.paths.clone()
        }
    }

    /// Logs go to stderr so stdout carries nothing but event lines.
    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            template: DEFAULT_TEMPLATE.to_string(),
            mask: Op::DEFAULT_MASK,
            json: false,
            mode: WatchMode::Native,
            poll_interval: 1000,
            verbose: false,
        }
    }
}
