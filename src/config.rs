//! Resolved runtime settings.
//!
//! `Settings` is what the binary actually runs with: command-line values after
//! defaults are applied and cross-field checks have passed.

use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{Cli, WatchMode};
use crate::error::TemplateError;
use crate::events::Op;
use crate::render::{Renderer, Template, DEFAULT_TEMPLATE};
use crate::watcher::Backend;

/// How accepted events are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Template,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Paths to register, in the order given
    pub paths: Vec<PathBuf>,
    /// Template source, compiled by [`Settings::renderer`]
    pub template: String,
    /// Event kinds that get printed
    pub mask: Op,
    pub format: OutputFormat,
    pub backend: Backend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(".")],
            template: DEFAULT_TEMPLATE.to_string(),
            mask: Op::DEFAULT_MASK,
            format: OutputFormat::Template,
            backend: Backend::Native,
        }
    }
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Self {
        let backend = match cli.mode {
            WatchMode::Native => Backend::Native,
            WatchMode::Polling => Backend::Poll {
                interval: Duration::from_millis(cli.poll_interval),
            },
        };
        let format = if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Template
        };

        Self {
            paths: cli.watch_paths(),
            template: cli.template.clone(),
            mask: cli.mask,
            format,
            backend,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.paths.is_empty() {
            return Err("at least one path is required".to_string());
        }

        if let Backend::Poll { interval } = self.backend {
            if interval.is_zero() {
                return Err("poll interval must be greater than 0".to_string());
            }
        }

        if self.mask.is_empty() {
            tracing::warn!("mask 0 matches no events, nothing will be printed");
        } else if !Op::all().contains(self.mask) {
            tracing::warn!(
                "mask {} has bits no event kind uses",
                self.mask.bits()
            );
        }

        Ok(())
    }

    /// Compiles the output template, or picks the JSON renderer.
    pub fn renderer(&self) -> Result<Renderer, TemplateError> {
        match self.format {
            OutputFormat::Template => Ok(Renderer::Template(Template::compile(&self.template)?)),
            OutputFormat::Json => Ok(Renderer::Json),
        }
    }
}
