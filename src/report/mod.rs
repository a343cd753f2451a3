//! Rendering of a finished run.
//!
//! ## Reporter Trait
//!
//! A [`Reporter`] is a pure projection of a [`RunSummary`] into any `io::Write`. Two formats exist:
//!
//! - [`HumanReporter`]: per-file sections with check markers, failure messages and a summary line
//! - [`JsonReporter`]: one JSON record per file (JSON Lines), nothing else
//!
//! Discovery warnings go to stderr through [`write_warnings`] in both modes so stdout stays machine-readable.

mod human;
mod json;

use std::io::{self, IsTerminal, Write};

use checkrun_core::RunSummary;

use crate::config::{ColorChoice, OutputFormat};
use crate::discovery::DiscoveryWarning;

pub use human::HumanReporter;
pub use json::JsonReporter;

/// Renders a run summary.
pub trait Reporter {
    fn render(&self, summary: &RunSummary, out: &mut dyn Write) -> io::Result<()>;
}

/// Build the reporter for `format`. Color only applies to human output.
pub fn reporter_for(format: OutputFormat, color: ColorChoice) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Human => Box::new(HumanReporter::new(use_color(color))),
        OutputFormat::Json => Box::new(JsonReporter),
    }
}

/// Resolve `auto` against whether stdout is a terminal.
pub fn use_color(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stdout().is_terminal(),
    }
}

pub fn write_warnings(warnings: &[DiscoveryWarning], out: &mut dyn Write) -> io::Result<()> {
    for warning in warnings {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(())
}
