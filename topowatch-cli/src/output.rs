//! Text and JSON rendering for command reports
//!
//! Handlers build a report value and hand it to [`OutputWriter`]; they never
//! print directly. JSON goes to stdout unchanged so it can be piped into `jq`.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command reports in the format chosen by `--output`.
///
/// ```no_run
/// use topowatch_cli::cli::OutputFormat;
/// use topowatch_cli::output::OutputWriter;
///
/// let writer = OutputWriter::new(OutputFormat::Json);
/// assert_eq!(writer.format(), OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write `report` to stdout.
    pub fn render<T: Render + Serialize>(&self, report: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        self.render_to(report, &mut stdout.lock())
    }

    /// Write `report` to `w`: pretty JSON plus a trailing newline, or the
    /// report's own text layout.
    pub fn render_to<T: Render + Serialize>(
        &self,
        report: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        if self.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut *w, report)?;
            writeln!(w)?;
        } else {
            report.render_text(w)?;
        }
        w.flush()?;
        Ok(())
    }
}

/// Human-readable layout of a report. Every report is also `Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// Format a confidence value as a fixed two-decimal string.
pub(crate) fn confidence(value: f64) -> String {
    format!("{value:.2}")
}

/// Format an optional link speed in human units.
pub(crate) fn speed(bps: Option<u64>) -> String {
    match bps {
        None => "-".to_owned(),
        Some(b) if b >= 1_000_000_000 && b % 1_000_000_000 == 0 => {
            format!("{}G", b / 1_000_000_000)
        }
        Some(b) if b >= 1_000_000 && b % 1_000_000 == 0 => format!("{}M", b / 1_000_000),
        Some(b) => format!("{b}bps"),
    }
}
