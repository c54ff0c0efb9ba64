//! Output formatting for verification reports

mod json;
mod terminal;

use std::io::IsTerminal;
use std::path::Path;

use anyhow::Result;
use termcolor::{ColorChoice, StandardStream, WriteColor};

use crate::config::ReportFormat;
use crate::verify::RoundTripReport;

pub use json::JsonOutput;
pub use terminal::TerminalOutput;

/// Trait for report formatters
pub trait ReportFormatter {
    /// Render the round-trip reports for `source` to a writer
    fn render(
        &self,
        source: &Path,
        reports: &[RoundTripReport],
        writer: &mut dyn WriteColor,
    ) -> Result<()>;
}

/// Factory for creating report formatters
pub struct OutputFactory;

impl OutputFactory {
    /// Create a report formatter based on format type
    pub fn create(format: ReportFormat) -> Box<dyn ReportFormatter> {
        match format {
            ReportFormat::Terminal => Box::new(TerminalOutput::new()),
            ReportFormat::Json => Box::new(JsonOutput::new()),
        }
    }
}

/// Render reports to stdout
///
/// Colors are used only for terminal reports written to a terminal.
pub fn render_to_stdout(source: &Path, reports: &[RoundTripReport], format: ReportFormat) -> Result<()> {
    let choice = match format {
        ReportFormat::Terminal if std::io::stdout().is_terminal() => ColorChoice::Auto,
        _ => ColorChoice::Never,
    };
    let formatter = OutputFactory::create(format);
    let mut stdout = StandardStream::stdout(choice);
    formatter.render(source, reports, &mut stdout)
}
