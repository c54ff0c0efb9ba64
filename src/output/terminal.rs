//! Colored terminal output

use std::path::Path;

use anyhow::Result;
use tabled::builder::Builder;
use tabled::settings::Style;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::verify::{FidelityReport, RoundTripReport, RoundTripStatus};

use super::ReportFormatter;

/// Terminal output with colors
pub struct TerminalOutput;

impl TerminalOutput {
    pub fn new() -> Self {
        Self
    }

    fn write_header(&self, writer: &mut dyn WriteColor, source: &Path) -> Result<()> {
        writeln!(writer, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(writer, " tabconv verify: {}", source.display())?;
        writeln!(writer, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(writer)?;
        Ok(())
    }

    fn write_status(&self, writer: &mut dyn WriteColor, label: &str, color: Color) -> Result<()> {
        writer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(writer, "{}", label)?;
        writer.reset()?;
        Ok(())
    }

    fn write_report(&self, writer: &mut dyn WriteColor, report: &RoundTripReport) -> Result<()> {
        write!(writer, "[{}] ", report.format)?;

        match &report.status {
            RoundTripStatus::Failed { kind, error } => {
                self.write_status(writer, "FAILED", Color::Red)?;
                writeln!(writer, " ({})", kind)?;
                writeln!(writer, "  {}", error)?;
            }
            RoundTripStatus::Completed { report: fidelity } => {
                if fidelity.is_lossless() {
                    self.write_status(writer, "lossless", Color::Green)?;
                } else {
                    self.write_status(writer, "differences found", Color::Yellow)?;
                }
                writeln!(writer)?;
                self.write_fidelity(writer, fidelity)?;
            }
        }

        writeln!(writer)?;
        Ok(())
    }

    fn write_fidelity(&self, writer: &mut dyn WriteColor, report: &FidelityReport) -> Result<()> {
        writeln!(
            writer,
            "  Rows: {} → {} (delta {:+})",
            report.rows_before, report.rows_after, report.row_delta
        )?;

        let schema = &report.schema;
        write_list(writer, "Type changes", &schema.dtype_changes)?;
        write_list(writer, "Category mismatches", &schema.category_mismatches)?;
        write_list(writer, "Renamed columns", &schema.renamed_columns)?;
        write_list(writer, "Missing columns", &schema.missing_columns)?;
        write_list(writer, "Extra columns", &schema.extra_columns)?;

        if report.value_diffs.is_empty() {
            return Ok(());
        }

        writeln!(writer, "  Value mismatches:")?;
        for diff in &report.value_diffs {
            writeln!(
                writer,
                "    {}: {} mismatching row(s), showing {}",
                diff.column,
                diff.mismatch_count,
                diff.samples.len()
            )?;
        }

        let mut builder = Builder::default();
        builder.push_record(["column", "row", "before", "after"]);
        for diff in &report.value_diffs {
            for sample in &diff.samples {
                builder.push_record([
                    diff.column.clone(),
                    sample.row.to_string(),
                    sample.before.clone(),
                    sample.after.clone(),
                ]);
            }
        }
        let mut table = builder.build();
        table.with(Style::modern());
        writeln!(writer, "{}", table)?;

        Ok(())
    }
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for TerminalOutput {
    fn render(
        &self,
        source: &Path,
        reports: &[RoundTripReport],
        writer: &mut dyn WriteColor,
    ) -> Result<()> {
        self.write_header(writer, source)?;

        if reports.is_empty() {
            writeln!(writer, "No formats selected.")?;
            return Ok(());
        }

        for report in reports {
            self.write_report(writer, report)?;
        }

        Ok(())
    }
}

fn write_list<T: std::fmt::Display>(
    writer: &mut dyn WriteColor,
    title: &str,
    items: &[T],
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    writeln!(writer, "  {}:", title)?;
    for item in items {
        writeln!(writer, "    {}", item)?;
    }
    Ok(())
}
