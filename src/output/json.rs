//! JSON output format

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use termcolor::WriteColor;

use crate::verify::RoundTripReport;

use super::ReportFormatter;

/// JSON output formatter
pub struct JsonOutput {
    pretty: bool,
}

impl JsonOutput {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct JsonVerifyOutput<'a> {
    source: String,
    lossless: bool,
    reports: &'a [RoundTripReport],
}

impl ReportFormatter for JsonOutput {
    fn render(
        &self,
        source: &Path,
        reports: &[RoundTripReport],
        writer: &mut dyn WriteColor,
    ) -> Result<()> {
        let output = JsonVerifyOutput {
            source: source.display().to_string(),
            lossless: reports
                .iter()
                .all(|r| r.fidelity().is_some_and(|f| f.is_lossless())),
            reports,
        };

        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, &output)?;
        } else {
            serde_json::to_writer(&mut *writer, &output)?;
        }
        writeln!(writer)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataFormat;
    use crate::error::ConvertError;
    use termcolor::NoColor;

    #[test]
    fn test_failed_report_renders_kind_and_error() {
        let err = ConvertError::encode(DataFormat::Xpt, "value too long");
        let reports = vec![RoundTripReport::failed(DataFormat::Xpt, &err)];

        let mut out = NoColor::new(Vec::new());
        JsonOutput::compact()
            .render(Path::new("ae.csv"), &reports, &mut out)
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out.into_inner()).unwrap();
        assert_eq!(value["source"], "ae.csv");
        assert_eq!(value["lossless"], false);
        assert_eq!(value["reports"][0]["format"], "xpt");
        assert_eq!(value["reports"][0]["status"], "failed");
        assert_eq!(value["reports"][0]["kind"], "encode");
        assert_eq!(
            value["reports"][0]["error"],
            "failed to encode xpt: value too long"
        );
    }
}
