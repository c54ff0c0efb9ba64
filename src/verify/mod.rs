//! Round-trip fidelity verification
//!
//! Each format encodes the table and decodes it again; the copy is compared
//! with the original at schema and value level. Findings are reported, never
//! raised: a failing format yields a `failed` report and the others still run.

mod schema_diff;
mod value_diff;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::codec::{Codec, CodecRegistry};
use crate::config::{Config, DataFormat};
use crate::error::ConvertError;
use crate::model::Table;

pub use schema_diff::{
    CategoryMismatch, ColumnMatch, DtypeChange, RenamedColumn, SchemaDiff, SchemaReport,
};
pub use value_diff::{
    comparison_key, ColumnValueDiff, ValueComparator, ValueMismatch, NA_SENTINEL,
};

/// Findings for one completed round trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FidelityReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub row_delta: i64,
    pub schema: SchemaReport,
    pub value_diffs: Vec<ColumnValueDiff>,
}

impl FidelityReport {
    /// Build the report for an original table and its round-tripped copy
    pub fn compare(before: &Table, after: &Table, stored_names: &[String], sample_limit: usize) -> Self {
        let (schema, matches) = SchemaDiff::compare(before, after, stored_names);
        let value_diffs = ValueComparator::new(sample_limit).compare_all(&matches);

        Self {
            rows_before: before.row_count(),
            rows_after: after.row_count(),
            row_delta: after.row_count() as i64 - before.row_count() as i64,
            schema,
            value_diffs,
        }
    }

    /// Same rows, clean schema, no value mismatch
    pub fn is_lossless(&self) -> bool {
        self.row_delta == 0 && self.schema.is_clean() && self.value_diffs.is_empty()
    }

    /// Total mismatching cells across all columns
    pub fn mismatch_count(&self) -> usize {
        self.value_diffs.iter().map(|d| d.mismatch_count).sum()
    }
}

/// Outcome of one format's round trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RoundTripStatus {
    Completed { report: FidelityReport },
    Failed { kind: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTripReport {
    pub format: DataFormat,
    #[serde(flatten)]
    pub status: RoundTripStatus,
}

impl RoundTripReport {
    pub fn completed(format: DataFormat, report: FidelityReport) -> Self {
        Self {
            format,
            status: RoundTripStatus::Completed { report },
        }
    }

    pub fn failed(format: DataFormat, error: &ConvertError) -> Self {
        Self {
            format,
            status: RoundTripStatus::Failed {
                kind: error.kind().to_string(),
                error: error_chain(error),
            },
        }
    }

    /// Report for a completed round trip, `None` if the format failed
    pub fn fidelity(&self) -> Option<&FidelityReport> {
        match &self.status {
            RoundTripStatus::Completed { report } => Some(report),
            RoundTripStatus::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RoundTripStatus::Failed { .. })
    }
}

/// Error message followed by its source chain, `: `-separated
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Runs round trips through a set of codecs
pub struct Verifier {
    registry: CodecRegistry,
    formats: Vec<DataFormat>,
    sample_limit: usize,
}

impl Verifier {
    /// Verifier over every codec, checking the formats the config selects
    pub fn new(config: &Config) -> Self {
        Self::with_registry(
            CodecRegistry::new(config),
            config.verify_formats.clone(),
            config.sample_limit,
        )
    }

    pub fn with_registry(registry: CodecRegistry, formats: Vec<DataFormat>, sample_limit: usize) -> Self {
        Self {
            registry,
            formats,
            sample_limit,
        }
    }

    /// Round-trip `table` through one format
    pub fn verify(&self, format: DataFormat, table: &Table) -> RoundTripReport {
        let span = info_span!(
            "verify",
            format = %format,
            rows = table.row_count(),
            columns = table.column_count()
        );
        let _guard = span.enter();
        let start = Instant::now();

        let result = self
            .registry
            .get(format)
            .and_then(|codec| self.round_trip(codec, table));

        match result {
            Ok(report) => {
                info!(
                    row_delta = report.row_delta,
                    dtype_changes = report.schema.dtype_changes.len(),
                    mismatches = report.mismatch_count(),
                    lossless = report.is_lossless(),
                    duration_ms = start.elapsed().as_millis(),
                    "round trip verified"
                );
                RoundTripReport::completed(format, report)
            }
            Err(error) => {
                warn!(
                    kind = error.kind(),
                    error = %error,
                    duration_ms = start.elapsed().as_millis(),
                    "round trip failed"
                );
                RoundTripReport::failed(format, &error)
            }
        }
    }

    /// Round-trip `table` through every configured format, in order
    pub fn verify_all(&self, table: &Table) -> Vec<RoundTripReport> {
        self.formats
            .iter()
            .map(|&format| self.verify(format, table))
            .collect()
    }

    fn round_trip(&self, codec: &dyn Codec, table: &Table) -> Result<FidelityReport, ConvertError> {
        let bytes = codec.encode(table)?;
        let decoded = codec.decode(&bytes)?;
        let stored_names = codec.stored_names(table);
        Ok(FidelityReport::compare(table, &decoded, &stored_names, self.sample_limit))
    }
}

/// Round-trip `table` through `format` with codecs built from `config`
pub fn verify_round_trip(format: DataFormat, table: &Table, config: &Config) -> RoundTripReport {
    Verifier::new(config).verify(format, table)
}

/// Round-trip `table` through every format in `config.verify_formats`
pub fn verify_all(table: &Table, config: &Config) -> Vec<RoundTripReport> {
    Verifier::new(config).verify_all(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CsvCodec, ParquetCodec};
    use crate::config::CsvMode;
    use crate::model::{Column, DtypeCategory, LogicalType};

    fn sample_table() -> Table {
        Table::new(vec![
            Column::strings("Subject ID", vec![Some("01-001"), Some("01-002"), Some("01-003")]),
            Column::integers("age", vec![Some(34), None, Some(51)]),
            Column::strings("comment", vec![Some(""), Some("0"), None]),
        ])
        .unwrap()
    }

    #[test]
    fn test_parquet_round_trip_is_lossless() {
        let report = verify_round_trip(DataFormat::Parquet, &sample_table(), &Config::default());
        let fidelity = report.fidelity().unwrap();
        assert!(fidelity.is_lossless(), "{:?}", fidelity);
        assert_eq!(fidelity.rows_before, 3);
    }

    #[test]
    fn test_literal_csv_reports_type_changes() {
        let config = Config::default().with_csv_mode(CsvMode::Literal);
        let report = verify_round_trip(DataFormat::Csv, &sample_table(), &config);
        let fidelity = report.fidelity().unwrap();

        assert_eq!(fidelity.row_delta, 0);
        assert!(fidelity.schema.dtype_changes.iter().any(|c| c.column == "age"
            && c.before == LogicalType::Integer
            && c.after == LogicalType::String));

        // Null age and null comment both come back as empty strings
        let age = fidelity.value_diffs.iter().find(|d| d.column == "age").unwrap();
        assert_eq!(age.mismatch_count, 1);
        assert_eq!(age.samples[0].before, NA_SENTINEL);
        assert_eq!(age.samples[0].after, "");
    }

    #[test]
    fn test_xpt_matches_through_sanitized_names() {
        let report = verify_round_trip(DataFormat::Xpt, &sample_table(), &Config::default());
        let fidelity = report.fidelity().unwrap();

        assert!(fidelity.schema.missing_columns.is_empty());
        assert!(fidelity.schema.extra_columns.is_empty());
        let renamed: Vec<&str> = fidelity
            .schema
            .renamed_columns
            .iter()
            .map(|r| r.stored.as_str())
            .collect();
        assert_eq!(renamed, vec!["SUBJECT_", "AGE", "COMMENT"]);

        // Integers come back as floats but stay numeric and equal
        assert!(fidelity.value_diffs.iter().all(|d| d.column != "age"));
        assert!(fidelity
            .schema
            .category_mismatches
            .iter()
            .all(|m| m.before != DtypeCategory::Numeric));
    }

    #[test]
    fn test_failing_format_does_not_stop_the_others() {
        let config = Config::default().with_staging_dir("/nonexistent/tabconv-staging");
        let reports = verify_all(&sample_table(), &config);

        let formats: Vec<DataFormat> = reports.iter().map(|r| r.format).collect();
        assert_eq!(formats, DataFormat::ALL.to_vec());

        let xpt = &reports[2];
        match &xpt.status {
            RoundTripStatus::Failed { kind, error } => {
                assert_eq!(kind, "resource");
                assert!(error.contains("/nonexistent/tabconv-staging"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(reports[0].fidelity().is_some());
        assert!(reports[1].fidelity().unwrap().is_lossless());
    }

    #[test]
    fn test_missing_codec_is_a_failed_report() {
        let registry = CodecRegistry::from_codecs(vec![
            Box::new(CsvCodec::new(CsvMode::NullAware)),
            Box::new(ParquetCodec::new()),
        ]);
        let verifier = Verifier::with_registry(registry, DataFormat::ALL.to_vec(), 5);
        let reports = verifier.verify_all(&sample_table());

        assert_eq!(reports.len(), 3);
        assert!(!reports[0].is_failed());
        assert!(!reports[1].is_failed());
        assert!(reports[2].is_failed());
    }

    #[test]
    fn test_report_serializes_with_status_tag() {
        let report = verify_round_trip(DataFormat::Parquet, &sample_table(), &Config::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["format"], "parquet");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["report"]["row_delta"], 0);
    }
}
