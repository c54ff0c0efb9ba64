//! Configuration handling for tabconv

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// One of the three supported table encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Parquet,
    Xpt,
}

impl DataFormat {
    /// All formats, in verification order
    pub const ALL: [DataFormat; 3] = [DataFormat::Csv, DataFormat::Parquet, DataFormat::Xpt];

    /// Canonical file extension (without the dot)
    pub fn extension(self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Parquet => "parquet",
            DataFormat::Xpt => "xpt",
        }
    }

    /// Match a file extension, case-insensitively
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(DataFormat::Csv),
            "parquet" | "pq" => Some(DataFormat::Parquet),
            "xpt" => Some(DataFormat::Xpt),
            _ => None,
        }
    }

    /// Determine the format of a file from its extension
    pub fn from_path(path: &Path) -> Result<Self, ConvertError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| ConvertError::unsupported(ext))
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("Unknown data format: {}", s))
    }
}

/// How CSV fields are turned into typed cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CsvMode {
    /// Every field is a literal string; empty fields stay empty strings
    #[default]
    Literal,
    /// Literal strings, but bare empty fields are null and `""` is the empty string
    NullAware,
    /// Infer booleans, numbers and timestamps like a generic tabular reader
    Infer,
}

impl std::str::FromStr for CsvMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "literal" => Ok(CsvMode::Literal),
            "null-aware" | "null_aware" => Ok(CsvMode::NullAware),
            "infer" => Ok(CsvMode::Infer),
            _ => Err(format!("Unknown CSV mode: {}", s)),
        }
    }
}

/// Output format for verification reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terminal" => Ok(ReportFormat::Terminal),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

/// Default dataset (member) name written into XPT files
pub const DEFAULT_XPT_DATASET: &str = "DATASET";

/// Default number of mismatching rows sampled per column
pub const DEFAULT_SAMPLE_LIMIT: usize = 10;

/// Configuration for conversion and verification
#[derive(Debug, Clone)]
pub struct Config {
    /// Target format for conversion
    pub target: Option<DataFormat>,
    /// CSV decoding policy
    pub csv_mode: CsvMode,
    /// Report output format
    pub report_format: ReportFormat,
    /// Max mismatching rows reported per column
    pub sample_limit: usize,
    /// Member name written into XPT files
    pub xpt_dataset_name: String,
    /// Created/modified stamp for XPT headers (current time if unset)
    pub xpt_timestamp: Option<NaiveDateTime>,
    /// Directory for transient staging files (system temp dir if unset)
    pub staging_dir: Option<PathBuf>,
    /// Formats exercised by the verifier
    pub verify_formats: Vec<DataFormat>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: None,
            csv_mode: CsvMode::default(),
            report_format: ReportFormat::default(),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            xpt_dataset_name: DEFAULT_XPT_DATASET.to_string(),
            xpt_timestamp: None,
            staging_dir: None,
            verify_formats: DataFormat::ALL.to_vec(),
        }
    }
}

impl Config {
    /// Create a config targeting a format
    pub fn new(target: DataFormat) -> Self {
        Self {
            target: Some(target),
            ..Default::default()
        }
    }

    /// Set the CSV decoding policy
    pub fn with_csv_mode(mut self, mode: CsvMode) -> Self {
        self.csv_mode = mode;
        self
    }

    /// Set report format
    pub fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    /// Set the per-column sample limit
    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Set XPT member name
    pub fn with_xpt_dataset_name(mut self, name: impl Into<String>) -> Self {
        self.xpt_dataset_name = name.into();
        self
    }

    /// Pin XPT header timestamps
    pub fn with_xpt_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.xpt_timestamp = Some(timestamp);
        self
    }

    /// Stage transient files in a specific directory
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Restrict which formats the verifier exercises
    pub fn with_verify_formats(mut self, formats: Vec<DataFormat>) -> Self {
        self.verify_formats = formats;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path_is_case_insensitive() {
        assert_eq!(DataFormat::from_path(Path::new("dm.CSV")).unwrap(), DataFormat::Csv);
        assert_eq!(DataFormat::from_path(Path::new("ae.Xpt")).unwrap(), DataFormat::Xpt);
        assert_eq!(DataFormat::from_path(Path::new("lb.pq")).unwrap(), DataFormat::Parquet);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = DataFormat::from_path(Path::new("dm.xlsx")).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat { ref extension } if extension == "xlsx"));

        let err = DataFormat::from_path(Path::new("README")).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("null-aware".parse::<CsvMode>().unwrap(), CsvMode::NullAware);
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_builder() {
        let config = Config::new(DataFormat::Xpt)
            .with_sample_limit(3)
            .with_verify_formats(vec![DataFormat::Csv]);
        assert_eq!(config.target, Some(DataFormat::Xpt));
        assert_eq!(config.sample_limit, 3);
        assert_eq!(config.verify_formats, vec![DataFormat::Csv]);
        assert_eq!(config.xpt_dataset_name, DEFAULT_XPT_DATASET);
    }
}
