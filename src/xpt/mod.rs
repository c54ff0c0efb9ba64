//! SAS Transport (XPT) version 5 library files
//!
//! A minimal single-member reader and writer. Both work on filesystem paths;
//! in-memory callers stage bytes through [`crate::staging::StagedFile`].

mod header;
mod ibm;
mod reader;
mod writer;

use chrono::NaiveDateTime;
use thiserror::Error;

pub use header::{truncate_bytes, LIBRARY_HEADER_PREFIX, RECORD_LEN};
pub use reader::read_xpt;
pub use writer::{write_xpt, XptWriter};

/// Longest character variable a V5 file can hold
pub const MAX_CHAR_LEN: usize = 200;

/// Longest variable or member label
pub const MAX_LABEL_LEN: usize = 40;

/// Errors raised while reading or writing transport files
#[derive(Debug, Error)]
pub enum XptError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid transport file: {0}")]
    InvalidFormat(String),

    #[error("missing {0} header record")]
    MissingHeader(&'static str),

    #[error("invalid NAMESTR record {index}: {message}")]
    InvalidNamestr { index: usize, message: String },

    #[error("invalid name {0:?}: must be 1-8 characters of A-Z, 0-9 or _")]
    InvalidName(String),

    #[error("duplicate variable name {0:?}")]
    DuplicateVariable(String),

    #[error("a transport member needs at least one variable")]
    NoVariables,

    #[error("variable {variable:?} is {length} bytes long, limit is 200")]
    ValueTooLong { variable: String, length: usize },

    #[error("variable {variable:?} holds {value}, outside the IBM float range")]
    NumericOverflow { variable: String, value: f64 },

    #[error("row {row} has {actual} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("observation data ends with non-blank partial row")]
    TrailingBytes,
}

pub type Result<T> = std::result::Result<T, XptError>;

/// Variable storage type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XptType {
    Num,
    Char,
}

impl XptType {
    pub fn from_ntype(ntype: i16) -> Option<Self> {
        match ntype {
            1 => Some(XptType::Num),
            2 => Some(XptType::Char),
            _ => None,
        }
    }

    pub fn ntype(self) -> i16 {
        match self {
            XptType::Num => 1,
            XptType::Char => 2,
        }
    }
}

/// One variable descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XptColumn {
    pub name: String,
    pub label: Option<String>,
    pub data_type: XptType,
    /// Bytes per observation; always 8 for numerics
    pub length: u16,
    pub format: Option<String>,
    pub format_length: u16,
    pub format_decimals: u16,
}

impl XptColumn {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            data_type: XptType::Num,
            length: 8,
            format: None,
            format_length: 0,
            format_decimals: 0,
        }
    }

    pub fn character(name: impl Into<String>, length: u16) -> Self {
        Self {
            data_type: XptType::Char,
            length,
            ..Self::numeric(name)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>, length: u16, decimals: u16) -> Self {
        self.format = Some(format.into());
        self.format_length = length;
        self.format_decimals = decimals;
        self
    }

    /// Whether the display format marks seconds since 1960
    pub fn is_datetime(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.to_ascii_uppercase().starts_with("DATETIME"))
    }

    /// Whether the display format marks days since 1960
    pub fn is_date(&self) -> bool {
        self.format.as_deref().is_some_and(|f| {
            let f = f.to_ascii_uppercase();
            f.starts_with("DATE") && !f.starts_with("DATETIME")
        })
    }
}

/// One observation value; numeric `None` is a SAS missing value
#[derive(Debug, Clone, PartialEq)]
pub enum XptValue {
    Num(Option<f64>),
    Char(String),
}

/// A single transport member
#[derive(Debug, Clone, PartialEq)]
pub struct XptDataset {
    pub name: String,
    pub label: Option<String>,
    pub columns: Vec<XptColumn>,
    pub rows: Vec<Vec<XptValue>>,
}

impl XptDataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Bytes per observation
    pub fn observation_length(&self) -> usize {
        self.columns.iter().map(|c| c.length as usize).sum()
    }
}

/// Header metadata written into a transport file
#[derive(Debug, Clone)]
pub struct XptWriterOptions {
    pub sas_version: String,
    pub os_name: String,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
}

impl XptWriterOptions {
    /// Options with both stamps set to `timestamp`
    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self {
            sas_version: "9.4".to_string(),
            os_name: "RUST".to_string(),
            created: timestamp,
            modified: timestamp,
        }
    }
}

/// 1960-01-01T00:00:00, the transport date/time epoch
pub fn sas_epoch() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(1960, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        let dt = XptColumn::numeric("ADTM").with_format("DATETIME", 20, 0);
        assert!(dt.is_datetime());
        assert!(!dt.is_date());

        let d = XptColumn::numeric("ADT").with_format("DATE9", 9, 0);
        assert!(d.is_date());
        assert!(!d.is_datetime());

        assert!(!XptColumn::numeric("AGE").is_date());
    }

    #[test]
    fn test_sas_epoch() {
        assert_eq!(sas_epoch().to_string(), "1960-01-01 00:00:00");
    }
}
