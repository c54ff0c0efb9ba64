//! Error types for conversion and table construction

use std::path::PathBuf;

use thiserror::Error;

use crate::config::DataFormat;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised at the conversion boundary
#[derive(Debug, Error)]
pub enum ConvertError {
    /// File extension is not one of the supported formats
    #[error("unsupported format: {extension:?}")]
    UnsupportedFormat { extension: String },

    /// Source bytes do not parse as the claimed format
    #[error("failed to decode {format}: {message}")]
    Decode {
        format: DataFormat,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Table cannot be serialized to the target format
    #[error("failed to encode {format}: {message}")]
    Encode {
        format: DataFormat,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Transient staging file could not be created, written or read
    #[error("staging file {operation} failed ({})", display_path(.path))]
    Resource {
        operation: &'static str,
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    pub fn unsupported(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }

    pub fn decode(format: DataFormat, message: impl Into<String>) -> Self {
        Self::Decode {
            format,
            message: message.into(),
            source: None,
        }
    }

    pub fn decode_with<E>(format: DataFormat, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Decode {
            format,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn encode(format: DataFormat, message: impl Into<String>) -> Self {
        Self::Encode {
            format,
            message: message.into(),
            source: None,
        }
    }

    pub fn encode_with<E>(format: DataFormat, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Encode {
            format,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn resource(operation: &'static str, path: Option<PathBuf>, source: std::io::Error) -> Self {
        Self::Resource {
            operation,
            path,
            source,
        }
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::UnsupportedFormat { .. } => "unsupported_format",
            ConvertError::Decode { .. } => "decode",
            ConvertError::Encode { .. } => "encode",
            ConvertError::Resource { .. } => "resource",
        }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map_or_else(|| "<unassigned>".to_string(), |p| p.display().to_string())
}

/// Errors raised while assembling a [`crate::model::Table`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("column {column:?} has {actual} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column name: {0:?}")]
    DuplicateColumn(String),

    #[error("column {column:?} is declared {declared} but row {row} holds a {found} value")]
    TypeMismatch {
        column: String,
        declared: String,
        found: String,
        row: usize,
    },
}
