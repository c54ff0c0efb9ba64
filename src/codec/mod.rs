//! Codec layer: one encoder/decoder pair per supported format

mod csv;
mod parquet;
mod traced;
mod xpt;

use std::path::Path;

use crate::config::{Config, DataFormat};
use crate::error::ConvertError;
use crate::model::Table;
use crate::xpt::LIBRARY_HEADER_PREFIX;

pub use self::csv::CsvCodec;
pub use self::parquet::ParquetCodec;
pub use self::traced::TracedCodec;
pub use self::xpt::{XptCodec, XptOptions};

/// Encoder/decoder pair for one table format
///
/// Implementations are pure with respect to their inputs: `decode` builds a
/// fresh [`Table`] from bytes and `encode` never mutates the table it is given.
pub trait Codec: Send + Sync {
    /// Format handled by this codec
    fn format(&self) -> DataFormat;

    /// Parse bytes into a table
    fn decode(&self, bytes: &[u8]) -> Result<Table, ConvertError>;

    /// Serialize a table into bytes
    fn encode(&self, table: &Table) -> Result<Vec<u8>, ConvertError>;

    /// Column names as this format will store them, positionally aligned
    /// with `table`'s columns
    fn stored_names(&self, table: &Table) -> Vec<String> {
        table.column_names().into_iter().map(str::to_string).collect()
    }
}

/// Build the codec for a format, wrapped with tracing
pub fn codec_for(format: DataFormat, config: &Config) -> Box<dyn Codec> {
    let codec: Box<dyn Codec> = match format {
        DataFormat::Csv => Box::new(CsvCodec::new(config.csv_mode)),
        DataFormat::Parquet => Box::new(ParquetCodec::new()),
        DataFormat::Xpt => Box::new(XptCodec::new(XptOptions::from(config))),
    };
    Box::new(TracedCodec::new(codec))
}

/// Set of codecs selected by format tag
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecRegistry {
    /// Create a registry with all supported codecs
    pub fn new(config: &Config) -> Self {
        Self {
            codecs: DataFormat::ALL
                .iter()
                .map(|&format| codec_for(format, config))
                .collect(),
        }
    }

    /// Create a registry from explicit codecs
    pub fn from_codecs(codecs: Vec<Box<dyn Codec>>) -> Self {
        Self { codecs }
    }

    /// Get the codec for a format
    pub fn get(&self, format: DataFormat) -> Result<&dyn Codec, ConvertError> {
        self.codecs
            .iter()
            .find(|c| c.format() == format)
            .map(|c| c.as_ref())
            .ok_or_else(|| ConvertError::unsupported(format.extension()))
    }

    /// Get the codec for a file path, by extension
    pub fn for_path(&self, path: &Path) -> Result<&dyn Codec, ConvertError> {
        self.get(DataFormat::from_path(path)?)
    }

    pub fn decode(&self, format: DataFormat, bytes: &[u8]) -> Result<Table, ConvertError> {
        self.get(format)?.decode(bytes)
    }

    pub fn encode(&self, format: DataFormat, table: &Table) -> Result<Vec<u8>, ConvertError> {
        self.get(format)?.encode(table)
    }
}

/// Detect format from content (for files without extension)
pub fn sniff_format(bytes: &[u8]) -> DataFormat {
    if bytes.starts_with(b"PAR1") {
        return DataFormat::Parquet;
    }

    if bytes.starts_with(LIBRARY_HEADER_PREFIX.as_bytes()) {
        return DataFormat::Xpt;
    }

    DataFormat::Csv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_selects_by_tag() {
        let registry = CodecRegistry::new(&Config::default());
        for format in DataFormat::ALL {
            assert_eq!(registry.get(format).unwrap().format(), format);
        }
        assert_eq!(
            registry.for_path(Path::new("dm.XPT")).unwrap().format(),
            DataFormat::Xpt
        );
        assert!(registry.for_path(Path::new("dm.sas7bdat")).is_err());
    }

    #[test]
    fn test_registry_missing_codec() {
        let registry = CodecRegistry::from_codecs(vec![Box::new(ParquetCodec::new())]);
        match registry.get(DataFormat::Csv) {
            Err(err) => assert!(matches!(err, ConvertError::UnsupportedFormat { .. })),
            Ok(codec) => panic!("unexpected codec for {}", codec.format()),
        }
        assert!(registry.get(DataFormat::Parquet).is_ok());
    }

    #[test]
    fn test_sniff_format() {
        assert_eq!(sniff_format(b"PAR1\x15\x04"), DataFormat::Parquet);
        assert_eq!(sniff_format(b"USUBJID,AGE\n"), DataFormat::Csv);

        let mut xpt = LIBRARY_HEADER_PREFIX.as_bytes().to_vec();
        xpt.extend_from_slice(b"000000000000000000000000000000  ");
        assert_eq!(sniff_format(&xpt), DataFormat::Xpt);
    }
}
