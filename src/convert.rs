//! Conversion routing between formats

use std::path::{Path, PathBuf};

use tracing::info;

use crate::codec::codec_for;
use crate::config::{Config, DataFormat};
use crate::error::ConvertError;
use crate::model::Table;

/// Decode bytes with the codec for `format`
pub fn decode(format: DataFormat, bytes: &[u8], config: &Config) -> Result<Table, ConvertError> {
    codec_for(format, config).decode(bytes)
}

/// Encode a table with the codec for `format`
pub fn encode(format: DataFormat, table: &Table, config: &Config) -> Result<Vec<u8>, ConvertError> {
    codec_for(format, config).encode(table)
}

/// Decode with the source codec and encode with the target codec
pub fn convert(
    bytes: &[u8],
    from: DataFormat,
    to: DataFormat,
    config: &Config,
) -> Result<Vec<u8>, ConvertError> {
    let table = decode(from, bytes, config)?;
    let output = encode(to, &table, config)?;

    info!(
        from = %from,
        to = %to,
        rows = table.row_count(),
        columns = table.column_count(),
        bytes_in = bytes.len(),
        bytes_out = output.len(),
        "conversion complete"
    );

    Ok(output)
}

/// Output file name: the source extension is replaced by the target's
///
/// Only a supported extension (matched case-insensitively) is replaced;
/// any other name gets the target extension appended.
pub fn output_file_name(source: &Path, target: DataFormat) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let has_known_extension = source
        .extension()
        .and_then(|e| e.to_str())
        .and_then(DataFormat::from_extension)
        .is_some();

    let name = if has_known_extension {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}.{}", stem, target.extension())
    } else {
        format!("{}.{}", file_name, target.extension())
    };

    source.with_file_name(name)
}
