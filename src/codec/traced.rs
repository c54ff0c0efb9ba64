//! Tracing wrapper for codecs

use std::time::Instant;

use tracing::{debug, info_span, warn};

use crate::config::DataFormat;
use crate::error::ConvertError;
use crate::model::Table;

use super::Codec;

/// Wraps a codec with spans and timing events
///
/// Only shapes and sizes are recorded, never cell values.
pub struct TracedCodec {
    inner: Box<dyn Codec>,
}

impl TracedCodec {
    pub fn new(inner: Box<dyn Codec>) -> Self {
        Self { inner }
    }
}

impl Codec for TracedCodec {
    fn format(&self) -> DataFormat {
        self.inner.format()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Table, ConvertError> {
        let span = info_span!("decode", format = %self.format(), bytes = bytes.len());
        let _guard = span.enter();
        let start = Instant::now();

        match self.inner.decode(bytes) {
            Ok(table) => {
                debug!(
                    rows = table.row_count(),
                    columns = table.column_count(),
                    duration_ms = start.elapsed().as_millis(),
                    "decode complete"
                );
                Ok(table)
            }
            Err(error) => {
                warn!(
                    kind = error.kind(),
                    error = %error,
                    duration_ms = start.elapsed().as_millis(),
                    "decode failed"
                );
                Err(error)
            }
        }
    }

    fn encode(&self, table: &Table) -> Result<Vec<u8>, ConvertError> {
        let span = info_span!(
            "encode",
            format = %self.format(),
            rows = table.row_count(),
            columns = table.column_count()
        );
        let _guard = span.enter();
        let start = Instant::now();

        match self.inner.encode(table) {
            Ok(bytes) => {
                debug!(
                    bytes = bytes.len(),
                    duration_ms = start.elapsed().as_millis(),
                    "encode complete"
                );
                Ok(bytes)
            }
            Err(error) => {
                warn!(
                    kind = error.kind(),
                    error = %error,
                    duration_ms = start.elapsed().as_millis(),
                    "encode failed"
                );
                Err(error)
            }
        }
    }

    fn stored_names(&self, table: &Table) -> Vec<String> {
        self.inner.stored_names(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CsvCodec;
    use crate::config::CsvMode;
    use crate::model::Column;

    #[test]
    fn test_delegates_to_inner_codec() {
        let traced = TracedCodec::new(Box::new(CsvCodec::new(CsvMode::Literal)));
        assert_eq!(traced.format(), DataFormat::Csv);

        let table = Table::new(vec![Column::strings("A", vec![Some("1")])]).unwrap();
        let bytes = traced.encode(&table).unwrap();
        assert_eq!(bytes, b"A\n1\n");
        assert_eq!(traced.decode(&bytes).unwrap(), table);
    }

    #[test]
    fn test_errors_pass_through() {
        let traced = TracedCodec::new(Box::new(CsvCodec::default()));
        let err = traced.decode(b"A,A\n1,2\n").unwrap_err();
        assert_eq!(err.kind(), "decode");
    }
}
