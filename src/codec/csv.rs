//! CSV codec

use rustc_hash::FxHashSet;

use crate::config::{CsvMode, DataFormat};
use crate::error::ConvertError;
use crate::model::{CellValue, Column, LogicalType, Table};

use super::Codec;

const DELIMITER: u8 = b',';
const QUOTE: u8 = b'"';

/// Codec for comma-separated text
pub struct CsvCodec {
    mode: CsvMode,
}

impl CsvCodec {
    pub fn new(mode: CsvMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> CsvMode {
        self.mode
    }
}

impl Default for CsvCodec {
    fn default() -> Self {
        Self::new(CsvMode::default())
    }
}

impl Codec for CsvCodec {
    fn format(&self) -> DataFormat {
        DataFormat::Csv
    }

    fn decode(&self, bytes: &[u8]) -> Result<Table, ConvertError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);

        // Read headers
        let headers = csv_reader
            .headers()
            .map_err(|e| ConvertError::decode_with(DataFormat::Csv, "failed to read CSV header", e))?
            .clone();

        let names: Vec<String> = headers.iter().map(str::to_string).collect();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for name in &names {
            if !seen.insert(name) {
                return Err(ConvertError::decode(
                    DataFormat::Csv,
                    format!("duplicate header name {:?}", name),
                ));
            }
        }

        let mut cells: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];

        // Read rows
        for (line_num, result) in csv_reader.records().enumerate() {
            // +2 for 1-indexing and header
            let record = result.map_err(|e| {
                ConvertError::decode_with(
                    DataFormat::Csv,
                    format!("failed to read CSV row {}", line_num + 2),
                    e,
                )
            })?;

            let quoted = match self.mode {
                CsvMode::NullAware => record
                    .position()
                    .and_then(|pos| bytes.get(pos.byte() as usize..))
                    .map(quoted_fields)
                    .filter(|q| q.len() == record.len()),
                _ => None,
            };

            for (idx, field) in record.iter().enumerate() {
                let value = match self.mode {
                    CsvMode::Literal => CellValue::String(field.to_string()),
                    // Without quoting information an empty field stays an empty string
                    CsvMode::NullAware => {
                        let was_quoted = quoted.as_ref().map_or(true, |q| q[idx]);
                        if field.is_empty() && !was_quoted {
                            CellValue::Null
                        } else {
                            CellValue::String(field.to_string())
                        }
                    }
                    CsvMode::Infer => parse_cell_value(field),
                };
                cells[idx].push(value);
            }
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, values)| match self.mode {
                CsvMode::Infer => build_inferred_column(name, values),
                CsvMode::Literal | CsvMode::NullAware => {
                    Column::new(name, LogicalType::String, values)
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConvertError::decode_with(DataFormat::Csv, "invalid column", e))?;

        Table::new(columns)
            .map_err(|e| ConvertError::decode_with(DataFormat::Csv, "invalid table", e))
    }

    fn encode(&self, table: &Table) -> Result<Vec<u8>, ConvertError> {
        let mut out = Vec::new();
        if table.column_count() == 0 {
            return Ok(out);
        }

        let header: Vec<Option<&str>> = table.column_names().into_iter().map(Some).collect();
        write_record(&mut out, &header);

        let mut row: Vec<Option<String>> = Vec::with_capacity(table.column_count());
        for row_idx in 0..table.row_count() {
            row.clear();
            for column in table.columns() {
                let value = column.get(row_idx).unwrap_or(&CellValue::Null);
                row.push(value.canonical().map(|s| s.into_owned()));
            }
            let fields: Vec<Option<&str>> = row.iter().map(|f| f.as_deref()).collect();
            write_record(&mut out, &fields);
        }

        Ok(out)
    }
}

/// Write one record; `None` is a bare empty field, `Some("")` is written as `""`
///
/// A single null field is also written as `""`, since a blank line is not a record.
fn write_record(out: &mut Vec<u8>, fields: &[Option<&str>]) {
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            out.push(DELIMITER);
        }
        match field {
            None if fields.len() > 1 => {}
            None => out.extend_from_slice(b"\"\""),
            Some(text) => write_field(out, text),
        }
    }
    out.push(b'\n');
}

fn write_field(out: &mut Vec<u8>, text: &str) {
    let needs_quotes = text.is_empty()
        || text
            .bytes()
            .any(|b| b == DELIMITER || b == QUOTE || b == b'\n' || b == b'\r');

    if !needs_quotes {
        out.extend_from_slice(text.as_bytes());
        return;
    }

    out.push(QUOTE);
    for b in text.bytes() {
        if b == QUOTE {
            out.push(QUOTE);
        }
        out.push(b);
    }
    out.push(QUOTE);
}

/// For each field of the first record in `raw`, whether it was quoted
fn quoted_fields(raw: &[u8]) -> Vec<bool> {
    let mut quoted = Vec::new();
    let mut at_field_start = true;
    let mut in_quotes = false;
    let mut i = 0;

    while i < raw.len() {
        let b = raw[i];
        if in_quotes {
            if b == QUOTE {
                if raw.get(i + 1) == Some(&QUOTE) {
                    i += 1;
                } else {
                    in_quotes = false;
                }
            }
        } else if at_field_start {
            at_field_start = false;
            if b == QUOTE {
                quoted.push(true);
                in_quotes = true;
            } else {
                quoted.push(false);
                // Re-examine this byte as field content
                continue;
            }
        } else if b == DELIMITER {
            at_field_start = true;
        } else if b == b'\n' || b == b'\r' {
            break;
        }
        i += 1;
    }

    if at_field_start {
        quoted.push(false);
    }

    quoted
}

/// Parse a string value into a CellValue with type inference
fn parse_cell_value(s: &str) -> CellValue {
    let trimmed = s.trim();

    // Check for empty/null
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed == "NA" {
        return CellValue::Null;
    }

    // Try parsing as boolean
    if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("yes") {
        return CellValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("no") {
        return CellValue::Bool(false);
    }

    // Try parsing as integer
    if let Ok(i) = trimmed.parse::<i64>() {
        return CellValue::Int(i);
    }

    // Try parsing as float
    if let Ok(f) = trimmed.parse::<f64>() {
        return CellValue::Float(f);
    }

    // Try parsing as datetime (ISO 8601)
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, layout) {
            return CellValue::DateTime(dt);
        }
    }

    // Dates become midnight timestamps
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return CellValue::DateTime(date.and_time(chrono::NaiveTime::MIN));
    }

    // Default to string
    CellValue::String(s.to_string())
}

/// Build a column whose type is widened from its values
fn build_inferred_column(
    name: String,
    values: Vec<CellValue>,
) -> Result<Column, crate::error::TableError> {
    let inferred = values
        .iter()
        .filter_map(CellValue::logical_type)
        .reduce(LogicalType::widen)
        .unwrap_or(LogicalType::String);

    let values = if inferred == LogicalType::Float {
        values
            .into_iter()
            .map(|v| match v {
                CellValue::Int(i) => CellValue::Float(i as f64),
                other => other,
            })
            .collect()
    } else {
        values
    };

    Column::new(name, inferred, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(mode: CsvMode, text: &str) -> Table {
        CsvCodec::new(mode).decode(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_cell_value() {
        assert_eq!(parse_cell_value(""), CellValue::Null);
        assert_eq!(parse_cell_value("null"), CellValue::Null);
        assert_eq!(parse_cell_value("true"), CellValue::Bool(true));
        assert_eq!(parse_cell_value("false"), CellValue::Bool(false));
        assert_eq!(parse_cell_value("42"), CellValue::Int(42));
        assert_eq!(parse_cell_value("3.14"), CellValue::Float(3.14));
        assert_eq!(parse_cell_value("hello"), CellValue::from("hello"));
        assert!(matches!(parse_cell_value("2024-03-15"), CellValue::DateTime(_)));
        assert!(matches!(parse_cell_value("2024-03-15 08:30:00"), CellValue::DateTime(_)));
    }

    #[test]
    fn test_literal_mode_keeps_every_field_as_text() {
        let table = decode(CsvMode::Literal, "ID,VAL\n1,x\n2,\n3,0\n");
        let val = table.column("VAL").unwrap();
        assert_eq!(val.logical_type(), LogicalType::String);
        assert_eq!(
            val.values(),
            &[CellValue::from("x"), CellValue::from(""), CellValue::from("0")]
        );
        assert_eq!(val.null_count(), 0);
        assert_eq!(table.column("ID").unwrap().get(0), Some(&CellValue::from("1")));
    }

    #[test]
    fn test_null_aware_mode_distinguishes_quoted_empty() {
        let table = decode(CsvMode::NullAware, "A,B\nx,\"\"\n,y\n\"a,b\",\n");
        let a = table.column("A").unwrap();
        let b = table.column("B").unwrap();
        assert_eq!(a.values(), &[CellValue::from("x"), CellValue::Null, CellValue::from("a,b")]);
        assert_eq!(b.values(), &[CellValue::from(""), CellValue::from("y"), CellValue::Null]);
    }

    #[test]
    fn test_infer_mode_widens_types() {
        let table = decode(CsvMode::Infer, "N,F,M,E\n1,1,1,\n2,2.5,x,\n");
        assert_eq!(table.column("N").unwrap().logical_type(), LogicalType::Integer);
        assert_eq!(table.column("F").unwrap().logical_type(), LogicalType::Float);
        assert_eq!(table.column("F").unwrap().get(0), Some(&CellValue::Float(1.0)));
        assert_eq!(table.column("M").unwrap().logical_type(), LogicalType::Object);
        assert_eq!(table.column("E").unwrap().logical_type(), LogicalType::String);
        assert_eq!(table.column("E").unwrap().null_count(), 2);
    }

    #[test]
    fn test_duplicate_header_is_rejected() {
        let err = CsvCodec::default().decode(b"A,B,A\n1,2,3\n").unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
        assert!(err.to_string().contains("duplicate header"));
    }

    #[test]
    fn test_ragged_row_is_rejected() {
        let err = CsvCodec::default().decode(b"A,B\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }

    #[test]
    fn test_encode_separates_null_from_empty_string() {
        let table = Table::new(vec![
            Column::strings("ID", vec![Some("1"), Some("2"), Some("3")]),
            Column::strings("VAL", vec![None, Some(""), Some("0")]),
        ])
        .unwrap();
        let bytes = CsvCodec::default().encode(&table).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "ID,VAL\n1,\n2,\"\"\n3,0\n");
    }

    #[test]
    fn test_encode_escapes_embedded_delimiters() {
        let table = Table::new(vec![
            Column::strings("TERM", vec![Some("HEADACHE, SEVERE"), Some("say \"hi\"")]),
            Column::floats("DOSE", vec![Some(2.0), None]),
        ])
        .unwrap();
        let bytes = CsvCodec::default().encode(&table).unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "TERM,DOSE\n\"HEADACHE, SEVERE\",2.0\n\"say \"\"hi\"\"\",\n"
        );

        let decoded = CsvCodec::new(CsvMode::NullAware).decode(&bytes).unwrap();
        assert_eq!(decoded.column("TERM").unwrap().get(0), Some(&CellValue::from("HEADACHE, SEVERE")));
        assert_eq!(decoded.column("DOSE").unwrap().get(1), Some(&CellValue::Null));
    }

    #[test]
    fn test_single_column_null_keeps_its_row() {
        let table = Table::new(vec![Column::strings("A", vec![Some("x"), None])]).unwrap();
        let bytes = CsvCodec::default().encode(&table).unwrap();
        let decoded = CsvCodec::default().decode(&bytes).unwrap();
        assert_eq!(decoded.row_count(), 2);
    }

    #[test]
    fn test_quoted_fields_scanner() {
        assert_eq!(quoted_fields(b"a,\"\",\n"), vec![false, true, false]);
        assert_eq!(quoted_fields(b"\"x\"\"y\",b\r\nnext"), vec![true, false]);
        assert_eq!(quoted_fields(b"\"a,b\",c"), vec![true, false]);
    }
}
