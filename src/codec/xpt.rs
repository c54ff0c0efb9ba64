//! XPT codec
//!
//! Encoding derives a transport-safe table (sanitized names, character or
//! numeric storage) and writes it through a staged file; decoding stages the
//! bytes and reads them back. The caller's table is never modified.

use std::path::PathBuf;

use chrono::{NaiveDateTime, TimeDelta};

use crate::config::{Config, DataFormat, DEFAULT_XPT_DATASET};
use crate::error::ConvertError;
use crate::model::{CellValue, Column, LogicalType, Table};
use crate::sanitize::sanitize_names;
use crate::staging::StagedFile;
use crate::xpt::{
    read_xpt, sas_epoch, truncate_bytes, write_xpt, XptColumn, XptDataset, XptError, XptType,
    XptValue, XptWriterOptions, MAX_CHAR_LEN, MAX_LABEL_LEN, RECORD_LEN,
};

use super::Codec;

const STAGING_SUFFIX: &str = ".xpt";
const DATETIME_FORMAT: &str = "DATETIME";
const DATETIME_WIDTH: u16 = 20;

/// Settings for the XPT codec
#[derive(Debug, Clone)]
pub struct XptOptions {
    /// Member name; sanitized before writing
    pub dataset_name: String,
    /// Header created/modified stamp; current local time when unset
    pub timestamp: Option<NaiveDateTime>,
    /// Where staging files go; system temp dir when unset
    pub staging_dir: Option<PathBuf>,
}

impl Default for XptOptions {
    fn default() -> Self {
        Self {
            dataset_name: DEFAULT_XPT_DATASET.to_string(),
            timestamp: None,
            staging_dir: None,
        }
    }
}

impl From<&Config> for XptOptions {
    fn from(config: &Config) -> Self {
        Self {
            dataset_name: config.xpt_dataset_name.clone(),
            timestamp: config.xpt_timestamp,
            staging_dir: config.staging_dir.clone(),
        }
    }
}

/// Codec for SAS Transport V5 files
#[derive(Debug, Clone, Default)]
pub struct XptCodec {
    options: XptOptions,
}

impl XptCodec {
    pub fn new(options: XptOptions) -> Self {
        Self { options }
    }

    fn member_name(&self) -> String {
        sanitize_names(&[self.options.dataset_name.as_str()])
            .names()
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_XPT_DATASET.to_string())
    }

    fn writer_options(&self) -> XptWriterOptions {
        let stamp = self
            .options
            .timestamp
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        XptWriterOptions::at(stamp)
    }

    /// Build the transport member from the original table
    fn build_dataset(&self, table: &Table) -> Result<XptDataset, ConvertError> {
        let stored = self.stored_names(table);
        let derived = derive_transport_table(table, &stored)?;

        let mut dataset = XptDataset::new(self.member_name());
        for (original, column) in table.columns().iter().zip(derived.columns()) {
            let label = truncate_bytes(original.name(), MAX_LABEL_LEN);
            let descriptor = match column.logical_type() {
                LogicalType::Float => {
                    let numeric = XptColumn::numeric(column.name()).with_label(label);
                    if original.logical_type() == LogicalType::Timestamp {
                        numeric.with_format(DATETIME_FORMAT, DATETIME_WIDTH, 0)
                    } else {
                        numeric
                    }
                }
                _ => {
                    let longest = column
                        .values()
                        .iter()
                        .filter_map(|v| match v {
                            CellValue::String(s) => Some(s.len()),
                            _ => None,
                        })
                        .max()
                        .unwrap_or(0);
                    if longest > MAX_CHAR_LEN {
                        return Err(ConvertError::encode(
                            DataFormat::Xpt,
                            format!(
                                "column {:?} holds a {}-byte value, limit is {}",
                                original.name(),
                                longest,
                                MAX_CHAR_LEN
                            ),
                        ));
                    }
                    XptColumn::character(column.name(), longest.max(1) as u16).with_label(label)
                }
            };
            dataset.columns.push(descriptor);
        }
        widen_character_observation(&mut dataset);

        dataset.rows = (0..derived.row_count())
            .map(|row| {
                derived
                    .columns()
                    .iter()
                    .map(|column| transport_value(column, row))
                    .collect()
            })
            .collect();

        Ok(dataset)
    }
}

/// Pad all-character observations to at least one record
///
/// Readers treat a blank tail shorter than a record as padding, so a short
/// all-blank trailing row would otherwise vanish. Trailing blanks are trimmed
/// on read, which leaves values unchanged.
fn widen_character_observation(dataset: &mut XptDataset) {
    if dataset.columns.iter().any(|c| c.data_type == XptType::Num) {
        return;
    }
    let short_by = RECORD_LEN.saturating_sub(dataset.observation_length());
    if let Some(last) = dataset.columns.last_mut() {
        last.length += short_by as u16;
    }
}

impl Codec for XptCodec {
    fn format(&self) -> DataFormat {
        DataFormat::Xpt
    }

    fn decode(&self, bytes: &[u8]) -> Result<Table, ConvertError> {
        let staged = StagedFile::with_contents(self.options.staging_dir.as_deref(), STAGING_SUFFIX, bytes)?;
        let dataset = read_xpt(staged.path()).map_err(|e| match e {
            XptError::Io(source) => ConvertError::resource("read", Some(staged.path().to_path_buf()), source),
            other => ConvertError::decode_with(DataFormat::Xpt, "failed to read transport file", other),
        })?;

        dataset_to_table(dataset)
    }

    fn encode(&self, table: &Table) -> Result<Vec<u8>, ConvertError> {
        if table.column_count() == 0 {
            return Err(ConvertError::encode(
                DataFormat::Xpt,
                "a table without columns cannot be written as a transport member",
            ));
        }

        let dataset = self.build_dataset(table)?;

        let staged = StagedFile::new(self.options.staging_dir.as_deref(), STAGING_SUFFIX)?;
        write_xpt(staged.path(), &dataset, self.writer_options()).map_err(|e| match e {
            XptError::Io(source) => ConvertError::resource("write", Some(staged.path().to_path_buf()), source),
            other => ConvertError::encode_with(DataFormat::Xpt, "failed to write transport file", other),
        })?;

        staged.read()
    }

    fn stored_names(&self, table: &Table) -> Vec<String> {
        sanitize_names(&table.column_names()).names()
    }
}

/// Renamed copy of `table` using transport storage types
///
/// Text and object columns become strings; integers, booleans and timestamps
/// become floats (timestamps as seconds since 1960).
fn derive_transport_table(table: &Table, names: &[String]) -> Result<Table, ConvertError> {
    let columns = table
        .columns()
        .iter()
        .zip(names)
        .map(|(column, name)| coerce_column(column, name))
        .collect();

    Table::new(columns)
        .map_err(|e| ConvertError::encode_with(DataFormat::Xpt, "sanitized names collide", e))
}

fn coerce_column(column: &Column, name: &str) -> Column {
    let values = column.values().iter();
    match column.logical_type() {
        LogicalType::String | LogicalType::Object => {
            Column::strings(name, values.map(|v| v.canonical().map(|s| s.into_owned())))
        }
        LogicalType::Float => column.renamed(name),
        LogicalType::Integer => Column::floats(
            name,
            values.map(|v| match v {
                CellValue::Int(i) => Some(*i as f64),
                _ => None,
            }),
        ),
        LogicalType::Boolean => Column::floats(
            name,
            values.map(|v| match v {
                CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            }),
        ),
        LogicalType::Timestamp => Column::floats(
            name,
            values.map(|v| match v {
                CellValue::DateTime(dt) => Some(seconds_since_epoch(*dt)),
                _ => None,
            }),
        ),
    }
}

fn transport_value(column: &Column, row: usize) -> XptValue {
    match (column.logical_type(), column.get(row)) {
        (LogicalType::Float, Some(CellValue::Float(f))) => XptValue::Num(Some(*f)),
        (LogicalType::Float, _) => XptValue::Num(None),
        // Character nulls are written as blanks
        (_, Some(CellValue::String(s))) => XptValue::Char(s.clone()),
        (_, _) => XptValue::Char(String::new()),
    }
}

/// Seconds between the 1960 epoch and `dt`, with sub-second precision
pub fn seconds_since_epoch(dt: NaiveDateTime) -> f64 {
    let delta = dt - sas_epoch();
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9
}

/// Timestamp `seconds` after the 1960 epoch, to the microsecond
fn from_epoch_seconds(seconds: f64) -> Option<NaiveDateTime> {
    let micros = (seconds * 1e6).round();
    if !micros.is_finite() || micros.abs() > i64::MAX as f64 {
        return None;
    }
    sas_epoch().checked_add_signed(TimeDelta::microseconds(micros as i64))
}

fn dataset_to_table(dataset: XptDataset) -> Result<Table, ConvertError> {
    let XptDataset { columns, rows, .. } = dataset;

    let mut cells: Vec<Vec<CellValue>> = vec![Vec::with_capacity(rows.len()); columns.len()];
    for row in rows {
        for (idx, value) in row.into_iter().enumerate() {
            cells[idx].push(match value {
                XptValue::Char(s) => CellValue::String(s),
                XptValue::Num(n) => CellValue::from(n),
            });
        }
    }

    let table_columns = columns
        .iter()
        .zip(cells)
        .map(|(descriptor, values)| numeric_or_text(descriptor, values))
        .collect::<Result<Vec<_>, _>>()?;

    Table::new(table_columns)
        .map_err(|e| ConvertError::decode_with(DataFormat::Xpt, "invalid table", e))
}

fn numeric_or_text(descriptor: &XptColumn, values: Vec<CellValue>) -> Result<Column, ConvertError> {
    let (logical_type, values) = match descriptor.data_type {
        XptType::Char => (LogicalType::String, values),
        XptType::Num if descriptor.is_datetime() || descriptor.is_date() => {
            let scale = if descriptor.is_date() { 86_400.0 } else { 1.0 };
            let values = values
                .into_iter()
                .map(|v| match v {
                    CellValue::Float(f) => from_epoch_seconds(f * scale)
                        .map(CellValue::DateTime)
                        .ok_or_else(|| {
                            ConvertError::decode(
                                DataFormat::Xpt,
                                format!("{:?} holds an out-of-range date value {}", descriptor.name, f),
                            )
                        }),
                    other => Ok(other),
                })
                .collect::<Result<Vec<_>, _>>()?;
            (LogicalType::Timestamp, values)
        }
        XptType::Num => (LogicalType::Float, values),
    };

    Column::new(descriptor.name.clone(), logical_type, values)
        .map_err(|e| ConvertError::decode_with(DataFormat::Xpt, "invalid column", e))
}
