//! Parquet codec

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{
    ArrowTemporalType, DataType as ArrowType, Date32Type, Date64Type, Field, Float64Type,
    Int64Type, Schema, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType,
};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::{WriterProperties, WriterVersion};

use crate::config::DataFormat;
use crate::error::ConvertError;
use crate::model::{CellValue, Column, LogicalType, Table};

use super::Codec;

/// Fixed writer identity so repeated runs produce identical bytes
const CREATED_BY: &str = concat!("tabconv version ", env!("CARGO_PKG_VERSION"));

/// Codec for Parquet files held in memory
#[derive(Debug, Default)]
pub struct ParquetCodec;

impl ParquetCodec {
    pub fn new() -> Self {
        Self
    }

    fn writer_properties() -> WriterProperties {
        WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_compression(Compression::SNAPPY)
            .set_created_by(CREATED_BY.to_string())
            .build()
    }
}

impl Codec for ParquetCodec {
    fn format(&self) -> DataFormat {
        DataFormat::Parquet
    }

    fn decode(&self, bytes: &[u8]) -> Result<Table, ConvertError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))
            .map_err(|e| decode_error("failed to open Parquet data", e))?;

        let schema = builder.schema().clone();
        let reader = builder
            .build()
            .map_err(|e| decode_error("failed to build Parquet reader", e))?;

        let mut cells: Vec<Vec<CellValue>> = vec![Vec::new(); schema.fields().len()];

        // Read record batches
        for batch_result in reader {
            let batch = batch_result.map_err(|e| decode_error("failed to read Parquet batch", e))?;
            for (idx, array) in batch.columns().iter().enumerate() {
                append_cells(array, &mut cells[idx])?;
            }
        }

        let columns = schema
            .fields()
            .iter()
            .zip(cells)
            .map(|(field, values)| {
                Column::new(field.name().clone(), arrow_type_to_logical(field.data_type()), values)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error("invalid column", e))?;

        Table::new(columns).map_err(|e| decode_error("invalid table", e))
    }

    fn encode(&self, table: &Table) -> Result<Vec<u8>, ConvertError> {
        // An empty root schema is not readable
        if table.column_count() == 0 {
            return Err(ConvertError::encode(
                DataFormat::Parquet,
                "a table without columns cannot be written as Parquet",
            ));
        }

        let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = table
            .columns()
            .iter()
            .map(column_to_array)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .unzip();

        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays)
            .map_err(|e| encode_error("failed to assemble record batch", e))?;

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, Some(Self::writer_properties()))
            .map_err(|e| encode_error("failed to create Parquet writer", e))?;
        writer
            .write(&batch)
            .map_err(|e| encode_error("failed to write record batch", e))?;
        writer
            .close()
            .map_err(|e| encode_error("failed to finish Parquet file", e))?;

        Ok(buf)
    }
}

fn decode_error<E>(message: &str, source: E) -> ConvertError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ConvertError::decode_with(DataFormat::Parquet, message, source)
}

fn encode_error<E>(message: &str, source: E) -> ConvertError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ConvertError::encode_with(DataFormat::Parquet, message, source)
}

fn arrow_type_to_logical(arrow_type: &ArrowType) -> LogicalType {
    match arrow_type {
        ArrowType::Boolean => LogicalType::Boolean,
        ArrowType::Int8
        | ArrowType::Int16
        | ArrowType::Int32
        | ArrowType::Int64
        | ArrowType::UInt8
        | ArrowType::UInt16
        | ArrowType::UInt32
        | ArrowType::UInt64 => LogicalType::Integer,
        ArrowType::Float16 | ArrowType::Float32 | ArrowType::Float64 => LogicalType::Float,
        ArrowType::Date32 | ArrowType::Date64 | ArrowType::Timestamp(_, _) => LogicalType::Timestamp,
        _ => LogicalType::String, // Fallback to string for everything else
    }
}

/// Widen an array to `target`, failing instead of nulling values that do not fit
fn widen(array: &ArrayRef, target: &ArrowType) -> Result<ArrayRef, ConvertError> {
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    cast_with_options(array, target, &options)
        .map_err(|e| decode_error("column values do not fit the widened type", e))
}

fn append_cells(array: &ArrayRef, out: &mut Vec<CellValue>) -> Result<(), ConvertError> {
    match array.data_type() {
        ArrowType::Null => out.extend(std::iter::repeat(CellValue::Null).take(array.len())),
        ArrowType::Boolean => out.extend(array.as_boolean().iter().map(CellValue::from)),
        ArrowType::Int8
        | ArrowType::Int16
        | ArrowType::Int32
        | ArrowType::Int64
        | ArrowType::UInt8
        | ArrowType::UInt16
        | ArrowType::UInt32
        | ArrowType::UInt64 => {
            let ints = widen(array, &ArrowType::Int64)?;
            out.extend(ints.as_primitive::<Int64Type>().iter().map(CellValue::from));
        }
        ArrowType::Float16 | ArrowType::Float32 | ArrowType::Float64 => {
            let floats = widen(array, &ArrowType::Float64)?;
            out.extend(floats.as_primitive::<Float64Type>().iter().map(CellValue::from));
        }
        ArrowType::Utf8 => out.extend(
            array
                .as_string::<i32>()
                .iter()
                .map(|v| CellValue::from(v.map(str::to_string))),
        ),
        ArrowType::LargeUtf8 => out.extend(
            array
                .as_string::<i64>()
                .iter()
                .map(|v| CellValue::from(v.map(str::to_string))),
        ),
        ArrowType::Date32 => append_temporal::<Date32Type>(array, out)?,
        ArrowType::Date64 => append_temporal::<Date64Type>(array, out)?,
        ArrowType::Timestamp(unit, _) => match unit {
            TimeUnit::Second => append_temporal::<TimestampSecondType>(array, out)?,
            TimeUnit::Millisecond => append_temporal::<TimestampMillisecondType>(array, out)?,
            TimeUnit::Microsecond => append_temporal::<TimestampMicrosecondType>(array, out)?,
            TimeUnit::Nanosecond => append_temporal::<TimestampNanosecondType>(array, out)?,
        },
        _ => {
            // Fallback: convert to string
            let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())
                .map_err(|e| decode_error("unsupported column type", e))?;
            out.extend((0..array.len()).map(|idx| {
                if array.is_null(idx) {
                    CellValue::Null
                } else {
                    CellValue::String(formatter.value(idx).to_string())
                }
            }));
        }
    }
    Ok(())
}

fn append_temporal<T>(array: &ArrayRef, out: &mut Vec<CellValue>) -> Result<(), ConvertError>
where
    T: ArrowTemporalType,
    i64: From<T::Native>,
{
    let arr = array.as_primitive::<T>();
    for idx in 0..arr.len() {
        if arr.is_null(idx) {
            out.push(CellValue::Null);
            continue;
        }
        let dt = arr.value_as_datetime(idx).ok_or_else(|| {
            ConvertError::decode(
                DataFormat::Parquet,
                format!("temporal value at row {} is out of range", idx),
            )
        })?;
        out.push(CellValue::DateTime(dt));
    }
    Ok(())
}

/// Build the typed array for one column from its own null mask
fn column_to_array(column: &Column) -> Result<(Field, ArrayRef), ConvertError> {
    let values = column.values();

    let (data_type, array): (ArrowType, ArrayRef) = match column.logical_type() {
        LogicalType::String | LogicalType::Object => {
            let arr: StringArray = values.iter().map(CellValue::canonical).collect();
            (ArrowType::Utf8, Arc::new(arr))
        }
        LogicalType::Integer => {
            let arr: Int64Array = values
                .iter()
                .map(|v| match v {
                    CellValue::Int(i) => Ok(Some(*i)),
                    CellValue::Null => Ok(None),
                    other => Err(unexpected_cell(column, other)),
                })
                .collect::<Result<_, _>>()?;
            (ArrowType::Int64, Arc::new(arr))
        }
        LogicalType::Float => {
            let arr: Float64Array = values
                .iter()
                .map(|v| match v {
                    CellValue::Float(f) => Ok(Some(*f)),
                    CellValue::Null => Ok(None),
                    other => Err(unexpected_cell(column, other)),
                })
                .collect::<Result<_, _>>()?;
            (ArrowType::Float64, Arc::new(arr))
        }
        LogicalType::Boolean => {
            let arr: BooleanArray = values
                .iter()
                .map(|v| match v {
                    CellValue::Bool(b) => Ok(Some(*b)),
                    CellValue::Null => Ok(None),
                    other => Err(unexpected_cell(column, other)),
                })
                .collect::<Result<_, _>>()?;
            (ArrowType::Boolean, Arc::new(arr))
        }
        LogicalType::Timestamp => {
            let arr: TimestampMicrosecondArray = values
                .iter()
                .map(|v| match v {
                    CellValue::DateTime(dt) => Ok(Some(dt.and_utc().timestamp_micros())),
                    CellValue::Null => Ok(None),
                    other => Err(unexpected_cell(column, other)),
                })
                .collect::<Result<_, _>>()?;
            (ArrowType::Timestamp(TimeUnit::Microsecond, None), Arc::new(arr))
        }
    };

    Ok((Field::new(column.name(), data_type, true), array))
}

fn unexpected_cell(column: &Column, value: &CellValue) -> ConvertError {
    ConvertError::encode(
        DataFormat::Parquet,
        format!(
            "column {:?} is {} but holds {:?}",
            column.name(),
            column.logical_type(),
            value
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn round_trip(table: &Table) -> Table {
        let codec = ParquetCodec::new();
        let bytes = codec.encode(table).unwrap();
        codec.decode(&bytes).unwrap()
    }

    #[test]
    fn test_round_trip_identity() {
        let table = Table::new(vec![
            Column::strings("USUBJID", vec![Some("01-001"), Some("01-002"), Some("")]),
            Column::integers("AGE", vec![Some(34), Some(0), Some(-1)]),
            Column::floats("WEIGHT", vec![Some(70.5), Some(0.1), Some(1e-9)]),
        ])
        .unwrap();

        assert_eq!(round_trip(&table), table);
    }

    #[test]
    fn test_nulls_are_not_zero_or_empty() {
        let table = Table::new(vec![
            Column::integers("AGE", vec![Some(34), None, Some(0)]),
            Column::strings("SEX", vec![None, Some(""), Some("F")]),
            Column::booleans("FLAG", vec![None, Some(false), Some(true)]),
        ])
        .unwrap();

        let decoded = round_trip(&table);
        assert_eq!(decoded, table);
        assert_eq!(decoded.column("AGE").unwrap().null_mask(), vec![false, true, false]);
        assert_eq!(decoded.column("SEX").unwrap().get(0), Some(&CellValue::Null));
        assert_eq!(decoded.column("SEX").unwrap().get(1), Some(&CellValue::from("")));
    }

    #[test]
    fn test_timestamps_keep_microseconds() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_micro_opt(8, 30, 0, 123_456)
            .unwrap();
        let table = Table::new(vec![Column::timestamps("ADTM", vec![Some(dt), None])]).unwrap();
        assert_eq!(round_trip(&table), table);
    }

    #[test]
    fn test_object_column_is_written_as_text() {
        let table = Table::new(vec![Column::new(
            "MIXED",
            LogicalType::Object,
            vec![CellValue::Int(1), CellValue::from("a"), CellValue::Null],
        )
        .unwrap()])
        .unwrap();

        let decoded = round_trip(&table);
        let column = decoded.column("MIXED").unwrap();
        assert_eq!(column.logical_type(), LogicalType::String);
        assert_eq!(
            column.values(),
            &[CellValue::from("1"), CellValue::from("a"), CellValue::Null]
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let table = Table::new(vec![
            Column::strings("A", vec![Some("x"), None]),
            Column::floats("B", vec![None, Some(2.5)]),
        ])
        .unwrap();
        let codec = ParquetCodec::new();
        assert_eq!(codec.encode(&table).unwrap(), codec.encode(&table).unwrap());
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let codec = ParquetCodec::new();
        let err = codec.encode(&Table::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Encode { format: DataFormat::Parquet, .. }));

        // Zero rows with columns is still fine
        let table = Table::new(vec![Column::integers("AGE", Vec::new())]).unwrap();
        let decoded = round_trip(&table);
        assert_eq!(decoded.row_count(), 0);
        assert_eq!(decoded.column_names(), vec!["AGE"]);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = ParquetCodec::new().decode(b"not parquet at all").unwrap_err();
        assert!(matches!(err, ConvertError::Decode { .. }));
    }
}
