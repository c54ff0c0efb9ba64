//! Transport file writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rustc_hash::FxHashSet;

use super::header::{
    build_dscrptr_header, build_library_header, build_member_header, build_namestr,
    build_namestr_header, build_obs_header, build_real_header, build_second_header,
    format_header_datetime, RECORD_LEN,
};
use super::ibm::{ieee_to_ibm, MISSING_STANDARD};
use super::{
    Result, XptColumn, XptDataset, XptError, XptType, XptValue, XptWriterOptions, MAX_CHAR_LEN,
};

/// Writes one member as a V5 library
pub struct XptWriter<W: Write> {
    writer: BufWriter<W>,
    options: XptWriterOptions,
}

impl<W: Write> XptWriter<W> {
    pub fn new(writer: W, options: XptWriterOptions) -> Self {
        Self {
            writer: BufWriter::new(writer),
            options,
        }
    }

    /// Validate and write the dataset, then flush
    pub fn write_dataset(mut self, dataset: &XptDataset) -> Result<()> {
        validate_dataset(dataset)?;

        let created = format_header_datetime(self.options.created);
        let modified = format_header_datetime(self.options.modified);
        let (version, os) = (&self.options.sas_version, &self.options.os_name);

        // Library headers
        self.writer.write_all(&build_library_header())?;
        self.writer
            .write_all(&build_real_header("SASLIB", "SAS", version, os, &created))?;
        self.writer.write_all(&build_second_header(&modified, None))?;

        // Member headers
        self.writer.write_all(&build_member_header())?;
        self.writer.write_all(&build_dscrptr_header())?;
        self.writer
            .write_all(&build_real_header("SASDATA", &dataset.name, version, os, &created))?;
        self.writer
            .write_all(&build_second_header(&modified, dataset.label.as_deref()))?;

        // NAMESTR header and records
        self.writer
            .write_all(&build_namestr_header(dataset.columns.len()))?;
        let mut records = RecordWriter::new(&mut self.writer);
        let mut position = 0u32;
        for (idx, column) in dataset.columns.iter().enumerate() {
            records.write_bytes(&build_namestr(column, (idx + 1) as u16, position))?;
            position += u32::from(column.length);
        }
        records.finish()?;

        // OBS header and data
        self.writer.write_all(&build_obs_header())?;
        let obs_len = dataset.observation_length();
        let mut records = RecordWriter::new(&mut self.writer);
        let mut obs = vec![b' '; obs_len];
        for row in &dataset.rows {
            let mut pos = 0usize;
            for (value, column) in row.iter().zip(&dataset.columns) {
                let len = column.length as usize;
                encode_value(value, column, &mut obs[pos..pos + len])?;
                pos += len;
            }
            records.write_bytes(&obs)?;
        }
        records.finish()?;

        self.writer.flush()?;
        Ok(())
    }
}

/// Write a dataset to a new file at `path`
pub fn write_xpt(path: &Path, dataset: &XptDataset, options: XptWriterOptions) -> Result<()> {
    let file = File::create(path)?;
    XptWriter::new(file, options).write_dataset(dataset)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 8
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}

fn validate_dataset(dataset: &XptDataset) -> Result<()> {
    if !is_valid_name(&dataset.name) {
        return Err(XptError::InvalidName(dataset.name.clone()));
    }
    if dataset.columns.is_empty() {
        return Err(XptError::NoVariables);
    }

    let mut seen = FxHashSet::default();
    for column in &dataset.columns {
        if !is_valid_name(&column.name) {
            return Err(XptError::InvalidName(column.name.clone()));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(XptError::DuplicateVariable(column.name.clone()));
        }
        let length = column.length as usize;
        let valid_length = match column.data_type {
            XptType::Num => length == 8,
            XptType::Char => (1..=MAX_CHAR_LEN).contains(&length),
        };
        if !valid_length {
            return Err(XptError::ValueTooLong {
                variable: column.name.clone(),
                length,
            });
        }
    }

    for (row, values) in dataset.rows.iter().enumerate() {
        if values.len() != dataset.columns.len() {
            return Err(XptError::RowLength {
                row,
                expected: dataset.columns.len(),
                actual: values.len(),
            });
        }
    }

    Ok(())
}

/// Encode one value into its slot, which is pre-filled with blanks
fn encode_value(value: &XptValue, column: &XptColumn, slot: &mut [u8]) -> Result<()> {
    match (value, column.data_type) {
        (XptValue::Char(text), XptType::Char) => {
            let bytes = text.as_bytes();
            if bytes.len() > slot.len() {
                return Err(XptError::ValueTooLong {
                    variable: column.name.clone(),
                    length: bytes.len(),
                });
            }
            slot[..bytes.len()].copy_from_slice(bytes);
            slot[bytes.len()..].fill(b' ');
        }
        (XptValue::Num(number), XptType::Num) => {
            let encoded = match number {
                Some(v) if v.is_finite() => ieee_to_ibm(*v).map_err(|_| XptError::NumericOverflow {
                    variable: column.name.clone(),
                    value: *v,
                })?,
                // Missing and non-finite values
                _ => MISSING_STANDARD,
            };
            slot.copy_from_slice(&encoded);
        }
        (XptValue::Char(_), XptType::Num) | (XptValue::Num(_), XptType::Char) => {
            return Err(XptError::InvalidFormat(format!(
                "value type does not match variable {:?}",
                column.name
            )));
        }
    }
    Ok(())
}

/// Writes a byte stream as space-padded 80-byte records
struct RecordWriter<'a, W: Write> {
    writer: &'a mut W,
    record: [u8; RECORD_LEN],
    pos: usize,
}

impl<'a, W: Write> RecordWriter<'a, W> {
    fn new(writer: &'a mut W) -> Self {
        Self {
            writer,
            record: [b' '; RECORD_LEN],
            pos: 0,
        }
    }

    fn write_bytes(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let take = (RECORD_LEN - self.pos).min(bytes.len());
            self.record[self.pos..self.pos + take].copy_from_slice(&bytes[..take]);
            self.pos += take;
            bytes = &bytes[take..];

            if self.pos == RECORD_LEN {
                self.writer.write_all(&self.record)?;
                self.record = [b' '; RECORD_LEN];
                self.pos = 0;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.pos > 0 {
            self.record[self.pos..].fill(b' ');
            self.writer.write_all(&self.record)?;
            self.pos = 0;
        }
        Ok(())
    }
}
