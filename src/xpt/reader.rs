//! Transport file reader

use std::path::Path;

use super::header::{
    align_to_record, decode_text, expect_header, parse_member_label, parse_member_name,
    parse_namestr, parse_namestr_len, parse_variable_count, DSCRPTR_HEADER_PREFIX,
    LIBRARY_HEADER_PREFIX, MEMBER_HEADER_PREFIX, NAMESTR_HEADER_PREFIX, OBS_HEADER_PREFIX,
    RECORD_LEN,
};
use super::ibm::{ibm_to_ieee, is_missing};
use super::{Result, XptColumn, XptDataset, XptError, XptType, XptValue};

/// Read the first member of the library at `path`
pub fn read_xpt(path: &Path) -> Result<XptDataset> {
    let data = std::fs::read(path)?;
    parse_xpt(&data)
}

fn parse_xpt(data: &[u8]) -> Result<XptDataset> {
    if data.len() < RECORD_LEN * 9 {
        return Err(XptError::InvalidFormat("file too small".to_string()));
    }

    let mut offset = 0usize;

    // Library header, real header, modified header
    expect_header(read_record(data, offset)?, LIBRARY_HEADER_PREFIX, "LIBRARY")?;
    offset += RECORD_LEN * 3;

    let member_header = read_record(data, offset)?;
    expect_header(member_header, MEMBER_HEADER_PREFIX, "MEMBER")?;
    let namestr_len = parse_namestr_len(member_header)?;
    if namestr_len != 140 && namestr_len != 136 {
        return Err(XptError::InvalidFormat(format!(
            "unsupported NAMESTR length {}",
            namestr_len
        )));
    }
    offset += RECORD_LEN;

    expect_header(read_record(data, offset)?, DSCRPTR_HEADER_PREFIX, "DSCRPTR")?;
    offset += RECORD_LEN;

    let name = parse_member_name(read_record(data, offset)?);
    offset += RECORD_LEN;
    let label = parse_member_label(read_record(data, offset)?);
    offset += RECORD_LEN;

    let namestr_header = read_record(data, offset)?;
    expect_header(namestr_header, NAMESTR_HEADER_PREFIX, "NAMESTR")?;
    let var_count = parse_variable_count(namestr_header)?;
    offset += RECORD_LEN;

    let mut columns = Vec::with_capacity(var_count);
    for idx in 0..var_count {
        let start = offset + idx * namestr_len;
        let record = data
            .get(start..start + namestr_len)
            .ok_or_else(|| XptError::InvalidNamestr {
                index: idx,
                message: "NAMESTR data out of bounds".to_string(),
            })?;
        columns.push(parse_namestr(record, idx)?);
    }
    offset = align_to_record(offset + var_count * namestr_len);

    expect_header(read_record(data, offset)?, OBS_HEADER_PREFIX, "OBS")?;
    offset += RECORD_LEN;

    let rows = parse_observations(&data[offset..], &columns)?;

    Ok(XptDataset {
        name,
        label,
        columns,
        rows,
    })
}

fn read_record(data: &[u8], offset: usize) -> Result<&[u8]> {
    data.get(offset..offset + RECORD_LEN)
        .ok_or_else(|| XptError::InvalidFormat(format!("record at offset {} is truncated", offset)))
}

/// Split observation data into rows
///
/// The writer pads the last record with blanks, so up to 79 trailing bytes
/// can be padding. Blank rows are only dropped from that tail; a blank row
/// that lies entirely inside it cannot be told apart from padding.
fn parse_observations(data: &[u8], columns: &[XptColumn]) -> Result<Vec<Vec<XptValue>>> {
    let obs_len: usize = columns.iter().map(|c| c.length as usize).sum();
    if obs_len == 0 {
        return Ok(Vec::new());
    }

    let mut rows_total = data.len() / obs_len;
    let remainder = &data[rows_total * obs_len..];
    if remainder.iter().any(|&b| b != b' ') {
        return Err(XptError::TrailingBytes);
    }

    let min_rows = data.len().saturating_sub(RECORD_LEN - 1).div_ceil(obs_len);
    while rows_total > min_rows {
        let row = &data[(rows_total - 1) * obs_len..rows_total * obs_len];
        if row.iter().all(|&b| b == b' ') {
            rows_total -= 1;
        } else {
            break;
        }
    }

    Ok(data[..rows_total * obs_len]
        .chunks_exact(obs_len)
        .map(|row| parse_row(row, columns))
        .collect())
}

fn parse_row(row: &[u8], columns: &[XptColumn]) -> Vec<XptValue> {
    let mut values = Vec::with_capacity(columns.len());
    let mut pos = 0usize;

    for column in columns {
        let slice = &row[pos..pos + column.length as usize];
        values.push(match column.data_type {
            XptType::Char => XptValue::Char(decode_text(slice).trim_end().to_string()),
            XptType::Num => XptValue::Num(decode_numeric(slice)),
        });
        pos += column.length as usize;
    }

    values
}

/// Decode a numeric slot; short numerics are zero-extended
fn decode_numeric(bytes: &[u8]) -> Option<f64> {
    if is_missing(bytes) {
        return None;
    }
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[..len].copy_from_slice(&bytes[..len]);
    Some(ibm_to_ieee(buf))
}
