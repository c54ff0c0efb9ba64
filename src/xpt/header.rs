//! Header records and NAMESTR descriptors
//!
//! A V5 library file is a sequence of 80-byte records:
//!
//! | Records | Content                                              |
//! |---------|------------------------------------------------------|
//! | 1-3     | library header, SAS/OS/created, modified             |
//! | 4-7     | member header, descriptor header, name, label        |
//! | 8       | NAMESTR header carrying the variable count           |
//! | 9..     | one 140-byte NAMESTR per variable, space padded      |
//! | next    | OBS header, then observations, space padded          |

use chrono::NaiveDateTime;

use super::{XptColumn, XptError, XptType};

/// Record length in bytes
pub const RECORD_LEN: usize = 80;

/// NAMESTR descriptor length
pub const NAMESTR_LEN: usize = 140;

pub const LIBRARY_HEADER_PREFIX: &str = "HEADER RECORD*******LIBRARY HEADER RECORD!!!!!!!";
pub const MEMBER_HEADER_PREFIX: &str = "HEADER RECORD*******MEMBER  HEADER RECORD!!!!!!!";
pub const DSCRPTR_HEADER_PREFIX: &str = "HEADER RECORD*******DSCRPTR HEADER RECORD!!!!!!!";
pub const NAMESTR_HEADER_PREFIX: &str = "HEADER RECORD*******NAMESTR HEADER RECORD!!!!!!!";
pub const OBS_HEADER_PREFIX: &str = "HEADER RECORD*******OBS     HEADER RECORD!!!!!!!";

pub type Record = [u8; RECORD_LEN];

/// Header timestamps in `ddMMMyy:hh:mm:ss`
pub fn format_header_datetime(dt: NaiveDateTime) -> String {
    dt.format("%d%b%y:%H:%M:%S").to_string().to_uppercase()
}

fn build_fixed_header(prefix: &str) -> Record {
    let mut record = [b' '; RECORD_LEN];
    record[..prefix.len()].copy_from_slice(prefix.as_bytes());
    record[48..78].fill(b'0');
    record
}

pub fn build_library_header() -> Record {
    build_fixed_header(LIBRARY_HEADER_PREFIX)
}

/// First real header: SAS symbols, version, OS and created stamp
pub fn build_real_header(kind: &str, name: &str, sas_version: &str, os_name: &str, created: &str) -> Record {
    let mut record = [b' '; RECORD_LEN];
    write_string(&mut record, 0, "SAS", 8);
    write_string(&mut record, 8, name, 8);
    write_string(&mut record, 16, kind, 8);
    write_string(&mut record, 24, sas_version, 8);
    write_string(&mut record, 32, os_name, 8);
    write_string(&mut record, 64, created, 16);
    record
}

/// Second real header: modified stamp, then the member label when present
pub fn build_second_header(modified: &str, label: Option<&str>) -> Record {
    let mut record = [b' '; RECORD_LEN];
    write_string(&mut record, 0, modified, 16);
    if let Some(label) = label {
        write_string(&mut record, 32, label, 40);
    }
    record
}

pub fn build_member_header() -> Record {
    let mut record = build_fixed_header(MEMBER_HEADER_PREFIX);
    write_string(&mut record, 64, "0160", 4);
    write_string(&mut record, 74, &format!("{:04}", NAMESTR_LEN), 4);
    record
}

pub fn build_dscrptr_header() -> Record {
    build_fixed_header(DSCRPTR_HEADER_PREFIX)
}

pub fn build_namestr_header(var_count: usize) -> Record {
    let mut record = build_fixed_header(NAMESTR_HEADER_PREFIX);
    write_string(&mut record, 54, &format!("{:04}", var_count), 4);
    record
}

pub fn build_obs_header() -> Record {
    build_fixed_header(OBS_HEADER_PREFIX)
}

/// Check that a record starts with a header prefix
pub fn expect_header(record: &[u8], prefix: &str, what: &'static str) -> Result<(), XptError> {
    if record.starts_with(prefix.as_bytes()) {
        Ok(())
    } else {
        Err(XptError::MissingHeader(what))
    }
}

/// NAMESTR length from the member header (offset 74, 4 digits)
pub fn parse_namestr_len(record: &[u8]) -> Result<usize, XptError> {
    parse_number(record, 74, "NAMESTR length")
}

/// Variable count from the NAMESTR header (offset 54, 4 digits)
pub fn parse_variable_count(record: &[u8]) -> Result<usize, XptError> {
    parse_number(record, 54, "variable count")
}

/// Member name from the member real header (offset 8)
pub fn parse_member_name(record: &[u8]) -> String {
    read_string(record, 8, 8)
}

/// Member label from the second member header (offset 32)
pub fn parse_member_label(record: &[u8]) -> Option<String> {
    Some(read_string(record, 32, 40)).filter(|label| !label.is_empty())
}

fn parse_number(record: &[u8], offset: usize, field: &'static str) -> Result<usize, XptError> {
    read_string(record, offset, 4)
        .trim()
        .parse::<usize>()
        .map_err(|_| XptError::InvalidFormat(format!("unreadable {}", field)))
}

/// Build the 140-byte descriptor for one variable
///
/// | Offset | Field  | Content                        |
/// |--------|--------|--------------------------------|
/// | 0      | ntype  | 1 numeric, 2 character         |
/// | 4      | nlng   | length in the observation      |
/// | 6      | nvar0  | variable number                |
/// | 8      | nname  | name, 8 bytes                  |
/// | 16     | nlabel | label, 40 bytes                |
/// | 56     | nform  | format name, 8 bytes           |
/// | 64     | nfl    | format width                   |
/// | 66     | nfd    | format decimals                |
/// | 84     | npos   | byte offset in the observation |
pub fn build_namestr(column: &XptColumn, varnum: u16, position: u32) -> [u8; NAMESTR_LEN] {
    let mut buf = [0u8; NAMESTR_LEN];

    write_i16(&mut buf, 0, column.data_type.ntype());
    write_i16(&mut buf, 4, column.length as i16);
    write_i16(&mut buf, 6, varnum as i16);
    write_string(&mut buf, 8, &column.name, 8);
    write_string(&mut buf, 16, column.label.as_deref().unwrap_or(""), 40);
    write_string(&mut buf, 56, column.format.as_deref().unwrap_or(""), 8);
    write_i16(&mut buf, 64, column.format_length as i16);
    write_i16(&mut buf, 66, column.format_decimals as i16);
    // niform is blank rather than zeroed
    write_string(&mut buf, 72, "", 8);
    buf[84..88].copy_from_slice(&(position as i32).to_be_bytes());

    buf
}

/// Parse one NAMESTR descriptor
pub fn parse_namestr(data: &[u8], index: usize) -> Result<XptColumn, XptError> {
    if data.len() < 88 {
        return Err(XptError::InvalidNamestr {
            index,
            message: format!("data too short: {} bytes", data.len()),
        });
    }

    let ntype = read_i16(data, 0);
    let data_type = XptType::from_ntype(ntype).ok_or_else(|| XptError::InvalidNamestr {
        index,
        message: format!("invalid ntype: {}", ntype),
    })?;

    let length = read_i16(data, 4);
    if length <= 0 {
        return Err(XptError::InvalidNamestr {
            index,
            message: format!("invalid variable length: {}", length),
        });
    }

    let name = read_string(data, 8, 8);
    if name.is_empty() {
        return Err(XptError::InvalidNamestr {
            index,
            message: "empty variable name".to_string(),
        });
    }

    let label = read_string(data, 16, 40);
    let format = read_string(data, 56, 8);

    Ok(XptColumn {
        name,
        label: Some(label).filter(|l| !l.is_empty()),
        data_type,
        length: length as u16,
        format: Some(format).filter(|f| !f.is_empty()),
        format_length: read_i16(data, 64).max(0) as u16,
        format_decimals: read_i16(data, 66).max(0) as u16,
    })
}

/// Round a size up to the next record boundary
pub fn align_to_record(size: usize) -> usize {
    size.div_ceil(RECORD_LEN) * RECORD_LEN
}

fn read_i16(data: &[u8], offset: usize) -> i16 {
    i16::from_be_bytes([data[offset], data[offset + 1]])
}

fn write_i16(buf: &mut [u8], offset: usize, value: i16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Read a field, trimming trailing blanks and NULs
fn read_string(data: &[u8], offset: usize, len: usize) -> String {
    data.get(offset..offset + len)
        .map(|slice| decode_text(slice).trim_end_matches([' ', '\0']).to_string())
        .unwrap_or_default()
}

/// Decode stored text as UTF-8, or as Latin-1 when it is not valid UTF-8
///
/// Every byte is a Latin-1 code point, so no byte is ever replaced.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().copied().map(char::from).collect(),
    }
}

/// Write a field, space padded, cut on a char boundary
fn write_string(buf: &mut [u8], offset: usize, value: &str, len: usize) {
    let bytes = truncate_bytes(value, len).as_bytes();
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    buf[offset + bytes.len()..offset + len].fill(b' ');
}

/// Longest prefix of `value` that fits in `max` bytes
pub fn truncate_bytes(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
