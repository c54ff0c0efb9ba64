//! Table, Column, and Cell data structures

use std::borrow::Cow;

use chrono::NaiveDateTime;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::schema::{DtypeCategory, LogicalType};
use crate::error::TableError;

/// Canonical text layout for timestamps; fractional seconds only when present
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single cell value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Int(a), CellValue::Int(b)) => a == b,
            (CellValue::Float(a), CellValue::Float(b)) => {
                // Handle NaN comparison
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::DateTime(a), CellValue::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl CellValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Logical type this value belongs to, `None` for null
    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(_) => Some(LogicalType::Boolean),
            CellValue::Int(_) => Some(LogicalType::Integer),
            CellValue::Float(_) => Some(LogicalType::Float),
            CellValue::String(_) => Some(LogicalType::String),
            CellValue::DateTime(_) => Some(LogicalType::Timestamp),
        }
    }

    /// Category of this value
    pub fn category(&self) -> DtypeCategory {
        match self {
            CellValue::Null => DtypeCategory::Empty,
            CellValue::Bool(_) => DtypeCategory::Boolean,
            CellValue::Int(_) | CellValue::Float(_) => DtypeCategory::Numeric,
            CellValue::String(_) => DtypeCategory::String,
            CellValue::DateTime(_) => DtypeCategory::Temporal,
        }
    }

    /// Canonical string form used when a value must become text; `None` for null
    pub fn canonical(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            CellValue::Int(i) => Some(Cow::Owned(i.to_string())),
            // Debug keeps a decimal point or exponent and round-trips exactly
            CellValue::Float(f) => Some(Cow::Owned(format!("{:?}", f))),
            CellValue::String(s) => Some(Cow::Borrowed(s.as_str())),
            CellValue::DateTime(dt) => Some(Cow::Owned(dt.format(TIMESTAMP_FORMAT).to_string())),
        }
    }

    /// Convert to a display string
    pub fn display(&self) -> Cow<'_, str> {
        self.canonical().unwrap_or(Cow::Borrowed("NULL"))
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => CellValue::Null,
        }
    }
}

/// A named, typed column of cells
///
/// Every non-null cell matches the declared [`LogicalType`]; object columns
/// accept any cell kind. Nulls are explicit cells, so an empty string or a
/// zero is never confused with a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    logical_type: LogicalType,
    values: Vec<CellValue>,
}

impl Column {
    /// Create a column, checking every cell against the declared type
    pub fn new(
        name: impl Into<String>,
        logical_type: LogicalType,
        values: Vec<CellValue>,
    ) -> Result<Self, TableError> {
        let name = name.into();

        if logical_type != LogicalType::Object {
            for (row, value) in values.iter().enumerate() {
                if let Some(found) = value.logical_type() {
                    if found != logical_type {
                        return Err(TableError::TypeMismatch {
                            column: name,
                            declared: logical_type.to_string(),
                            found: found.to_string(),
                            row,
                        });
                    }
                }
            }
        }

        Ok(Self {
            name,
            logical_type,
            values,
        })
    }

    fn from_options<T, I>(name: impl Into<String>, logical_type: LogicalType, values: I) -> Self
    where
        T: Into<CellValue>,
        I: IntoIterator<Item = Option<T>>,
    {
        Self {
            name: name.into(),
            logical_type,
            values: values.into_iter().map(CellValue::from).collect(),
        }
    }

    /// String column; `None` entries are null
    pub fn strings<S, I>(name: impl Into<String>, values: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Option<S>>,
    {
        Self::from_options(
            name,
            LogicalType::String,
            values.into_iter().map(|v| v.map(Into::<String>::into)),
        )
    }

    /// Integer column; `None` entries are null
    pub fn integers(name: impl Into<String>, values: impl IntoIterator<Item = Option<i64>>) -> Self {
        Self::from_options(name, LogicalType::Integer, values)
    }

    /// Float column; `None` entries are null
    pub fn floats(name: impl Into<String>, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self::from_options(name, LogicalType::Float, values)
    }

    /// Boolean column; `None` entries are null
    pub fn booleans(name: impl Into<String>, values: impl IntoIterator<Item = Option<bool>>) -> Self {
        Self::from_options(name, LogicalType::Boolean, values)
    }

    /// Timestamp column; `None` entries are null
    pub fn timestamps(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Option<NaiveDateTime>>,
    ) -> Self {
        Self::from_options(name, LogicalType::Timestamp, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a cell by row index
    pub fn get(&self, row: usize) -> Option<&CellValue> {
        self.values.get(row)
    }

    /// Per-row missing flags
    pub fn null_mask(&self) -> Vec<bool> {
        self.values.iter().map(CellValue::is_null).collect()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Category of the values actually present
    pub fn category(&self) -> DtypeCategory {
        self.values
            .iter()
            .fold(DtypeCategory::Empty, |acc, v| acc.widen(v.category()))
    }

    /// Same cells under a different name
    pub fn renamed(&self, name: impl Into<String>) -> Column {
        Column {
            name: name.into(),
            logical_type: self.logical_type,
            values: self.values.clone(),
        }
    }
}

/// An ordered set of equally long, uniquely named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Create a table, checking row counts and name uniqueness
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(TableError::DuplicateColumn(column.name().to_string()));
            }
        }

        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(TableError::RowCountMismatch {
                    column: bad.name().to_string(),
                    expected,
                    actual: bad.len(),
                });
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Get column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Derived table with the columns renamed positionally
    pub fn with_column_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Table, TableError> {
        let columns = self
            .columns
            .iter()
            .zip(names)
            .map(|(column, name)| column.renamed(name.as_ref()))
            .collect();
        Table::new(columns)
    }
}
