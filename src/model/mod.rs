//! Data model for tabular data representation

mod schema;
mod table;

pub use schema::{DtypeCategory, LogicalType};
pub use table::{CellValue, Column, Table, TIMESTAMP_FORMAT};
