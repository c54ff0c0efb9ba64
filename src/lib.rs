//! tabconv - Clinical table conversion with round-trip verification
//!
//! Converts tables between CSV, Parquet and SAS Transport V5 (XPT) through a
//! typed in-memory model, and checks how faithfully each format stores a
//! table by encoding, decoding and diffing it.

pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod logging;
pub mod model;
pub mod output;
pub mod sanitize;
pub mod staging;
pub mod verify;
pub mod xpt;

pub use codec::{codec_for, sniff_format, Codec, CodecRegistry};
pub use config::{Config, CsvMode, DataFormat};
pub use convert::{convert, decode, encode, output_file_name};
pub use error::{ConvertError, TableError};
pub use model::{CellValue, Column, Table};
pub use verify::{verify_all, verify_round_trip, RoundTripReport};
