use chrono::NaiveDate;
use tabconv::config::{Config, CsvMode, DataFormat};
use tabconv::model::{CellValue, Column, LogicalType, Table};
use tabconv::sanitize::sanitize_names;
use tabconv::{decode, encode, verify_all};

fn adverse_events() -> Table {
    let onset = NaiveDate::from_ymd_opt(2023, 4, 17)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap();

    Table::new(vec![
        Column::strings("USUBJID", vec![Some("01-001"), Some("01-002"), Some("01-003")]),
        Column::strings("AETERM", vec![Some("HEADACHE"), Some(""), Some("0")]),
        Column::integers("AESEQ", vec![Some(1), Some(2), None]),
        Column::floats("AEDUR", vec![Some(2.5), None, Some(10.0)]),
        Column::booleans("AESER", vec![Some(true), Some(false), None]),
        Column::timestamps("AESTDTM", vec![Some(onset), None, Some(onset)]),
    ])
    .unwrap()
}

#[test]
fn test_row_count_is_invariant_across_formats() {
    let config = Config::default().with_csv_mode(CsvMode::NullAware);
    let table = adverse_events();

    for format in DataFormat::ALL {
        let bytes = encode(format, &table, &config).unwrap();
        let decoded = decode(format, &bytes, &config).unwrap();
        assert_eq!(decoded.row_count(), 3, "{}", format);
        assert_eq!(decoded.column_count(), 6, "{}", format);
    }
}

#[test]
fn test_parquet_is_an_identity() {
    let config = Config::default();
    let table = adverse_events();

    let bytes = encode(DataFormat::Parquet, &table, &config).unwrap();
    assert_eq!(decode(DataFormat::Parquet, &bytes, &config).unwrap(), table);
}

#[test]
fn test_literal_csv_keeps_empty_string_and_zero() {
    let config = Config::default();
    let csv = b"USUBJID,AETERM\n01-001,HEADACHE\n01-002,\"\"\n01-003,0\n";

    let table = decode(DataFormat::Csv, csv, &config).unwrap();
    let terms = table.column("AETERM").unwrap();
    assert_eq!(terms.get(1), Some(&CellValue::from("")));
    assert_eq!(terms.get(2), Some(&CellValue::from("0")));
    assert_eq!(terms.null_count(), 0);

    let encoded = encode(DataFormat::Csv, &table, &config).unwrap();
    assert_eq!(encoded, csv.to_vec());
}

#[test]
fn test_xpt_stores_timestamps_and_booleans_as_numbers() {
    let config = Config::default();
    let bytes = encode(DataFormat::Xpt, &adverse_events(), &config).unwrap();
    let decoded = decode(DataFormat::Xpt, &bytes, &config).unwrap();

    let onset = decoded.column("AESTDTM").unwrap();
    assert_eq!(onset.logical_type(), LogicalType::Timestamp);
    assert_eq!(onset.get(1), Some(&CellValue::Null));

    let serious = decoded.column("AESER").unwrap();
    assert_eq!(
        serious.values(),
        &[CellValue::Float(1.0), CellValue::Float(0.0), CellValue::Null]
    );
}

#[test]
fn test_sanitized_names_are_deterministic() {
    let names = ["Subject ID", "subject_id", "SUBJECT_ID_EXTRA_LONG"];
    let first = sanitize_names(&names).names();
    assert_eq!(first, vec!["SUBJECT_", "SUBJECT1", "SUBJECT2"]);
    assert_eq!(sanitize_names(&names).names(), first);
}

#[test]
fn test_verifier_reports_known_losses() {
    let config = Config::default().with_csv_mode(CsvMode::NullAware);
    let reports = verify_all(&adverse_events(), &config);
    assert_eq!(reports.len(), 3);

    let parquet = reports[1].fidelity().unwrap();
    assert!(parquet.is_lossless());

    // XPT keeps the rows but turns booleans into numbers and text nulls into blanks
    let xpt = reports[2].fidelity().unwrap();
    assert_eq!(xpt.row_delta, 0);
    assert!(xpt.schema.missing_columns.is_empty());
    assert!(xpt.schema.dtype_changes.iter().any(|c| c.column == "AESER"));
    assert!(xpt.value_diffs.iter().any(|d| d.column == "AESER"));
    assert!(xpt.value_diffs.iter().all(|d| d.column != "AESEQ"));
}
