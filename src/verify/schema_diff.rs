//! Column-level comparison of a table with its round-tripped copy

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::model::{Column, DtypeCategory, LogicalType, Table};

/// Declared type changed across the round trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtypeChange {
    pub column: String,
    pub before: LogicalType,
    pub after: LogicalType,
}

/// Value category changed across the round trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMismatch {
    pub column: String,
    pub before: DtypeCategory,
    pub after: DtypeCategory,
}

/// Column stored under a different name by the target format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamedColumn {
    pub original: String,
    pub stored: String,
    pub index: usize,
}

/// Schema-level findings for one round trip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReport {
    pub dtype_changes: Vec<DtypeChange>,
    /// Original columns with no counterpart after the round trip
    pub missing_columns: Vec<String>,
    /// Columns that only exist after the round trip
    pub extra_columns: Vec<String>,
    pub renamed_columns: Vec<RenamedColumn>,
    pub category_mismatches: Vec<CategoryMismatch>,
}

impl SchemaReport {
    /// No missing or extra columns and no type or category change
    ///
    /// Renames are expected for some formats and do not count.
    pub fn is_clean(&self) -> bool {
        self.dtype_changes.is_empty()
            && self.missing_columns.is_empty()
            && self.extra_columns.is_empty()
            && self.category_mismatches.is_empty()
    }
}

impl std::fmt::Display for DtypeChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (type {} → {})", self.column, self.before, self.after)
    }
}

impl std::fmt::Display for CategoryMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (category {} → {})", self.column, self.before, self.after)
    }
}

impl std::fmt::Display for RenamedColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} → {} (position {})", self.original, self.stored, self.index)
    }
}

/// An original column paired with its round-tripped counterpart
#[derive(Debug, Clone, Copy)]
pub struct ColumnMatch<'a> {
    pub before: &'a Column,
    pub after: &'a Column,
}

/// Schema comparison engine
pub struct SchemaDiff;

impl SchemaDiff {
    /// Compare schemas, pairing columns through the stored-name mapping
    ///
    /// `stored_names[i]` is the name the target format gives `before`'s
    /// column `i`; absent entries mean the name is kept.
    pub fn compare<'a>(
        before: &'a Table,
        after: &'a Table,
        stored_names: &[String],
    ) -> (SchemaReport, Vec<ColumnMatch<'a>>) {
        let mut report = SchemaReport::default();
        let mut matches = Vec::new();
        let mut claimed: FxHashSet<&str> = FxHashSet::default();

        for (idx, before_col) in before.columns().iter().enumerate() {
            let stored = stored_names
                .get(idx)
                .map(String::as_str)
                .unwrap_or_else(|| before_col.name());

            let Some(after_col) = after.column(stored) else {
                report.missing_columns.push(before_col.name().to_string());
                continue;
            };
            claimed.insert(after_col.name());

            if stored != before_col.name() {
                report.renamed_columns.push(RenamedColumn {
                    original: before_col.name().to_string(),
                    stored: stored.to_string(),
                    index: idx,
                });
            }

            if before_col.logical_type() != after_col.logical_type() {
                report.dtype_changes.push(DtypeChange {
                    column: before_col.name().to_string(),
                    before: before_col.logical_type(),
                    after: after_col.logical_type(),
                });
            }

            let (before_cat, after_cat) = (before_col.category(), after_col.category());
            if before_cat != after_cat {
                report.category_mismatches.push(CategoryMismatch {
                    column: before_col.name().to_string(),
                    before: before_cat,
                    after: after_cat,
                });
            }

            matches.push(ColumnMatch {
                before: before_col,
                after: after_col,
            });
        }

        report.extra_columns = after
            .column_names()
            .into_iter()
            .filter(|name| !claimed.contains(name))
            .map(str::to_string)
            .collect();

        (report, matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_identical_schemas_are_clean() {
        let table = Table::new(vec![
            Column::strings("A", vec![Some("x")]),
            Column::integers("B", vec![Some(1)]),
        ])
        .unwrap();

        let (report, matches) = SchemaDiff::compare(&table, &table, &names(&["A", "B"]));
        assert!(report.is_clean());
        assert!(report.renamed_columns.is_empty());
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_renamed_columns_are_matched_through_mapping() {
        let before = Table::new(vec![Column::integers("Subject Age", vec![Some(30)])]).unwrap();
        let after = Table::new(vec![Column::floats("SUBJECT_", vec![Some(30.0)])]).unwrap();

        let (report, matches) = SchemaDiff::compare(&before, &after, &names(&["SUBJECT_"]));
        assert!(report.missing_columns.is_empty());
        assert!(report.extra_columns.is_empty());
        assert_eq!(report.renamed_columns[0].stored, "SUBJECT_");
        assert_eq!(
            report.dtype_changes,
            vec![DtypeChange {
                column: "Subject Age".to_string(),
                before: LogicalType::Integer,
                after: LogicalType::Float,
            }]
        );
        // Integer to float stays numeric
        assert!(report.category_mismatches.is_empty());
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_missing_and_extra_columns() {
        let before = Table::new(vec![Column::strings("A", vec![Some("x")])]).unwrap();
        let after = Table::new(vec![Column::strings("Z", vec![Some("x")])]).unwrap();

        let (report, matches) = SchemaDiff::compare(&before, &after, &names(&["A"]));
        assert_eq!(report.missing_columns, vec!["A"]);
        assert_eq!(report.extra_columns, vec!["Z"]);
        assert!(matches.is_empty());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_numeric_turning_into_text_is_a_category_mismatch() {
        let before = Table::new(vec![Column::floats("DOSE", vec![Some(1.5)])]).unwrap();
        let after = Table::new(vec![Column::strings("DOSE", vec![Some("1.5")])]).unwrap();

        let (report, _) = SchemaDiff::compare(&before, &after, &names(&["DOSE"]));
        assert_eq!(report.category_mismatches.len(), 1);
        assert_eq!(report.category_mismatches[0].after, DtypeCategory::String);
    }
}
