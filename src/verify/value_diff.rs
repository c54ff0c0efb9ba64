//! Cell-level comparison of matched columns

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::model::CellValue;

use super::schema_diff::ColumnMatch;

/// Comparison key for missing values
pub const NA_SENTINEL: &str = "<NA>";

/// Largest magnitude below which an integral float is printed as an integer
const INTEGRAL_LIMIT: f64 = 9_007_199_254_740_992.0;

/// One differing cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMismatch {
    pub row: usize,
    pub before: String,
    pub after: String,
}

/// Value differences in one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnValueDiff {
    pub column: String,
    pub stored_name: String,
    pub mismatch_count: usize,
    /// First mismatching rows, in row order
    pub samples: Vec<ValueMismatch>,
}

/// Stringified form of a cell used for comparison
///
/// Nulls become [`NA_SENTINEL`] and integral floats lose their fraction, so a
/// numeric column stored as floats compares equal to its integer original.
pub fn comparison_key(value: &CellValue) -> Cow<'_, str> {
    match value {
        CellValue::Null => Cow::Borrowed(NA_SENTINEL),
        CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < INTEGRAL_LIMIT => {
            Cow::Owned(format!("{}", *f as i64))
        }
        other => other.display(),
    }
}

/// Compares matched columns cell by cell
pub struct ValueComparator {
    sample_limit: usize,
}

impl ValueComparator {
    pub fn new(sample_limit: usize) -> Self {
        Self { sample_limit }
    }

    /// Diff one column pair over the rows both sides have
    pub fn compare(&self, pair: &ColumnMatch<'_>) -> Option<ColumnValueDiff> {
        let mut mismatch_count = 0usize;
        let mut samples = Vec::new();

        for (row, (before, after)) in pair
            .before
            .values()
            .iter()
            .zip(pair.after.values())
            .enumerate()
        {
            let (before_key, after_key) = (comparison_key(before), comparison_key(after));
            if before_key == after_key {
                continue;
            }

            mismatch_count += 1;
            if samples.len() < self.sample_limit {
                samples.push(ValueMismatch {
                    row,
                    before: before_key.into_owned(),
                    after: after_key.into_owned(),
                });
            }
        }

        (mismatch_count > 0).then(|| ColumnValueDiff {
            column: pair.before.name().to_string(),
            stored_name: pair.after.name().to_string(),
            mismatch_count,
            samples,
        })
    }

    /// Diff every matched pair, keeping only columns with mismatches
    pub fn compare_all(&self, pairs: &[ColumnMatch<'_>]) -> Vec<ColumnValueDiff> {
        pairs.iter().filter_map(|pair| self.compare(pair)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;

    #[test]
    fn test_comparison_key() {
        assert_eq!(comparison_key(&CellValue::Null), NA_SENTINEL);
        assert_eq!(comparison_key(&CellValue::Float(34.0)), "34");
        assert_eq!(comparison_key(&CellValue::Float(-2.0)), "-2");
        assert_eq!(comparison_key(&CellValue::Float(70.5)), "70.5");
        assert_eq!(comparison_key(&CellValue::Int(34)), "34");
        assert_eq!(comparison_key(&CellValue::from("")), "");
        assert_eq!(comparison_key(&CellValue::Float(f64::NAN)), "NaN");
    }

    #[test]
    fn test_integers_stored_as_floats_match() {
        let before = Column::integers("AGE", vec![Some(34), None]);
        let after = Column::floats("AGE", vec![Some(34.0), None]);
        let pair = ColumnMatch {
            before: &before,
            after: &after,
        };
        assert!(ValueComparator::new(10).compare(&pair).is_none());
    }

    #[test]
    fn test_null_and_empty_string_differ() {
        let before = Column::strings("AETERM", vec![Some("HEADACHE"), None]);
        let after = Column::strings("AETERM", vec![Some("HEADACHE"), Some("")]);
        let pair = ColumnMatch {
            before: &before,
            after: &after,
        };

        let diff = ValueComparator::new(10).compare(&pair).unwrap();
        assert_eq!(diff.mismatch_count, 1);
        assert_eq!(
            diff.samples,
            vec![ValueMismatch {
                row: 1,
                before: NA_SENTINEL.to_string(),
                after: String::new(),
            }]
        );
    }

    #[test]
    fn test_samples_are_capped_but_count_is_not() {
        let before = Column::integers("N", (0..25).map(Some));
        let after = Column::integers("N", (100..125).map(Some));
        let pair = ColumnMatch {
            before: &before,
            after: &after,
        };

        let diff = ValueComparator::new(3).compare(&pair).unwrap();
        assert_eq!(diff.mismatch_count, 25);
        let rows: Vec<usize> = diff.samples.iter().map(|s| s.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);
    }
}
