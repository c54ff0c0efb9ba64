//! Transport-safe identifiers
//!
//! XPT variable and member names are at most 8 characters drawn from
//! `[A-Z0-9_]`. Arbitrary column names are mapped onto that space
//! deterministically, in input order, with numeric suffixes on collision.

use indexmap::IndexSet;

/// Maximum identifier length in a V5 transport file
pub const MAX_NAME_LEN: usize = 8;

/// Name used when nothing usable survives sanitization
pub const PLACEHOLDER_NAME: &str = "COL";

/// Sanitized names plus the original → stored mapping
///
/// There is exactly one stored name per input name, even when inputs repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedNames {
    originals: Vec<String>,
    stored: IndexSet<String>,
}

impl SanitizedNames {
    /// Stored names, in input order
    pub fn names(&self) -> Vec<String> {
        self.stored.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    /// Stored name for the first input called `original`
    pub fn get(&self, original: &str) -> Option<&str> {
        let idx = self.originals.iter().position(|name| name == original)?;
        self.stored.get_index(idx).map(String::as_str)
    }

    /// Original → stored pairs, in input order
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.originals
            .iter()
            .zip(&self.stored)
            .map(|(original, stored)| (original.as_str(), stored.as_str()))
    }

    /// Pairs whose stored name differs from the original
    pub fn renamed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs().filter(|(original, stored)| original != stored)
    }
}

/// Base identifier for one name, before collision handling
pub fn sanitize_identifier(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();

    if cleaned.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        cleaned
    }
}

/// Map every name to a unique transport identifier
pub fn sanitize_names<S: AsRef<str>>(names: &[S]) -> SanitizedNames {
    let mut originals = Vec::with_capacity(names.len());
    let mut stored: IndexSet<String> = IndexSet::with_capacity(names.len());

    for name in names {
        let base = sanitize_identifier(name.as_ref());
        let mut candidate = base.clone();
        let mut counter = 1usize;

        while stored.contains(&candidate) {
            let suffix = counter.to_string();
            let keep = MAX_NAME_LEN.saturating_sub(suffix.len()).min(base.len());
            // Base is pure ASCII, so byte slicing is on char boundaries
            candidate = format!("{}{}", &base[..keep], suffix);
            counter += 1;
        }

        originals.push(name.as_ref().to_string());
        stored.insert(candidate);
    }

    SanitizedNames { originals, stored }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_collisions_get_numeric_suffixes() {
        let names = ["Subject ID", "subject_id", "SUBJECT_ID_EXTRA_LONG"];
        let sanitized = sanitize_names(&names);
        assert_eq!(sanitized.names(), vec!["SUBJECT_", "SUBJECT1", "SUBJECT2"]);

        // Deterministic across runs
        assert_eq!(sanitize_names(&names), sanitized);
    }

    #[test]
    fn test_names_fit_the_transport_alphabet() {
        let names = ["age (years)", "bmi", "héight", "x.y.z", "a-very-long-name-indeed"];
        for stored in sanitize_names(&names).names() {
            assert!(stored.len() <= MAX_NAME_LEN, "{stored} too long");
            assert!(stored
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
        }
    }

    #[test]
    fn test_empty_name_uses_placeholder() {
        let sanitized = sanitize_names(&["", ""]);
        assert_eq!(sanitized.names(), vec!["COL", "COL1"]);
    }

    #[test]
    fn test_repeated_inputs_keep_one_output_each() {
        let sanitized = sanitize_names(&["AGE", "VISIT", "AGE"]);
        assert_eq!(sanitized.len(), 3);
        assert_eq!(sanitized.names(), vec!["AGE", "VISIT", "AGE1"]);
        assert_eq!(sanitized.get("AGE"), Some("AGE"));
        assert_eq!(
            sanitized.pairs().collect::<Vec<_>>(),
            vec![("AGE", "AGE"), ("VISIT", "VISIT"), ("AGE", "AGE1")]
        );
        assert_eq!(sanitized.renamed().collect::<Vec<_>>(), vec![("AGE", "AGE1")]);
    }

    #[test]
    fn test_short_base_keeps_whole_name() {
        let sanitized = sanitize_names(&["ab", "AB", "a.b"]);
        assert_eq!(sanitized.names(), vec!["AB", "AB1", "A_B"]);
    }

    #[test]
    fn test_mapping_lookup() {
        let sanitized = sanitize_names(&["USUBJID", "Visit Date"]);
        assert_eq!(sanitized.get("Visit Date"), Some("VISIT_DA"));
        assert_eq!(
            sanitized.renamed().collect::<Vec<_>>(),
            vec![("Visit Date", "VISIT_DA")]
        );
    }

    #[test]
    fn test_many_collisions_stay_unique() {
        let names: Vec<String> = (0..120).map(|i| format!("item {}#{}", i % 3, i)).collect();
        let stored = sanitize_names(&names).names();
        let unique: FxHashSet<&String> = stored.iter().collect();
        assert_eq!(unique.len(), stored.len());
        assert!(stored.iter().all(|s| s.len() <= MAX_NAME_LEN));
    }
}
