//! Column type information

use serde::{Deserialize, Serialize};

/// Declared logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    /// Generic column whose cells may hold any value kind
    Object,
}

impl LogicalType {
    /// Widen the type to accommodate another type
    pub fn widen(self, other: LogicalType) -> LogicalType {
        if self == other {
            return self;
        }

        match (self, other) {
            (LogicalType::Integer, LogicalType::Float) | (LogicalType::Float, LogicalType::Integer) => {
                LogicalType::Float
            }
            _ => LogicalType::Object,
        }
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalType::String => write!(f, "string"),
            LogicalType::Integer => write!(f, "integer"),
            LogicalType::Float => write!(f, "float"),
            LogicalType::Boolean => write!(f, "boolean"),
            LogicalType::Timestamp => write!(f, "timestamp"),
            LogicalType::Object => write!(f, "object"),
        }
    }
}

/// Coarse classification of a column's actual values
///
/// Integers and floats share [`DtypeCategory::Numeric`], so a column that is
/// stored as float after a round trip stays in the same category while a
/// numeric column that comes back as text does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtypeCategory {
    /// No non-null values
    #[default]
    Empty,
    Numeric,
    Boolean,
    String,
    Temporal,
    Mixed,
}

impl DtypeCategory {
    /// Widen the category to accommodate another category
    pub fn widen(self, other: DtypeCategory) -> DtypeCategory {
        match (self, other) {
            (a, b) if a == b => a,
            (DtypeCategory::Empty, t) | (t, DtypeCategory::Empty) => t,
            _ => DtypeCategory::Mixed,
        }
    }
}

impl std::fmt::Display for DtypeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DtypeCategory::Empty => write!(f, "empty"),
            DtypeCategory::Numeric => write!(f, "numeric"),
            DtypeCategory::Boolean => write!(f, "boolean"),
            DtypeCategory::String => write!(f, "string"),
            DtypeCategory::Temporal => write!(f, "temporal"),
            DtypeCategory::Mixed => write!(f, "mixed"),
        }
    }
}
