use std::fmt;

use serde::{Deserialize, Serialize};

/// DataType is the local classification of a field, inferred from its remote tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Date,
    Text,
    Int,
    Decimal,
    Unknown,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::Date,
        DataType::Text,
        DataType::Int,
        DataType::Decimal,
        DataType::Unknown,
    ];

    /// The code stored in the catalog.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DataType::Date => "DATE",
            DataType::Text => "TEXT",
            DataType::Int => "INT",
            DataType::Decimal => "DECIMAL",
            DataType::Unknown => "UNKNOWN",
        }
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DataType::Date => "Date",
            DataType::Text => "Text",
            DataType::Int => "Integer",
            DataType::Decimal => "Decimal",
            DataType::Unknown => "Undefined",
        }
    }

    /// Converts a stored code back to a data type.
    pub fn parse(s: &str) -> Option<DataType> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
