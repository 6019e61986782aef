//! Core port and status types for treeflow
//!
//! # Main Types
//!
//! - [`DataType`] - What kind of value a port carries
//! - [`InterpretAs`] - How the data matcher reads an input (per item, per list, whole tree)
//! - [`Sufficiency`] - Whether a component has enough input to calculate
//!
//! # Persisted Codes
//!
//! `DataType` and `InterpretAs` are stored in project files as integers. The
//! codes may be appended to but never renumbered, or saved projects would
//! silently change meaning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type of data carried by an input or output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataType {
    Number = 0,
    Boolean = 1,
    NumericArray = 2,
    String = 3,
    DataFrame = 4,
    /// Matches any other type when connecting
    #[default]
    Wild = 5,
    Null = 6,
    Comparator = 7,
    Array = 8,
}

impl DataType {
    /// Get the display name for this data type.
    pub fn display_name(&self) -> &'static str {
        match self {
            DataType::Number => "Number",
            DataType::Boolean => "Boolean",
            DataType::NumericArray => "Numeric Array",
            DataType::String => "String",
            DataType::DataFrame => "Data Frame",
            DataType::Wild => "(Any Data Type)",
            DataType::Null => "Null",
            DataType::Comparator => "Comparison Operator",
            DataType::Array => "List / Array",
        }
    }

    /// Whether an output of type `output` may feed an input of this type.
    pub fn accepts(self, output: DataType) -> bool {
        self == output || self == DataType::Wild || output == DataType::Wild
    }
}

impl From<DataType> for u8 {
    fn from(t: DataType) -> u8 {
        t as u8
    }
}

impl TryFrom<u8> for DataType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => DataType::Number,
            1 => DataType::Boolean,
            2 => DataType::NumericArray,
            3 => DataType::String,
            4 => DataType::DataFrame,
            5 => DataType::Wild,
            6 => DataType::Null,
            7 => DataType::Comparator,
            8 => DataType::Array,
            other => return Err(format!("unknown data type code {}", other)),
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// How the data matcher reads an input's tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum InterpretAs {
    /// One calculation per value
    #[default]
    Item = 0,
    /// One calculation per branch, receiving the whole branch as a list
    List = 1,
    /// The whole tree at once
    Tree = 2,
}

impl From<InterpretAs> for u8 {
    fn from(i: InterpretAs) -> u8 {
        i as u8
    }
}

impl TryFrom<u8> for InterpretAs {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(InterpretAs::Item),
            1 => Ok(InterpretAs::List),
            2 => Ok(InterpretAs::Tree),
            other => Err(format!("unknown interpretation code {}", other)),
        }
    }
}

impl fmt::Display for InterpretAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpretAs::Item => write!(f, "Item"),
            InterpretAs::List => write!(f, "List"),
            InterpretAs::Tree => write!(f, "Tree"),
        }
    }
}

/// Component readiness: `True` and `False` follow the required inputs,
/// `Error` means the last calculation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Sufficiency {
    #[default]
    False,
    True,
    Error,
}

impl Sufficiency {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Sufficiency::True)
    }
}

impl fmt::Display for Sufficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sufficiency::False => write!(f, "insufficient"),
            Sufficiency::True => write!(f, "sufficient"),
            Sufficiency::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_codes_round_trip() {
        for code in 0u8..=8 {
            let t = DataType::try_from(code).unwrap();
            assert_eq!(u8::from(t), code);
        }
        assert!(DataType::try_from(9).is_err());
    }

    #[test]
    fn test_data_type_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&DataType::String).unwrap(), "3");
        let t: DataType = serde_json::from_str("5").unwrap();
        assert_eq!(t, DataType::Wild);
    }

    #[test]
    fn test_wild_accepts_everything() {
        assert!(DataType::Wild.accepts(DataType::Number));
        assert!(DataType::Boolean.accepts(DataType::Wild));
        assert!(!DataType::Boolean.accepts(DataType::Number));
    }

    #[test]
    fn test_interpret_as_codes() {
        assert_eq!(serde_json::to_string(&InterpretAs::List).unwrap(), "1");
        assert!(InterpretAs::try_from(3).is_err());
    }
}
