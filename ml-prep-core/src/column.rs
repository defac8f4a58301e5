//! Column model: inferred types and categorical class tables

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Inferred column type; never declared by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Every value parses as an integer
    #[serde(rename = "i")]
    Integer,
    /// Every value parses as a float
    #[serde(rename = "f")]
    Float,
    /// Anything else
    #[serde(rename = "S")]
    Text,
}

impl ColumnType {
    /// One-letter type code used in metadata
    pub fn code(self) -> char {
        match self {
            Self::Integer => 'i',
            Self::Float => 'f',
            Self::Text => 'S',
        }
    }

    /// Whether columns of this type carry a class table
    pub fn is_categorical(self) -> bool {
        matches!(self, Self::Integer | Self::Text)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// Bounded dictionary from raw values to dense codes in first-seen order
///
/// Once more than `threshold` distinct values have been offered the table
/// locks: it never grows again and every unseen value maps to
/// [`ClassTable::oov_code`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ClassTableParts", into = "ClassTableParts")]
pub struct ClassTable {
    /// Mapping from values to codes
    value_to_code: HashMap<String, u32>,

    /// Values in code order
    values: Vec<String>,

    /// Maximum number of distinct values before locking
    threshold: usize,

    /// Whether growth is disabled
    locked: bool,
}

impl ClassTable {
    /// Create a new class table with the given lock threshold
    pub fn new(threshold: usize) -> Self {
        Self {
            value_to_code: HashMap::new(),
            values: Vec::new(),
            threshold,
            locked: false,
        }
    }

    /// Get or insert a value, returning its code
    ///
    /// Offering a new value to a full table locks it and yields the
    /// out-of-vocabulary code.
    pub fn get_or_insert(&mut self, value: &str) -> u32 {
        if let Some(&code) = self.value_to_code.get(value) {
            return code;
        }
        if self.locked || self.values.len() >= self.threshold {
            self.locked = true;
            return self.oov_code();
        }
        let code = self.values.len() as u32;
        self.value_to_code.insert(value.to_string(), code);
        self.values.push(value.to_string());
        code
    }

    /// Code for a value without inserting; unseen values get the out-of-vocabulary code
    pub fn code(&self, value: &str) -> u32 {
        self.get_index(value).unwrap_or_else(|| self.oov_code())
    }

    /// Get the code for a known value
    pub fn get_index(&self, value: &str) -> Option<u32> {
        self.value_to_code.get(value).copied()
    }

    /// Get the value for a code
    pub fn get_value(&self, code: u32) -> Option<&str> {
        self.values.get(code as usize).map(String::as_str)
    }

    /// Reserved code shared by every value the table does not know
    pub fn oov_code(&self) -> u32 {
        self.values.len() as u32
    }

    /// Number of known values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the table has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether growth is disabled
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock threshold
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Known values in code order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

#[derive(Serialize, Deserialize)]
struct ClassTableParts {
    values: Vec<String>,
    threshold: usize,
    locked: bool,
}

impl From<ClassTableParts> for ClassTable {
    fn from(parts: ClassTableParts) -> Self {
        let value_to_code = parts
            .values
            .iter()
            .enumerate()
            .map(|(code, value)| (value.clone(), code as u32))
            .collect();
        Self {
            value_to_code,
            values: parts.values,
            threshold: parts.threshold,
            locked: parts.locked,
        }
    }
}

impl From<ClassTable> for ClassTableParts {
    fn from(table: ClassTable) -> Self {
        Self {
            values: table.values,
            threshold: table.threshold,
            locked: table.locked,
        }
    }
}

/// Description of one column of a tabular dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Header name, or the 1-based position when the file has no header
    pub name: String,

    /// Position of the originating column in the parsed file
    pub source_index: usize,

    /// Inferred type
    pub column_type: ColumnType,

    /// Class table for categorical columns
    pub classes: Option<ClassTable>,
}

impl ColumnInfo {
    /// Create a new column description
    pub fn new(name: impl Into<String>, source_index: usize, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            source_index,
            column_type,
            classes: None,
        }
    }

    /// Attach a class table
    #[must_use]
    pub fn with_classes(mut self, classes: ClassTable) -> Self {
        self.classes = Some(classes);
        self
    }

    /// Whether the column's class table stopped growing
    pub fn is_locked(&self) -> bool {
        self.classes.as_ref().is_some_and(ClassTable::is_locked)
    }

    /// Whether the column can be one-hot expanded
    ///
    /// Integer columns whose class table locked revert to plain numbers.
    pub fn is_categorical(&self) -> bool {
        match self.column_type {
            ColumnType::Text => self.classes.is_some(),
            ColumnType::Integer => self.classes.is_some() && !self.is_locked(),
            ColumnType::Float => false,
        }
    }

    /// Canonical class-table key for a stored numeric value
    ///
    /// Text columns store codes, other columns store their value.
    pub fn class_key(&self, stored: f64) -> Option<String> {
        match self.column_type {
            ColumnType::Text => {
                let classes = self.classes.as_ref()?;
                classes.get_value(stored as u32).map(str::to_string)
            }
            _ => Some(format_integer(stored)),
        }
    }
}

/// Render an integral float the way integer fields are keyed in class tables
pub fn format_integer(value: f64) -> String {
    format!("{}", value as i64)
}
