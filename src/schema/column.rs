//! Column definition metadata.
//!
//! `Column` carries every attribute a generic migration API can express. Most of the
//! exotic ones (enum, charset, collation, ...) have no equivalent on the engine; they
//! exist so the DDL generator and the change validator can reject them explicitly.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static TYPE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:ARRAY<)?([A-Z0-9]+)(?:\((MAX|\d+)\))?>?$").expect("valid type pattern")
});

/// Engine column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bool,
    Int64,
    Float32,
    Float64,
    Numeric,
    String,
    Bytes,
    Date,
    Timestamp,
    Json,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Bool => "BOOL",
            ColumnType::Int64 => "INT64",
            ColumnType::Float32 => "FLOAT32",
            ColumnType::Float64 => "FLOAT64",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::String => "STRING",
            ColumnType::Bytes => "BYTES",
            ColumnType::Date => "DATE",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Json => "JSON",
        }
    }

    /// STRING and BYTES carry a length, everything else does not
    pub fn has_length(&self) -> bool {
        matches!(self, ColumnType::String | ColumnType::Bytes)
    }

    /// The one type change the engine performs in place
    pub fn is_convertible_to(&self, other: &ColumnType) -> bool {
        self == other
            || matches!(
                (self, other),
                (ColumnType::String, ColumnType::Bytes) | (ColumnType::Bytes, ColumnType::String)
            )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "BOOL" => Some(ColumnType::Bool),
            "INT64" => Some(ColumnType::Int64),
            "FLOAT32" => Some(ColumnType::Float32),
            "FLOAT64" => Some(ColumnType::Float64),
            "NUMERIC" => Some(ColumnType::Numeric),
            "STRING" => Some(ColumnType::String),
            "BYTES" => Some(ColumnType::Bytes),
            "DATE" => Some(ColumnType::Date),
            "TIMESTAMP" => Some(ColumnType::Timestamp),
            "JSON" => Some(ColumnType::Json),
            _ => None,
        }
    }

    /// Parse engine type text such as `STRING(MAX)`, `BYTES(16)` or `ARRAY<INT64>`.
    ///
    /// Returns the element type, its length and whether the column is an array.
    pub fn parse(text: &str) -> Option<(ColumnType, Option<ColumnLength>, bool)> {
        let text = text.trim();
        let caps = TYPE_PATTERN.captures(text)?;
        let column_type = ColumnType::from_name(caps.get(1)?.as_str())?;
        let length = match caps.get(2).map(|m| m.as_str()) {
            Some("MAX") => Some(ColumnLength::Max),
            Some(n) => Some(ColumnLength::Fixed(n.parse().ok()?)),
            None => None,
        };
        Some((column_type, length, text.starts_with("ARRAY<")))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Length of a STRING/BYTES column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnLength {
    Fixed(u32),
    Max,
}

impl fmt::Display for ColumnLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnLength::Fixed(n) => write!(f, "{n}"),
            ColumnLength::Max => f.write_str("MAX"),
        }
    }
}

/// Column default
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnDefault {
    /// Engine assigns the commit timestamp on write
    CommitTimestamp,
    /// Literal kept in the shadow table
    Literal(String),
}

/// How a value is produced when the caller does not supply one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationStrategy {
    Uuid,
    Increment,
}

impl GenerationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStrategy::Uuid => "uuid",
            GenerationStrategy::Increment => "increment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "uuid" => Some(GenerationStrategy::Uuid),
            "increment" => Some(GenerationStrategy::Increment),
            _ => None,
        }
    }
}

/// Generated column storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratedType {
    Virtual,
    Stored,
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub length: Option<ColumnLength>,
    pub nullable: bool,
    pub unique: bool,
    pub primary: bool,
    pub default: Option<ColumnDefault>,
    pub generation_strategy: Option<GenerationStrategy>,
    pub is_array: bool,
    pub enum_values: Option<Vec<String>>,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: Option<String>,
    pub as_expression: Option<String>,
    pub generated_type: Option<GeneratedType>,
    pub zerofill: bool,
    pub unsigned: bool,
    pub on_update: Option<String>,
}

impl Column {
    /// A nullable, non-key column with every other attribute unset
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            length: None,
            nullable: true,
            unique: false,
            primary: false,
            default: None,
            generation_strategy: None,
            is_array: false,
            enum_values: None,
            charset: None,
            collation: None,
            comment: None,
            as_expression: None,
            generated_type: None,
            zerofill: false,
            unsigned: false,
            on_update: None,
        }
    }

    pub fn length(mut self, length: ColumnLength) -> Self {
        self.length = Some(length);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn null(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Primary-key member; implies NOT NULL
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(ColumnDefault::Literal(value.into()));
        self
    }

    pub fn commit_timestamp(mut self) -> Self {
        self.default = Some(ColumnDefault::CommitTimestamp);
        self
    }

    pub fn generated(mut self, strategy: GenerationStrategy) -> Self {
        self.generation_strategy = Some(strategy);
        self
    }

    pub fn has_commit_timestamp(&self) -> bool {
        self.default == Some(ColumnDefault::CommitTimestamp)
    }

    /// Literal default stored in the shadow table
    pub fn literal_default(&self) -> Option<&str> {
        match &self.default {
            Some(ColumnDefault::Literal(value)) => Some(value),
            _ => None,
        }
    }

    /// True when the column has rows to keep in the shadow table
    pub fn has_extended_metadata(&self) -> bool {
        self.literal_default().is_some() || self.generation_strategy.is_some()
    }

    /// Length as the engine sees it: STRING/BYTES default to MAX
    pub fn effective_length(&self) -> Option<ColumnLength> {
        if self.column_type.has_length() {
            Some(self.length.unwrap_or(ColumnLength::Max))
        } else {
            self.length
        }
    }

    /// Rendered type, e.g. `STRING(MAX)` or `INT64`
    pub fn type_sql(&self) -> String {
        let base = if self.column_type.has_length() {
            format!(
                "{}({})",
                self.column_type.as_sql(),
                self.length.unwrap_or(ColumnLength::Max)
            )
        } else {
            self.column_type.as_sql().to_string()
        };
        if self.is_array {
            format!("ARRAY<{base}>")
        } else {
            base
        }
    }
}
