//! Table metadata and the schema-introspection interface
//!
//! The parser never talks to a database. Code generation asks a [`SchemaIntrospector`]
//! for the columns of every table a query references and maps their database types
//! through a [`TypeMap`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A column as reported by the database
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name
    pub name: String,

    /// Full database type, e.g. `varchar(255)` or `tinyint(1)`
    #[serde(rename = "type")]
    pub column_type: String,

    /// Whether NULL is allowed
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnMetadata {
    /// Create a new non-nullable column
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable: false,
        }
    }

    /// Mark the column nullable
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Columns of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name
    pub name: String,

    /// Columns in ordinal order
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    /// Create table metadata from columns
    pub fn new(name: impl Into<String>, columns: Vec<ColumnMetadata>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Errors that can occur when describing tables
#[derive(Debug, thiserror::Error)]
pub enum IntrospectionError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Source of table metadata keyed by table name
pub trait SchemaIntrospector {
    /// Describe the columns of a table
    fn describe_table(&self, table: &str) -> Result<TableMetadata, IntrospectionError>;
}

/// In-memory schema, loadable from a JSON array of tables
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    tables: HashMap<String, TableMetadata>,
}

impl StaticSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a table
    pub fn add_table(&mut self, table: TableMetadata) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Build from a JSON string: `[{"name": "users", "columns": [...]}]`
    pub fn from_json(json: &str) -> Result<Self, IntrospectionError> {
        let tables: Vec<TableMetadata> = serde_json::from_str(json)
            .map_err(|e| IntrospectionError::ParseError(e.to_string()))?;

        let mut schema = Self::new();
        for table in tables {
            schema.add_table(table);
        }
        Ok(schema)
    }

    /// Load from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, IntrospectionError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| IntrospectionError::IoError(e.to_string()))?;
        Self::from_json(&contents)
    }

    /// Number of known tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl SchemaIntrospector for StaticSchema {
    fn describe_table(&self, table: &str) -> Result<TableMetadata, IntrospectionError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| IntrospectionError::TableNotFound(table.to_string()))
    }
}

/// Database column type -> generated type label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMap {
    entries: HashMap<String, String>,
}

impl Default for TypeMap {
    fn default() -> Self {
        let entries = [
            ("int", "number"),
            ("smallint", "number"),
            ("tinyint", "number"),
            ("mediumint", "number"),
            ("bigint", "number"),
            ("float", "number"),
            ("double", "number"),
            ("decimal", "number"),
            ("varchar", "string"),
            ("text", "string"),
            ("char", "string"),
            ("enum", "string"),
            ("date", "Date"),
            ("datetime", "Date"),
            ("timestamp", "Date"),
            ("boolean", "boolean"),
            ("tinyint(1)", "boolean"),
        ]
        .into_iter()
        .map(|(db, ts)| (db.to_string(), ts.to_string()))
        .collect();

        Self { entries }
    }
}

impl TypeMap {
    /// Fallback for unknown database types
    pub const FALLBACK: &'static str = "any";

    /// Default map extended (or overridden) by user entries
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut map = Self::default();
        for (db_type, target) in overrides {
            map.entries.insert(db_type.to_lowercase(), target.clone());
        }
        map
    }

    /// Map a database type. The exact type wins over its base type, so
    /// `tinyint(1)` maps to boolean while `tinyint(4)` maps to number.
    pub fn map(&self, db_type: &str) -> &str {
        let exact = db_type.trim().to_lowercase();
        if let Some(target) = self.entries.get(&exact) {
            return target;
        }

        let base = exact.split('(').next().unwrap_or_default().trim();
        self.entries
            .get(base)
            .map(String::as_str)
            .unwrap_or(Self::FALLBACK)
    }
}
