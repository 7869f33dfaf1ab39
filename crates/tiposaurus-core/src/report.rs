//! Generation report (stable v1)
//!
//! This is the document handed to code generation: every parsed query, every
//! diagnostic, and optionally the typed columns of referenced tables.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::diagnostic::{Diagnostic, Severity};
use crate::query::QueryDescriptor;
use crate::schema::{TableMetadata, TypeMap};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of query files processed
    pub files: usize,

    /// Number of query descriptors produced
    pub queries: usize,

    /// Total number of diagnostics
    pub total: usize,

    /// Number of errors
    pub errors: usize,

    /// Number of warnings
    pub warnings: usize,

    /// Number of info messages
    pub info: usize,
}

/// Queries and diagnostics of one `.sql` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    /// Path of the query file
    pub path: String,

    pub queries: Vec<QueryDescriptor>,

    pub diagnostics: Vec<Diagnostic>,
}

/// A column with its database type already mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReport {
    pub name: String,
    pub db_type: String,
    pub target_type: String,
    pub nullable: bool,
}

/// Typed columns of one referenced table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub name: String,
    pub columns: Vec<ColumnReport>,
}

impl TableReport {
    /// Map every column of `table` through `types`
    pub fn from_metadata(table: &TableMetadata, types: &TypeMap) -> Self {
        Self {
            name: table.name.clone(),
            columns: table
                .columns
                .iter()
                .map(|c| ColumnReport {
                    name: c.name.clone(),
                    db_type: c.column_type.clone(),
                    target_type: types.map(&c.column_type).to_string(),
                    nullable: c.nullable,
                })
                .collect(),
        }
    }
}

/// Generation report (queries.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// One entry per processed file
    pub files: Vec<FileReport>,

    /// Referenced tables, when a schema source was available
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableReport>,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            files: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Add a processed file and update the summary
    pub fn add_file(&mut self, file: FileReport) {
        self.summary.files += 1;
        self.summary.queries += file.queries.len();

        for diagnostic in &file.diagnostics {
            match diagnostic.severity {
                Severity::Error => self.summary.errors += 1,
                Severity::Warn => self.summary.warnings += 1,
                Severity::Info => self.summary.info += 1,
            }
            self.summary.total += 1;
        }

        self.files.push(file);
    }

    /// All queries across files, in file order
    pub fn queries(&self) -> impl Iterator<Item = &QueryDescriptor> {
        self.files.iter().flat_map(|f| f.queries.iter())
    }

    /// All diagnostics across files, in file order
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.files.iter().flat_map(|f| f.diagnostics.iter())
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file, creating parent directories
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCode;
    use crate::schema::ColumnMetadata;

    fn file_with(diagnostics: Vec<Diagnostic>) -> FileReport {
        FileReport {
            path: "queries/users.sql".to_string(),
            queries: Vec::new(),
            diagnostics,
        }
    }

    #[test]
    fn empty_report() {
        let report = Report::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 0);
        assert!(!report.has_errors());
    }

    #[test]
    fn summary_counts_diagnostics() {
        let mut report = Report::new();
        report.add_file(file_with(vec![
            Diagnostic::new(DiagnosticCode::FileReadError, Severity::Error, "unreadable"),
            Diagnostic::new(DiagnosticCode::QueryEmptyBody, Severity::Info, "empty"),
            Diagnostic::warn(DiagnosticCode::AliasConflict, "conflict"),
        ]));
        report.add_file(file_with(Vec::new()));

        assert_eq!(report.summary.files, 2);
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.info, 1);
        assert_eq!(report.diagnostics().count(), 3);
        assert!(report.has_errors());
    }

    #[test]
    fn table_report_maps_types() {
        let table = TableMetadata::new(
            "users",
            vec![
                ColumnMetadata::new("id", "int(11)"),
                ColumnMetadata::new("active", "tinyint(1)").nullable(),
            ],
        );

        let report = TableReport::from_metadata(&table, &TypeMap::default());
        assert_eq!(report.columns[0].target_type, "number");
        assert_eq!(report.columns[1].target_type, "boolean");
        assert!(report.columns[1].nullable);
    }

    #[test]
    fn report_serialization() {
        let report = Report::new();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"files\""));
        assert!(!json.contains("\"tables\""));
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/queries.json");

        Report::new().save_to_file(&path).unwrap();
        assert!(path.exists());
    }
}
