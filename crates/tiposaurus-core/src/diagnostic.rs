//! Diagnostic codes and non-fatal error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Annotation problems (1xxx)
    /// `@returnFunction` line without the mandatory `alias:expression` colon
    AnnotationMalformedReturnFunction,

    /// `@param` line with an empty parameter name
    AnnotationMalformedParam,

    /// `@return` line with an empty field expression
    AnnotationMalformedReturn,

    // Query block problems (2xxx)
    /// Block had no SQL body and produced no descriptor
    QueryEmptyBody,

    /// The same query name appears more than once in one file
    QueryDuplicateName,

    // SQL analysis (3xxx)
    /// A table is bound to more than one alias within a single query
    AliasConflict,

    // I/O (4xxx)
    /// A query file could not be read
    FileReadError,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnnotationMalformedReturnFunction => "ANNOTATION_MALFORMED_RETURN_FUNCTION",
            Self::AnnotationMalformedParam => "ANNOTATION_MALFORMED_PARAM",
            Self::AnnotationMalformedReturn => "ANNOTATION_MALFORMED_RETURN",
            Self::QueryEmptyBody => "QUERY_EMPTY_BODY",
            Self::QueryDuplicateName => "QUERY_DUPLICATE_NAME",
            Self::AliasConflict => "ALIAS_CONFLICT",
            Self::FileReadError => "FILE_READ_ERROR",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - something was dropped or guessed, generation continues
    Warn,

    /// Error - the file could not be processed at all
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path (empty when parsing an in-memory string)
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
        }
    }

    /// Create a location with file and line number
    pub fn with_line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// Query the diagnostic belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            query: None,
        }
    }

    /// Shorthand for a warning
    pub fn warn(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warn, message)
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach the name of the query being parsed
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the file of an existing location, or create one
    pub fn in_file(mut self, file: &str) -> Self {
        match &mut self.location {
            Some(location) => location.file = file.to_string(),
            None => self.location = Some(Location::new(file)),
        }
        self
    }
}
