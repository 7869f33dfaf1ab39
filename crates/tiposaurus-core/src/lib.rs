//! Tiposaurus Core
//!
//! Core domain model shared by the annotation parser and the code generation shell.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod query;
pub mod schema;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use query::{QueryDescriptor, QueryParameter, ReturnField, NestedFunction, ValueCategory};
pub use schema::{
    ColumnMetadata, TableMetadata, SchemaIntrospector, StaticSchema, TypeMap, IntrospectionError,
};
pub use report::{Report, ReportVersion, ReportSummary, FileReport, TableReport, ColumnReport};
pub use config::{Config, DatabaseConfig, ConfigError};
