//! Query file parsing
//!
//! Ties the pieces together: blocks are split by [`AnnotationScanner`], read by
//! [`QueryBlockParser`], return annotations resolved by [`ReturnFieldResolver`] and the
//! SQL rewritten by [`SqlRewriter`].

use serde::Deserialize;
use tiposaurus_core::{
    Config, Diagnostic, DiagnosticCode, Location, QueryDescriptor, QueryParameter, ReturnField,
    Severity,
};
use std::collections::HashMap;
use std::sync::Arc;
use crate::annotations::AnnotationScanner;
use crate::block::{BlockContent, QueryBlockParser, ReturnKind};
use crate::registry::FunctionRegistry;
use crate::resolver::AliasResolver;
use crate::return_fields::ReturnFieldResolver;
use crate::rewriter::SqlRewriter;

/// Result of parsing one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFile {
    /// Descriptors in file order
    pub queries: Vec<QueryDescriptor>,

    /// Non-fatal problems found while parsing
    pub diagnostics: Vec<Diagnostic>,
}

/// Metadata for [`Parser::parse_query`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryMetadata {
    pub name: Option<String>,
    pub description: Option<String>,

    /// Comma separated `name[:type]` list
    pub params: Option<String>,

    /// Return type label, `[]` suffix for lists
    pub returns: Option<String>,
}

/// Annotated SQL parser
#[derive(Debug, Clone)]
pub struct Parser {
    scanner: AnnotationScanner,
    registry: Arc<FunctionRegistry>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Parser with the `--` comment prefix and the built-in function registry
    pub fn new() -> Self {
        Self {
            scanner: AnnotationScanner::default(),
            registry: FunctionRegistry::builtin(),
        }
    }

    pub fn with_comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.scanner = AnnotationScanner::new(prefix);
        self
    }

    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Parser configured from `tiposaurus.toml`: comment prefix and custom functions
    pub fn from_config(config: &Config) -> Self {
        let parser = Self::new().with_comment_prefix(config.comment_prefix.clone());
        if config.custom_functions.is_empty() {
            return parser;
        }

        let registry = parser
            .registry
            .extended(config.custom_functions.iter().map(|(name, category)| (name, *category)));
        parser.with_registry(Arc::new(registry))
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn comment_prefix(&self) -> &str {
        self.scanner.comment_prefix()
    }

    /// Parse an in-memory file
    pub fn parse_file(&self, content: &str) -> ParsedFile {
        self.parse_file_at(content, "")
    }

    /// Parse a file's content; `path` is only used for diagnostics
    pub fn parse_file_at(&self, content: &str, path: &str) -> ParsedFile {
        let block_parser = QueryBlockParser::new(&self.scanner);
        let mut parsed = ParsedFile::default();

        for block in self.scanner.blocks(content) {
            let mut block_content = block_parser.parse(&block);
            parsed.diagnostics.extend(
                block_content
                    .diagnostics
                    .drain(..)
                    .map(|d| d.in_file(path)),
            );

            if !block_content.has_body() {
                tracing::debug!(
                    query = %block.name,
                    file = path,
                    "skipping block without SQL body"
                );
                parsed.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::QueryEmptyBody,
                        Severity::Info,
                        format!("Query '{}' has no SQL body and was skipped", block.name),
                    )
                    .with_location(Location::with_line(path, block.line))
                    .with_query(&block.name),
                );
                continue;
            }

            let query = self.build(block_content, path, &mut parsed.diagnostics);
            parsed.queries.push(query);
        }

        parsed.diagnostics.extend(duplicate_names(&parsed.queries, path));

        tracing::debug!(
            file = path,
            queries = parsed.queries.len(),
            diagnostics = parsed.diagnostics.len(),
            "parsed query file"
        );
        parsed
    }

    /// Build a descriptor for SQL described by `metadata` instead of annotations.
    /// Returns `None` when no name is given.
    pub fn parse_query(&self, sql: &str, metadata: &QueryMetadata) -> Option<QueryDescriptor> {
        let name = metadata.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;

        let params = metadata
            .params
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|param| {
                let (name, param_type) = match param.split_once(':') {
                    Some((name, param_type)) => (name.trim(), Some(param_type)),
                    None => (param.trim(), None),
                };
                (!name.is_empty()).then(|| QueryParameter::new(name, param_type))
            })
            .collect();

        let returns = metadata.returns.as_deref().map(str::trim).filter(|r| !r.is_empty());

        let content = BlockContent {
            name: name.to_string(),
            description: metadata.description.clone(),
            params,
            return_type: returns.map(str::to_string),
            return_single: Some(returns.map_or(true, |r| !r.ends_with("[]"))),
            body: sql.trim().to_string(),
            ..Default::default()
        };

        let mut diagnostics = Vec::new();
        Some(self.build(content, "", &mut diagnostics))
    }

    fn build(
        &self,
        content: BlockContent,
        path: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> QueryDescriptor {
        let resolver = ReturnFieldResolver::new(&self.registry);
        let rewriter = SqlRewriter::new(&self.registry);

        let mut return_fields: Vec<ReturnField> = Vec::with_capacity(content.returns.len());
        for annotation in &content.returns {
            let (resolved, code) = match annotation.kind {
                ReturnKind::Column => (
                    resolver.resolve_return(&annotation.text),
                    DiagnosticCode::AnnotationMalformedReturn,
                ),
                ReturnKind::Function => (
                    resolver.resolve_return_function(&annotation.text),
                    DiagnosticCode::AnnotationMalformedReturnFunction,
                ),
            };

            match resolved {
                Ok(field) => return_fields.push(field),
                Err(err) => {
                    tracing::warn!(
                        query = %content.name,
                        file = path,
                        line = annotation.line,
                        "{}",
                        err
                    );
                    diagnostics.push(
                        Diagnostic::warn(code, err.to_string())
                            .with_location(Location::with_line(path, annotation.line))
                            .with_query(&content.name),
                    );
                }
            }
        }

        let aliases = AliasResolver::resolve(&content.body);
        for conflict in aliases.conflicts() {
            let kept = aliases.alias_for(&conflict.table).unwrap_or_default();
            diagnostics.push(
                Diagnostic::warn(
                    DiagnosticCode::AliasConflict,
                    format!(
                        "Table '{}' is aliased as both '{}' and '{}'; using '{}'",
                        conflict.table, kept, conflict.alias, kept
                    ),
                )
                .with_location(Location::new(path))
                .with_query(&content.name),
            );
        }

        let sql = rewriter.rewrite(&content.body, &aliases, &return_fields);
        let tables = AliasResolver::table_names(&content.body);

        QueryDescriptor {
            return_type: content.return_type().to_string(),
            return_single: content.return_single(),
            name: content.name,
            description: content.description,
            raw_sql: content.body,
            sql,
            params: content.params,
            return_fields,
            tables,
        }
    }
}

/// Warnings for names used by more than one query
fn duplicate_names(queries: &[QueryDescriptor], path: &str) -> Vec<Diagnostic> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for query in queries {
        *counts.entry(query.name.as_str()).or_default() += 1;
    }

    let mut reported = Vec::new();
    queries
        .iter()
        .filter(|q| counts.get(q.name.as_str()).is_some_and(|&n| n > 1))
        .filter_map(|q| {
            if reported.contains(&q.name.as_str()) {
                return None;
            }
            reported.push(q.name.as_str());

            tracing::warn!(query = %q.name, file = path, "query name used more than once");
            Some(
                Diagnostic::warn(
                    DiagnosticCode::QueryDuplicateName,
                    format!("Query name '{}' is used more than once in this file", q.name),
                )
                .with_location(Location::new(path))
                .with_query(&q.name),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiposaurus_core::ValueCategory;

    #[test]
    fn parses_every_block() {
        let parser = Parser::new();
        let parsed = parser.parse_file(
            "-- @name A\nSELECT 1 FROM dual;\n\n\
             -- @name B\n-- @returnType Row[]\nSELECT * FROM t;\n",
        );

        assert_eq!(parsed.queries.len(), 2);
        assert_eq!(parsed.queries[0].name, "A");
        assert!(parsed.queries[0].return_single);
        assert!(!parsed.queries[1].return_single);
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn empty_blocks_are_dropped_with_info() {
        let parsed = Parser::new().parse_file_at("-- @name GetUser\n-- @param id\n\n", "users.sql");

        assert!(parsed.queries.is_empty());
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].code, DiagnosticCode::QueryEmptyBody);
        assert_eq!(parsed.diagnostics[0].severity, Severity::Info);
        assert_eq!(parsed.diagnostics[0].location, Some(Location::with_line("users.sql", 1)));
    }

    #[test]
    fn malformed_return_function_is_dropped() {
        let parsed = Parser::new().parse_file_at(
            "-- @name Totals\n\
             -- @returnFunction total SUM(o.total)\n\
             -- @returnFunction n:COUNT(*)\n\
             SELECT * FROM orders o",
            "orders.sql",
        );

        let query = &parsed.queries[0];
        assert_eq!(query.return_fields.len(), 1);
        assert_eq!(query.return_fields[0].alias, "n");
        assert_eq!(parsed.diagnostics[0].code, DiagnosticCode::AnnotationMalformedReturnFunction);
        assert_eq!(parsed.diagnostics[0].location, Some(Location::with_line("orders.sql", 2)));
    }

    #[test]
    fn duplicate_names_are_reported_once() {
        let parsed = Parser::new()
            .parse_file("-- @name Q\nSELECT 1\n-- @name Q\nSELECT 2\n-- @name Q\nSELECT 3");

        assert_eq!(parsed.queries.len(), 3);
        let duplicates: Vec<_> = parsed
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::QueryDuplicateName)
            .collect();
        assert_eq!(duplicates.len(), 1);
    }

    #[test]
    fn alias_conflicts_are_reported() {
        let parsed = Parser::new()
            .parse_file("-- @name Q\nSELECT 1 FROM users u JOIN users m ON m.id = u.manager_id");
        assert_eq!(parsed.diagnostics[0].code, DiagnosticCode::AliasConflict);
        assert_eq!(parsed.diagnostics[0].query.as_deref(), Some("Q"));
    }

    #[test]
    fn custom_functions_from_config() {
        let mut config = Config::default();
        config.comment_prefix = "#".to_string();
        config.custom_functions.insert("soundex_plus".to_string(), ValueCategory::String);

        let parser = Parser::from_config(&config);
        assert_eq!(parser.comment_prefix(), "#");
        assert_eq!(parser.registry().category("SOUNDEX_PLUS"), Some(ValueCategory::String));
        assert!(!FunctionRegistry::builtin().contains("SOUNDEX_PLUS"));

        let parsed = parser
            .parse_file("# @name Q\n# @return SOUNDEX_PLUS(u.name) as code\nSELECT * FROM users u");
        assert_eq!(parsed.queries[0].return_fields[0].field_type, "string");
    }

    #[test]
    fn parse_query_from_metadata() {
        let metadata = QueryMetadata {
            name: Some("ListUsers".to_string()),
            params: Some("status:string, limit".to_string()),
            returns: Some("User[]".to_string()),
            ..Default::default()
        };

        let query = Parser::new().parse_query("SELECT * FROM users", &metadata).unwrap();
        assert_eq!(query.name, "ListUsers");
        assert_eq!(query.params.len(), 2);
        assert_eq!(query.params[1].param_type, "any");
        assert_eq!(query.return_type, "User[]");
        assert!(!query.return_single);
        assert_eq!(query.tables, vec!["users"]);
    }

    #[test]
    fn parse_query_without_name() {
        let parser = Parser::new();
        assert_eq!(parser.parse_query("SELECT 1", &QueryMetadata::default()), None);

        let blank = QueryMetadata {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(parser.parse_query("SELECT 1", &blank), None);

        let named = QueryMetadata {
            name: Some("One".to_string()),
            ..Default::default()
        };
        let query = parser.parse_query("SELECT 1", &named).unwrap();
        assert!(query.return_single);
        assert_eq!(query.return_type, "any");
    }
}
