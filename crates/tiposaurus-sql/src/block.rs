//! Per-block annotation extraction
//!
//! Annotations are only read before the SQL body starts. Comment lines after the
//! first SQL line are ignored, and a `@name` marker there ends the block.

use tiposaurus_core::{Diagnostic, DiagnosticCode, Location, QueryDescriptor, QueryParameter};
use crate::annotations::{AnnotationKey, AnnotationScanner, Line, QueryBlock};

/// Which return annotation a [`ReturnSpec`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// `@return <expr>[ as <alias>][:<type>]`
    Column,

    /// `@returnFunction <alias>:<expression>`
    Function,
}

/// An unresolved return annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSpec {
    pub kind: ReturnKind,
    pub text: String,

    /// 1-based line number in the file
    pub line: usize,
}

/// Everything read from one block, before return fields are resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockContent {
    pub name: String,
    pub description: Option<String>,
    pub params: Vec<QueryParameter>,
    pub return_type: Option<String>,
    pub return_single: Option<bool>,
    pub returns: Vec<ReturnSpec>,

    /// SQL lines, verbatim, joined with `\n`
    pub body: String,

    pub diagnostics: Vec<Diagnostic>,
}

impl BlockContent {
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }

    /// Declared wrapper type, `any` when absent
    pub fn return_type(&self) -> &str {
        self.return_type
            .as_deref()
            .unwrap_or(QueryDescriptor::DEFAULT_RETURN_TYPE)
    }

    /// Explicit `@returnSingle`, otherwise false only for an array `@returnType`
    pub fn return_single(&self) -> bool {
        self.return_single.unwrap_or_else(|| {
            !self
                .return_type
                .as_deref()
                .is_some_and(|t| t.ends_with("[]"))
        })
    }
}

/// Reads annotations and the SQL body of a block
#[derive(Debug, Clone, Copy)]
pub struct QueryBlockParser<'s> {
    scanner: &'s AnnotationScanner,
}

impl<'s> QueryBlockParser<'s> {
    pub fn new(scanner: &'s AnnotationScanner) -> Self {
        Self { scanner }
    }

    pub fn parse(&self, block: &QueryBlock<'_>) -> BlockContent {
        let mut content = BlockContent {
            name: block.name.clone(),
            ..Default::default()
        };
        let mut body: Vec<&str> = Vec::new();

        // The first line is the marker itself
        for (index, line) in block.text.lines().enumerate().skip(1) {
            let line_number = block.line + index;
            let body_started = !body.is_empty();

            match self.scanner.classify(line) {
                Line::Blank => {}
                Line::Sql(sql) => body.push(sql),
                _ if body_started => {
                    if self.scanner.marker_name(line).is_some() {
                        break;
                    }
                }
                Line::Annotation(key, value) => {
                    self.apply(&mut content, key, value, line_number);
                }
                Line::Comment(_) => {}
            }
        }

        content.body = body.join("\n").trim_end().to_string();
        content
    }

    fn apply(&self, content: &mut BlockContent, key: AnnotationKey, value: &str, line: usize) {
        match key {
            AnnotationKey::Name => {}
            AnnotationKey::Description => {
                content.description = Some(value.to_string());
            }
            AnnotationKey::Param => {
                let (name, param_type) = match value.split_once(':') {
                    Some((name, param_type)) => (name.trim(), Some(param_type)),
                    None => (value.trim(), None),
                };

                if name.is_empty() {
                    tracing::warn!(query = %content.name, line, "dropping @param without a name");
                    content.diagnostics.push(
                        Diagnostic::warn(
                            DiagnosticCode::AnnotationMalformedParam,
                            format!("@param `{}` has no parameter name", value),
                        )
                        .with_location(Location::with_line("", line))
                        .with_query(&content.name),
                    );
                } else {
                    content.params.push(QueryParameter::new(name, param_type));
                }
            }
            AnnotationKey::ReturnType => {
                content.return_type = Some(value.to_string());
            }
            AnnotationKey::ReturnSingle => {
                content.return_single = Some(value.eq_ignore_ascii_case("true"));
            }
            AnnotationKey::Return | AnnotationKey::ReturnFunction => {
                let kind = if key == AnnotationKey::Return {
                    ReturnKind::Column
                } else {
                    ReturnKind::Function
                };
                content.returns.push(ReturnSpec {
                    kind,
                    text: value.to_string(),
                    line,
                });
            }
        }
    }
}
