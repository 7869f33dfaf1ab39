//! Annotated SQL parsing and rewriting
//!
//! This crate handles:
//! - Splitting query files into `@name` blocks and reading their annotations
//! - Resolving `@return` / `@returnFunction` fields and inferring their types
//! - Resolving table aliases in FROM / JOIN clauses
//! - Rewriting SQL so every output column has a predictable name

mod lexer;

pub mod annotations;
pub mod block;
pub mod inference;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod return_fields;
pub mod rewriter;

pub use annotations::{AnnotationKey, AnnotationScanner, BlockMarker, Line, QueryBlock};
pub use block::{BlockContent, QueryBlockParser, ReturnKind, ReturnSpec};
pub use inference::{ExpressionTypeInferencer, FunctionCall};
pub use parser::{ParsedFile, Parser, QueryMetadata};
pub use registry::FunctionRegistry;
pub use resolver::{AliasResolver, TableAlias, TableAliases};
pub use return_fields::{ReturnFieldError, ReturnFieldResolver};
pub use rewriter::SqlRewriter;
