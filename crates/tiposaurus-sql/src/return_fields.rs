//! `@return` and `@returnFunction` annotation parsing

use tiposaurus_core::{ReturnField, ValueCategory};
use crate::inference::ExpressionTypeInferencer;
use crate::lexer::SqlText;
use crate::registry::FunctionRegistry;

/// Why a return annotation produced no field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReturnFieldError {
    #[error("@return has no field expression")]
    EmptyExpression,

    #[error("@returnFunction expects `alias:expression`, got `{0}`")]
    MissingColon(String),

    #[error("@returnFunction `{0}` has an empty alias or expression")]
    EmptySide(String),
}

/// Turns return annotations into [`ReturnField`] records
#[derive(Debug, Clone, Copy)]
pub struct ReturnFieldResolver<'r> {
    inferencer: ExpressionTypeInferencer<'r>,
}

impl<'r> ReturnFieldResolver<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        Self {
            inferencer: ExpressionTypeInferencer::new(registry),
        }
    }

    /// Parse `<expr>[ as <alias>][ : <type>]`
    pub fn resolve_return(&self, annotation: &str) -> Result<ReturnField, ReturnFieldError> {
        let annotation = annotation.trim();

        let (rest, declared) = match SqlText::new(annotation).rfind_top_level(":") {
            Some(colon) => {
                let declared = annotation[colon + 1..].trim();
                (&annotation[..colon], (!declared.is_empty()).then_some(declared))
            }
            None => (annotation, None),
        };

        let (expr, alias) = match SqlText::new(rest).rfind_top_level(" as ") {
            Some(split) => (&rest[..split], rest[split + 4..].trim()),
            None => (rest, ""),
        };
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(ReturnFieldError::EmptyExpression);
        }

        let field = if self.inferencer.is_function_expression(expr) {
            let inferred = self.inferencer.infer(expr);
            ReturnField::function(expr)
                .with_type(declared.unwrap_or(inferred.as_str()))
                .with_nested(self.inferencer.nested_function(expr))
        } else {
            let (table, column) = match expr.rsplit_once('.') {
                Some((table, column)) => (Some(table.trim().to_string()), column.trim()),
                None => (None, expr),
            };
            if column.is_empty() {
                return Err(ReturnFieldError::EmptyExpression);
            }

            let inferred = column_category(column);
            ReturnField::column(table, column).with_type(declared.unwrap_or(inferred.as_str()))
        };

        Ok(field.with_alias(alias))
    }

    /// Parse `<alias>:<expression>`; the colon is mandatory
    pub fn resolve_return_function(
        &self,
        annotation: &str,
    ) -> Result<ReturnField, ReturnFieldError> {
        let annotation = annotation.trim();
        let Some((alias, expr)) = annotation.split_once(':') else {
            return Err(ReturnFieldError::MissingColon(annotation.to_string()));
        };

        let (alias, expr) = (alias.trim(), expr.trim());
        if alias.is_empty() || expr.is_empty() {
            return Err(ReturnFieldError::EmptySide(annotation.to_string()));
        }

        let category = self
            .inferencer
            .outer_call(expr)
            .and_then(|call| self.inferencer.registry().category(call.name))
            .unwrap_or_else(|| alias_category(alias));

        Ok(ReturnField::function(expr)
            .with_alias(alias)
            .with_type(category.as_str())
            .with_nested(self.inferencer.nested_function(expr)))
    }
}

/// Category guessed from a column name
pub fn column_category(column: &str) -> ValueCategory {
    if column.eq_ignore_ascii_case("id") || column.ends_with("_id") || column.contains("Id") {
        ValueCategory::Number
    } else if ["date", "time", "Date", "Time"].iter().any(|p| column.contains(p))
        || column.ends_with("_at")
    {
        ValueCategory::Date
    } else if column.starts_with("is_") || column.starts_with("has_") {
        ValueCategory::Boolean
    } else {
        ValueCategory::String
    }
}

/// Category guessed from a `@returnFunction` alias when the expression gives no answer
fn alias_category(alias: &str) -> ValueCategory {
    let alias = alias.to_lowercase();
    if alias.starts_with("is_") || alias.starts_with("has_") {
        ValueCategory::Boolean
    } else if alias.contains("id") {
        ValueCategory::Number
    } else if alias.contains("date") || alias.contains("time") {
        ValueCategory::Date
    } else {
        ValueCategory::String
    }
}
