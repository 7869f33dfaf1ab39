//! Type inference for SQL expressions
//!
//! Classifies an expression by its outermost function call. Calls are only
//! type-bearing when their name is in the [`FunctionRegistry`]; nested calls never
//! decide the type of the expression that wraps them.

use tiposaurus_core::{NestedFunction, ValueCategory};
use crate::lexer::{self, SqlText};
use crate::registry::FunctionRegistry;

/// A function call found at the start of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCall<'a> {
    /// Function name as written
    pub name: &'a str,

    /// Text between the parentheses
    pub args: &'a str,

    /// Byte offset just past the closing parenthesis, relative to the input
    pub end: usize,
}

/// Classifies expressions using a function registry
#[derive(Debug, Clone, Copy)]
pub struct ExpressionTypeInferencer<'r> {
    registry: &'r FunctionRegistry,
}

impl<'r> ExpressionTypeInferencer<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r FunctionRegistry {
        self.registry
    }

    /// The outermost call `name(...)` starting the expression, whatever its name.
    ///
    /// Leading whitespace is skipped. Returns `None` when the parentheses never balance.
    pub fn outer_call<'a>(&self, expr: &'a str) -> Option<FunctionCall<'a>> {
        let start = expr.len() - expr.trim_start().len();
        let rest = &expr[start..];

        let name = lexer::leading_identifier(rest)?;
        let after_name = &rest[name.len()..];
        let open = start + name.len() + (after_name.len() - after_name.trim_start().len());
        if expr.as_bytes().get(open) != Some(&b'(') {
            return None;
        }

        let text = SqlText::new(expr);
        let close = text.matching_paren(open)?;

        Some(FunctionCall {
            name,
            args: &expr[open + 1..close],
            end: close + 1,
        })
    }

    /// Like [`outer_call`](Self::outer_call), but only for registered functions
    pub fn leading_call<'a>(&self, expr: &'a str) -> Option<FunctionCall<'a>> {
        self.outer_call(expr)
            .filter(|call| self.registry.contains(call.name))
    }

    /// A registered call that makes up the whole expression (`SUM(x)` but not `SUM(x) + 1`)
    pub fn function_expression<'a>(&self, expr: &'a str) -> Option<FunctionCall<'a>> {
        self.leading_call(expr)
            .filter(|call| expr[call.end..].trim().is_empty())
    }

    pub fn is_function_expression(&self, expr: &str) -> bool {
        self.function_expression(expr).is_some()
    }

    /// Category of the expression's outermost call; `any` if it is not a call or the
    /// outer name is unknown, even when inner calls are recognized.
    pub fn infer(&self, expr: &str) -> ValueCategory {
        self.outer_call(expr)
            .and_then(|call| self.registry.category(call.name))
            .unwrap_or(ValueCategory::Any)
    }

    /// Outer function info when a whole-expression call has registered calls among its arguments
    pub fn nested_function(&self, expr: &str) -> Option<NestedFunction> {
        let call = self.function_expression(expr)?;
        if !self.contains_registered_call(call.args) {
            return None;
        }

        Some(NestedFunction {
            outer: call.name.to_uppercase(),
            category: self.infer(expr),
        })
    }

    /// Whether any registered `name(` appears outside quotes
    fn contains_registered_call(&self, text: &str) -> bool {
        let scanned = SqlText::new(text);

        text.char_indices().any(|(i, c)| {
            if !(c.is_ascii_alphabetic() || c == '_') || !scanned.is_code(i) {
                return false;
            }
            let preceded_by_word = text[..i]
                .chars()
                .next_back()
                .is_some_and(|p| lexer::is_word_char(p) || p == '.');
            if preceded_by_word {
                return false;
            }
            self.leading_call(&text[i..]).is_some()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(expr: &str) -> ValueCategory {
        let registry = FunctionRegistry::builtin();
        ExpressionTypeInferencer::new(&registry).infer(expr)
    }

    #[test]
    fn simple_calls() {
        assert_eq!(infer("SUM(o.total)"), ValueCategory::Number);
        assert_eq!(infer("count(*)"), ValueCategory::Number);
        assert_eq!(infer("NOW()"), ValueCategory::Date);
        assert_eq!(infer("CONCAT(u.first, ' ', u.last)"), ValueCategory::String);
        assert_eq!(infer("JSON_ARRAYAGG(t.id)"), ValueCategory::JsonArray);
    }

    #[test]
    fn outer_call_decides_nested_type() {
        assert_eq!(infer("DATE_FORMAT(MAX(o.created_at), '%Y')"), ValueCategory::String);
        assert_eq!(infer("ROUND(AVG(LENGTH(u.name)), 2)"), ValueCategory::Number);
    }

    #[test]
    fn unknown_outer_call_is_any() {
        assert_eq!(infer("COALESCE(SUM(o.total), 0)"), ValueCategory::Any);
        assert_eq!(infer("u.name"), ValueCategory::Any);
        assert_eq!(infer("SUM(o.total"), ValueCategory::Any);
    }

    #[test]
    fn function_expression_must_span_whole_text() {
        let registry = FunctionRegistry::builtin();
        let inferencer = ExpressionTypeInferencer::new(&registry);

        assert!(inferencer.is_function_expression(" SUM(o.total) "));
        assert!(inferencer.is_function_expression("COUNT (DISTINCT u.id)"));
        assert!(!inferencer.is_function_expression("SUM(a) + SUM(b)"));
        assert!(!inferencer.is_function_expression("COALESCE(a, b)"));
        assert!(inferencer.leading_call("SUM(a) + SUM(b)").is_some());
    }

    #[test]
    fn call_positions() {
        let registry = FunctionRegistry::builtin();
        let inferencer = ExpressionTypeInferencer::new(&registry);

        let call = inferencer.outer_call("  IFNULL(SUM(x), 0) total").unwrap();
        assert_eq!(call.name, "IFNULL");
        assert_eq!(call.args, "SUM(x), 0");
        assert_eq!(call.end, 19);
    }

    #[test]
    fn nested_function_info() {
        let registry = FunctionRegistry::builtin();
        let inferencer = ExpressionTypeInferencer::new(&registry);

        let nested = inferencer.nested_function("round(sum(o.total), 2)").unwrap();
        assert_eq!(nested.outer, "ROUND");
        assert_eq!(nested.category, ValueCategory::Number);

        assert_eq!(inferencer.nested_function("SUM(o.total)"), None);
        assert_eq!(inferencer.nested_function("CONCAT('sum(', u.name)"), None);
        assert_eq!(inferencer.nested_function("COALESCE(SUM(x), 0)"), None);
    }
}
