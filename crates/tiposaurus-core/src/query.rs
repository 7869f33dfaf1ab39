//! Query descriptors produced by the annotation parser
//!
//! These records are the hand-off format to code generation. They are built once per
//! annotated block and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Semantic output type category of a column or expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueCategory {
    /// Text
    String,

    /// Any numeric value
    Number,

    /// Date, time or timestamp
    Date,

    /// Boolean flag
    Boolean,

    /// JSON value of unknown shape
    JsonAny,

    /// JSON object
    JsonObject,

    /// JSON array
    JsonArray,

    /// Fallback when nothing better is known
    Any,
}

impl ValueCategory {
    /// Stable label used in descriptors and config files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::JsonAny => "json-any",
            Self::JsonObject => "json-object",
            Self::JsonArray => "json-array",
            Self::Any => "any",
        }
    }

    /// Parse a label produced by [`ValueCategory::as_str`] (case-insensitive)
    pub fn from_label(label: &str) -> Option<Self> {
        let category = match label.trim().to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "number" => Self::Number,
            "date" => Self::Date,
            "boolean" => Self::Boolean,
            "json-any" => Self::JsonAny,
            "json-object" => Self::JsonObject,
            "json-array" => Self::JsonArray,
            "any" => Self::Any,
            _ => return None,
        };
        Some(category)
    }
}

impl std::fmt::Display for ValueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared query parameter (`@param name:type`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,

    /// Declared type label, `any` when omitted
    #[serde(rename = "type")]
    pub param_type: String,
}

impl QueryParameter {
    pub const DEFAULT_TYPE: &'static str = "any";

    pub fn new(name: impl Into<String>, param_type: Option<&str>) -> Self {
        let param_type = param_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(Self::DEFAULT_TYPE);

        Self {
            name: name.into(),
            param_type: param_type.to_string(),
        }
    }
}

/// Outer function information for a return field whose expression nests calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedFunction {
    /// Outermost function name, uppercased
    pub outer: String,

    /// Category inferred from the outer function
    pub category: ValueCategory,
}

/// Provenance, alias and type of one output column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnField {
    /// Column name, or the full call text for function expressions. Never empty.
    pub source_field: String,

    /// Table qualifier of a column reference
    pub source_table: Option<String>,

    /// Output name. Never empty, defaults to `source_field`.
    pub alias: String,

    /// Declared type, or the inferred category label
    #[serde(rename = "type")]
    pub field_type: String,

    pub is_function: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<NestedFunction>,
}

impl ReturnField {
    /// A plain column reference, optionally qualified
    pub fn column(source_table: Option<String>, source_field: impl Into<String>) -> Self {
        let source_field = source_field.into();
        Self {
            alias: source_field.clone(),
            source_field,
            source_table,
            field_type: ValueCategory::Any.as_str().to_string(),
            is_function: false,
            nested: None,
        }
    }

    /// An arbitrary SQL expression, kept verbatim
    pub fn function(expression: impl Into<String>) -> Self {
        Self {
            is_function: true,
            ..Self::column(None, expression)
        }
    }

    /// Set the alias; blank aliases keep the `source_field` fallback
    pub fn with_alias(mut self, alias: &str) -> Self {
        let alias = alias.trim();
        if !alias.is_empty() {
            self.alias = alias.to_string();
        }
        self
    }

    pub fn with_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = field_type.into();
        self
    }

    pub fn with_nested(mut self, nested: Option<NestedFunction>) -> Self {
        self.nested = nested;
        self
    }

    /// `qualifier.field` for columns, where `qualifier` replaces the source table when
    /// given. Function expressions and unqualified columns come back as written.
    pub fn qualified_source(&self, qualifier: Option<&str>) -> String {
        match (qualifier.or(self.source_table.as_deref()), self.is_function) {
            (Some(table), false) => format!("{}.{}", table, self.source_field),
            _ => self.source_field.clone(),
        }
    }
}

/// Everything known about one annotated query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Query name from `@name`, never empty
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// SQL body exactly as written below the annotations
    pub raw_sql: String,

    /// SQL after the alias rewriting pipeline
    pub sql: String,

    pub params: Vec<QueryParameter>,

    /// Wrapper type label (`@returnType`), `any` by default
    pub return_type: String,

    /// Whether a single row is returned rather than a list
    pub return_single: bool,

    /// Explicit row shape from `@return` / `@returnFunction`, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub return_fields: Vec<ReturnField>,

    /// Tables referenced by the query, in first-seen order
    #[serde(default)]
    pub tables: Vec<String>,
}

impl QueryDescriptor {
    pub const DEFAULT_RETURN_TYPE: &'static str = "any";

    pub fn has_return_fields(&self) -> bool {
        !self.return_fields.is_empty()
    }

    /// Name of the row interface a generator should emit (`User[]` -> `User`)
    pub fn row_type_name(&self) -> &str {
        self.return_type.trim_end_matches("[]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_defaults_to_any() {
        assert_eq!(QueryParameter::new("id", None).param_type, "any");
        assert_eq!(QueryParameter::new("id", Some("  ")).param_type, "any");
        assert_eq!(QueryParameter::new("id", Some(" number ")).param_type, "number");
    }

    #[test]
    fn alias_falls_back_to_source_field() {
        let field = ReturnField::column(Some("u".to_string()), "email").with_alias("   ");
        assert_eq!(field.alias, "email");
        assert_eq!(field.qualified_source(None), "u.email");
        assert_eq!(field.qualified_source(Some("usr")), "usr.email");

        let field = field.with_alias("mail");
        assert_eq!(field.alias, "mail");
    }

    #[test]
    fn function_fields_are_unqualified() {
        let field = ReturnField::function("COUNT(*)");
        assert!(field.is_function);
        assert_eq!(field.source_table, None);
        assert_eq!(field.qualified_source(None), "COUNT(*)");
        assert_eq!(field.qualified_source(Some("u")), "COUNT(*)");
    }

    #[test]
    fn category_labels_round_trip() {
        for category in [
            ValueCategory::String,
            ValueCategory::Number,
            ValueCategory::Date,
            ValueCategory::Boolean,
            ValueCategory::JsonAny,
            ValueCategory::JsonObject,
            ValueCategory::JsonArray,
            ValueCategory::Any,
        ] {
            assert_eq!(ValueCategory::from_label(category.as_str()), Some(category));
        }
        assert_eq!(ValueCategory::from_label("NUMBER"), Some(ValueCategory::Number));
        assert_eq!(ValueCategory::from_label("decimal"), None);
    }

    #[test]
    fn category_serializes_kebab_case() {
        let json = serde_json::to_string(&ValueCategory::JsonObject).unwrap();
        assert_eq!(json, "\"json-object\"");
    }

    #[test]
    fn row_type_name_strips_array_marker() {
        let descriptor = QueryDescriptor {
            name: "ListUsers".to_string(),
            description: None,
            raw_sql: String::new(),
            sql: String::new(),
            params: Vec::new(),
            return_type: "User[]".to_string(),
            return_single: false,
            return_fields: Vec::new(),
            tables: Vec::new(),
        };
        assert_eq!(descriptor.row_type_name(), "User");
        assert!(!descriptor.has_return_fields());
    }
}
