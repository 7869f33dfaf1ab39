//! Static SQL function registry
//!
//! Maps uppercase function names to the category of value they return. Only functions
//! listed here are treated as type-bearing calls; anything else falls back to `any`.

use tiposaurus_core::ValueCategory;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

static BUILTIN: LazyLock<Arc<FunctionRegistry>> = LazyLock::new(|| {
    let entries: &[(&[&str], ValueCategory)] = &[
        (
            &[
                "CONCAT", "CONCAT_WS", "UPPER", "LOWER", "UCASE", "LCASE", "TRIM", "LTRIM",
                "RTRIM", "SUBSTRING", "SUBSTR", "SUBSTRING_INDEX", "LEFT", "RIGHT", "REPLACE",
                "REVERSE", "REPEAT", "LPAD", "RPAD", "GROUP_CONCAT", "FORMAT", "HEX", "MD5",
                "SHA1", "SHA2", "UUID", "DATE_FORMAT", "TIME_FORMAT", "MONTHNAME", "DAYNAME",
                "JSON_UNQUOTE", "JSON_TYPE", "QUOTE", "SOUNDEX",
            ],
            ValueCategory::String,
        ),
        (
            &[
                "COUNT", "SUM", "AVG", "MIN", "MAX", "ROUND", "FLOOR", "CEIL", "CEILING", "ABS",
                "MOD", "POW", "POWER", "SQRT", "EXP", "LN", "LOG", "SIGN", "TRUNCATE", "RAND",
                "LENGTH", "CHAR_LENGTH", "CHARACTER_LENGTH", "LOCATE", "INSTR", "POSITION",
                "FIND_IN_SET", "YEAR", "MONTH", "DAY", "DAYOFMONTH", "DAYOFWEEK", "DAYOFYEAR",
                "WEEK", "QUARTER", "HOUR", "MINUTE", "SECOND", "DATEDIFF", "TIMESTAMPDIFF",
                "UNIX_TIMESTAMP", "STDDEV", "STDDEV_POP", "STDDEV_SAMP", "VARIANCE", "VAR_POP",
                "VAR_SAMP", "BIT_COUNT", "JSON_LENGTH", "JSON_DEPTH", "ROW_NUMBER", "RANK",
                "DENSE_RANK", "LAST_INSERT_ID", "FOUND_ROWS",
            ],
            ValueCategory::Number,
        ),
        (
            &[
                "NOW", "CURDATE", "CURRENT_DATE", "CURTIME", "CURRENT_TIME", "CURRENT_TIMESTAMP",
                "SYSDATE", "UTC_DATE", "UTC_TIMESTAMP", "DATE", "DATE_ADD", "DATE_SUB", "ADDDATE",
                "SUBDATE", "STR_TO_DATE", "FROM_UNIXTIME", "LAST_DAY", "TIMESTAMP", "MAKEDATE",
                "CONVERT_TZ",
            ],
            ValueCategory::Date,
        ),
        (
            &["ISNULL", "EXISTS", "JSON_CONTAINS", "JSON_CONTAINS_PATH", "REGEXP_LIKE", "IS_UUID"],
            ValueCategory::Boolean,
        ),
        (
            &[
                "JSON_EXTRACT",
                "JSON_VALUE",
                "JSON_SET",
                "JSON_INSERT",
                "JSON_REPLACE",
                "JSON_REMOVE",
            ],
            ValueCategory::JsonAny,
        ),
        (&["JSON_OBJECT", "JSON_OBJECTAGG", "JSON_MERGE_PATCH"], ValueCategory::JsonObject),
        (&["JSON_ARRAY", "JSON_ARRAYAGG", "JSON_KEYS"], ValueCategory::JsonArray),
    ];

    let functions = entries
        .iter()
        .flat_map(|(names, category)| names.iter().map(move |name| (name.to_string(), *category)))
        .collect();

    Arc::new(FunctionRegistry { functions })
});

/// Immutable function-name -> category lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRegistry {
    functions: HashMap<String, ValueCategory>,
}

impl FunctionRegistry {
    /// The built-in registry, shared by every parser
    pub fn builtin() -> Arc<FunctionRegistry> {
        Arc::clone(&BUILTIN)
    }

    /// A registry that recognizes nothing
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// A new registry with `entries` added on top of this one.
    /// Later entries override earlier ones; `self` is left untouched.
    pub fn extended<I, S>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, ValueCategory)>,
        S: AsRef<str>,
    {
        let mut functions = self.functions.clone();
        for (name, category) in entries {
            functions.insert(name.as_ref().trim().to_uppercase(), category);
        }
        Self { functions }
    }

    /// Category of a function, matched case-insensitively
    pub fn category(&self, name: &str) -> Option<ValueCategory> {
        self.functions.get(&name.to_uppercase()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.category(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::builtin();
        assert_eq!(registry.category("sum"), Some(ValueCategory::Number));
        assert_eq!(registry.category("Now"), Some(ValueCategory::Date));
        assert_eq!(registry.category("JSON_OBJECT"), Some(ValueCategory::JsonObject));
        assert_eq!(registry.category("COALESCE"), None);
    }

    #[test]
    fn builtin_is_shared() {
        let a = FunctionRegistry::builtin();
        let b = FunctionRegistry::builtin();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn extending_produces_a_new_registry() {
        let builtin = FunctionRegistry::builtin();
        let extended =
            builtin.extended([("coalesce", ValueCategory::Any), ("SUM", ValueCategory::String)]);

        assert_eq!(extended.category("COALESCE"), Some(ValueCategory::Any));
        assert_eq!(extended.category("SUM"), Some(ValueCategory::String));
        assert_eq!(extended.len(), builtin.len() + 1);

        // The shared registry is unchanged
        assert_eq!(builtin.category("SUM"), Some(ValueCategory::Number));
        assert!(!builtin.contains("COALESCE"));
    }

    #[test]
    fn empty_registry() {
        let registry = FunctionRegistry::empty();
        assert!(registry.is_empty());
        assert!(!registry.contains("COUNT"));
    }
}
