//! Table alias resolution
//!
//! Finds `FROM|JOIN <table> [AS] <alias>` bindings in raw SQL text and the names of
//! every table a statement touches.

use regex::Regex;
use std::sync::LazyLock;
use crate::lexer::{self, SqlText};

/// Words that can follow a table name without being its alias
const RESERVED_WORDS: &[&str] = &[
    "ALL", "AND", "ANY", "AS", "BETWEEN", "BY", "CASE", "CROSS", "DELETE", "DISTINCT", "DUAL",
    "ELSE", "END", "EXCEPT", "EXISTS", "FOR", "FORCE", "FROM", "FULL", "GROUP", "HAVING", "IGNORE",
    "IN", "INDEX", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "KEY", "LATERAL", "LEFT",
    "LIKE", "LIMIT", "LOCK", "NATURAL", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER",
    "PARTITION", "RIGHT", "SELECT", "SET", "SOME", "STRAIGHT_JOIN", "THEN", "UNION", "UPDATE",
    "USE", "USING", "VALUES", "WHEN", "WHERE", "WINDOW", "WITH",
];

static DML_TARGET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:INSERT\s+(?:IGNORE\s+)?INTO|UPDATE|DELETE\s+FROM)",
        r"\s+`?([A-Za-z_][A-Za-z0-9_]*)`?",
    ))
    .expect("DML target pattern is valid")
});

/// Whether `word` is an SQL keyword that can never be an alias
pub fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(word))
}

/// A table and the alias it is referenced by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAlias {
    pub table: String,
    pub alias: String,
}

/// Alias bindings of one query. The first alias recorded for a table wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableAliases {
    bindings: Vec<TableAlias>,
    conflicts: Vec<TableAlias>,
}

impl TableAliases {
    /// Record a binding; a second, different alias for a known table is kept as a conflict
    fn bind(&mut self, table: &str, alias: &str) {
        match self.bindings.iter().find(|b| b.table == table) {
            Some(existing) if existing.alias != alias => {
                tracing::warn!(
                    table,
                    kept = %existing.alias,
                    ignored = alias,
                    "table bound to more than one alias, keeping the first"
                );
                self.conflicts.push(TableAlias {
                    table: table.to_string(),
                    alias: alias.to_string(),
                });
            }
            Some(_) => {}
            None => self.bindings.push(TableAlias {
                table: table.to_string(),
                alias: alias.to_string(),
            }),
        }
    }

    /// Alias bound to `table`
    pub fn alias_for(&self, table: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.table == table)
            .map(|b| b.alias.as_str())
    }

    /// Whether `name` is used as an alias
    pub fn is_alias(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.alias == name)
    }

    /// Bindings in the order they appear
    pub fn iter(&self) -> impl Iterator<Item = &TableAlias> {
        self.bindings.iter()
    }

    /// Later aliases that lost against an earlier binding of the same table
    pub fn conflicts(&self) -> &[TableAlias] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A table reference found after FROM or JOIN
#[derive(Debug, Clone, PartialEq, Eq)]
struct TableRef<'a> {
    table: &'a str,
    alias: Option<&'a str>,
    offset: usize,
}

/// Scans SQL text for table references
pub struct AliasResolver;

impl AliasResolver {
    /// Collect table/alias bindings, left to right
    pub fn resolve(sql: &str) -> TableAliases {
        let mut aliases = TableAliases::default();

        for table_ref in Self::table_refs(sql) {
            if let Some(alias) = table_ref.alias {
                aliases.bind(table_ref.table, alias);
            }
        }

        aliases
    }

    /// Tables referenced by FROM, JOIN, INSERT INTO, UPDATE and DELETE FROM,
    /// de-duplicated in order of first appearance
    pub fn table_names(sql: &str) -> Vec<String> {
        let text = SqlText::new(sql);

        let mut found: Vec<(usize, &str)> = Self::table_refs(sql)
            .into_iter()
            .map(|r| (r.offset, r.table))
            .collect();

        for captures in DML_TARGET_PATTERN.captures_iter(sql) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if !text.is_code(whole.start()) || is_reserved_word(name.as_str()) {
                continue;
            }
            // ON DUPLICATE KEY UPDATE assigns columns, not a table
            if sql[..whole.start()].trim_end().to_ascii_uppercase().ends_with("KEY") {
                continue;
            }
            found.push((whole.start(), name.as_str()));
        }

        found.sort_by_key(|(offset, _)| *offset);

        let mut names: Vec<String> = Vec::new();
        for (_, name) in found {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Every `FROM|JOIN table [[AS] alias][, table [[AS] alias]]...` reference
    fn table_refs(sql: &str) -> Vec<TableRef<'_>> {
        let text = SqlText::new(sql);
        let mut refs = Vec::new();

        let mut keywords: Vec<usize> = ["FROM", "JOIN"]
            .iter()
            .flat_map(|kw| {
                let mut positions = Vec::new();
                let mut from = 0;
                while let Some(pos) = text.find_keyword_anywhere(kw, from) {
                    positions.push(pos + kw.len());
                    from = pos + kw.len();
                }
                positions
            })
            .collect();
        keywords.sort_unstable();

        for mut pos in keywords {
            if inside_call(&text, sql, pos - 1) {
                continue;
            }
            let level = text.depth_at(pos - 1);
            loop {
                let Some((table, table_start, after_table)) = next_word(sql, pos) else {
                    break;
                };
                if is_reserved_word(table) {
                    break;
                }

                let mut end = after_table;
                let mut alias = None;
                if let Some((word, _, after_word)) = next_word(sql, after_table) {
                    let candidate = if word.eq_ignore_ascii_case("AS") {
                        next_word(sql, after_word).map(|(w, _, after)| (w, after))
                    } else {
                        Some((word, after_word))
                    };

                    if let Some((candidate, after_candidate)) = candidate {
                        if !is_reserved_word(candidate) && !candidate.eq_ignore_ascii_case(table) {
                            alias = Some(candidate);
                            end = after_candidate;
                        }
                    }
                }

                refs.push(TableRef {
                    table,
                    alias,
                    offset: table_start,
                });

                // Comma joins: FROM a x, b y
                let rest = &sql[end..];
                let skipped = rest.len() - rest.trim_start().len();
                if rest[skipped..].starts_with(',') && text.depth_at(end + skipped) == level {
                    pos = end + skipped + 1;
                } else {
                    break;
                }
            }
        }

        refs
    }
}

/// Whether byte `pos` sits in the arguments of a call such as `TRIM(x FROM y)` or
/// `EXTRACT(YEAR FROM d)`, as opposed to a subquery opened after a keyword
fn inside_call(text: &SqlText, sql: &str, pos: usize) -> bool {
    let depth = match text.depth_at(pos) {
        Some(depth) if depth > 0 => depth,
        _ => return false,
    };

    let bytes = sql.as_bytes();
    let Some(open) = (0..pos)
        .rev()
        .find(|&i| bytes[i] == b'(' && text.depth_at(i) == Some(depth - 1))
    else {
        return false;
    };

    let name = sql[..open]
        .trim_end()
        .rsplit(|c: char| !lexer::is_word_char(c))
        .next()
        .unwrap_or_default();
    !name.is_empty() && !is_reserved_word(name)
}

/// Next identifier after whitespace: `(word, start, end)`. Backticks are stripped.
fn next_word(sql: &str, pos: usize) -> Option<(&str, usize, usize)> {
    let rest = sql.get(pos..)?;
    let start = pos + (rest.len() - rest.trim_start().len());
    let rest = &sql[start..];

    if let Some(quoted) = rest.strip_prefix('`') {
        let close = quoted.find('`')?;
        let word = &quoted[..close];
        return (!word.is_empty()).then_some((word, start + 1, start + close + 2));
    }

    let word = lexer::leading_identifier(rest)?;
    // `schema.table` and `table.*` are not plain table names
    if rest[word.len()..].starts_with('.') {
        return None;
    }
    Some((word, start, start + word.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(sql: &str) -> Vec<(String, String)> {
        AliasResolver::resolve(sql)
            .iter()
            .map(|b| (b.table.clone(), b.alias.clone()))
            .collect()
    }

    fn pair(table: &str, alias: &str) -> (String, String) {
        (table.to_string(), alias.to_string())
    }

    #[test]
    fn from_and_join() {
        let sql = "SELECT * FROM orders o JOIN customers c ON o.customer_id = c.id";
        assert_eq!(bindings(sql), vec![pair("orders", "o"), pair("customers", "c")]);
    }

    #[test]
    fn explicit_as_and_mixed_case() {
        let sql = "select * from users AS u left join roles as r on r.id = u.role_id";
        assert_eq!(bindings(sql), vec![pair("users", "u"), pair("roles", "r")]);
    }

    #[test]
    fn reserved_words_are_not_aliases() {
        let sql = "SELECT * FROM users JOIN roles ON roles.id = users.role_id WHERE users.id = ?";
        assert!(AliasResolver::resolve(sql).is_empty());

        let sql = "SELECT * FROM users\nWHERE id = ?";
        assert!(AliasResolver::resolve(sql).is_empty());
    }

    #[test]
    fn join_right_after_unaliased_table() {
        let sql = "SELECT * FROM users JOIN roles r ON r.id = users.role_id";
        assert_eq!(bindings(sql), vec![pair("roles", "r")]);
    }

    #[test]
    fn comma_joins() {
        let sql = "SELECT * FROM users u, orders o WHERE o.user_id = u.id";
        assert_eq!(bindings(sql), vec![pair("users", "u"), pair("orders", "o")]);
    }

    #[test]
    fn first_binding_wins() {
        let sql = "SELECT * FROM users u JOIN users manager ON manager.id = u.manager_id";
        let aliases = AliasResolver::resolve(sql);

        assert_eq!(aliases.alias_for("users"), Some("u"));
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases.conflicts().len(), 1);
        assert_eq!(aliases.conflicts()[0].alias, "manager");
    }

    #[test]
    fn alias_lookups() {
        let aliases = AliasResolver::resolve("SELECT 1 FROM `order_items` oi");
        assert_eq!(aliases.alias_for("order_items"), Some("oi"));
        assert!(aliases.is_alias("oi"));
        assert!(!aliases.is_alias("order_items"));
    }

    #[test]
    fn quoted_keywords_are_ignored() {
        let sql = "SELECT 'from x y' AS label FROM users u";
        assert_eq!(bindings(sql), vec![pair("users", "u")]);
    }

    #[test]
    fn subquery_aliases() {
        let sql = "SELECT * FROM (SELECT id FROM users u) sub JOIN orders o ON o.user_id = sub.id";
        assert_eq!(bindings(sql), vec![pair("users", "u"), pair("orders", "o")]);
    }

    #[test]
    fn table_names_cover_dml() {
        assert_eq!(
            AliasResolver::table_names("SELECT * FROM orders o JOIN customers c ON o.c = c.id"),
            vec!["orders", "customers"]
        );
        assert_eq!(
            AliasResolver::table_names(
                "INSERT INTO users (name) VALUES (?) ON DUPLICATE KEY UPDATE name = ?"
            ),
            vec!["users"]
        );
        assert_eq!(AliasResolver::table_names("UPDATE users SET a = 1"), vec!["users"]);
        assert_eq!(
            AliasResolver::table_names("DELETE FROM sessions WHERE id = ?"),
            vec!["sessions"]
        );
        assert_eq!(
            AliasResolver::table_names("SELECT * FROM a, b WHERE a.id IN (SELECT id FROM a)"),
            vec!["a", "b"]
        );
    }

    #[test]
    fn from_inside_calls_is_not_a_table() {
        assert_eq!(
            AliasResolver::table_names("SELECT TRIM(BOTH ' ' FROM name) FROM orders o"),
            vec!["orders"]
        );
        assert_eq!(
            bindings("SELECT EXTRACT(YEAR FROM o.created_at) y FROM orders o"),
            vec![pair("orders", "o")]
        );
        assert_eq!(
            AliasResolver::table_names(
                "SELECT * FROM a WHERE EXISTS (SELECT 1 FROM b) AND a.id = ANY (SELECT id FROM c)"
            ),
            vec!["a", "b", "c"]
        );
    }
}
