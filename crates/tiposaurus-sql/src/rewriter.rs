//! SQL text rewriting
//!
//! Stages run in a fixed order, each on the previous stage's output:
//!
//! 1. qualify SELECT-list columns with table aliases
//! 2. give function calls in the SELECT list an explicit alias
//! 3. camel-case `prefix_suffix` aliases
//! 4. strip `AS alias` fragments that are invalid outside the SELECT list
//!
//! When explicit return fields exist, [`SqlRewriter::apply_return_field_aliases`]
//! replaces all of the above.

use regex::{Captures, Regex};
use tiposaurus_core::ReturnField;
use std::ops::Range;
use std::sync::LazyLock;
use crate::inference::ExpressionTypeInferencer;
use crate::lexer::{self, SqlText};
use crate::registry::FunctionRegistry;
use crate::resolver::{is_reserved_word, TableAliases};

static TRAILING_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bAS\s+[`"]?\w+[`"]?$"#).expect("trailing alias pattern is valid")
});

static SNAKE_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([\w)'"`])(\s+AS\s+)([A-Za-z0-9]+)_([A-Za-z0-9]+)\b"#)
        .expect("snake alias pattern is valid")
});

static QUALIFIED_COLUMN_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\w+\.\w+)\s+AS\s+\w+").expect("qualified alias pattern is valid")
});

static ALIAS_BEFORE_OPERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+AS\s+\w+(\s*(?:<>|!=|>=|<=|=|>|<|\bIS\b|\bLIKE\b|\bIN\b|\bBETWEEN\b))")
        .expect("operator alias pattern is valid")
});

static ALIAS_AFTER_OPERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)((?:<>|!=|>=|<=|=|>|<|\bIS\b|\bLIKE\b|\bIN\b|\bBETWEEN\b)",
        r"\s*(?:[\w.]+|\?|:\w+|'[^']*'))\s+AS\s+\w+",
    ))
    .expect("operator alias pattern is valid")
});

static ALIAS_BEFORE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+AS\s+\w+(\s*=\s*(?:\?|:\w+|\$\d+))")
        .expect("placeholder alias pattern is valid")
});

/// Keywords that end an ON or WHERE condition
const CONDITION_TERMINATORS: &[&str] = &[
    "JOIN", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "UNION", "WINDOW",
];

/// Location of the top-level SELECT list
#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectList {
    /// Offset of the SELECT keyword
    select: usize,

    /// `DISTINCT`, `DISTINCTROW` or `ALL` as written
    modifier: Option<Range<usize>>,

    /// The expressions, between the keyword (and modifier) and FROM
    list: Range<usize>,

    /// Offset of the top-level FROM keyword
    from: Option<usize>,
}

impl SelectList {
    fn find(sql: &str) -> Option<Self> {
        let text = SqlText::new(sql);
        let select = text.find_keyword("SELECT", 0)?;
        let mut start = select + "SELECT".len();

        let rest = &sql[start..];
        let word_start = start + (rest.len() - rest.trim_start().len());
        let modifier = lexer::leading_identifier(&sql[word_start..])
            .filter(|w| {
                ["DISTINCT", "DISTINCTROW", "ALL"]
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(w))
            })
            .map(|w| word_start..word_start + w.len());
        if let Some(modifier) = &modifier {
            start = modifier.end;
        }

        let from = text.find_keyword("FROM", start);
        let end = from.unwrap_or_else(|| {
            sql.trim_end().trim_end_matches(';').trim_end().len()
        });

        (start <= end).then_some(Self {
            select,
            modifier,
            list: start..end,
            from,
        })
    }
}

/// Rewrites query SQL so every output column has a predictable name
#[derive(Debug, Clone, Copy)]
pub struct SqlRewriter<'r> {
    inferencer: ExpressionTypeInferencer<'r>,
}

impl<'r> SqlRewriter<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        Self {
            inferencer: ExpressionTypeInferencer::new(registry),
        }
    }

    /// Run the pipeline: return-field regeneration when `fields` is non-empty,
    /// otherwise stages 1 to 4
    pub fn rewrite(&self, sql: &str, aliases: &TableAliases, fields: &[ReturnField]) -> String {
        if !fields.is_empty() {
            return self.apply_return_field_aliases(sql, fields, aliases);
        }

        let sql = self.replace_tables_with_aliases(sql, aliases);
        let sql = self.add_missing_aliases_to_functions(&sql);
        let sql = Self::format_sql_aliases(&sql);
        Self::fix_invalid_sql_syntax(&sql)
    }

    /// Stage 1: `table.column` becomes `alias.column` inside the SELECT list
    pub fn replace_tables_with_aliases(&self, sql: &str, aliases: &TableAliases) -> String {
        let Some(select) = SelectList::find(sql) else {
            return sql.to_string();
        };

        let mut list = sql[select.list.clone()].to_string();
        for binding in aliases.iter() {
            list = replace_qualifier(&list, &binding.table, &binding.alias);
        }

        tracing::trace!(stage = "replace_tables_with_aliases", %list);
        splice(sql, select.list, &list)
    }

    /// Stage 2: recognized function calls without an alias get `AS propertyN`
    /// (N is the 1-based position in the SELECT list). `COUNT(*) total` becomes
    /// `COUNT(*) AS total`.
    pub fn add_missing_aliases_to_functions(&self, sql: &str) -> String {
        let Some(select) = SelectList::find(sql) else {
            return sql.to_string();
        };

        let list = &sql[select.list.clone()];
        let rewritten: Vec<String> = SqlText::new(list)
            .split_top_level(',')
            .into_iter()
            .enumerate()
            .map(|(index, range)| self.alias_function_item(&list[range], index + 1))
            .collect();
        let rewritten = rewritten.join(",");

        tracing::trace!(stage = "add_missing_aliases_to_functions", list = %rewritten);
        splice(sql, select.list, &rewritten)
    }

    fn alias_function_item(&self, item: &str, position: usize) -> String {
        let expr = item.trim();
        let Some(call) = self.inferencer.leading_call(expr) else {
            return item.to_string();
        };
        if TRAILING_ALIAS.is_match(expr) {
            return item.to_string();
        }

        let leading = &item[..item.len() - item.trim_start().len()];
        let trailing = &item[item.trim_end().len()..];
        let tail = expr[call.end..].trim();

        let aliased = if is_bare_alias(tail) {
            format!("{} AS {}", &expr[..call.end], tail)
        } else {
            format!("{} AS property{}", expr, position)
        };

        format!("{}{}{}", leading, aliased, trailing)
    }

    /// Stage 3: `AS first_name` becomes `AS firstName` in the SELECT list.
    /// Only aliases with exactly one underscore are touched.
    pub fn format_sql_aliases(sql: &str) -> String {
        let Some(select) = SelectList::find(sql) else {
            return sql.to_string();
        };

        let list = &sql[select.list.clone()];
        let scanned = SqlText::new(list);
        let formatted = SNAKE_ALIAS.replace_all(list, |caps: &Captures| {
            let whole = &caps[0];
            let alias_start = caps.get(3).map_or(0, |m| m.start());
            if !scanned.is_code(alias_start) {
                return whole.to_string();
            }

            let suffix = &caps[4];
            let mut chars = suffix.chars();
            let capitalized: String = chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect())
                .unwrap_or_default();

            format!("{}{}{}{}", &caps[1], &caps[2], &caps[3], capitalized)
        });

        tracing::trace!(stage = "format_sql_aliases", list = %formatted);
        splice(sql, select.list, &formatted)
    }

    /// Stage 4: remove `AS alias` fragments from conditions. Applies to the text after
    /// the top-level SELECT list, or to everything when there is none. SELECT lists of
    /// subqueries, derived tables and UNION branches keep their aliases.
    ///
    /// Idempotent: running it on its own output changes nothing.
    pub fn fix_invalid_sql_syntax(sql: &str) -> String {
        let mut current = sql.to_string();
        loop {
            let next = repair_once(&current);
            if next == current {
                break;
            }
            current = next;
        }

        tracing::trace!(stage = "fix_invalid_sql_syntax", sql = %current);
        current
    }

    /// Stage 5: rebuild the SELECT list from `fields` and keep the rest of the query
    /// from FROM onwards. SQL without a top-level SELECT ... FROM is returned as is.
    pub fn apply_return_field_aliases(
        &self,
        sql: &str,
        fields: &[ReturnField],
        aliases: &TableAliases,
    ) -> String {
        let located = SelectList::find(sql).and_then(|s| s.from.map(|from| (s, from)));
        let Some((select, from)) = located else {
            tracing::trace!(stage = "apply_return_field_aliases", "no SELECT ... FROM, SQL kept");
            return sql.to_string();
        };

        let columns: Vec<String> = fields
            .iter()
            .map(|field| {
                let qualifier = field
                    .source_table
                    .as_deref()
                    .map(|table| aliases.alias_for(table).unwrap_or(table));
                format!("{} AS {}", field.qualified_source(qualifier), field.alias)
            })
            .collect();

        let modifier = select
            .modifier
            .map(|range| format!("{} ", sql[range].to_uppercase()))
            .unwrap_or_default();

        let rewritten = format!(
            "{}SELECT {}{} {}",
            &sql[..select.select],
            modifier,
            columns.join(", "),
            Self::fix_invalid_sql_syntax(&sql[from..])
        );

        tracing::trace!(stage = "apply_return_field_aliases", sql = %rewritten);
        rewritten
    }
}

/// Whether an implicit alias follows a call, as in `COUNT(*) total` or `COUNT(*) "total"`
fn is_bare_alias(tail: &str) -> bool {
    let quoted = ['`', '"']
        .iter()
        .find_map(|&q| tail.strip_prefix(q).and_then(|t| t.strip_suffix(q)));
    match quoted {
        Some(name) => !name.is_empty() && !name.contains(['`', '"']),
        None => lexer::is_identifier(tail) && !is_reserved_word(tail),
    }
}

/// Replace every `table.` qualifier (whole word, outside quotes) with `alias.`
fn replace_qualifier(text: &str, table: &str, alias: &str) -> String {
    let scanned = SqlText::new(text);
    let needle = format!("{}.", table);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for (i, _) in text.match_indices(&needle) {
        let at_boundary = text[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !lexer::is_word_char(c) && c != '.');
        if i < last || !at_boundary || !scanned.is_code(i) {
            continue;
        }

        out.push_str(&text[last..i]);
        out.push_str(alias);
        out.push('.');
        last = i + needle.len();
    }

    out.push_str(&text[last..]);
    out
}

fn splice(sql: &str, range: Range<usize>, replacement: &str) -> String {
    format!("{}{}{}", &sql[..range.start], replacement, &sql[range.end..])
}

/// One pass of stage 4
fn repair_once(sql: &str) -> String {
    let region_start = SelectList::find(sql)
        .and_then(|s| s.from)
        .unwrap_or(0);
    let (head, region) = sql.split_at(region_start);

    let conditions = condition_spans(region);
    let protected = select_list_spans(region);
    let scanned = SqlText::new(region);
    let region = QUALIFIED_COLUMN_ALIAS.replace_all(region, |caps: &Captures| {
        let start = caps.get(0).map_or(0, |m| m.start());
        // Calls nested in the condition (`CAST(t.x AS CHAR)`) sit deeper than the keyword
        let in_condition = conditions
            .iter()
            .any(|(span, depth)| span.contains(&start) && scanned.depth_at(start) == *depth);
        if in_condition && !protected.iter().any(|span| span.contains(&start)) {
            caps[1].to_string()
        } else {
            caps[0].to_string()
        }
    });

    let region = strip_in_code(&ALIAS_BEFORE_OPERATOR, &region);
    let region = strip_in_code(&ALIAS_AFTER_OPERATOR, &region);
    let region = strip_in_code(&ALIAS_BEFORE_PLACEHOLDER, &region);

    format!("{}{}", head, region)
}

/// Replace matches of `pattern` with its first group, skipping matches inside quotes
/// or inside a SELECT list
fn strip_in_code(pattern: &Regex, text: &str) -> String {
    let scanned = SqlText::new(text);
    let protected = select_list_spans(text);
    pattern
        .replace_all(text, |caps: &Captures| {
            // Where the stripped `AS alias` starts: after group 1 when the match opens with it
            let at = match (caps.get(0), caps.get(1)) {
                (Some(whole), Some(kept)) if kept.start() == whole.start() => kept.end(),
                (Some(whole), _) => whole.start(),
                _ => return caps[0].to_string(),
            };
            if scanned.is_code(at) && !protected.iter().any(|span| span.contains(&at)) {
                caps[1].to_string()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Spans that follow an ON or WHERE keyword, up to the next clause keyword,
/// with the paren depth of the keyword
fn condition_spans(sql: &str) -> Vec<(Range<usize>, Option<usize>)> {
    let text = SqlText::new(sql);
    let mut spans = Vec::new();

    for keyword in ["ON", "WHERE"] {
        let mut from = 0;
        while let Some(pos) = text.find_keyword_anywhere(keyword, from) {
            let start = pos + keyword.len();
            let end = CONDITION_TERMINATORS
                .iter()
                .filter_map(|t| text.find_keyword_anywhere(t, start))
                .min()
                .unwrap_or(sql.len());
            spans.push((start..end, text.depth_at(pos)));
            from = start;
        }
    }

    spans
}

/// Every SELECT list at any depth: from the SELECT keyword to the FROM at the same
/// depth, or to the parenthesis closing its subquery
fn select_list_spans(sql: &str) -> Vec<Range<usize>> {
    let text = SqlText::new(sql);
    let mut spans = Vec::new();
    let mut from = 0;

    while let Some(pos) = text.find_keyword_anywhere("SELECT", from) {
        let start = pos + "SELECT".len();
        let depth = text.depth_at(pos);
        let end = (start..sql.len())
            .find(|&i| match text.depth_at(i) {
                Some(d) => Some(d) < depth || (Some(d) == depth && text.is_keyword_at("FROM", i)),
                None => false,
            })
            .unwrap_or(sql.len());
        spans.push(start..end);
        from = start;
    }

    spans
}
