//! Quote- and parenthesis-aware views over raw SQL text
//!
//! Every helper here is a pure function of the text it is given. Nothing keeps a
//! cursor between calls, so the same values can be shared by concurrent parses.

use std::ops::Range;

/// SQL text with the nesting depth of every byte precomputed.
///
/// Bytes inside quoted literals or backtick identifiers have no depth. A `(` carries
/// the depth outside it and its matching `)` carries the same depth.
pub(crate) struct SqlText<'a> {
    text: &'a str,
    depth: Vec<Option<usize>>,
}

impl<'a> SqlText<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let mut depth = vec![None; text.len()];
        let mut level = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;

        for (i, c) in text.char_indices() {
            let value = match quote {
                Some(q) => {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == q {
                        quote = None;
                    }
                    None
                }
                None => match c {
                    '\'' | '"' | '`' => {
                        quote = Some(c);
                        None
                    }
                    '(' => {
                        level += 1;
                        Some(level - 1)
                    }
                    ')' => {
                        level = level.saturating_sub(1);
                        Some(level)
                    }
                    _ => Some(level),
                },
            };

            for slot in &mut depth[i..i + c.len_utf8()] {
                *slot = value;
            }
        }

        Self { text, depth }
    }

    /// Depth at byte `i`, `None` inside quotes or out of range
    pub(crate) fn depth_at(&self, i: usize) -> Option<usize> {
        self.depth.get(i).copied().flatten()
    }

    /// Whether byte `i` is outside quotes
    pub(crate) fn is_code(&self, i: usize) -> bool {
        self.depth_at(i).is_some()
    }

    /// First whole-word, case-insensitive occurrence of `keyword` at paren depth 0
    pub(crate) fn find_keyword(&self, keyword: &str, from: usize) -> Option<usize> {
        self.find_word(keyword, from, true)
    }

    /// Like [`SqlText::find_keyword`] but at any depth (still outside quotes)
    pub(crate) fn find_keyword_anywhere(&self, keyword: &str, from: usize) -> Option<usize> {
        self.find_word(keyword, from, false)
    }

    /// Whether `keyword` starts at byte `i` as a whole word outside quotes
    pub(crate) fn is_keyword_at(&self, keyword: &str, i: usize) -> bool {
        let needle = keyword.as_bytes();
        !needle.is_empty()
            && self.is_code(i)
            && self
                .text
                .as_bytes()
                .get(i..i + needle.len())
                .is_some_and(|bytes| bytes.eq_ignore_ascii_case(needle))
            && is_word_start(self.text, i)
            && is_word_end(self.text, i + needle.len())
    }

    fn find_word(&self, word: &str, from: usize, top_level: bool) -> Option<usize> {
        (from..self.text.len()).find(|&i| {
            (!top_level || self.depth_at(i) == Some(0)) && self.is_keyword_at(word, i)
        })
    }

    /// Last case-insensitive occurrence of `pattern` starting at paren depth 0
    pub(crate) fn rfind_top_level(&self, pattern: &str) -> Option<usize> {
        let bytes = self.text.as_bytes();
        let needle = pattern.as_bytes();
        if needle.is_empty() || needle.len() > bytes.len() {
            return None;
        }

        (0..=bytes.len() - needle.len()).rev().find(|&i| {
            self.depth_at(i) == Some(0)
                && self.text.is_char_boundary(i)
                && bytes[i..i + needle.len()].eq_ignore_ascii_case(needle)
        })
    }

    /// Byte offset of the `)` closing the `(` at `open`
    pub(crate) fn matching_paren(&self, open: usize) -> Option<usize> {
        if self.text.as_bytes().get(open) != Some(&b'(') {
            return None;
        }
        let level = self.depth_at(open)?;

        self.text[open + 1..]
            .char_indices()
            .map(|(j, c)| (open + 1 + j, c))
            .find(|&(j, c)| c == ')' && self.depth_at(j) == Some(level))
            .map(|(j, _)| j)
    }

    /// Ranges between top-level occurrences of `separator`
    pub(crate) fn split_top_level(&self, separator: char) -> Vec<Range<usize>> {
        let mut parts = Vec::new();
        let mut start = 0;

        for (i, c) in self.text.char_indices() {
            if c == separator && self.depth_at(i) == Some(0) {
                parts.push(start..i);
                start = i + c.len_utf8();
            }
        }
        parts.push(start..self.text.len());
        parts
    }
}

/// Letters, digits and underscore
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_word_start(text: &str, i: usize) -> bool {
    text.is_char_boundary(i)
        && text[..i].chars().next_back().map_or(true, |c| !is_word_char(c))
}

fn is_word_end(text: &str, i: usize) -> bool {
    text.is_char_boundary(i)
        && text[i..].chars().next().map_or(true, |c| !is_word_char(c))
}

/// Identifier (`[A-Za-z_][A-Za-z0-9_]*`) at the very start of `s`
pub(crate) fn leading_identifier(s: &str) -> Option<&str> {
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }

    let end = chars
        .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(s.len(), |(i, _)| i);
    Some(&s[..end])
}

/// Whether `s` is a plain identifier
pub(crate) fn is_identifier(s: &str) -> bool {
    leading_identifier(s).is_some_and(|ident| ident.len() == s.len())
}
