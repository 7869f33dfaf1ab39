//! Annotation line classification and block splitting
//!
//! A query file is a sequence of blocks, each starting at a `-- @name <Name>` line and
//! running to the next such line or the end of the file.

use regex::Regex;
use std::sync::LazyLock;

/// `@key[:] value` after the comment prefix has been removed
static ANNOTATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@([A-Za-z]+)\b(?:\s*:)?\s*(.*)$").expect("annotation pattern is valid")
});

/// Recognized annotation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKey {
    Name,
    Description,
    Param,
    ReturnType,
    ReturnSingle,
    Return,
    ReturnFunction,
}

impl AnnotationKey {
    /// Match an exact, case-sensitive keyword (`returnType`, not `returntype`)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let key = match keyword {
            "name" => Self::Name,
            "description" => Self::Description,
            "param" => Self::Param,
            "returnType" => Self::ReturnType,
            "returnSingle" => Self::ReturnSingle,
            "return" => Self::Return,
            "returnFunction" => Self::ReturnFunction,
            _ => return None,
        };
        Some(key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "@name",
            Self::Description => "@description",
            Self::Param => "@param",
            Self::ReturnType => "@returnType",
            Self::ReturnSingle => "@returnSingle",
            Self::Return => "@return",
            Self::ReturnFunction => "@returnFunction",
        }
    }
}

impl std::fmt::Display for AnnotationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One physical line of a query file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Empty or whitespace only
    Blank,

    /// SQL text, verbatim
    Sql(&'a str),

    /// A recognized annotation and its trimmed value
    Annotation(AnnotationKey, &'a str),

    /// Any other comment
    Comment(&'a str),
}

/// Start of a query block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMarker {
    /// Query name, trimmed
    pub name: String,

    /// Byte offset of the marker line
    pub offset: usize,

    /// 1-based line number of the marker line
    pub line: usize,
}

/// Text of one query block, marker line included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBlock<'a> {
    pub name: String,
    pub text: &'a str,
    pub line: usize,
}

/// Splits query files into named blocks.
///
/// Holds no cursor state, so one scanner can serve any number of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationScanner {
    prefix: String,
}

impl Default for AnnotationScanner {
    fn default() -> Self {
        Self::new("--")
    }
}

impl AnnotationScanner {
    pub fn new(comment_prefix: impl Into<String>) -> Self {
        Self {
            prefix: comment_prefix.into(),
        }
    }

    pub fn comment_prefix(&self) -> &str {
        &self.prefix
    }

    /// Classify a single line
    pub fn classify<'a>(&self, line: &'a str) -> Line<'a> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Line::Blank;
        }

        let Some(comment) = trimmed.strip_prefix(self.prefix.as_str()) else {
            return Line::Sql(line);
        };

        let comment = comment.trim_start();
        let annotation = ANNOTATION_PATTERN.captures(comment).and_then(|captures| {
            let key = AnnotationKey::from_keyword(captures.get(1)?.as_str())?;
            let value = captures.get(2).map_or("", |m| m.as_str().trim());
            Some(Line::Annotation(key, value))
        });

        annotation.unwrap_or(Line::Comment(comment))
    }

    /// Query name if `line` is a `@name` marker with a non-empty name
    pub fn marker_name<'a>(&self, line: &'a str) -> Option<&'a str> {
        match self.classify(line) {
            Line::Annotation(AnnotationKey::Name, name) if !name.is_empty() => Some(name),
            _ => None,
        }
    }

    /// Every `@name` marker, in file order
    pub fn markers(&self, text: &str) -> Vec<BlockMarker> {
        let mut markers = Vec::new();
        let mut offset = 0;

        for (index, line) in text.split_inclusive('\n').enumerate() {
            if let Some(name) = self.marker_name(line) {
                markers.push(BlockMarker {
                    name: name.to_string(),
                    offset,
                    line: index + 1,
                });
            }
            offset += line.len();
        }

        markers
    }

    /// Block texts between consecutive markers; the last block runs to end of file
    pub fn blocks<'a>(&self, text: &'a str) -> Vec<QueryBlock<'a>> {
        let markers = self.markers(text);
        let ends = markers
            .iter()
            .skip(1)
            .map(|m| m.offset)
            .chain(std::iter::once(text.len()));

        markers
            .iter()
            .zip(ends)
            .map(|(marker, end)| QueryBlock {
                name: marker.name.clone(),
                text: &text[marker.offset..end],
                line: marker.line,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_lines() {
        let scanner = AnnotationScanner::default();

        assert_eq!(scanner.classify("   "), Line::Blank);
        assert_eq!(scanner.classify("SELECT 1"), Line::Sql("SELECT 1"));
        assert_eq!(
            scanner.classify("-- @param id:number"),
            Line::Annotation(AnnotationKey::Param, "id:number")
        );
        assert_eq!(
            scanner.classify("  --@description:  Active users "),
            Line::Annotation(AnnotationKey::Description, "Active users")
        );
        assert_eq!(scanner.classify("-- plain comment"), Line::Comment("plain comment"));
        assert_eq!(scanner.classify("-- @unknown x"), Line::Comment("@unknown x"));
    }

    #[test]
    fn return_keys_are_distinct() {
        let scanner = AnnotationScanner::default();

        assert_eq!(
            scanner.classify("-- @returnFunction total:SUM(x)"),
            Line::Annotation(AnnotationKey::ReturnFunction, "total:SUM(x)")
        );
        assert_eq!(
            scanner.classify("-- @returnType User[]"),
            Line::Annotation(AnnotationKey::ReturnType, "User[]")
        );
        assert_eq!(
            scanner.classify("-- @return u.id"),
            Line::Annotation(AnnotationKey::Return, "u.id")
        );
        assert_eq!(
            scanner.classify("-- @returns u.id"),
            Line::Comment("@returns u.id")
        );
    }

    #[test]
    fn markers_and_blocks() {
        let text = "-- @name First\nSELECT 1;\n\n-- @name Second\nSELECT 2;\n";
        let scanner = AnnotationScanner::default();

        let markers = scanner.markers(text);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[1].name, "Second");
        assert_eq!(markers[1].line, 4);

        let blocks = scanner.blocks(text);
        assert_eq!(blocks[0].text, "-- @name First\nSELECT 1;\n\n");
        assert_eq!(blocks[1].text, "-- @name Second\nSELECT 2;\n");
    }

    #[test]
    fn no_markers_is_empty() {
        let scanner = AnnotationScanner::default();
        assert!(scanner.blocks("SELECT 1;").is_empty());
        assert!(scanner.blocks("-- @name   \nSELECT 1;").is_empty());
    }

    #[test]
    fn custom_prefix() {
        let scanner = AnnotationScanner::new("#");
        assert_eq!(scanner.marker_name("# @name Hash"), Some("Hash"));
        assert_eq!(scanner.classify("-- @name Dash"), Line::Sql("-- @name Dash"));
    }

    #[test]
    fn repeated_scans_are_independent() {
        let scanner = AnnotationScanner::default();
        let text = "-- @name A\nSELECT 1;\n-- @name B\nSELECT 2;";
        assert_eq!(scanner.blocks(text), scanner.blocks(text));
    }
}
