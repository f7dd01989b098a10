#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Positional extraction of the header fields students fill in at the top of
//! their source file.

use std::{collections::HashMap, sync::LazyLock};

use itertools::Itertools;
use regex::Regex;

use crate::constants::REQUIRED_HEADER_FIELDS;

/// First `/* ... */` block comment, across lines, shortest match.
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern is valid")
});

/// Any required label followed by a half- or full-width colon.
static FIELD_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    let labels = REQUIRED_HEADER_FIELDS.iter().map(|f| regex::escape(f)).join("|");
    Regex::new(&format!(r"({labels})\s*[:：]")).expect("field label pattern is valid")
});

/// Field contents extracted from a header, keyed by canonical label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    /// Trimmed content per label; later duplicates overwrite earlier ones.
    contents: HashMap<&'static str, String>,
}

impl HeaderFields {
    /// Content recorded for `field`, if the label appeared at all.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.contents.get(field).map(String::as_str)
    }

    /// Required fields that never appeared or whose content is empty, in
    /// canonical order.
    pub fn missing(&self) -> Vec<&'static str> {
        REQUIRED_HEADER_FIELDS
            .iter()
            .copied()
            .filter(|f| self.get(f).is_none_or(str::is_empty))
            .collect()
    }
}

/// The span the fields are searched in: the first block comment, or the
/// whole text when there is none.
fn header_span(source: &str) -> &str {
    BLOCK_COMMENT
        .find(source)
        .map(|m| m.as_str())
        .unwrap_or(source)
}

/// Maps a matched label back to its `'static` canonical spelling.
fn canonical(label: &str) -> Option<&'static str> {
    REQUIRED_HEADER_FIELDS.iter().copied().find(|f| *f == label)
}

/// Splits the header of `source` into fields.
///
/// Each label's content runs up to the next label (or the end of the span),
/// with `*/` removed and surrounding whitespace trimmed.
pub fn parse_fields(source: &str) -> HeaderFields {
    let span = header_span(source);
    let matches: Vec<_> = FIELD_LABEL.captures_iter(span).collect();

    let mut contents = HashMap::new();
    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(field) = canonical(label.as_str().trim()) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(span.len());
        let content = span[whole.end()..end].replace("*/", "");
        contents.insert(field, content.trim().to_string());
    }

    HeaderFields { contents }
}

/// Required header fields missing from `source`, in canonical order.
pub fn scan(source: &str) -> Vec<&'static str> {
    parse_fields(source).missing()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: &str = "/* 氏名: Alice 学生番号: 123 作成日: 2024-01-01 入出力の説明: x \
                            動きの説明: y 感想: z */";

    #[test]
    fn complete_header_has_nothing_missing() {
        assert!(scan(COMPLETE).is_empty());
    }

    #[test]
    fn label_right_before_comment_end_is_missing() {
        let src = "/* 氏名: Alice 学生番号: 123 作成日: 2024-01-01 入出力の説明: x 動きの説明: y \
                   感想:*/";
        assert_eq!(scan(src), vec!["感想"]);
    }

    #[test]
    fn multiline_header_with_fullwidth_colons() {
        let src = "/*\n * 氏名：山田 太郎\n * 学生番号：B123456\n * 作成日：2024/04/10\n * \
                   入出力の説明：整数を2つ読み込み和を出力する\n * 動きの説明：scanfで読み込む\n * \
                   感想：\n */\n#include <stdio.h>\nint main(void) { return 0; }\n";
        let fields = parse_fields(src);
        assert_eq!(fields.get("氏名"), Some("山田 太郎\n *"));
        assert_eq!(scan(src), vec!["感想"]);
    }

    #[test]
    fn only_first_block_comment_is_inspected() {
        let src = "/* 氏名: Alice */\n/* 学生番号: 1 作成日: d 入出力の説明: a 動きの説明: b 感想: c */";
        assert_eq!(scan(src), vec!["学生番号", "作成日", "入出力の説明", "動きの説明", "感想"]);
    }

    #[test]
    fn text_without_block_comment_is_scanned_whole() {
        let src = "// 氏名: Alice\n// 学生番号: 1\n// 作成日: d\n// 入出力の説明: a\n// \
                   動きの説明: b\n// 感想: c\n";
        assert!(scan(src).is_empty());
    }

    #[test]
    fn missing_fields_follow_canonical_order() {
        let src = "/* 感想: fun 氏名: Alice */";
        assert_eq!(scan(src), vec!["学生番号", "作成日", "入出力の説明", "動きの説明"]);
    }

    #[test]
    fn later_duplicate_overwrites_content() {
        let src = "/* 氏名: Alice 氏名: 学生番号: 1 作成日: d 入出力の説明: a 動きの説明: b 感想: c */";
        let fields = parse_fields(src);
        assert_eq!(fields.get("氏名"), Some(""));
        assert_eq!(scan(src), vec!["氏名"]);

        let src = "/* 氏名: 氏名: Bob 学生番号: 1 作成日: d 入出力の説明: a 動きの説明: b 感想: c */";
        assert!(scan(src).is_empty());
    }

    #[test]
    fn empty_source_misses_everything() {
        assert_eq!(scan("").len(), REQUIRED_HEADER_FIELDS.len());
    }
}
