//! # ドキュメント文字列
//!
//! コメントから得たテキストを本文と `@tag` 行に分けて保持します。
//! タグの解析は境界部分（タグ名・型リスト・テキスト）のみで、
//! ディレクティブ言語そのものは扱いません。

use std::fmt;

use serde::{Deserialize, Serialize};

/// `@tag [Types] text` 形式のタグ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// タグ名（`@` を除く）
    pub tag_name: String,
    /// 型リスト
    pub types: Vec<String>,
    /// 残りのテキスト
    pub text: String,
}

/// ドキュメント文字列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Docstring {
    /// タグを除いた本文
    pub text: String,
    /// タグ
    pub tags: Vec<Tag>,
    /// 元のコメント
    pub raw: String,
}

impl Docstring {
    /// コメントテキストを解析
    pub fn parse(raw: &str) -> Self {
        let mut body: Vec<&str> = Vec::new();
        let mut tags: Vec<Tag> = Vec::new();

        for line in raw.lines() {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix('@') {
                if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    tags.push(parse_tag(rest));
                    continue;
                }
            }
            match tags.last_mut() {
                // インデントされた行は直前のタグの続き
                Some(tag) if line.starts_with(char::is_whitespace) && !trimmed.is_empty() => {
                    if !tag.text.is_empty() {
                        tag.text.push(' ');
                    }
                    tag.text.push_str(trimmed);
                }
                _ => body.push(line),
            }
        }

        Self {
            text: body.join("\n").trim().to_string(),
            tags,
            raw: raw.to_string(),
        }
    }

    /// 本文もタグもないかどうか
    pub fn is_blank(&self) -> bool {
        self.text.is_empty() && self.tags.is_empty()
    }

    /// 指定名のタグを取得
    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.tag_name == name)
    }

    /// 指定名のタグを全て取得
    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.tags.iter().filter(move |t| t.tag_name == name)
    }

    /// 指定名のタグがあるかどうか
    pub fn has_tag(&self, name: &str) -> bool {
        self.tag(name).is_some()
    }

    /// 本文の最初の文（一覧表示用）
    pub fn summary(&self) -> &str {
        let first = self.text.split("\n\n").next().unwrap_or("");
        match first.find(". ") {
            Some(index) => &first[..=index],
            None => first.lines().next().unwrap_or(""),
        }
    }
}

fn parse_tag(rest: &str) -> Tag {
    let name_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '!'))
        .unwrap_or(rest.len());
    let tag_name = rest[..name_end].to_string();
    let mut remainder = rest[name_end..].trim_start();

    let mut types = Vec::new();
    if remainder.starts_with('[') {
        if let Some(close) = remainder.find(']') {
            types = remainder[1..close]
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            remainder = remainder[close + 1..].trim_start();
        }
    }

    Tag {
        tag_name,
        types,
        text: remainder.trim_end().to_string(),
    }
}

impl fmt::Display for Docstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl From<&str> for Docstring {
    fn from(raw: &str) -> Self {
        Docstring::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_and_tags() {
        let doc = Docstring::parse("Adds numbers.\n\n@param a [Integer] first\n@return [Integer, nil] the sum\n  or nil");
        assert_eq!(doc.text, "Adds numbers.");
        assert_eq!(doc.tags.len(), 2);
        let returns = doc.tag("return").unwrap();
        assert_eq!(returns.types, vec!["Integer", "nil"]);
        assert_eq!(returns.text, "the sum or nil");
        assert_eq!(doc.tag("param").unwrap().text, "a [Integer] first");
    }

    #[test]
    fn test_blank_and_summary() {
        assert!(Docstring::default().is_blank());
        let doc = Docstring::parse("First sentence. Second one.\nMore");
        assert_eq!(doc.summary(), "First sentence.");
        assert!(!doc.is_blank());
    }

    #[test]
    fn test_email_like_text_is_not_a_tag() {
        let doc = Docstring::parse("contact @ the desk");
        assert!(doc.tags.is_empty());
    }
}
