//! # コメント蓄積
//!
//! 文の直前に並ぶコメント行を集め、ドキュメントテキストに変換します。

use std::sync::OnceLock;

use regex::Regex;

use crate::frontend::lexer::Token;

fn marker_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#+ ?").ok()).as_ref()
}

fn magic_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^#\s*(-\*-.*-\*-|(en)?coding\s*[:=]|frozen_string_literal\s*:|warn_indent\s*:|shareable_constant_value\s*:)",
            )
            .ok()
        })
        .as_ref()
}

/// コメントマーカー（`#` の並びと1つの空白）を取り除く
pub fn strip_marker(text: &str) -> String {
    match marker_pattern() {
        Some(pattern) => pattern.replace(text, "").into_owned(),
        None => text.trim_start_matches('#').to_string(),
    }
}

/// コメントトークンをテキスト行に変換する
///
/// `=begin`/`=end` ブロックは内側の行をそのまま返します。
pub fn comment_text_lines(token: &Token) -> Vec<String> {
    if token.text.starts_with("=begin") {
        let mut lines: Vec<&str> = token.text.lines().skip(1).collect();
        if lines.last().map_or(false, |l| l.starts_with("=end")) {
            lines.pop();
        }
        return lines.into_iter().map(|l| l.to_string()).collect();
    }
    vec![strip_marker(token.text.trim_end())]
}

/// ファイル先頭のシバン・マジックコメントかどうか
pub fn is_magic_comment(token: &Token) -> bool {
    (token.line == 1 && token.text.starts_with("#!")) || magic_pattern().map_or(false, |pattern| pattern.is_match(&token.text))
}

/// 文の前に蓄積されたコメント
#[derive(Debug, Default)]
pub struct CommentBuffer {
    /// 蓄積中のテキスト行
    lines: Vec<String>,
    /// 最初のコメント行
    first_line: Option<usize>,
    /// 最後のコメント行（ブロックコメントは終了行）
    last_line: Option<usize>,
    /// コードをまだ1つも見ていないか（マジックコメントを除外するため）
    at_file_start: bool,
}

impl CommentBuffer {
    /// 新しいバッファを作成
    pub fn new(at_file_start: bool) -> Self {
        Self {
            at_file_start,
            ..Self::default()
        }
    }

    /// コメントトークンを追加
    ///
    /// 直前のコメントとの間に空行がある場合、それまでの内容は破棄されます。
    pub fn push(&mut self, token: &Token) {
        if self.at_file_start && is_magic_comment(token) {
            return;
        }
        if let Some(last) = self.last_line {
            if token.line > last + 1 {
                self.clear();
            }
        }
        let lines = comment_text_lines(token);
        if self.first_line.is_none() {
            self.first_line = Some(token.line);
        }
        self.last_line = Some(token.line + token.text.matches('\n').count());
        self.lines.extend(lines);
    }

    /// 指定行から始まる文のためにコメントを取り出す
    ///
    /// コメントと文の間に2行以上の空行があれば何も返しません。
    pub fn take_for(&mut self, statement_line: usize) -> Option<(String, usize)> {
        self.at_file_start = false;
        let last = self.last_line?;
        let first = self.first_line.unwrap_or(last);
        if statement_line > last + 2 {
            self.clear();
            return None;
        }
        let text = self.lines.join("\n");
        self.clear();
        Some((text, first))
    }

    /// 蓄積中のコメントを破棄
    pub fn clear(&mut self) {
        self.lines.clear();
        self.first_line = None;
        self.last_line = None;
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
