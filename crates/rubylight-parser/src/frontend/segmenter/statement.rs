//! # 文（Statement）
//!
//! 文分割器が生成する論理的な構成要素を定義します。

use std::fmt;

use crate::frontend::lexer::{Token, TokenKind};

/// 1つの論理的な構成要素（def・class・代入・メソッド呼び出しなど）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 直前のコメント（マーカーを除去した複数行テキスト）
    pub leading_comment: Option<String>,
    /// コメントの開始行
    pub comment_line: Option<usize>,
    /// ヘッダーのトークン列（改行を含まない）
    pub header: Vec<Token>,
    /// ブロックを開く場合、その本体を再帰的に分割した文
    pub body: Option<Vec<Statement>>,
    /// ブロックを閉じた後に続くトークン（`end.freeze` など）
    pub trailer: Vec<Token>,
    /// 開始行
    pub line: usize,
    /// 終了行（ブロックの場合は閉じトークンの行）
    pub end_line: usize,
}

impl Statement {
    /// ヘッダーの先頭トークン
    pub fn first_token(&self) -> Option<&Token> {
        self.header.first()
    }

    /// ヘッダーの先頭トークンの種類
    pub fn first_keyword(&self) -> Option<TokenKind> {
        self.header.first().map(|t| t.kind)
    }

    /// ブロックを開く文かどうか
    pub fn is_block(&self) -> bool {
        self.body.is_some()
    }

    /// コメントを行ごとに返す
    pub fn comment_lines(&self) -> Vec<&str> {
        self.leading_comment
            .as_deref()
            .map(|c| c.lines().collect())
            .unwrap_or_default()
    }

    /// ヘッダーを元の空白・改行を保って再構成
    pub fn header_source(&self) -> String {
        join_tokens(&self.header)
    }

    /// ヘッダーの最初の行（メソッドシグネチャなどに使う）
    pub fn signature(&self) -> String {
        let first_line = self.line;
        let tokens: Vec<Token> = self
            .header
            .iter()
            .take_while(|t| t.line == first_line)
            .cloned()
            .collect();
        join_tokens(&tokens)
    }

    /// 本体の文（ブロックでなければ空）
    pub fn statements(&self) -> &[Statement] {
        self.body.as_deref().unwrap_or(&[])
    }
}

/// トークンを元の空白・改行を保って連結
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut previous_line = None;
    for token in tokens {
        match previous_line {
            Some(line) if token.line > line => out.push('\n'),
            Some(_) if token.space_before => out.push(' '),
            _ => {}
        }
        out.push_str(&token.text);
        previous_line = Some(token.line + token.text.matches('\n').count());
    }
    out
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.header_source())?;
        if let Some(body) = &self.body {
            write!(f, " [{} statements]", body.len())?;
        }
        Ok(())
    }
}
