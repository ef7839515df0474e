//! # 文分割器
//!
//! トークン列を完全な構文木を作らずに論理的な文へ分割します。
//! 括弧・キーワードのバランスを数えて文の境界を決め、直前のコメントを文に付与し、
//! ブロックを開く文は本体を再帰的に分割して `body` に格納します。
//!
//! 分割器はどのようなトークン列に対してもエラーを返しません。
//! 対応の取れない閉じトークンは読み捨て、入力の終わりで未完の文はそのまま確定します。

pub mod comments;
pub mod statement;

pub use self::comments::CommentBuffer;
pub use self::statement::{join_tokens, Statement};

use crate::frontend::lexer::{self, LexState, Token, TokenKind};

use self::comments::strip_marker;

/// ソースコードを文に分割する
pub fn segment(source: &str) -> Vec<Statement> {
    StatementSegmenter::new(source).collect()
}

/// 文分割器
///
/// 前方にのみ進むイテレータとして文を遅延生成します。
pub struct StatementSegmenter {
    /// 入力トークン
    tokens: Vec<Token>,
    /// 次に読むトークンの位置
    position: usize,
    /// 蓄積中のコメント
    comments: CommentBuffer,
    /// 先頭行の行末コメントをドキュメントとして使うか
    attach_inline_comments: bool,
}

/// ヘッダー走査の結果
struct Header {
    tokens: Vec<Token>,
    enters_body: bool,
    inline_comment: Option<String>,
    end_line: usize,
}

impl StatementSegmenter {
    /// ソースコードから文分割器を作成
    pub fn new(source: &str) -> Self {
        Self::from_tokens(lexer::tokenize(source))
    }

    /// トークン列（ファイル全体）から文分割器を作成
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            comments: CommentBuffer::new(true),
            attach_inline_comments: true,
        }
    }

    /// 行末コメントの付与を設定
    pub fn with_inline_comments(mut self, attach: bool) -> Self {
        self.attach_inline_comments = attach;
        self
    }

    /// ブロック本体用の分割器
    fn nested(tokens: Vec<Token>, attach_inline_comments: bool) -> Self {
        Self {
            tokens,
            position: 0,
            comments: CommentBuffer::new(false),
            attach_inline_comments,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// 次の文を読む
    fn next_statement(&mut self) -> Option<Statement> {
        // 空行・コメント・対応のない閉じトークンを読み飛ばす
        loop {
            let token = self.tokens.get(self.position)?;
            match token.kind {
                TokenKind::Newline | TokenKind::Semicolon => {}
                TokenKind::Comment => self.comments.push(token),
                kind if kind.is_closer() => {}
                _ => break,
            }
            self.position += 1;
        }

        let line = self.peek()?.line;
        let (mut leading_comment, mut comment_line) = match self.comments.take_for(line) {
            Some((text, first)) => (Some(text), Some(first)),
            None => (None, None),
        };

        let header = self.read_header(line);
        let mut end_line = header.end_line;

        if leading_comment.is_none() && self.attach_inline_comments {
            if let Some(inline) = header.inline_comment {
                leading_comment = Some(inline);
                comment_line = Some(line);
            }
        }

        let mut body = None;
        let mut trailer = Vec::new();
        if header.enters_body {
            let (body_tokens, closer) = self.collect_body();
            end_line = closer
                .as_ref()
                .or_else(|| body_tokens.last())
                .map_or(end_line, |t| t.line);
            body = Some(Self::nested(body_tokens, self.attach_inline_comments).collect());
            if closer.is_some() {
                trailer = self.collect_trailer();
                if let Some(last) = trailer.last() {
                    end_line = last.line;
                }
            }
        }

        Some(Statement {
            leading_comment,
            comment_line,
            header: header.tokens,
            body,
            trailer,
            line,
            end_line,
        })
    }

    /// 文のヘッダーを読む
    ///
    /// ブロックを開く文では、本体の直前（`then`・ブロック引数・def の引数リストの後など）で止まります。
    fn read_header(&mut self, line: usize) -> Header {
        let mut tokens: Vec<Token> = Vec::new();
        let mut balance = 0usize;
        let mut opener: Option<TokenKind> = None;
        let mut clause = false;
        let mut previous = LexState::Beg;
        let mut inline_comment = None;
        let mut enters_body = false;

        while let Some(token) = self.peek().cloned() {
            let kind = token.kind;

            if kind == TokenKind::Comment {
                if token.line == line && inline_comment.is_none() {
                    inline_comment = Some(strip_marker(&token.text));
                }
                self.position += 1;
                continue;
            }

            if kind.is_terminator() {
                self.position += 1;
                let base = if opener.is_some() { 1 } else { 0 };
                if balance == base {
                    let bare_keyword = tokens.len() == 1 && (clause || opener == Some(TokenKind::Case));
                    if kind == TokenKind::Semicolon || previous.allows_statement_end() || bare_keyword {
                        enters_body = opener.is_some();
                        break;
                    }
                }
                continue;
            }

            self.position += 1;

            if tokens.is_empty() && kind.is_clause() {
                clause = true;
            } else if matches!(kind, TokenKind::Then | TokenKind::DoCond) && opener.is_some() && balance == 1 {
                tokens.push(token);
                enters_body = true;
                break;
            } else if kind == TokenKind::Then && clause && balance == 0 {
                tokens.push(token);
                break;
            } else if kind.is_keyword_opener() {
                if balance == 0 && opener.is_none() {
                    opener = Some(kind);
                }
                balance += 1;
            } else if kind.is_simple_opener() {
                if balance == 0 && opener.is_none() {
                    tokens.push(token);
                    self.take_block_params(&mut tokens);
                    enters_body = true;
                    break;
                }
                balance += 1;
            } else if kind.is_bracket_opener() {
                balance += 1;
            } else if kind.is_closer() {
                if balance == 0 {
                    continue;
                }
                balance -= 1;
                if balance == 0 {
                    opener = None;
                }
                if kind == TokenKind::RightParen
                    && balance == 1
                    && opener == Some(TokenKind::Def)
                    && !self.peek().map_or(false, |t| t.kind == TokenKind::Equal)
                {
                    tokens.push(token);
                    enters_body = true;
                    break;
                }
            } else if kind == TokenKind::Equal && opener == Some(TokenKind::Def) && balance == 1 {
                // 終端なしのメソッド定義（def m = expr）
                opener = None;
                balance = 0;
            }

            previous = token.lex_state;
            tokens.push(token);
        }

        let end_line = tokens.last().map_or(line, |t| t.line);
        if let Some(text) = self.absorb_trailing_comment(end_line) {
            if end_line == line && inline_comment.is_none() {
                inline_comment = Some(text);
            }
        }

        Header {
            tokens,
            enters_body,
            inline_comment,
            end_line,
        }
    }

    /// ヘッダー末尾と同じ行にあるコメントを読み取る
    fn absorb_trailing_comment(&mut self, line: usize) -> Option<String> {
        let mut text = None;
        while let Some(token) = self.peek() {
            if token.kind != TokenKind::Comment || token.line != line {
                break;
            }
            text.get_or_insert_with(|| strip_marker(&token.text));
            self.position += 1;
        }
        text
    }

    /// `do` / `{` の直後のブロック引数 `|a, b|` をヘッダーに含める
    fn take_block_params(&mut self, tokens: &mut Vec<Token>) {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Operator && token.text == "||" => {
                tokens.push(token.clone());
                self.position += 1;
            }
            Some(token) if token.kind == TokenKind::Pipe => {
                tokens.push(token.clone());
                self.position += 1;
                while let Some(token) = self.peek().cloned() {
                    self.position += 1;
                    let closes = token.kind == TokenKind::Pipe;
                    if token.kind != TokenKind::Newline {
                        tokens.push(token);
                    }
                    if closes {
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    /// 対応する閉じトークンまでの本体トークンを集める
    fn collect_body(&mut self) -> (Vec<Token>, Option<Token>) {
        let mut depth = 1usize;
        let mut pending_def: Option<usize> = None;
        let mut body = Vec::new();

        while let Some(token) = self.peek().cloned() {
            self.position += 1;
            let kind = token.kind;
            if kind.is_keyword_opener() || kind.is_simple_opener() || kind.is_bracket_opener() {
                depth += 1;
                if kind == TokenKind::Def {
                    pending_def = Some(depth);
                }
            } else if kind.is_closer() {
                depth -= 1;
                if depth == 0 {
                    return (body, Some(token));
                }
                if pending_def.map_or(false, |level| depth < level) {
                    pending_def = None;
                }
            } else if kind == TokenKind::Equal && pending_def == Some(depth) {
                depth -= 1;
                pending_def = None;
            } else if kind.is_terminator() && pending_def == Some(depth) {
                pending_def = None;
            }
            body.push(token);
        }

        (body, None)
    }

    /// ブロックを閉じた後、文の終端までのトークンを集める
    fn collect_trailer(&mut self) -> Vec<Token> {
        let mut trailer = Vec::new();
        let mut balance = 0usize;
        let mut previous = LexState::End;

        while let Some(token) = self.peek().cloned() {
            self.position += 1;
            let kind = token.kind;
            if kind == TokenKind::Comment {
                continue;
            }
            if kind.is_terminator() {
                if balance == 0 && (kind == TokenKind::Semicolon || previous.allows_statement_end()) {
                    break;
                }
                continue;
            }
            if kind.is_keyword_opener() || kind.is_simple_opener() || kind.is_bracket_opener() {
                balance += 1;
            } else if kind.is_closer() {
                if balance == 0 {
                    continue;
                }
                balance -= 1;
            }
            previous = token.lex_state;
            trailer.push(token);
        }

        trailer
    }
}

impl Iterator for StatementSegmenter {
    type Item = Statement;

    fn next(&mut self) -> Option<Statement> {
        self.next_statement()
    }
}
