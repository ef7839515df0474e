//! # トークン定義
//!
//! Rubyレキサーが生成するトークンの定義を提供します。
//! 文分割器が必要とする分類（括弧・キーワード・修飾子・終端子）と、
//! トークン直後の字句状態を保持します。

use std::fmt;

/// トークンの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // 識別子とリテラル
    /// 識別子（ローカル変数・メソッド名）
    Identifier,
    /// 定数（大文字で始まる識別子）
    Constant,
    /// インスタンス変数 @foo
    InstanceVar,
    /// クラス変数 @@foo
    ClassVar,
    /// グローバル変数 $foo
    GlobalVar,
    /// ラベル foo:
    Label,
    /// シンボル :foo
    Symbol,
    /// 文字列リテラル（ヒアドキュメント・%リテラルを含む）
    StringLiteral,
    /// 正規表現リテラル
    Regexp,
    /// 整数リテラル
    Integer,
    /// 浮動小数点リテラル
    Float,
    /// 文字リテラル ?a
    CharLiteral,

    // 区切り記号
    /// 左括弧 (
    LeftParen,
    /// 右括弧 )
    RightParen,
    /// 左角括弧 [
    LeftBracket,
    /// 右角括弧 ]
    RightBracket,
    /// ハッシュリテラルの左波括弧 {
    LeftBrace,
    /// ブロックを開始する左波括弧 {
    BlockBrace,
    /// 右波括弧 }
    RightBrace,
    /// コンマ ,
    Comma,
    /// ドット . または &.
    Dot,
    /// ダブルコロン ::
    DoubleColon,
    /// セミコロン ;
    Semicolon,
    /// 改行
    Newline,
    /// 等号 =
    Equal,
    /// 小なり <
    Less,
    /// 左シフト <<
    LeftShift,
    /// パイプ |
    Pipe,
    /// ファットアロー =>
    FatArrow,
    /// ラムダ矢印 ->
    Lambda,
    /// その他の演算子
    Operator,

    // キーワード
    /// class キーワード
    Class,
    /// module キーワード
    Module,
    /// def キーワード
    Def,
    /// if キーワード（文頭）
    If,
    /// unless キーワード（文頭）
    Unless,
    /// while キーワード（文頭）
    While,
    /// until キーワード（文頭）
    Until,
    /// for キーワード
    For,
    /// case キーワード
    Case,
    /// begin キーワード
    Begin,
    /// do キーワード（ブロック）
    Do,
    /// while/until/for の条件を閉じる do
    DoCond,
    /// end キーワード
    End,
    /// then キーワード
    Then,
    /// else キーワード
    Else,
    /// elsif キーワード
    Elsif,
    /// when キーワード
    When,
    /// in キーワード
    In,
    /// rescue キーワード（節）
    Rescue,
    /// ensure キーワード
    Ensure,
    /// 後置 if
    IfMod,
    /// 後置 unless
    UnlessMod,
    /// 後置 while
    WhileMod,
    /// 後置 until
    UntilMod,
    /// 後置 rescue
    RescueMod,
    /// alias キーワード
    Alias,
    /// undef キーワード
    Undef,
    /// self キーワード
    SelfKw,
    /// nil / true / false / __FILE__ などの値キーワード
    ValueKeyword,
    /// return / break / next / redo / retry
    FlowKeyword,
    /// yield / super / defined? / not
    CallKeyword,
    /// and / or
    LogicalKeyword,

    // その他
    /// コメント（# または =begin/=end）
    Comment,
    /// 解釈できない文字
    Unknown,
}

impl TokenKind {
    /// `end` との対応を必要とするキーワードかどうか
    pub fn is_keyword_opener(&self) -> bool {
        matches!(
            self,
            TokenKind::Class
                | TokenKind::Module
                | TokenKind::Def
                | TokenKind::If
                | TokenKind::Unless
                | TokenKind::While
                | TokenKind::Until
                | TokenKind::For
                | TokenKind::Case
        )
    }

    /// ブロック本体を直後に開始する単純なオープナーかどうか
    pub fn is_simple_opener(&self) -> bool {
        matches!(self, TokenKind::Do | TokenKind::BlockBrace | TokenKind::Begin)
    }

    /// 括弧類のオープナーかどうか
    pub fn is_bracket_opener(&self) -> bool {
        matches!(
            self,
            TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace
        )
    }

    /// バランスを減らすクローザーかどうか
    pub fn is_closer(&self) -> bool {
        matches!(
            self,
            TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace | TokenKind::End
        )
    }

    /// 文の終端子かどうか
    pub fn is_terminator(&self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Semicolon)
    }

    /// 外側のネストを変えずに新しい副文を開始する節キーワードかどうか
    pub fn is_clause(&self) -> bool {
        matches!(
            self,
            TokenKind::Else
                | TokenKind::Elsif
                | TokenKind::When
                | TokenKind::In
                | TokenKind::Rescue
                | TokenKind::Ensure
        )
    }

    /// 後置修飾子かどうか
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            TokenKind::IfMod
                | TokenKind::UnlessMod
                | TokenKind::WhileMod
                | TokenKind::UntilMod
                | TokenKind::RescueMod
        )
    }

    /// 空白・改行・コメントのような意味を持たないトークンかどうか
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Newline | TokenKind::Comment)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// トークン直後のレキサー状態
///
/// MRIの `EXPR_*` 状態を文分割に必要な範囲で簡略化したものです。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexState {
    /// 式の開始位置（演算子・開き括弧・改行の後）
    Beg,
    /// return / break / next の後
    Mid,
    /// 引数を取りうる識別子の後
    Arg,
    /// 完結した式の後（リテラル・閉じ括弧・end）
    End,
    /// メソッド定義名の後
    EndFn,
    /// def / alias / undef の直後（メソッド名を期待）
    Fname,
    /// . / &. / :: の後
    Dot,
    /// class キーワードの直後
    Class,
}

impl LexState {
    /// この状態で終端子が来たときに文を終了できるかどうか
    pub fn allows_statement_end(&self) -> bool {
        matches!(self, LexState::End | LexState::EndFn | LexState::Arg | LexState::Mid)
    }

    /// 式の開始位置にいるかどうか
    pub fn is_beginning(&self) -> bool {
        matches!(
            self,
            LexState::Beg | LexState::Mid | LexState::Class | LexState::Fname | LexState::Dot
        )
    }
}

impl Default for LexState {
    fn default() -> Self {
        LexState::Beg
    }
}

/// トークン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// トークンの種類
    pub kind: TokenKind,
    /// ソース上のテキスト
    pub text: String,
    /// 行番号（1から始まる）
    pub line: usize,
    /// 列番号（1から始まる）
    pub column: usize,
    /// トークン直後の字句状態
    pub lex_state: LexState,
    /// 直前に空白があったかどうか
    pub space_before: bool,
}

impl Token {
    /// 新しいトークンを作成
    pub fn new(
        kind: TokenKind,
        text: impl Into<String>,
        line: usize,
        column: usize,
        lex_state: LexState,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
            lex_state,
            space_before: false,
        }
    }

    /// 直前の空白の有無を設定
    pub fn with_space_before(mut self, space_before: bool) -> Self {
        self.space_before = space_before;
        self
    }

    /// 指定した種類かどうか
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// 指定したテキストを持つ識別子かどうか
    pub fn is_ident(&self, text: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?}) @{}:{}", self.kind, self.text, self.line, self.column)
    }
}
