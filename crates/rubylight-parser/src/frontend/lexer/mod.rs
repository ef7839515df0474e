//! # レキサー（字句解析器）
//!
//! Rubyソースコードを字句解析し、文分割に必要な分類を付けたトークン列に変換します。
//! 文法レベルの解析は行わず、括弧・キーワードの対応付けと後置修飾子の判別、
//! ブロックとハッシュの `{` の区別ができる程度の字句状態のみを追跡します。
//!
//! このレキサーは失敗しません。解釈できない文字は `Unknown` トークンになり、
//! 閉じられていないリテラルは入力の終わりまで延長されます。

pub mod token;

pub use token::{LexState, Token, TokenKind};

/// 長い順に並べた複数文字の演算子
const MULTI_CHAR_OPERATORS: &[&str] = &[
    "**=", "<=>", "===", "...", "<<=", ">>=", "&&=", "||=", "**", "==", "!=", ">=", "<=", "&&",
    "||", "<<", ">>", "=~", "!~", "+=", "-=", "*=", "/=", "%=", "|=", "&=", "^=", "..", "->", "=>",
    "&.", "::",
];

/// メソッド名として使える演算子（長い順）
const OPERATOR_METHOD_NAMES: &[&str] = &[
    "[]=", "<=>", "===", "[]", "==", "=~", "!=", "!~", "<<", ">>", "<=", ">=", "**", "+@", "-@",
    "+", "-", "*", "/", "%", "<", ">", "~", "&", "|", "^", "!", "`",
];

/// 読み込み待ちのヒアドキュメント
#[derive(Debug, Clone)]
struct PendingHeredoc {
    /// 終端識別子
    terminator: String,
    /// 終端識別子の前のインデントを許すか（<<- / <<~）
    indented: bool,
}

/// レキサー
pub struct Lexer {
    /// ソースコードの文字列
    chars: Vec<char>,
    /// 現在の文字位置
    position: usize,
    /// 現在の行番号（1から始まる）
    line: usize,
    /// 現在の列番号（1から始まる）
    column: usize,
    /// 現在の字句状態
    state: LexState,
    /// 括弧のネスト深さ
    paren_depth: usize,
    /// while/until/for の条件部を閉じる `do` を待っている括弧深さ
    cond_depth: Option<usize>,
    /// def の直後でメソッド名を待っているか
    def_pending: bool,
    /// alias/undef の後に残っているメソッド名の数
    fname_names_left: usize,
    /// 直前に空白を読み飛ばしたか
    space_before: bool,
    /// 次の行頭で読むヒアドキュメント
    pending_heredocs: Vec<PendingHeredoc>,
    /// 生成済みトークン
    tokens: Vec<Token>,
}

/// ソースコードをトークン列に変換
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

impl Lexer {
    /// 新しいレキサーを作成
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            state: LexState::Beg,
            paren_depth: 0,
            cond_depth: None,
            def_pending: false,
            fname_names_left: 0,
            space_before: false,
            pending_heredocs: Vec::new(),
            tokens: Vec::new(),
        }
    }

    /// 入力の終わりまで字句解析してトークン列を返す
    pub fn tokenize(mut self) -> Vec<Token> {
        loop {
            self.space_before = self.skip_spaces();
            if self.is_at_end() {
                break;
            }

            if self.column == 1 && self.starts_with("__END__") && self.is_line_end_at(self.position + 7) {
                break;
            }

            let c = self.peek();
            let (line, column, start) = (self.line, self.column, self.position);

            match c {
                '\n' => self.newline(),
                '#' => self.line_comment(),
                '=' if column == 1 && self.starts_with("=begin") && self.is_word_end_at(self.position + 6) => {
                    self.block_comment()
                }
                c if is_ident_start(c) => self.identifier(),
                c if c.is_ascii_digit() => self.number(),
                '"' | '`' => {
                    self.advance();
                    self.skip_delimited(c, c, true);
                    self.push(TokenKind::StringLiteral, start, line, column, LexState::End);
                }
                '\'' => {
                    self.advance();
                    self.skip_delimited('\'', '\'', false);
                    self.push(TokenKind::StringLiteral, start, line, column, LexState::End);
                }
                '@' => self.variable(TokenKind::InstanceVar),
                '$' => self.global_variable(),
                ':' => self.colon(),
                '?' => self.question(),
                '/' if self.value_expected() => {
                    self.advance();
                    self.skip_regexp_body('/');
                    self.push(TokenKind::Regexp, start, line, column, LexState::End);
                }
                '%' if self.value_expected() && self.percent_literal_follows() => self.percent_literal(),
                '<' if self.value_expected() && self.heredoc_follows() => self.heredoc_start(),
                _ if self.in_method_name_position() && self.operator_method_name().is_some() => {
                    self.operator_method()
                }
                _ => self.operator(),
            }
        }

        self.tokens
    }

    // ===== 文字単位の操作 =====

    fn is_at_end(&self) -> bool {
        self.position >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> char {
        self.chars.get(self.position + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        if self.is_at_end() {
            return c;
        }
        self.position += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.position + i) == Some(&c))
    }

    fn is_line_end_at(&self, index: usize) -> bool {
        matches!(self.chars.get(index), None | Some('\n') | Some('\r'))
    }

    fn is_word_end_at(&self, index: usize) -> bool {
        match self.chars.get(index) {
            None => true,
            Some(c) => c.is_whitespace(),
        }
    }

    /// 空白と行継続（バックスラッシュ改行）を読み飛ばす
    fn skip_spaces(&mut self) -> bool {
        let mut skipped = false;
        loop {
            match self.peek() {
                ' ' | '\t' | '\r' | '\x0c' if !self.is_at_end() => {
                    self.advance();
                    skipped = true;
                }
                '\\' if self.peek_at(1) == '\n' => {
                    self.advance();
                    self.advance();
                    skipped = true;
                }
                _ => return skipped,
            }
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, line: usize, column: usize, state: LexState) {
        let text: String = self.chars[start..self.position].iter().collect();
        let token = Token::new(kind, text, line, column, state).with_space_before(self.space_before);
        self.tokens.push(token);
        self.state = state;
    }

    /// 直前の状態が値（リテラル・正規表現など）の開始を期待しているかどうか
    ///
    /// 引数位置では「前に空白があり、直後に空白がない」場合のみ値とみなします。
    fn value_expected(&self) -> bool {
        match self.state {
            LexState::Beg | LexState::Mid | LexState::Class => true,
            LexState::Arg => self.space_before && !self.peek_at(1).is_whitespace() && self.peek_at(1) != '=',
            _ => false,
        }
    }

    fn in_method_name_position(&self) -> bool {
        self.state == LexState::Fname || (self.def_pending && self.state == LexState::Dot)
    }

    // ===== 改行とコメント =====

    fn newline(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();

        if !self.pending_heredocs.is_empty() {
            self.read_heredoc_bodies();
        }

        if self.cond_depth == Some(self.paren_depth) && !self.state.is_beginning() {
            self.cond_depth = None;
        }

        if self.next_line_continues_chain() {
            self.space_before = true;
            return;
        }

        let token = Token::new(TokenKind::Newline, "\n", line, column, LexState::Beg)
            .with_space_before(self.space_before);
        self.tokens.push(token);
        self.state = LexState::Beg;
    }

    /// 次の行が `.foo` / `&.foo` で始まるメソッドチェーンの継続かどうか
    fn next_line_continues_chain(&self) -> bool {
        let mut index = self.position;
        while let Some(c) = self.chars.get(index) {
            if *c == ' ' || *c == '\t' || *c == '\r' {
                index += 1;
                continue;
            }
            break;
        }
        let at = |i: usize| self.chars.get(i).copied().unwrap_or('\0');
        (at(index) == '.' && at(index + 1) != '.') || (at(index) == '&' && at(index + 1) == '.')
    }

    fn line_comment(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
        let state = self.state;
        self.push(TokenKind::Comment, start, line, column, state);
    }

    /// `=begin` から `=end` の行までを1つのコメントとして読む
    fn block_comment(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        loop {
            while !self.is_at_end() && self.peek() != '\n' {
                self.advance();
            }
            if self.is_at_end() {
                break;
            }
            self.advance();
            if self.starts_with("=end") && self.is_word_end_at(self.position + 4) {
                while !self.is_at_end() && self.peek() != '\n' {
                    self.advance();
                }
                break;
            }
        }
        let state = self.state;
        self.push(TokenKind::Comment, start, line, column, state);
    }

    // ===== 識別子とキーワード =====

    fn identifier(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        while is_ident_char(self.peek()) && !self.is_at_end() {
            self.advance();
        }
        if matches!(self.peek(), '?' | '!') && self.peek_at(1) != '=' {
            self.advance();
        }

        let word: String = self.chars[start..self.position].iter().collect();
        let previous = self.state;

        // ラベル（key:）
        if self.peek() == ':'
            && self.peek_at(1) != ':'
            && previous != LexState::Dot
            && previous != LexState::Fname
            && !word.ends_with('?')
        {
            self.advance();
            self.push(TokenKind::Label, start, line, column, LexState::Beg);
            return;
        }

        if self.in_method_name_position() || previous == LexState::Fname {
            self.method_name_identifier(start, line, column, &word);
            return;
        }

        if previous != LexState::Dot {
            if let Some((kind, state)) = self.keyword(&word, previous) {
                self.push(kind, start, line, column, state);
                self.after_keyword(kind);
                return;
            }
        }

        let kind = if word.chars().next().map_or(false, |c| c.is_uppercase()) {
            TokenKind::Constant
        } else {
            TokenKind::Identifier
        };
        self.push(kind, start, line, column, LexState::Arg);
    }

    /// def / alias / undef の後に現れるメソッド名
    fn method_name_identifier(&mut self, start: usize, line: usize, column: usize, word: &str) {
        let receiver_follows = self.peek() == '.' && self.peek_at(1) != '.';

        if word == "self" && self.def_pending && receiver_follows {
            self.push(TokenKind::SelfKw, start, line, column, LexState::End);
            return;
        }

        if receiver_follows && self.def_pending {
            let kind = if word.chars().next().map_or(false, |c| c.is_uppercase()) {
                TokenKind::Constant
            } else {
                TokenKind::Identifier
            };
            self.push(kind, start, line, column, LexState::Arg);
            return;
        }

        // セッター名（def name=(value)）
        if self.peek() == '=' && !matches!(self.peek_at(1), '=' | '~' | '>') {
            self.advance();
        }
        self.finish_method_name(start, line, column);
    }

    fn finish_method_name(&mut self, start: usize, line: usize, column: usize) {
        if self.def_pending {
            self.def_pending = false;
            self.push(TokenKind::Identifier, start, line, column, LexState::EndFn);
            return;
        }
        self.fname_names_left = self.fname_names_left.saturating_sub(1);
        let state = if self.fname_names_left > 0 {
            LexState::Fname
        } else {
            LexState::End
        };
        self.push(TokenKind::Identifier, start, line, column, state);
    }

    fn operator_method_name(&self) -> Option<&'static str> {
        OPERATOR_METHOD_NAMES.iter().copied().find(|name| self.starts_with(name))
    }

    fn operator_method(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        let name = match self.operator_method_name() {
            Some(name) => name,
            None => return self.operator(),
        };
        for _ in name.chars() {
            self.advance();
        }
        self.finish_method_name(start, line, column);
    }

    /// キーワードを判定し、トークン種別と直後の状態を返す
    fn keyword(&self, word: &str, previous: LexState) -> Option<(TokenKind, LexState)> {
        // return/break/next の直後（Mid）は修飾子として扱う
        let beginning = matches!(previous, LexState::Beg | LexState::Class);
        let result = match word {
            "class" => (TokenKind::Class, LexState::Class),
            "module" => (TokenKind::Module, LexState::Beg),
            "def" => (TokenKind::Def, LexState::Fname),
            "if" if beginning => (TokenKind::If, LexState::Beg),
            "if" => (TokenKind::IfMod, LexState::Beg),
            "unless" if beginning => (TokenKind::Unless, LexState::Beg),
            "unless" => (TokenKind::UnlessMod, LexState::Beg),
            "while" if beginning => (TokenKind::While, LexState::Beg),
            "while" => (TokenKind::WhileMod, LexState::Beg),
            "until" if beginning => (TokenKind::Until, LexState::Beg),
            "until" => (TokenKind::UntilMod, LexState::Beg),
            "rescue" if beginning => (TokenKind::Rescue, LexState::Mid),
            "rescue" => (TokenKind::RescueMod, LexState::Mid),
            "for" => (TokenKind::For, LexState::Beg),
            "case" => (TokenKind::Case, LexState::Beg),
            "begin" => (TokenKind::Begin, LexState::Beg),
            "do" if self.cond_depth == Some(self.paren_depth) => (TokenKind::DoCond, LexState::Beg),
            "do" => (TokenKind::Do, LexState::Beg),
            "end" => (TokenKind::End, LexState::End),
            "then" => (TokenKind::Then, LexState::Beg),
            "else" => (TokenKind::Else, LexState::Beg),
            "elsif" => (TokenKind::Elsif, LexState::Beg),
            "when" => (TokenKind::When, LexState::Beg),
            "in" => (TokenKind::In, LexState::Beg),
            "ensure" => (TokenKind::Ensure, LexState::Beg),
            "alias" => (TokenKind::Alias, LexState::Fname),
            "undef" => (TokenKind::Undef, LexState::Fname),
            "self" => (TokenKind::SelfKw, LexState::End),
            "nil" | "true" | "false" | "__FILE__" | "__LINE__" | "__ENCODING__" => {
                (TokenKind::ValueKeyword, LexState::End)
            }
            "return" | "break" | "next" => (TokenKind::FlowKeyword, LexState::Mid),
            "redo" | "retry" => (TokenKind::FlowKeyword, LexState::End),
            "yield" | "super" | "defined?" => (TokenKind::CallKeyword, LexState::Arg),
            "not" => (TokenKind::CallKeyword, LexState::Beg),
            "and" | "or" => (TokenKind::LogicalKeyword, LexState::Beg),
            _ => return None,
        };
        Some(result)
    }

    fn after_keyword(&mut self, kind: TokenKind) {
        match kind {
            TokenKind::Def => self.def_pending = true,
            TokenKind::Alias => self.fname_names_left = 2,
            TokenKind::Undef => self.fname_names_left = 1,
            TokenKind::While | TokenKind::Until | TokenKind::For => {
                self.cond_depth = Some(self.paren_depth)
            }
            TokenKind::DoCond => self.cond_depth = None,
            _ => {}
        }
    }

    // ===== 変数 =====

    fn variable(&mut self, kind: TokenKind) {
        let (line, column, start) = (self.line, self.column, self.position);
        self.advance();
        let kind = if self.peek() == '@' {
            self.advance();
            TokenKind::ClassVar
        } else {
            kind
        };
        while is_ident_char(self.peek()) && !self.is_at_end() {
            self.advance();
        }
        let state = self.name_state();
        self.push(kind, start, line, column, state);
    }

    fn global_variable(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        self.advance();
        if is_ident_char(self.peek()) {
            while is_ident_char(self.peek()) && !self.is_at_end() {
                self.advance();
            }
        } else if !self.is_at_end() && !self.peek().is_whitespace() {
            // $! $0 $~ などの特殊変数
            self.advance();
        }
        let state = self.name_state();
        self.push(TokenKind::GlobalVar, start, line, column, state);
    }

    /// alias の引数として読んだ名前の後の状態
    fn name_state(&mut self) -> LexState {
        if self.state == LexState::Fname && self.fname_names_left > 0 {
            self.fname_names_left -= 1;
            if self.fname_names_left > 0 {
                return LexState::Fname;
            }
        }
        LexState::End
    }

    // ===== 数値 =====

    fn number(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        let mut kind = TokenKind::Integer;
        while (self.peek().is_ascii_alphanumeric() || self.peek() == '_') && !self.is_at_end() {
            let c = self.advance();
            if matches!(c, 'e' | 'E') && matches!(self.peek(), '+' | '-') && self.peek_at(1).is_ascii_digit() {
                kind = TokenKind::Float;
                self.advance();
            }
        }
        if self.peek() == '.' && self.peek_at(1).is_ascii_digit() {
            kind = TokenKind::Float;
            self.advance();
            while (self.peek().is_ascii_alphanumeric() || self.peek() == '_') && !self.is_at_end() {
                let c = self.advance();
                if matches!(c, 'e' | 'E') && matches!(self.peek(), '+' | '-') {
                    self.advance();
                }
            }
        }
        self.push(kind, start, line, column, LexState::End);
    }

    // ===== 記号で始まるリテラル =====

    fn colon(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        let next = self.peek_at(1);

        if next == ':' {
            self.advance();
            self.advance();
            self.push(TokenKind::DoubleColon, start, line, column, LexState::Dot);
            return;
        }

        if next == '"' || next == '\'' {
            self.advance();
            self.advance();
            self.skip_delimited(next, next, next == '"');
            self.push(TokenKind::Symbol, start, line, column, LexState::End);
            return;
        }

        if is_ident_start(next) || next == '@' || next == '$' {
            self.advance();
            if matches!(self.peek(), '@' | '$') {
                self.advance();
                if self.peek() == '@' {
                    self.advance();
                }
            }
            while is_ident_char(self.peek()) && !self.is_at_end() {
                self.advance();
            }
            if matches!(self.peek(), '?' | '!') {
                self.advance();
            } else if self.peek() == '=' && !matches!(self.peek_at(1), '=' | '~' | '>') {
                self.advance();
            }
            let state = self.name_state();
            self.push(TokenKind::Symbol, start, line, column, state);
            return;
        }

        if next != ' ' && next != '\n' {
            let saved = self.position;
            self.position += 1;
            if let Some(name) = self.operator_method_name() {
                self.position = saved;
                self.advance();
                for _ in name.chars() {
                    self.advance();
                }
                let state = self.name_state();
                self.push(TokenKind::Symbol, start, line, column, state);
                return;
            }
            self.position = saved;
        }

        self.advance();
        self.push(TokenKind::Operator, start, line, column, LexState::Beg);
    }

    fn question(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        let next = self.peek_at(1);
        if self.value_expected() && !next.is_whitespace() && next != '\0' {
            let literal_len = if next == '\\' { 3 } else { 2 };
            let after = self.peek_at(literal_len);
            if !is_ident_char(after) || next == '\\' {
                for _ in 0..literal_len {
                    self.advance();
                }
                self.push(TokenKind::CharLiteral, start, line, column, LexState::End);
                return;
            }
        }
        self.advance();
        self.push(TokenKind::Operator, start, line, column, LexState::Beg);
    }

    fn percent_literal_follows(&self) -> bool {
        let next = self.peek_at(1);
        if matches!(next, 'q' | 'Q' | 'w' | 'W' | 'i' | 'I' | 'r' | 's' | 'x') {
            let delimiter = self.peek_at(2);
            return !delimiter.is_alphanumeric() && !delimiter.is_whitespace() && delimiter != '\0';
        }
        !next.is_alphanumeric() && !next.is_whitespace() && next != '\0' && next != '='
    }

    fn percent_literal(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        self.advance();
        let mut type_char = 'Q';
        if self.peek().is_ascii_alphabetic() {
            type_char = self.advance();
        }
        let open = self.advance();
        let close = closing_delimiter(open);
        let interpolate = matches!(type_char, 'Q' | 'W' | 'I' | 'r' | 'x');
        if type_char == 'r' {
            self.skip_regexp_body(close);
        } else {
            self.skip_delimited(open, close, interpolate);
        }
        let kind = match type_char {
            'r' => TokenKind::Regexp,
            's' => TokenKind::Symbol,
            _ => TokenKind::StringLiteral,
        };
        self.push(kind, start, line, column, LexState::End);
    }

    /// 開き区切り文字の直後から閉じ区切り文字までを読み飛ばす
    fn skip_delimited(&mut self, open: char, close: char, interpolate: bool) {
        let nests = open != close;
        let mut depth = 1usize;
        while !self.is_at_end() {
            let c = self.advance();
            if c == '\\' {
                self.advance();
            } else if interpolate && c == '#' && self.peek() == '{' {
                self.advance();
                self.skip_interpolation();
            } else if nests && c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
    }

    /// `#{` の直後から対応する `}` までを読み飛ばす
    fn skip_interpolation(&mut self) {
        let mut depth = 1usize;
        while !self.is_at_end() {
            let c = self.advance();
            match c {
                '\\' => {
                    self.advance();
                }
                '"' | '`' => self.skip_delimited(c, c, true),
                '\'' => self.skip_delimited('\'', '\'', false),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// 正規表現本体と後続のフラグを読み飛ばす
    fn skip_regexp_body(&mut self, close: char) {
        let mut in_class = false;
        while !self.is_at_end() {
            let c = self.advance();
            match c {
                '\\' => {
                    self.advance();
                }
                '#' if self.peek() == '{' => {
                    self.advance();
                    self.skip_interpolation();
                }
                '[' => in_class = true,
                ']' => in_class = false,
                c if c == close && !in_class => break,
                _ => {}
            }
        }
        while self.peek().is_ascii_alphabetic() && !self.is_at_end() {
            self.advance();
        }
    }

    // ===== ヒアドキュメント =====

    fn heredoc_follows(&self) -> bool {
        if self.peek_at(1) != '<' {
            return false;
        }
        let mut index = 2;
        if matches!(self.peek_at(index), '~' | '-') {
            index += 1;
        }
        let c = self.peek_at(index);
        c == '"' || c == '\'' || c == '`' || c.is_ascii_uppercase() || c == '_'
    }

    fn heredoc_start(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);
        self.advance();
        self.advance();
        let mut indented = false;
        if matches!(self.peek(), '~' | '-') {
            self.advance();
            indented = true;
        }
        let quote = self.peek();
        let terminator = if matches!(quote, '"' | '\'' | '`') {
            self.advance();
            let id_start = self.position;
            while !self.is_at_end() && self.peek() != quote && self.peek() != '\n' {
                self.advance();
            }
            let id: String = self.chars[id_start..self.position].iter().collect();
            if self.peek() == quote {
                self.advance();
            }
            id
        } else {
            let id_start = self.position;
            while is_ident_char(self.peek()) && !self.is_at_end() {
                self.advance();
            }
            self.chars[id_start..self.position].iter().collect()
        };
        self.pending_heredocs.push(PendingHeredoc { terminator, indented });
        self.push(TokenKind::StringLiteral, start, line, column, LexState::End);
    }

    /// 改行の直後で、保留中のヒアドキュメント本体を終端行まで読み飛ばす
    fn read_heredoc_bodies(&mut self) {
        let pending = std::mem::take(&mut self.pending_heredocs);
        for heredoc in pending {
            while !self.is_at_end() {
                let line_start = self.position;
                while !self.is_at_end() && self.peek() != '\n' {
                    self.advance();
                }
                let text: String = self.chars[line_start..self.position].iter().collect();
                let text = text.trim_end_matches('\r');
                let candidate = if heredoc.indented { text.trim_start() } else { text };
                self.advance();
                if candidate == heredoc.terminator {
                    break;
                }
            }
        }
    }

    // ===== 演算子と区切り記号 =====

    fn operator(&mut self) {
        let (line, column, start) = (self.line, self.column, self.position);

        if let Some(op) = MULTI_CHAR_OPERATORS.iter().copied().find(|op| self.starts_with(op)) {
            for _ in op.chars() {
                self.advance();
            }
            let (kind, state) = match op {
                "<<" => (TokenKind::LeftShift, LexState::Beg),
                "=>" => (TokenKind::FatArrow, LexState::Beg),
                "->" => (TokenKind::Lambda, LexState::EndFn),
                "&." => (TokenKind::Dot, LexState::Dot),
                "::" => (TokenKind::DoubleColon, LexState::Dot),
                _ => (TokenKind::Operator, LexState::Beg),
            };
            self.push(kind, start, line, column, state);
            return;
        }

        let c = self.advance();
        let (kind, state) = match c {
            '(' => {
                self.paren_depth += 1;
                (TokenKind::LeftParen, LexState::Beg)
            }
            ')' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                (TokenKind::RightParen, LexState::End)
            }
            '[' => {
                self.paren_depth += 1;
                (TokenKind::LeftBracket, LexState::Beg)
            }
            ']' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                (TokenKind::RightBracket, LexState::End)
            }
            '{' => {
                self.paren_depth += 1;
                if matches!(self.state, LexState::End | LexState::EndFn | LexState::Arg) {
                    (TokenKind::BlockBrace, LexState::Beg)
                } else {
                    (TokenKind::LeftBrace, LexState::Beg)
                }
            }
            '}' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                (TokenKind::RightBrace, LexState::End)
            }
            ',' => (TokenKind::Comma, LexState::Beg),
            '.' => (TokenKind::Dot, LexState::Dot),
            ';' => {
                if self.cond_depth == Some(self.paren_depth) {
                    self.cond_depth = None;
                }
                (TokenKind::Semicolon, LexState::Beg)
            }
            '=' => (TokenKind::Equal, LexState::Beg),
            '<' => (TokenKind::Less, LexState::Beg),
            '|' => (TokenKind::Pipe, LexState::Beg),
            '+' | '-' | '*' | '/' | '%' | '!' | '~' | '^' | '&' | '>' => (TokenKind::Operator, LexState::Beg),
            _ => (TokenKind::Unknown, LexState::Beg),
        };
        self.push(kind, start, line, column, state);
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || (!c.is_ascii() && !c.is_whitespace())
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || (!c.is_ascii() && !c.is_whitespace())
}

fn closing_delimiter(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_class_header_tokens() {
        let tokens = tokenize("class Foo < Bar\nend");
        let expected = vec![
            TokenKind::Class,
            TokenKind::Constant,
            TokenKind::Less,
            TokenKind::Constant,
            TokenKind::Newline,
            TokenKind::End,
        ];
        let actual: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(actual, expected);
        assert_eq!(tokens[2].lex_state, LexState::Beg);
        assert!(tokens[3].lex_state.allows_statement_end());
    }

    #[test]
    fn test_modifier_keywords() {
        assert_eq!(
            kinds("x = 1 if y"),
            vec![
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Integer,
                TokenKind::IfMod,
                TokenKind::Identifier,
            ]
        );
        assert_eq!(kinds("if y")[0], TokenKind::If);
        assert_eq!(kinds("foo while bar")[1], TokenKind::WhileMod);
        assert_eq!(kinds("x = y rescue nil")[3], TokenKind::RescueMod);
    }

    #[test]
    fn test_modifiers_after_flow_keywords() {
        assert_eq!(kinds("return if x"), vec![TokenKind::FlowKeyword, TokenKind::IfMod, TokenKind::Identifier]);
        assert_eq!(kinds("next unless y")[1], TokenKind::UnlessMod);
        assert_eq!(kinds("break while z")[1], TokenKind::WhileMod);
        assert_eq!(kinds("return 1 until done")[2], TokenKind::UntilMod);
        assert_eq!(kinds("self if x")[1], TokenKind::IfMod);
        assert_eq!(kinds("foo(a) if x")[4], TokenKind::IfMod);
        assert_eq!(kinds("x = if y")[2], TokenKind::If);
    }

    #[test]
    fn test_do_after_while_condition() {
        let k = kinds("while x do\n y\nend\nfoo do\nend");
        assert_eq!(k[2], TokenKind::DoCond);
        assert!(k.contains(&TokenKind::Do));
    }

    #[test]
    fn test_keywords_after_dot_are_identifiers() {
        let k = kinds("self.class.end");
        assert_eq!(
            k,
            vec![
                TokenKind::SelfKw,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_def_method_names() {
        let tokens = tokenize("def end; end");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "end");
        assert_eq!(tokens[1].lex_state, LexState::EndFn);

        let tokens = tokenize("def self.call(x)");
        assert_eq!(tokens[1].kind, TokenKind::SelfKw);
        assert_eq!(tokens[3].text, "call");
        assert_eq!(tokens[3].lex_state, LexState::EndFn);

        let tokens = tokenize("def ==(other)");
        assert_eq!(tokens[1].text, "==");
        assert_eq!(tokens[2].kind, TokenKind::LeftParen);

        let tokens = tokenize("def name=(value)");
        assert_eq!(tokens[1].text, "name=");
    }

    #[test]
    fn test_labels_are_not_keywords() {
        let k = kinds("foo(class: 1, if: 2)");
        assert_eq!(k.iter().filter(|k| **k == TokenKind::Label).count(), 2);
        assert!(!k.contains(&TokenKind::Class));
    }

    #[test]
    fn test_block_brace_versus_hash() {
        let k = kinds("foo { |x| x }");
        assert_eq!(k[1], TokenKind::BlockBrace);
        let k = kinds("x = { a: 1 }");
        assert_eq!(k[2], TokenKind::LeftBrace);
    }

    #[test]
    fn test_strings_with_interpolation() {
        let tokens = tokenize("x = \"a #{ {b: \"}\"}[:b] } c\"\ny");
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[3].kind, TokenKind::Newline);
        assert_eq!(tokens[4].text, "y");
    }

    #[test]
    fn test_percent_literals_and_regexp() {
        let k = kinds("x = %w(a (b) c)\ny = /a\\/b[/]/i");
        assert_eq!(k[2], TokenKind::StringLiteral);
        assert_eq!(k[5], TokenKind::Regexp);
        assert_eq!(k.len(), 6);
    }

    #[test]
    fn test_heredoc_body_is_skipped() {
        let tokens = tokenize("x = <<~EOS\n  def fake\n  end\nEOS\ny = 1");
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(!texts.contains(&"def"));
        assert!(texts.contains(&"y"));
        let y = tokens.iter().find(|t| t.text == "y").unwrap();
        assert_eq!(y.line, 5);
    }

    #[test]
    fn test_comments_and_block_comments() {
        let tokens = tokenize("# hello\n=begin\nskip\n=end\nfoo");
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].text, "# hello");
        assert_eq!(tokens[2].kind, TokenKind::Comment);
        assert!(tokens[2].text.starts_with("=begin"));
        assert_eq!(tokens.last().unwrap().line, 5);
    }

    #[test]
    fn test_leading_dot_chain_suppresses_newline() {
        let k = kinds("foo\n  .bar\n  &.baz");
        let all: Vec<_> = tokenize("foo\n  .bar\n  &.baz").into_iter().map(|t| t.kind).collect();
        assert!(!all.contains(&TokenKind::Newline));
        assert_eq!(k.len(), 5);
    }

    #[test]
    fn test_symbols_and_ternary() {
        let k = kinds("a ? :b : :+");
        assert_eq!(
            k,
            vec![
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Symbol,
                TokenKind::Operator,
                TokenKind::Symbol,
            ]
        );
    }

    #[test]
    fn test_class_singleton_is_not_heredoc() {
        let k = kinds("class << self\nend");
        assert_eq!(k[1], TokenKind::LeftShift);
        assert_eq!(k[2], TokenKind::SelfKw);
    }

    #[test]
    fn test_end_marker_stops_lexing() {
        let tokens = tokenize("foo\n__END__\nclass Broken");
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Class));
    }

    #[test]
    fn test_alias_names() {
        let tokens = tokenize("alias new old\nx");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert!(tokens[2].lex_state.allows_statement_end());
    }
}
