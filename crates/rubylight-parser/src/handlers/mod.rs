//! # 文ハンドラー
//!
//! 分割済みの文を構成要素ごとのハンドラーに振り分け、レジストリに反映します。
//! ハンドラーは周囲の名前空間・可視性・スコープを [`HandlerContext`] から受け取り、
//! 次のいずれかの結果を返します。
//!
//! - 正常終了
//! - 記述不能（その文だけスキップ）
//! - 未解決依存（ファイル全体をロード順序コーディネーターに差し戻す）

pub mod alias;
pub mod attribute;
pub mod class;
pub mod constant;
pub mod method;
pub mod mixin;
pub mod module;
pub mod visibility;

use log::{debug, warn};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::frontend::error::HandlerError;
use crate::frontend::lexer::{Token, TokenKind};
use crate::frontend::segmenter::Statement;
use crate::registry::path::{self, NAMESPACE_SEPARATOR};
use crate::registry::{Docstring, ObjectId, ObjectRef, ObjectType, Proxy, Registry, ResolveOptions, Scope, Visibility};

pub use self::alias::AliasHandler;
pub use self::attribute::AttributeHandler;
pub use self::class::ClassHandler;
pub use self::constant::{ClassVariableHandler, ConstantHandler};
pub use self::method::MethodHandler;
pub use self::mixin::MixinHandler;
pub use self::module::ModuleHandler;
pub use self::visibility::VisibilityHandler;

/// ハンドラーの処理結果
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// 文ハンドラー
pub trait Handler {
    /// ハンドラー名（ログ用）
    fn name(&self) -> &'static str;

    /// この文を処理するかどうか
    fn matches(&self, statement: &Statement) -> bool;

    /// 文を処理する
    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult;
}

/// ハンドラーに渡される周囲の状態
pub struct HandlerContext<'a> {
    /// 書き込み先のレジストリ
    pub registry: &'a mut Registry,
    /// 診断情報の出力先
    pub diagnostics: &'a mut Diagnostics,
    /// 現在の名前空間
    pub namespace: ObjectId,
    /// 現在の可視性
    pub visibility: Visibility,
    /// 現在のスコープ
    pub scope: Scope,
    /// module_function が有効か
    pub module_function: bool,
    /// 処理中のファイル名
    pub file: String,
    /// 未解決依存で処理を延期してよいか（再試行の予算が残っているか）
    pub allow_deferral: bool,
    processor: &'a Processor,
}

impl<'a> HandlerContext<'a> {
    /// ルート名前空間から始まるコンテキストを作成
    pub fn new(
        registry: &'a mut Registry,
        diagnostics: &'a mut Diagnostics,
        processor: &'a Processor,
        file: impl Into<String>,
    ) -> Self {
        let root = registry.root();
        Self {
            registry,
            diagnostics,
            namespace: root,
            visibility: Visibility::Public,
            scope: Scope::Instance,
            module_function: false,
            file: file.into(),
            allow_deferral: true,
            processor,
        }
    }

    /// 新しい名前空間で本体を処理し、周囲の状態を元に戻す
    pub fn process_body(&mut self, statements: &[Statement], namespace: ObjectId, scope: Scope) -> HandlerResult {
        let saved = (self.namespace, self.visibility, self.scope, self.module_function);
        self.namespace = namespace;
        self.visibility = Visibility::Public;
        self.scope = scope;
        self.module_function = false;

        let processor = self.processor;
        let result = processor.process_statements(statements, self);

        (self.namespace, self.visibility, self.scope, self.module_function) = saved;
        result
    }

    /// 周囲の状態を保ったまま文を処理する
    pub fn process_statement(&mut self, statement: &Statement) -> HandlerResult {
        let processor = self.processor;
        processor.process_statement(statement, self)
    }

    /// 名前空間を表す名前を解決する
    ///
    /// 見つからない場合、延期が許されていれば未解決依存を返し、
    /// そうでなければ仮のモジュールを作成します。
    pub fn resolve_namespace(&mut self, name: &str, line: usize) -> Result<ObjectId, HandlerError> {
        let options = ResolveOptions::new().inherit(true);
        if let Some(ObjectRef::Object(id)) = self.registry.resolve(self.namespace, name, &options) {
            if self.registry.get(id).map_or(false, |o| o.is_namespace()) {
                return Ok(id);
            }
            return Err(HandlerError::undocumentable(format!("'{}' は名前空間ではありません", name), line));
        }
        if self.allow_deferral {
            return Err(HandlerError::unresolved(name, line));
        }
        self.create_placeholder_namespace(name, line)
    }

    /// 見つからない名前空間を動的なモジュールとして作成
    fn create_placeholder_namespace(&mut self, name: &str, line: usize) -> Result<ObjectId, HandlerError> {
        let mut current = if path::is_root_qualified(name) {
            self.registry.root()
        } else {
            self.namespace
        };
        for (index, (_, segment)) in path::segments(name).into_iter().enumerate() {
            let options = ResolveOptions::new().inherit(true);
            let existing = if index == 0 {
                match self.registry.resolve(current, segment, &options) {
                    Some(ObjectRef::Object(id)) => Some(id),
                    _ => None,
                }
            } else {
                self.registry.child(current, segment, None)
            };
            current = match existing.filter(|id| self.registry.get(*id).map_or(false, |o| o.is_namespace())) {
                Some(id) => id,
                None => {
                    let (id, _) = self.registry.register(current, segment, ObjectType::Module, Scope::Instance)?;
                    if let Some(object) = self.registry.get_mut(id) {
                        object.dynamic = true;
                    }
                    id
                }
            };
        }
        self.report_unresolved(name, line);
        Ok(current)
    }

    /// 修飾名（`A::B::C`）を所有する名前空間と最後の名前に分ける
    pub fn split_namespace(&mut self, qualified: &str, line: usize) -> Result<(ObjectId, String), HandlerError> {
        match qualified.rfind(NAMESPACE_SEPARATOR) {
            Some(0) => Ok((self.registry.root(), qualified[NAMESPACE_SEPARATOR.len()..].to_string())),
            Some(index) => {
                let owner = self.resolve_namespace(&qualified[..index], line)?;
                Ok((owner, qualified[index + NAMESPACE_SEPARATOR.len()..].to_string()))
            }
            None => Ok((self.namespace, qualified.to_string())),
        }
    }

    /// スーパークラスなどの参照を解決する
    ///
    /// 見つからない場合、延期が許されていれば未解決依存を返し、
    /// そうでなければプロキシを返して未解決参照として記録します。
    pub fn resolve_reference(
        &mut self,
        name: &str,
        type_hint: Option<ObjectType>,
        line: usize,
    ) -> Result<ObjectRef, HandlerError> {
        let options = ResolveOptions::new().inherit(true).type_hint(type_hint);
        match self.registry.resolve(self.namespace, name, &options) {
            Some(reference @ ObjectRef::Object(_)) => Ok(reference),
            _ if self.allow_deferral => Err(HandlerError::unresolved(name, line)),
            _ => {
                self.report_unresolved(name, line);
                Ok(ObjectRef::Proxy(Proxy::new(self.namespace, name, type_hint)))
            }
        }
    }

    /// 参照を解決し、見つからなければ延期せずにプロキシを返す
    pub fn reference_or_proxy(&self, name: &str, type_hint: Option<ObjectType>) -> ObjectRef {
        let options = ResolveOptions::new()
            .inherit(true)
            .type_hint(type_hint)
            .proxy_fallback(true);
        self.registry
            .resolve(self.namespace, name, &options)
            .unwrap_or_else(|| ObjectRef::Proxy(Proxy::new(self.namespace, name, type_hint)))
    }

    /// 未解決参照を診断情報に記録
    pub fn report_unresolved(&mut self, name: &str, line: usize) {
        let message = format!("'{}' を解決できませんでした", name);
        debug!("{}:{}: {}", self.file, line, message);
        self.diagnostics
            .push(Diagnostic::new(DiagnosticKind::UnresolvedReference, message).at(self.file.clone(), line));
    }

    /// オブジェクトを登録し、定義位置・ドキュメント・シグネチャを記録する
    pub fn register(
        &mut self,
        statement: &Statement,
        namespace: ObjectId,
        name: &str,
        object_type: ObjectType,
        scope: Scope,
    ) -> Result<ObjectId, HandlerError> {
        let (id, created) = self.registry.register(namespace, name, object_type, scope)?;
        let object = self.registry.try_get_mut(id)?;
        object.add_file(self.file.clone(), statement.line);
        if let Some(comment) = &statement.leading_comment {
            let docstring = Docstring::parse(comment);
            if !docstring.is_blank() {
                object.docstring = docstring;
            }
        }
        if created || object.signature.is_none() {
            object.signature = Some(statement.signature());
            object.source = Some(statement.header_source());
        }
        Ok(id)
    }

    /// 現在の名前空間のパス
    pub fn namespace_path(&self) -> &str {
        self.registry.get(self.namespace).map_or("", |o| o.path.as_str())
    }
}

/// ハンドラーの振り分け
pub struct Processor {
    handlers: Vec<Box<dyn Handler>>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// 標準のハンドラーを登録した振り分け器を作成
    pub fn new() -> Self {
        let mut processor = Self::empty();
        processor.register(Box::new(ClassHandler));
        processor.register(Box::new(ModuleHandler));
        processor.register(Box::new(MethodHandler));
        processor.register(Box::new(VisibilityHandler));
        processor.register(Box::new(MixinHandler));
        processor.register(Box::new(AttributeHandler));
        processor.register(Box::new(AliasHandler));
        processor.register(Box::new(ClassVariableHandler));
        processor.register(Box::new(ConstantHandler));
        processor
    }

    /// ハンドラーを持たない振り分け器を作成
    pub fn empty() -> Self {
        Self { handlers: Vec::new() }
    }

    /// ハンドラーを追加
    pub fn register(&mut self, handler: Box<dyn Handler>) {
        self.handlers.push(handler);
    }

    /// 文を処理する
    ///
    /// 記述不能な文は診断情報に記録して成功扱いにします。
    /// どのハンドラーにも一致しない文は、本体があればその中を同じ状態で処理します。
    pub fn process_statement(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let handler = self.handlers.iter().find(|h| h.matches(statement));
        let result = match handler {
            Some(handler) => {
                debug!("{}:{}: {} で処理", context.file, statement.line, handler.name());
                handler.process(statement, context)
            }
            None => match &statement.body {
                Some(body) => self.process_statements(body, context),
                None => Ok(()),
            },
        };

        match result {
            Err(HandlerError::Undocumentable { message, line }) => {
                warn!("{}:{}: ドキュメント化できない文を無視します: {}", context.file, line, message);
                context.diagnostics.push(
                    Diagnostic::new(DiagnosticKind::Undocumentable, message).at(context.file.clone(), line),
                );
                Ok(())
            }
            other => other,
        }
    }

    /// 文の列を順に処理する
    pub fn process_statements(&self, statements: &[Statement], context: &mut HandlerContext<'_>) -> HandlerResult {
        for statement in statements {
            self.process_statement(statement, context)?;
        }
        Ok(())
    }
}

// ===== ハンドラー共通のトークン操作 =====

/// 定数パス（`A::B`・`::A`）を読み、パスと次の位置を返す
pub(crate) fn read_constant_path(tokens: &[Token], start: usize) -> Option<(String, usize)> {
    let mut index = start;
    let mut text = String::new();
    if tokens.get(index).map_or(false, |t| t.kind == TokenKind::DoubleColon) {
        text.push_str(NAMESPACE_SEPARATOR);
        index += 1;
    }
    loop {
        match tokens.get(index) {
            Some(token) if token.kind == TokenKind::Constant => {
                text.push_str(&token.text);
                index += 1;
            }
            _ => return None,
        }
        match (tokens.get(index), tokens.get(index + 1)) {
            (Some(separator), Some(next))
                if separator.kind == TokenKind::DoubleColon && next.kind == TokenKind::Constant =>
            {
                text.push_str(NAMESPACE_SEPARATOR);
                index += 1;
            }
            _ => return Some((text, index)),
        }
    }
}

/// 呼び出し引数をトップレベルのコンマで分割する（外側の括弧は除く）
pub(crate) fn split_arguments(tokens: &[Token]) -> Vec<&[Token]> {
    let tokens = match (tokens.first(), tokens.last()) {
        (Some(first), Some(last))
            if first.kind == TokenKind::LeftParen && last.kind == TokenKind::RightParen && tokens.len() >= 2 =>
        {
            &tokens[1..tokens.len() - 1]
        }
        _ => tokens,
    };

    let mut arguments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, token) in tokens.iter().enumerate() {
        let kind = token.kind;
        if kind.is_bracket_opener() || kind.is_simple_opener() || kind.is_keyword_opener() {
            depth += 1;
        } else if kind.is_closer() {
            depth = depth.saturating_sub(1);
        } else if kind == TokenKind::Comma && depth == 0 {
            arguments.push(&tokens[start..index]);
            start = index + 1;
        }
    }
    if start < tokens.len() {
        arguments.push(&tokens[start..]);
    }
    arguments
}

/// シンボル・文字列・識別子から名前を取り出す（`:foo`・`"foo"`・`foo`）
pub(crate) fn literal_name(token: &Token) -> Option<String> {
    let text = token.text.as_str();
    match token.kind {
        TokenKind::Symbol => {
            let name = text.trim_start_matches(':');
            Some(name.trim_matches(|c| c == '"' || c == '\'').to_string())
        }
        TokenKind::StringLiteral if text.len() >= 2 && (text.starts_with('"') || text.starts_with('\'')) => {
            Some(text[1..text.len() - 1].to_string())
        }
        TokenKind::Identifier | TokenKind::Constant => Some(text.to_string()),
        _ => None,
    }
}

/// ヘッダーの一部から新しい文を作る（`private def ...` の内側など）
pub(crate) fn sub_statement(statement: &Statement, start: usize) -> Statement {
    Statement {
        header: statement.header[start..].to_vec(),
        ..statement.clone()
    }
}
