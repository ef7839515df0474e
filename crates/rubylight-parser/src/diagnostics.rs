//! 診断情報モジュール
//!
//! バッチ処理中に発生した回復可能な問題（記述不能な文・未解決の参照・延期）を記録します。
//! 想定内の問題はエラーとして返さず、ここから件数と内容を取り出します。

use std::fmt;

/// 診断情報の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// ドキュメント化できない文（スキップした）
    Undocumentable,
    /// 最後まで解決できなかった参照
    UnresolvedReference,
    /// 依存が未定義のためファイルの処理を延期した
    Deferred,
    /// 再試行の上限に達した
    RetryExhausted,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Undocumentable => write!(f, "記述不能"),
            DiagnosticKind::UnresolvedReference => write!(f, "未解決参照"),
            DiagnosticKind::Deferred => write!(f, "延期"),
            DiagnosticKind::RetryExhausted => write!(f, "再試行上限"),
        }
    }
}

/// 診断情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 種類
    pub kind: DiagnosticKind,
    /// メッセージ
    pub message: String,
    /// ファイル
    pub file: Option<String>,
    /// 行番号
    pub line: Option<usize>,
}

impl Diagnostic {
    /// 新しい診断情報を作成
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    /// 位置を設定
    pub fn at(mut self, file: impl Into<String>, line: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "[{}] {}:{}: {}", self.kind, file, line, self.message),
            (Some(file), None) => write!(f, "[{}] {}: {}", self.kind, file, self.message),
            _ => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// 診断情報の集まり
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 診断情報を追加
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// 全ての診断情報
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// 指定した種類の件数
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    /// 指定した種類の診断情報
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 診断情報をクリア
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
