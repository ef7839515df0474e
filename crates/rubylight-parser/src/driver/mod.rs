//! # ロード順序コーディネーター
//!
//! 複数のファイルを1つのレジストリに取り込むバッチ処理を管理します。
//! ファイルは任意の順序で与えられます。未定義の名前空間やスーパークラスに
//! 依存する文に出会ったファイルは、その文の位置を記録してワークリストの末尾に戻り、
//! 他のファイルを処理した後でその文から再開します。
//!
//! 延期の回数はパースユニットごとに [`ParserConfig::max_retries`] までです。
//! 上限に達したユニットは延期せず、未解決の参照をプロキシとして扱います。

pub mod cache;

pub use self::cache::RegistrySnapshot;

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ParserConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::frontend::error::{HandlerError, ParserError, Result};
use crate::frontend::segmenter::{Statement, StatementSegmenter};
use crate::handlers::{HandlerContext, Processor};
use crate::registry::{Registry, Scope, Visibility};

/// 1ファイル分の再開可能な処理状態
#[derive(Debug, Clone)]
pub struct ParseUnit {
    /// ファイル名
    pub path: String,
    /// ソース
    pub source: String,
    /// 分割済みのトップレベルの文
    pub statements: Vec<Statement>,
    /// 次に処理する文の位置
    pub cursor: usize,
    /// 再開時の可視性
    pub visibility: Visibility,
    /// 再開時のスコープ
    pub scope: Scope,
    /// 延期した回数
    pub attempts: usize,
}

impl ParseUnit {
    /// ソースを分割して新しいユニットを作成
    pub fn new(path: impl Into<String>, source: impl Into<String>, attach_inline_comments: bool) -> Self {
        let source = source.into();
        let statements = StatementSegmenter::new(&source)
            .with_inline_comments(attach_inline_comments)
            .collect();
        Self {
            path: path.into(),
            source,
            statements,
            cursor: 0,
            visibility: Visibility::Public,
            scope: Scope::Instance,
            attempts: 0,
        }
    }

    /// 全ての文を処理し終えたかどうか
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.statements.len()
    }
}

/// バッチ処理の結果
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// 処理したファイル数
    pub files: usize,
    /// 延期の回数
    pub deferrals: usize,
    /// 処理したトップレベルの文の数
    pub statements: usize,
    /// 処理後のオブジェクト数（ルートを除く）
    pub objects: usize,
    /// 診断情報
    pub diagnostics: Diagnostics,
}

impl BatchReport {
    /// 記述不能として無視した文の数
    pub fn undocumentable(&self) -> usize {
        self.diagnostics.count(DiagnosticKind::Undocumentable)
    }

    /// プロキシで代用した参照の数
    pub fn unresolved(&self) -> usize {
        self.diagnostics.count(DiagnosticKind::UnresolvedReference)
    }
}

/// ユニットを1回処理した結果
enum UnitOutcome {
    Finished,
    Deferred { missing: String, line: usize },
}

/// ロード順序コーディネーター
pub struct LoadOrderCoordinator {
    config: ParserConfig,
    processor: Processor,
    units: Vec<ParseUnit>,
}

impl LoadOrderCoordinator {
    /// 新しいコーディネーターを作成
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            processor: Processor::new(),
            units: Vec::new(),
        }
    }

    /// ハンドラーの振り分け器を差し替える
    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = processor;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// 処理待ちのユニット数
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// ファイルを読み込んで追加
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| ParserError::io(path, e))?;
        self.add_source(path.display().to_string(), source);
        Ok(())
    }

    /// ソース文字列を追加
    pub fn add_source(&mut self, path: impl Into<String>, source: impl Into<String>) {
        let unit = ParseUnit::new(path, source, self.config.attach_inline_comments);
        self.units.push(unit);
    }

    /// ディレクトリ以下のRubyソースを名前順に追加し、追加した数を返す
    pub fn add_directory(&mut self, directory: impl AsRef<Path>) -> Result<usize> {
        let mut added = 0;
        let walker = WalkDir::new(directory.as_ref())
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self.config.is_excluded_dir(&entry.file_name().to_string_lossy())
            });
        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && self.config.is_included(entry.path()) {
                files.push(entry.into_path());
            }
        }
        for file in files {
            self.add_file(&file)?;
            added += 1;
        }
        debug!("{} から {} 個のファイルを追加しました", directory.as_ref().display(), added);
        Ok(added)
    }

    /// 全てのユニットを処理する
    ///
    /// 依存が未定義のユニットはワークリストの末尾に戻し、延期した文から再開します。
    /// 再試行の上限に達したユニットは延期せずに最後まで処理します。
    ///
    /// # 引数
    ///
    /// * `registry` - 結果を書き込むレジストリ
    ///
    /// # 戻り値
    ///
    /// * `Result<BatchReport>` - 成功時は処理結果、レジストリの契約違反ではエラー
    pub fn run(&mut self, registry: &mut Registry) -> Result<BatchReport> {
        let mut queue: VecDeque<ParseUnit> = self.units.drain(..).collect();
        let mut report = BatchReport {
            files: queue.len(),
            ..BatchReport::default()
        };
        let mut diagnostics = Diagnostics::new();

        while let Some(mut unit) = queue.pop_front() {
            if unit.cursor == 0 && unit.attempts == 0 {
                info!("解析開始: {}", unit.path);
            }
            match self.process_unit(&mut unit, registry, &mut diagnostics, &mut report)? {
                UnitOutcome::Finished => info!("解析完了: {}", unit.path),
                UnitOutcome::Deferred { missing, line } => {
                    debug!("{}:{}: '{}' が未定義のため処理を延期します", unit.path, line, missing);
                    diagnostics.push(
                        Diagnostic::new(DiagnosticKind::Deferred, format!("'{}' が未定義のため延期しました", missing))
                            .at(unit.path.clone(), line),
                    );
                    report.deferrals += 1;
                    queue.push_back(unit);
                }
            }
        }

        report.objects = registry.len();
        report.diagnostics = diagnostics;
        Ok(report)
    }

    fn process_unit(
        &self,
        unit: &mut ParseUnit,
        registry: &mut Registry,
        diagnostics: &mut Diagnostics,
        report: &mut BatchReport,
    ) -> Result<UnitOutcome> {
        let allow_deferral = unit.attempts < self.config.max_retries;
        let unresolved_before = diagnostics.count(DiagnosticKind::UnresolvedReference);
        let resumed_at = unit.statements.get(unit.cursor).map_or(0, |s| s.line);

        let mut context = HandlerContext::new(registry, diagnostics, &self.processor, unit.path.clone());
        context.visibility = unit.visibility;
        context.scope = unit.scope;
        context.allow_deferral = allow_deferral;

        while let Some(statement) = unit.statements.get(unit.cursor) {
            let (visibility, scope) = (context.visibility, context.scope);
            match self.processor.process_statement(statement, &mut context) {
                Ok(()) => {
                    unit.cursor += 1;
                    report.statements += 1;
                }
                Err(HandlerError::UnresolvedDependency { missing, line }) => {
                    unit.visibility = visibility;
                    unit.scope = scope;
                    unit.attempts += 1;
                    return Ok(UnitOutcome::Deferred { missing, line });
                }
                Err(error) => return Err(error.into()),
            }
        }
        drop(context);

        let exhausted = !allow_deferral && unit.attempts > 0;
        if exhausted && diagnostics.count(DiagnosticKind::UnresolvedReference) > unresolved_before {
            warn!("{}: 再試行の上限に達したため未解決の参照をプロキシとして扱いました", unit.path);
            diagnostics.push(
                Diagnostic::new(DiagnosticKind::RetryExhausted, format!("{}回の延期後も依存を解決できません", unit.attempts))
                    .at(unit.path.clone(), resumed_at),
            );
        }
        Ok(UnitOutcome::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_keeps_visibility() {
        let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
        coordinator.add_source("b.rb", "private\n\nclass B < A\nend\n\ndef helper; end\n");
        coordinator.add_source("a.rb", "class A\nend\n");

        let mut registry = Registry::new();
        let report = coordinator.run(&mut registry).unwrap();
        assert_eq!(report.deferrals, 1);
        assert_eq!(report.statements, 4);
        assert_eq!(registry.object_at("B").unwrap().superclass().unwrap().path(&registry), "A");
        assert_eq!(registry.object_at("#helper").unwrap().visibility, Visibility::Private);
    }

    #[test]
    fn test_zero_retries_never_defers() {
        let config = ParserConfig {
            max_retries: 0,
            ..ParserConfig::default()
        };
        let mut coordinator = LoadOrderCoordinator::new(config);
        coordinator.add_source("b.rb", "class B < A\nend\n");
        coordinator.add_source("a.rb", "class A\nend\n");

        let mut registry = Registry::new();
        let report = coordinator.run(&mut registry).unwrap();
        assert_eq!(report.deferrals, 0);
        // プロキシは後から定義された A に解決される
        assert_eq!(registry.object_at("B").unwrap().superclass().unwrap().path(&registry), "A");
        assert!(coordinator.is_empty());
    }

    #[test]
    fn test_unit_is_finished() {
        let unit = ParseUnit::new("x.rb", "module X\nend\n", true);
        assert_eq!(unit.statements.len(), 1);
        assert!(!unit.is_finished());
    }
}
