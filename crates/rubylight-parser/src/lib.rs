// RubyLight Parser Library
// Rubyソースのドキュメント解析コア

//! # RubyLight Parser
//!
//! Rubyのソースコードからクラス・モジュール・メソッド・定数などの定義と
//! その直前のコメントを取り出し、正規パスで引けるレジストリに格納するライブラリです。
//!
//! 処理は次の段階からなります。
//!
//! 1. レキサーがトークン列を生成する（[`frontend::lexer`]）
//! 2. 文分割器がトークン列を構成要素ごとの文に分け、コメントを対応付ける（[`frontend::segmenter`]）
//! 3. ハンドラーが文をレジストリに反映する（[`handlers`]）
//! 4. ロード順序コーディネーターが、未定義の依存を持つファイルを後回しにして再開する（[`driver`]）
//!
//! ```no_run
//! use rubylight_parser::{LoadOrderCoordinator, ParserConfig, Registry};
//!
//! let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
//! coordinator.add_directory("lib")?;
//! let mut registry = Registry::new();
//! let report = coordinator.run(&mut registry)?;
//! println!("{} objects", report.objects);
//! # Ok::<(), rubylight_parser::ParserError>(())
//! ```

pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod frontend;
pub mod handlers;
pub mod registry;

// 再エクスポート
pub use self::config::ParserConfig;
pub use self::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use self::driver::{BatchReport, LoadOrderCoordinator, ParseUnit, RegistrySnapshot};
pub use self::frontend::error::{HandlerError, ParserError, RegistryError, Result};
pub use self::frontend::lexer;
pub use self::frontend::segmenter::{segment, Statement, StatementSegmenter};
pub use self::handlers::{Handler, HandlerContext, Processor};
pub use self::registry::{
    CodeObject, Docstring, ObjectId, ObjectKind, ObjectRef, ObjectType, Proxy, Registry, ResolveOptions, Resolver,
    Scope, Visibility,
};

/// パーサーのバージョン
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
