//! # RubyLight フロントエンド
//!
//! ソーステキストから文の列を得るまでの処理を担当します。
//!
//! ## 処理フェーズ
//! 1. 字句解析（[`lexer`]）
//! 2. 文分割（[`segmenter`]）
//!
//! 文法レベルの構文木は作りません。文の境界とブロック本体の対応付けだけを求めます。

pub mod error;
pub mod lexer;
pub mod segmenter;

pub use self::error::{HandlerError, ParserError, RegistryError, Result};
pub use self::lexer::{LexState, Lexer, Token, TokenKind};
pub use self::segmenter::{segment, Statement, StatementSegmenter};
