//! # エラー処理モジュール
//!
//! RubyLightパーサーのエラー分類を定義します。
//!
//! - [`RegistryError`]: レジストリの契約違反。常に致命的です。
//! - [`HandlerError`]: 文ハンドラーの結果。文単位のスキップ（記述不能）と
//!   ロード順序の再試行を要求する未解決依存を、致命的な契約違反と区別します。
//! - [`ParserError`]: クレート最上位のエラー。

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// レジストリの契約違反
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// 名前空間でないオブジェクトの下に登録しようとした
    #[error("'{path}' は名前空間ではないため '{name}' を登録できません")]
    NotANamespace {
        /// 登録先オブジェクトのパス
        path: String,
        /// 登録しようとした名前
        name: String,
    },

    /// 空または不正な名前
    #[error("不正なオブジェクト名です: {0:?}")]
    InvalidName(String),

    /// 名前空間の付け替え先パスが既に使われている
    #[error("パス '{0}' は既に別のオブジェクトが使用しています")]
    PathOccupied(String),

    /// 存在しないハンドル
    #[error("不明なオブジェクトID: {0}")]
    UnknownObject(usize),
}

/// 文ハンドラーの処理結果（正常終了以外）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// 記述不能な文。その文だけをスキップして処理を続けます。
    #[error("{line}行目: ドキュメント化できない文です: {message}")]
    Undocumentable {
        /// 理由
        message: String,
        /// 行番号
        line: usize,
    },

    /// 未解決の依存。ファイル全体をワークリストの末尾に戻します。
    #[error("{line}行目: '{missing}' が未定義のため処理を延期します")]
    UnresolvedDependency {
        /// 見つからなかった名前
        missing: String,
        /// 行番号
        line: usize,
    },

    /// レジストリの契約違反（致命的）
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl HandlerError {
    /// 記述不能エラーを作成
    pub fn undocumentable(message: impl Into<String>, line: usize) -> Self {
        HandlerError::Undocumentable {
            message: message.into(),
            line,
        }
    }

    /// 未解決依存エラーを作成
    pub fn unresolved(missing: impl Into<String>, line: usize) -> Self {
        HandlerError::UnresolvedDependency {
            missing: missing.into(),
            line,
        }
    }

    /// バッチ全体を止める致命的なエラーかどうか
    pub fn is_fatal(&self) -> bool {
        matches!(self, HandlerError::Registry(_))
    }
}

/// パーサーのエラー型
#[derive(Error, Debug)]
pub enum ParserError {
    /// ファイル入出力エラー
    #[error("I/Oエラー: {}: {source}", path.display())]
    Io {
        /// 対象のパス
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// ディレクトリ走査エラー
    #[error("ディレクトリの走査に失敗しました: {0}")]
    Walk(#[from] walkdir::Error),

    /// 設定ファイルの解析エラー
    #[error("設定ファイルの解析に失敗しました: {0}")]
    Config(#[from] toml::de::Error),

    /// スナップショットの読み書きエラー
    #[error("キャッシュの読み書きに失敗しました: {0}")]
    Cache(#[from] serde_json::Error),

    /// レジストリの契約違反
    #[error("レジストリエラー: {0}")]
    Registry(#[from] RegistryError),

    /// ハンドラーから伝播した致命的なエラー
    #[error("ハンドラーエラー: {0}")]
    Handler(HandlerError),
}

impl ParserError {
    /// パス付きのI/Oエラーを作成
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ParserError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<HandlerError> for ParserError {
    fn from(error: HandlerError) -> Self {
        match error {
            HandlerError::Registry(inner) => ParserError::Registry(inner),
            other => ParserError::Handler(other),
        }
    }
}

/// パーサーの結果型
pub type Result<T> = std::result::Result<T, ParserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_registry_error_maps_to_registry() {
        let error: ParserError = HandlerError::from(RegistryError::InvalidName(String::new())).into();
        assert!(matches!(error, ParserError::Registry(RegistryError::InvalidName(_))));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!HandlerError::undocumentable("x", 1).is_fatal());
        assert!(!HandlerError::unresolved("A", 1).is_fatal());
        assert!(HandlerError::Registry(RegistryError::UnknownObject(3)).is_fatal());
    }

    #[test]
    fn test_messages_mention_names() {
        let error = HandlerError::unresolved("Foo::Bar", 12);
        let message = error.to_string();
        assert!(message.contains("Foo::Bar"));
        assert!(message.contains("12"));
    }
}
