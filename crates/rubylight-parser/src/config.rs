//! パーサー設定モジュール
//!
//! `.rubylight.toml` から読み込むバッチ処理の設定を提供します。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::frontend::error::{ParserError, Result};

/// 既定の設定ファイル名
pub const DEFAULT_CONFIG_FILE: &str = ".rubylight.toml";

/// パーサーの設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// パースユニットごとの延期の上限
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Rubyソースとして扱う拡張子
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// ディレクトリ走査で除外するディレクトリ名
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// 先頭行の行末コメントをドキュメントとして使うか
    #[serde(default = "default_true")]
    pub attach_inline_comments: bool,

    /// レジストリのスナップショットの保存先
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

fn default_max_retries() -> usize {
    1
}

fn default_include() -> Vec<String> {
    vec!["rb".to_string()]
}

fn default_exclude_dirs() -> Vec<String> {
    ["vendor", ".git", "tmp"].iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            include: default_include(),
            exclude_dirs: default_exclude_dirs(),
            attach_inline_comments: default_true(),
            cache_path: None,
        }
    }
}

impl ParserConfig {
    /// 設定ファイルを読み込む（ファイルがなければ既定値）
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("設定ファイル {} がないため既定値を使用します", path.display());
                return Ok(Self::default());
            }
            Err(error) => return Err(ParserError::io(path, error)),
        };
        let config = Self::from_toml(&content)?;
        debug!("設定ファイルを読み込みました: {}", path.display());
        Ok(config)
    }

    /// TOML文字列から設定を作成
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// ディレクトリ内の `.rubylight.toml` を読み込む
    pub fn discover(directory: impl AsRef<Path>) -> Result<Self> {
        Self::load(directory.as_ref().join(DEFAULT_CONFIG_FILE))
    }

    /// 拡張子がRubyソースとして扱われるかどうか
    pub fn is_included(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.include.iter().any(|included| included == ext))
    }

    /// ディレクトリ名が除外対象かどうか
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|excluded| excluded == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = ParserConfig::from_toml("max_retries = 3\n").unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.include, vec!["rb"]);
        assert!(config.attach_inline_comments);
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let error = ParserConfig::from_toml("max_retries = \"many\"").unwrap_err();
        assert!(matches!(error, ParserError::Config(_)));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = ParserConfig::load("/nonexistent/dir/.rubylight.toml").unwrap();
        assert_eq!(config, ParserConfig::default());
    }

    #[test]
    fn test_include_and_exclude() {
        let config = ParserConfig::default();
        assert!(config.is_included(Path::new("lib/foo.rb")));
        assert!(!config.is_included(Path::new("README.md")));
        assert!(config.is_excluded_dir("vendor"));
        assert!(!config.is_excluded_dir("lib"));
    }
}
