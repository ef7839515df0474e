//! # コードオブジェクト
//!
//! レジストリに格納されるクラス・モジュール・メソッド・定数などの定義です。
//! 種類ごとの属性は [`ObjectKind`] の各バリアントが型付きのフィールドとして持ちます。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::docstring::Docstring;
use super::proxy::ObjectRef;

/// レジストリ内のオブジェクトを指す安定したハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) usize);

impl ObjectId {
    /// アリーナ内のインデックス
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// オブジェクトの種類（ペイロードなし）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// ルート
    Root,
    /// モジュール
    Module,
    /// クラス
    Class,
    /// メソッド
    Method,
    /// 定数
    Constant,
    /// クラス変数
    ClassVariable,
}

impl ObjectType {
    /// 名前空間になれる種類かどうか
    pub fn is_namespace(&self) -> bool {
        matches!(self, ObjectType::Root | ObjectType::Module | ObjectType::Class)
    }

    /// 表示用の名前
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Root => "root",
            ObjectType::Module => "module",
            ObjectType::Class => "class",
            ObjectType::Method => "method",
            ObjectType::Constant => "constant",
            ObjectType::ClassVariable => "classvariable",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 可視性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// public
    #[default]
    Public,
    /// protected
    Protected,
    /// private
    Private,
}

impl Visibility {
    /// キーワードから可視性を得る
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// スコープ（クラスレベルかインスタンスレベルか）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// インスタンス
    #[default]
    Instance,
    /// クラス
    Class,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Instance => write!(f, "instance"),
            Scope::Class => write!(f, "class"),
        }
    }
}

/// 定義位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// ファイル名
    pub file: String,
    /// 行番号
    pub line: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// メソッドの引数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// 引数名（`*rest`・`key:`・`&blk` のように記号を含む）
    pub name: String,
    /// デフォルト値のソース
    pub default: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, default: Option<String>) -> Self {
        Self {
            name: name.into(),
            default,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default {
            Some(default) if self.name.ends_with(':') => write!(f, "{} {}", self.name, default),
            Some(default) => write!(f, "{} = {}", self.name, default),
            None => write!(f, "{}", self.name),
        }
    }
}

/// 属性の読み書きメソッド
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeSlot {
    /// リーダーメソッド
    pub read: Option<ObjectId>,
    /// ライターメソッド
    pub write: Option<ObjectId>,
}

/// 名前空間（ルート・モジュール・クラス）が持つデータ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceData {
    /// 子オブジェクト
    pub children: Vec<ObjectId>,
    /// include/prepend されたモジュール（新しいものが先頭）
    pub instance_mixins: Vec<ObjectRef>,
    /// extend されたモジュール（新しいものが先頭）
    pub class_mixins: Vec<ObjectRef>,
    /// エイリアス（別名のメソッド → 元の名前）
    pub aliases: BTreeMap<ObjectId, String>,
    /// インスタンス属性
    pub instance_attributes: BTreeMap<String, AttributeSlot>,
    /// クラス属性
    pub class_attributes: BTreeMap<String, AttributeSlot>,
}

impl NamespaceData {
    /// スコープ別のミックスイン
    pub fn mixins(&self, scope: Scope) -> &[ObjectRef] {
        match scope {
            Scope::Instance => &self.instance_mixins,
            Scope::Class => &self.class_mixins,
        }
    }

    /// スコープ別のミックスイン（可変）
    pub fn mixins_mut(&mut self, scope: Scope) -> &mut Vec<ObjectRef> {
        match scope {
            Scope::Instance => &mut self.instance_mixins,
            Scope::Class => &mut self.class_mixins,
        }
    }

    /// スコープ別の属性
    pub fn attributes(&self, scope: Scope) -> &BTreeMap<String, AttributeSlot> {
        match scope {
            Scope::Instance => &self.instance_attributes,
            Scope::Class => &self.class_attributes,
        }
    }

    /// スコープ別の属性（可変）
    pub fn attributes_mut(&mut self, scope: Scope) -> &mut BTreeMap<String, AttributeSlot> {
        match scope {
            Scope::Instance => &mut self.instance_attributes,
            Scope::Class => &mut self.class_attributes,
        }
    }
}

/// メソッドのデータ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodData {
    /// 引数
    pub parameters: Vec<Parameter>,
    /// 引数リストがソースに明示されていたか
    pub explicit: bool,
    /// module_function によって作られたコピーかどうか
    pub module_function: bool,
}

/// 種類ごとのデータ
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// ルート
    Root(NamespaceData),
    /// モジュール
    Module(NamespaceData),
    /// クラス
    Class {
        /// 名前空間データ
        namespace: NamespaceData,
        /// スーパークラス
        superclass: Option<ObjectRef>,
    },
    /// メソッド
    Method(MethodData),
    /// 定数
    Constant {
        /// 値のソース
        value: String,
    },
    /// クラス変数
    ClassVariable {
        /// 値のソース
        value: String,
    },
}

impl ObjectKind {
    /// 種類に応じた初期データを作成
    pub fn empty(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::Root => ObjectKind::Root(NamespaceData::default()),
            ObjectType::Module => ObjectKind::Module(NamespaceData::default()),
            ObjectType::Class => ObjectKind::Class {
                namespace: NamespaceData::default(),
                superclass: None,
            },
            ObjectType::Method => ObjectKind::Method(MethodData::default()),
            ObjectType::Constant => ObjectKind::Constant { value: String::new() },
            ObjectType::ClassVariable => ObjectKind::ClassVariable { value: String::new() },
        }
    }

    /// ペイロードなしの種類
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectKind::Root(_) => ObjectType::Root,
            ObjectKind::Module(_) => ObjectType::Module,
            ObjectKind::Class { .. } => ObjectType::Class,
            ObjectKind::Method(_) => ObjectType::Method,
            ObjectKind::Constant { .. } => ObjectType::Constant,
            ObjectKind::ClassVariable { .. } => ObjectType::ClassVariable,
        }
    }

    /// 名前空間データ
    pub fn namespace_data(&self) -> Option<&NamespaceData> {
        match self {
            ObjectKind::Root(ns) | ObjectKind::Module(ns) => Some(ns),
            ObjectKind::Class { namespace, .. } => Some(namespace),
            _ => None,
        }
    }

    /// 名前空間データ（可変）
    pub fn namespace_data_mut(&mut self) -> Option<&mut NamespaceData> {
        match self {
            ObjectKind::Root(ns) | ObjectKind::Module(ns) => Some(ns),
            ObjectKind::Class { namespace, .. } => Some(namespace),
            _ => None,
        }
    }

    /// 名前空間データを取り出して置き換える
    pub(crate) fn take_namespace_data(&mut self) -> Option<NamespaceData> {
        self.namespace_data_mut().map(std::mem::take)
    }
}

/// コードオブジェクト
#[derive(Debug, Clone, PartialEq)]
pub struct CodeObject {
    /// 名前
    pub name: String,
    /// 正規パス
    pub path: String,
    /// 所有する名前空間（ルートのみ `None`）
    pub namespace: Option<ObjectId>,
    /// ドキュメント
    pub docstring: Docstring,
    /// 定義・再オープンされた位置
    pub files: Vec<SourceLocation>,
    /// 可視性
    pub visibility: Visibility,
    /// スコープ
    pub scope: Scope,
    /// 定義のソース
    pub source: Option<String>,
    /// シグネチャ（定義の先頭行）
    pub signature: Option<String>,
    /// リテラルな定義以外（attr_* や alias など）から作られたか
    pub dynamic: bool,
    /// 種類ごとのデータ
    pub kind: ObjectKind,
}

impl CodeObject {
    /// 新しいオブジェクトを作成
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        namespace: Option<ObjectId>,
        kind: ObjectKind,
        scope: Scope,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            namespace,
            docstring: Docstring::default(),
            files: Vec::new(),
            visibility: Visibility::Public,
            scope,
            source: None,
            signature: None,
            dynamic: false,
            kind,
        }
    }

    /// 種類
    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    /// 名前空間かどうか
    pub fn is_namespace(&self) -> bool {
        self.object_type().is_namespace()
    }

    pub fn is_root(&self) -> bool {
        self.object_type() == ObjectType::Root
    }

    pub fn namespace_data(&self) -> Option<&NamespaceData> {
        self.kind.namespace_data()
    }

    pub fn namespace_data_mut(&mut self) -> Option<&mut NamespaceData> {
        self.kind.namespace_data_mut()
    }

    /// 子オブジェクト
    pub fn children(&self) -> &[ObjectId] {
        self.namespace_data().map_or(&[], |ns| ns.children.as_slice())
    }

    /// スーパークラス（クラスのみ）
    pub fn superclass(&self) -> Option<&ObjectRef> {
        match &self.kind {
            ObjectKind::Class { superclass, .. } => superclass.as_ref(),
            _ => None,
        }
    }

    /// スーパークラスを設定（クラス以外では何もしない）
    pub fn set_superclass(&mut self, reference: Option<ObjectRef>) {
        if let ObjectKind::Class { superclass, .. } = &mut self.kind {
            *superclass = reference;
        }
    }

    /// メソッドのデータ
    pub fn method_data(&self) -> Option<&MethodData> {
        match &self.kind {
            ObjectKind::Method(data) => Some(data),
            _ => None,
        }
    }

    pub fn method_data_mut(&mut self) -> Option<&mut MethodData> {
        match &mut self.kind {
            ObjectKind::Method(data) => Some(data),
            _ => None,
        }
    }

    /// 定数・クラス変数の値
    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            ObjectKind::Constant { value } | ObjectKind::ClassVariable { value } => Some(value),
            _ => None,
        }
    }

    /// 定数・クラス変数の値を設定
    pub fn set_value(&mut self, new_value: impl Into<String>) {
        if let ObjectKind::Constant { value } | ObjectKind::ClassVariable { value } = &mut self.kind {
            *value = new_value.into();
        }
    }

    /// 定義位置を追加（重複は無視）
    pub fn add_file(&mut self, file: impl Into<String>, line: usize) {
        let location = SourceLocation {
            file: file.into(),
            line,
        };
        if !self.files.contains(&location) {
            self.files.push(location);
        }
    }

    /// 最初の定義ファイル
    pub fn file(&self) -> Option<&str> {
        self.files.first().map(|l| l.file.as_str())
    }

    /// 最初の定義行
    pub fn line(&self) -> Option<usize> {
        self.files.first().map(|l| l.line)
    }

    /// インスタンスメソッドのように `#` で区切られるかどうか
    pub fn uses_instance_separator(&self) -> bool {
        self.object_type() == ObjectType::Method && self.scope == Scope::Instance
    }
}

impl fmt::Display for CodeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "(root)")
        } else {
            write!(f, "{}", self.path)
        }
    }
}
