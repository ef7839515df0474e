//! # プロキシ
//!
//! まだ定義されていない（あるいは最後まで定義されない）オブジェクトへの参照です。
//! プロキシは対象を保持せず、参照のたびに元の名前空間から名前を引き直します。
//! 比較は常にパス文字列で行うため、後から登録された実体と等しくなります。

use std::fmt;

use super::object::{ObjectId, ObjectType};
use super::path::{self, NAMESPACE_SEPARATOR};
use super::resolver::{ResolveOptions, Resolver};
use super::Registry;

/// 未解決の参照
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proxy {
    /// 参照が書かれた名前空間
    pub namespace: ObjectId,
    /// 参照された名前（修飾を含みうる）
    pub name: String,
    /// 期待される種類
    pub type_hint: Option<ObjectType>,
}

impl Proxy {
    /// 新しいプロキシを作成
    pub fn new(namespace: ObjectId, name: impl Into<String>, type_hint: Option<ObjectType>) -> Self {
        Self {
            namespace,
            name: name.into(),
            type_hint,
        }
    }

    /// 現在のレジストリで参照先を解決する
    pub fn resolve_now(&self, registry: &Registry) -> Option<ObjectId> {
        let options = ResolveOptions::new().type_hint(self.type_hint);
        Resolver::new(registry)
            .resolve(self.namespace, &self.name, &options)
            .and_then(|reference| reference.object_id())
    }

    /// 解決済みならその実体のパス、未解決なら仮のパス
    pub fn path(&self, registry: &Registry) -> String {
        if let Some(id) = self.resolve_now(registry) {
            if let Some(object) = registry.get(id) {
                return object.path.clone();
            }
        }
        self.provisional_path(registry)
    }

    /// 実体がない場合のパス（`origin::name`）
    pub fn provisional_path(&self, registry: &Registry) -> String {
        if path::is_root_qualified(&self.name) {
            return self.name[NAMESPACE_SEPARATOR.len()..].to_string();
        }
        let origin = registry.get(self.namespace).map_or("", |o| o.path.as_str());
        if self.name.starts_with(path::INSTANCE_SEPARATOR) {
            return format!("{}{}", origin, self.name);
        }
        path::join(origin, NAMESPACE_SEPARATOR, &self.name)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proxy({})", self.name)
    }
}

/// 実体またはプロキシへの参照
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    /// 登録済みのオブジェクト
    Object(ObjectId),
    /// 未解決の参照
    Proxy(Proxy),
}

impl ObjectRef {
    /// 実体のIDを直接持っていれば返す
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            ObjectRef::Object(id) => Some(*id),
            ObjectRef::Proxy(_) => None,
        }
    }

    /// プロキシであれば返す
    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            ObjectRef::Proxy(proxy) => Some(proxy),
            ObjectRef::Object(_) => None,
        }
    }

    /// 現在のレジストリで実体を得る
    pub fn resolve(&self, registry: &Registry) -> Option<ObjectId> {
        match self {
            ObjectRef::Object(id) => registry.get(*id).map(|_| *id),
            ObjectRef::Proxy(proxy) => proxy.resolve_now(registry),
        }
    }

    /// 比較に使うパス
    pub fn path(&self, registry: &Registry) -> String {
        match self {
            ObjectRef::Object(id) => registry.get(*id).map(|o| o.path.clone()).unwrap_or_default(),
            ObjectRef::Proxy(proxy) => proxy.path(registry),
        }
    }

    /// 参照が解決できるかどうか
    pub fn is_resolved(&self, registry: &Registry) -> bool {
        self.resolve(registry).is_some()
    }
}

impl From<ObjectId> for ObjectRef {
    fn from(id: ObjectId) -> Self {
        ObjectRef::Object(id)
    }
}

impl From<Proxy> for ObjectRef {
    fn from(proxy: Proxy) -> Self {
        ObjectRef::Proxy(proxy)
    }
}
