//! # オブジェクトレジストリ
//!
//! 発見したコードオブジェクトを正規パスをキーとして保持します。
//! オブジェクトはアリーナに格納され、[`ObjectId`] で参照されます。
//!
//! - 同じパス・同じ種類の再登録は既存のオブジェクトを返します（クラスの再オープン）。
//! - 異なる種類での再登録は、既存のオブジェクトにドキュメントがなければ置き換えます。
//! - ルート以外のオブジェクトはちょうど1つの名前空間に所有されます。
//!
//! レジストリは内部で同期を取りません。プロジェクトごとに独立したインスタンスを使ってください。

pub mod docstring;
pub mod object;
pub mod path;
pub mod proxy;
pub mod resolver;

use std::collections::HashMap;

use log::{debug, trace};

use crate::frontend::error::RegistryError;

pub use self::docstring::{Docstring, Tag};
pub use self::object::{
    AttributeSlot, CodeObject, MethodData, NamespaceData, ObjectId, ObjectKind, ObjectType, Parameter, Scope,
    SourceLocation, Visibility,
};
pub use self::proxy::{ObjectRef, Proxy};
pub use self::resolver::{ResolveOptions, Resolver};

/// スーパークラスを省略したクラスが暗黙に継承するクラス
pub const DEFAULT_SUPERCLASS: &str = "Object";

/// レジストリ操作の結果型
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// オブジェクトレジストリ
#[derive(Debug, Clone)]
pub struct Registry {
    /// オブジェクトのアリーナ（削除済みは `None`）
    objects: Vec<Option<CodeObject>>,
    /// パス → ID
    paths: HashMap<String, ObjectId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// ルートだけを持つ新しいレジストリを作成
    pub fn new() -> Self {
        let root = CodeObject::new(
            "root",
            path::ROOT_PATH,
            None,
            ObjectKind::empty(ObjectType::Root),
            Scope::Instance,
        );
        let mut paths = HashMap::new();
        paths.insert(path::ROOT_PATH.to_string(), ObjectId(0));
        Self {
            objects: vec![Some(root)],
            paths,
        }
    }

    /// ルートのID
    pub fn root(&self) -> ObjectId {
        ObjectId(0)
    }

    /// 全てのオブジェクトを破棄してルートだけに戻す
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// IDからオブジェクトを取得
    pub fn get(&self, id: ObjectId) -> Option<&CodeObject> {
        self.objects.get(id.0).and_then(|o| o.as_ref())
    }

    /// IDからオブジェクトを取得（可変）
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut CodeObject> {
        self.objects.get_mut(id.0).and_then(|o| o.as_mut())
    }

    /// IDからオブジェクトを取得（存在しなければエラー）
    pub fn try_get(&self, id: ObjectId) -> RegistryResult<&CodeObject> {
        self.get(id).ok_or(RegistryError::UnknownObject(id.0))
    }

    /// IDからオブジェクトを取得（可変、存在しなければエラー）
    pub fn try_get_mut(&mut self, id: ObjectId) -> RegistryResult<&mut CodeObject> {
        self.get_mut(id).ok_or(RegistryError::UnknownObject(id.0))
    }

    /// パスからIDを引く
    pub fn at(&self, path: &str) -> Option<ObjectId> {
        self.paths.get(path).copied()
    }

    /// パスからオブジェクトを引く
    pub fn object_at(&self, path: &str) -> Option<&CodeObject> {
        self.at(path).and_then(|id| self.get(id))
    }

    /// ルートを除く全オブジェクト（登録順）
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &CodeObject)> + '_ {
        self.objects
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(index, object)| object.as_ref().map(|o| (ObjectId(index), o)))
    }

    /// ルートを除くオブジェクト数
    pub fn len(&self) -> usize {
        self.paths.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 名前解決器を作成
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self)
    }

    /// 名前を解決する
    pub fn resolve(&self, namespace: ObjectId, name: &str, options: &ResolveOptions) -> Option<ObjectRef> {
        Resolver::new(self).resolve(namespace, name, options)
    }

    /// 2つの参照がパスとして等しいかどうか
    pub fn refs_equal(&self, left: &ObjectRef, right: &ObjectRef) -> bool {
        left.path(self) == right.path(self)
    }

    /// オブジェクトを登録する
    ///
    /// 戻り値の `bool` は新しく作成（または置き換え）したかどうかです。
    pub fn register(
        &mut self,
        namespace: ObjectId,
        name: &str,
        object_type: ObjectType,
        scope: Scope,
    ) -> RegistryResult<(ObjectId, bool)> {
        if !path::is_valid_name(name) || object_type == ObjectType::Root {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        let owner = self.try_get(namespace)?;
        if !owner.is_namespace() {
            return Err(RegistryError::NotANamespace {
                path: owner.path.clone(),
                name: name.to_string(),
            });
        }

        let path = path::join(&owner.path, path::separator(object_type, scope), name);

        if let Some(existing) = self.at(&path) {
            return self.reuse_or_replace(existing, object_type, scope);
        }

        let mut object = CodeObject::new(name, path.clone(), Some(namespace), ObjectKind::empty(object_type), scope);
        if object_type == ObjectType::Class && name != DEFAULT_SUPERCLASS && name != "BasicObject" {
            let root = self.root();
            object.set_superclass(Some(ObjectRef::Proxy(Proxy::new(
                root,
                DEFAULT_SUPERCLASS,
                Some(ObjectType::Class),
            ))));
        }

        let id = ObjectId(self.objects.len());
        self.objects.push(Some(object));
        self.paths.insert(path.clone(), id);
        if let Some(data) = self.get_mut(namespace).and_then(|o| o.namespace_data_mut()) {
            data.children.push(id);
        }
        trace!("オブジェクトを登録: {} ({})", path, object_type);
        Ok((id, true))
    }

    /// 既存パスへの再登録
    fn reuse_or_replace(
        &mut self,
        existing: ObjectId,
        object_type: ObjectType,
        scope: Scope,
    ) -> RegistryResult<(ObjectId, bool)> {
        let current = self.try_get(existing)?;
        if current.object_type() == object_type {
            trace!("既存のオブジェクトを再オープン: {}", current.path);
            return Ok((existing, false));
        }
        if !current.docstring.is_blank() {
            debug!(
                "'{}' は{}として記述済みのため{}で置き換えません",
                current.path,
                current.object_type(),
                object_type
            );
            return Ok((existing, false));
        }

        debug!("'{}' を{}から{}に置き換えます", current.path, current.object_type(), object_type);
        let object = self.try_get_mut(existing)?;
        let carried = object.kind.take_namespace_data();
        let superclass = object.superclass().cloned();
        object.kind = ObjectKind::empty(object_type);
        object.scope = scope;
        let orphans = match (carried, object.kind.namespace_data_mut()) {
            (Some(data), Some(target)) => {
                *target = data;
                Vec::new()
            }
            (Some(data), None) => data.children,
            _ => Vec::new(),
        };
        if object_type == ObjectType::Class {
            let root = self.root();
            let fallback = ObjectRef::Proxy(Proxy::new(root, DEFAULT_SUPERCLASS, Some(ObjectType::Class)));
            if let Some(object) = self.get_mut(existing) {
                object.set_superclass(Some(superclass.unwrap_or(fallback)));
            }
        }
        for orphan in orphans {
            self.remove(orphan);
        }
        Ok((existing, true))
    }

    /// オブジェクトとその子孫をレジストリから取り除く
    pub fn remove(&mut self, id: ObjectId) -> Option<CodeObject> {
        if id == self.root() {
            return None;
        }
        let object = self.objects.get_mut(id.0)?.take()?;
        self.paths.remove(&object.path);
        if let Some(owner) = object.namespace.and_then(|ns| self.get_mut(ns)) {
            if let Some(data) = owner.namespace_data_mut() {
                data.children.retain(|child| *child != id);
            }
        }
        for child in object.children().to_vec() {
            self.remove(child);
        }
        Some(object)
    }

    /// 名前空間を付け替える
    ///
    /// 古い所有者の子から外し、自身と子孫のパスを計算し直します。
    pub fn set_namespace(&mut self, id: ObjectId, namespace: ObjectId) -> RegistryResult<()> {
        let object = self.try_get(id)?;
        let owner = self.try_get(namespace)?;
        if !owner.is_namespace() {
            return Err(RegistryError::NotANamespace {
                path: owner.path.clone(),
                name: object.name.clone(),
            });
        }
        let separator = if object.uses_instance_separator() {
            path::INSTANCE_SEPARATOR
        } else {
            path::NAMESPACE_SEPARATOR
        };
        let new_path = path::join(&owner.path, separator, &object.name);
        if let Some(occupant) = self.at(&new_path) {
            if occupant != id {
                return Err(RegistryError::PathOccupied(new_path));
            }
            return Ok(());
        }

        let old_owner = object.namespace;
        if let Some(data) = old_owner.and_then(|ns| self.get_mut(ns)).and_then(|o| o.namespace_data_mut()) {
            data.children.retain(|child| *child != id);
        }
        if let Some(data) = self.get_mut(namespace).and_then(|o| o.namespace_data_mut()) {
            data.children.push(id);
        }
        if let Some(object) = self.get_mut(id) {
            object.namespace = Some(namespace);
        }
        self.rekey(id, new_path);
        Ok(())
    }

    /// パスを付け直し、子孫にも反映する
    fn rekey(&mut self, id: ObjectId, new_path: String) {
        let children = match self.get_mut(id) {
            Some(object) => {
                let old_path = std::mem::replace(&mut object.path, new_path.clone());
                self.paths.remove(&old_path);
                self.paths.insert(new_path.clone(), id);
                self.get(id).map(|o| o.children().to_vec()).unwrap_or_default()
            }
            None => return,
        };
        for child in children {
            let child_path = match self.get(child) {
                Some(c) => {
                    let separator = if c.uses_instance_separator() {
                        path::INSTANCE_SEPARATOR
                    } else {
                        path::NAMESPACE_SEPARATOR
                    };
                    path::join(&new_path, separator, &c.name)
                }
                None => continue,
            };
            self.rekey(child, child_path);
        }
    }

    /// 組み立て済みのオブジェクトをそのパスに格納する（スナップショットからの復元用）
    ///
    /// `namespace` は登録済みの名前空間を指している必要があります。
    /// 子の一覧は格納時に作り直されます。パスが既にあれば置き換えます。
    pub fn put(&mut self, mut object: CodeObject) -> RegistryResult<ObjectId> {
        if object.is_root() {
            let root = self.root();
            if let Some(data) = object.namespace_data_mut() {
                let children = self.try_get(root)?.children().to_vec();
                data.children = children;
            }
            object.path = path::ROOT_PATH.to_string();
            object.namespace = None;
            self.objects[root.0] = Some(object);
            return Ok(root);
        }

        let namespace = object
            .namespace
            .ok_or_else(|| RegistryError::InvalidName(object.path.clone()))?;
        let owner = self.try_get(namespace)?;
        if !owner.is_namespace() {
            return Err(RegistryError::NotANamespace {
                path: owner.path.clone(),
                name: object.name.clone(),
            });
        }

        if let Some(existing) = self.at(&object.path) {
            let children = self.try_get(existing)?.children().to_vec();
            if let Some(data) = object.namespace_data_mut() {
                data.children = children;
            }
            self.objects[existing.0] = Some(object);
            return Ok(existing);
        }

        if let Some(data) = object.namespace_data_mut() {
            data.children.clear();
        }
        let id = ObjectId(self.objects.len());
        self.paths.insert(object.path.clone(), id);
        self.objects.push(Some(object));
        if let Some(data) = self.get_mut(namespace).and_then(|o| o.namespace_data_mut()) {
            data.children.push(id);
        }
        Ok(id)
    }

    /// ミックスインを追加する（重複は無視し、新しいものを先頭に置く）
    ///
    /// 追加した場合は `true` を返します。
    pub fn add_mixin(&mut self, namespace: ObjectId, mixin: ObjectRef, scope: Scope) -> RegistryResult<bool> {
        let mixin_path = mixin.path(self);
        let existing: Vec<String> = {
            let object = self.try_get(namespace)?;
            let data = object.namespace_data().ok_or_else(|| RegistryError::NotANamespace {
                path: object.path.clone(),
                name: mixin_path.clone(),
            })?;
            data.mixins(scope).iter().map(|m| m.path(self)).collect()
        };
        if existing.contains(&mixin_path) {
            return Ok(false);
        }
        if let Some(data) = self.try_get_mut(namespace)?.namespace_data_mut() {
            data.mixins_mut(scope).insert(0, mixin);
        }
        Ok(true)
    }

    /// 名前空間の子を名前で引く
    pub fn child(&self, namespace: ObjectId, name: &str, object_type: Option<ObjectType>) -> Option<ObjectId> {
        self.get(namespace)?.children().iter().copied().find(|child| {
            self.get(*child).map_or(false, |c| {
                c.name == name && object_type.map_or(true, |t| c.object_type() == t)
            })
        })
    }

    /// バッチ後も解決できないプロキシ参照（スーパークラス・ミックスイン）
    ///
    /// 暗黙の `Object` スーパークラスは含みません。
    pub fn unresolved_references(&self) -> Vec<(ObjectId, Proxy)> {
        let mut unresolved = Vec::new();
        for (id, object) in self.objects() {
            let mut references: Vec<&ObjectRef> = Vec::new();
            if let Some(superclass) = object.superclass() {
                references.push(superclass);
            }
            if let Some(data) = object.namespace_data() {
                references.extend(data.instance_mixins.iter());
                references.extend(data.class_mixins.iter());
            }
            for reference in references {
                if let ObjectRef::Proxy(proxy) = reference {
                    let implicit = proxy.namespace == self.root() && proxy.name == DEFAULT_SUPERCLASS;
                    if !implicit && proxy.resolve_now(self).is_none() {
                        unresolved.push((id, proxy.clone()));
                    }
                }
            }
        }
        unresolved
    }

    /// 種類ごとのオブジェクト数
    pub fn count_by_type(&self) -> HashMap<ObjectType, usize> {
        let mut counts = HashMap::new();
        for (_, object) in self.objects() {
            *counts.entry(object.object_type()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path_is_empty() {
        let registry = Registry::new();
        let root = registry.root();
        assert_eq!(registry.get(root).unwrap().path, "");
        assert_eq!(registry.at(""), Some(root));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_paths_by_separator() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (foo, _) = registry.register(root, "Foo", ObjectType::Class, Scope::Instance).unwrap();
        let (bar, _) = registry.register(foo, "bar", ObjectType::Method, Scope::Instance).unwrap();
        let (baz, _) = registry.register(foo, "baz", ObjectType::Method, Scope::Class).unwrap();
        let (top, _) = registry.register(root, "helper", ObjectType::Method, Scope::Instance).unwrap();
        assert_eq!(registry.get(bar).unwrap().path, "Foo#bar");
        assert_eq!(registry.get(baz).unwrap().path, "Foo::baz");
        assert_eq!(registry.get(top).unwrap().path, "#helper");
        assert_eq!(registry.get(foo).unwrap().children(), &[bar, baz]);
    }

    #[test]
    fn test_register_under_method_is_contract_violation() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (m, _) = registry.register(root, "m", ObjectType::Method, Scope::Instance).unwrap();
        let error = registry.register(m, "X", ObjectType::Constant, Scope::Instance).unwrap_err();
        assert!(matches!(error, RegistryError::NotANamespace { .. }));
        let error = registry.register(root, "", ObjectType::Module, Scope::Instance).unwrap_err();
        assert!(matches!(error, RegistryError::InvalidName(_)));
    }

    #[test]
    fn test_default_superclass() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (foo, _) = registry.register(root, "Foo", ObjectType::Class, Scope::Instance).unwrap();
        let (object, _) = registry.register(root, "Object", ObjectType::Class, Scope::Instance).unwrap();
        let superclass = registry.get(foo).unwrap().superclass().unwrap().clone();
        assert_eq!(superclass.resolve(&registry), Some(object));
        assert!(registry.get(object).unwrap().superclass().is_none());
        assert!(registry.unresolved_references().is_empty());
    }

    #[test]
    fn test_replace_undocumented_with_other_kind_keeps_children() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (foo, _) = registry.register(root, "Foo", ObjectType::Module, Scope::Instance).unwrap();
        let (child, _) = registry.register(foo, "Bar", ObjectType::Constant, Scope::Instance).unwrap();
        let (again, created) = registry.register(root, "Foo", ObjectType::Class, Scope::Instance).unwrap();
        assert_eq!(again, foo);
        assert!(created);
        assert_eq!(registry.get(foo).unwrap().object_type(), ObjectType::Class);
        assert_eq!(registry.get(foo).unwrap().children(), &[child]);
    }

    #[test]
    fn test_documented_object_is_not_replaced() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (foo, _) = registry.register(root, "Foo", ObjectType::Module, Scope::Instance).unwrap();
        registry.get_mut(foo).unwrap().docstring = Docstring::parse("Documented");
        let (again, created) = registry.register(root, "Foo", ObjectType::Constant, Scope::Instance).unwrap();
        assert_eq!(again, foo);
        assert!(!created);
        assert_eq!(registry.get(foo).unwrap().object_type(), ObjectType::Module);
    }

    #[test]
    fn test_namespace_replaced_by_constant_drops_children() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (foo, _) = registry.register(root, "Foo", ObjectType::Module, Scope::Instance).unwrap();
        registry.register(foo, "Inner", ObjectType::Module, Scope::Instance).unwrap();
        registry.register(root, "Foo", ObjectType::Constant, Scope::Instance).unwrap();
        assert_eq!(registry.at("Foo::Inner"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_namespace_rekeys_subtree() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (a, _) = registry.register(root, "A", ObjectType::Module, Scope::Instance).unwrap();
        let (b, _) = registry.register(root, "B", ObjectType::Module, Scope::Instance).unwrap();
        let (m, _) = registry.register(b, "m", ObjectType::Method, Scope::Instance).unwrap();

        registry.set_namespace(b, a).unwrap();
        assert_eq!(registry.get(b).unwrap().path, "A::B");
        assert_eq!(registry.get(m).unwrap().path, "A::B#m");
        assert_eq!(registry.at("B"), None);
        assert_eq!(registry.at("A::B#m"), Some(m));
        assert!(!registry.get(root).unwrap().children().contains(&b));
        assert_eq!(registry.get(a).unwrap().children(), &[b]);
    }

    #[test]
    fn test_set_namespace_onto_occupied_path_fails() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (a, _) = registry.register(root, "A", ObjectType::Module, Scope::Instance).unwrap();
        registry.register(a, "B", ObjectType::Module, Scope::Instance).unwrap();
        let (b, _) = registry.register(root, "B", ObjectType::Module, Scope::Instance).unwrap();
        let error = registry.set_namespace(b, a).unwrap_err();
        assert_eq!(error, RegistryError::PathOccupied("A::B".to_string()));
    }

    #[test]
    fn test_add_mixin_dedups_and_orders() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (c, _) = registry.register(root, "C", ObjectType::Class, Scope::Instance).unwrap();
        let (m1, _) = registry.register(root, "M1", ObjectType::Module, Scope::Instance).unwrap();
        let (m2, _) = registry.register(root, "M2", ObjectType::Module, Scope::Instance).unwrap();
        assert!(registry.add_mixin(c, m1.into(), Scope::Instance).unwrap());
        assert!(registry.add_mixin(c, m2.into(), Scope::Instance).unwrap());
        assert!(!registry.add_mixin(c, Proxy::new(root, "M1", None).into(), Scope::Instance).unwrap());
        let mixins = &registry.get(c).unwrap().namespace_data().unwrap().instance_mixins;
        assert_eq!(mixins, &vec![ObjectRef::Object(m2), ObjectRef::Object(m1)]);
    }

    #[test]
    fn test_unresolved_references_lists_missing_mixins() {
        let mut registry = Registry::new();
        let root = registry.root();
        let (c, _) = registry.register(root, "C", ObjectType::Class, Scope::Instance).unwrap();
        registry
            .add_mixin(c, Proxy::new(c, "Missing", Some(ObjectType::Module)).into(), Scope::Instance)
            .unwrap();
        let unresolved = registry.unresolved_references();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].1.provisional_path(&registry), "C::Missing");
    }

    #[test]
    fn test_clear_resets_to_root() {
        let mut registry = Registry::new();
        let root = registry.root();
        registry.register(root, "Foo", ObjectType::Module, Scope::Instance).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.at("Foo"), None);
    }
}
