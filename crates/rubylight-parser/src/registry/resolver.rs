//! # 名前解決
//!
//! レジストリに対するRubyの名前探索規則を実装します。
//! 開始名前空間からレキシカルに外側へ向かって探索し、継承探索が有効なら
//! 各段でミックスイン（新しいものが優先）とスーパークラスの系列も探します。
//!
//! 探索は失敗してもエラーになりません。結果は実体、`None`、または
//! 呼び出し側が要求した場合のプロキシです。

use std::collections::HashSet;

use log::trace;

use super::object::{ObjectId, ObjectKind, ObjectType};
use super::path::{self, INSTANCE_SEPARATOR, NAMESPACE_SEPARATOR};
use super::proxy::{ObjectRef, Proxy};
use super::Registry;

/// 名前解決のオプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// ミックスイン・スーパークラスも探すか
    pub inherit: bool,
    /// 期待する種類（異なる種類の一致は無視）
    pub type_hint: Option<ObjectType>,
    /// 見つからない場合にプロキシを返すか
    pub proxy_fallback: bool,
}

impl ResolveOptions {
    /// 既定のオプション（継承なし・種類指定なし・フォールバックなし）
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    pub fn type_hint(mut self, type_hint: Option<ObjectType>) -> Self {
        self.type_hint = type_hint;
        self
    }

    pub fn proxy_fallback(mut self, fallback: bool) -> Self {
        self.proxy_fallback = fallback;
        self
    }
}

/// 名前解決器
pub struct Resolver<'r> {
    registry: &'r Registry,
}

impl<'r> Resolver<'r> {
    /// 新しい名前解決器を作成
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// 名前を解決する
    pub fn resolve(&self, namespace: ObjectId, name: &str, options: &ResolveOptions) -> Option<ObjectRef> {
        let root = self.registry.root();
        let start = if self.registry.get(namespace).map_or(false, |o| o.is_namespace()) {
            namespace
        } else {
            self.registry.get(namespace).and_then(|o| o.namespace).unwrap_or(root)
        };

        let (mut current, lookup_name) = if path::is_root_qualified(name) {
            (Some(root), &name[NAMESPACE_SEPARATOR.len()..])
        } else {
            (Some(start), name)
        };

        let mut found = None;
        let mut level = 0usize;
        while let Some(ns) = current {
            found = self
                .lookup_direct(ns, lookup_name, options.type_hint)
                .or_else(|| {
                    if options.inherit {
                        self.lookup_inherited(ns, lookup_name, options.type_hint)
                    } else {
                        None
                    }
                });
            if found.is_some() {
                break;
            }
            current = self.registry.get(ns).and_then(|o| o.namespace);
            level += 1;
        }

        // メソッドはレキシカルに2段以上外側からは見えない
        if level > 1 {
            if let Some(id) = found {
                if self.object_type(id) == Some(ObjectType::Method) {
                    trace!("'{}' は外側の名前空間のメソッドのため解決しません", name);
                    found = None;
                }
            }
        }

        match found {
            Some(id) => Some(ObjectRef::Object(id)),
            None if options.proxy_fallback => {
                Some(ObjectRef::Proxy(Proxy::new(namespace, name, options.type_hint)))
            }
            None => None,
        }
    }

    /// 参照を実体に解決する（プロキシは名前を引き直す）
    pub fn resolve_ref(&self, reference: &ObjectRef) -> Option<ObjectId> {
        reference.resolve(self.registry)
    }

    /// 名前空間の継承系列（自身・ミックスイン・スーパークラス）
    ///
    /// ミックスインは新しいものから順に並びます。循環は一度だけ辿ります。
    pub fn inheritance_tree(&self, namespace: ObjectId) -> Vec<ObjectId> {
        let mut tree = Vec::new();
        let mut visited = HashSet::new();
        self.collect_ancestors(namespace, &mut tree, &mut visited);
        tree
    }

    fn collect_ancestors(&self, id: ObjectId, tree: &mut Vec<ObjectId>, visited: &mut HashSet<ObjectId>) {
        if !visited.insert(id) {
            return;
        }
        let object = match self.registry.get(id) {
            Some(object) => object,
            None => return,
        };
        tree.push(id);

        if let Some(data) = object.namespace_data() {
            for mixin in data.instance_mixins.iter().chain(data.class_mixins.iter()) {
                if let Some(target) = self.resolve_ref(mixin) {
                    self.collect_ancestors(target, tree, visited);
                }
            }
        }
        if let ObjectKind::Class {
            superclass: Some(superclass),
            ..
        } = &object.kind
        {
            if let Some(target) = self.resolve_ref(superclass) {
                self.collect_ancestors(target, tree, visited);
            }
        }
    }

    /// 名前空間の直下でパスを引く
    fn lookup_direct(&self, namespace: ObjectId, name: &str, type_hint: Option<ObjectType>) -> Option<ObjectId> {
        let ns = self.registry.get(namespace)?;

        if ns.is_root() {
            if let Some(id) = self.validated(self.registry.at(name), type_hint) {
                return Some(id);
            }
        }

        if name.starts_with(NAMESPACE_SEPARATOR) || name.starts_with(INSTANCE_SEPARATOR) {
            return self.validated(self.registry.at(&format!("{}{}", ns.path, name)), type_hint);
        }

        [NAMESPACE_SEPARATOR, INSTANCE_SEPARATOR]
            .iter()
            .find_map(|sep| self.validated(self.registry.at(&path::join(&ns.path, sep, name)), type_hint))
    }

    /// 修飾名を部分ごとに、各部分の継承系列を辿って引く
    fn lookup_inherited(&self, namespace: ObjectId, name: &str, type_hint: Option<ObjectType>) -> Option<ObjectId> {
        let parts = path::segments(name);
        let mut current = namespace;
        let mut resolved = None;

        for (index, (separator, part)) in parts.iter().enumerate() {
            let last = index + 1 == parts.len();
            if !last && !self.is_namespace(current) {
                return None;
            }

            let separators: Vec<&str> = match separator {
                Some(sep) => vec![*sep],
                None if last => vec![NAMESPACE_SEPARATOR, INSTANCE_SEPARATOR],
                None => vec![NAMESPACE_SEPARATOR],
            };

            // 種類の合わない候補は捨てて次の祖先を探す
            let found = self.inheritance_tree(current).into_iter().find_map(|ancestor| {
                let ancestor_path = &self.registry.get(ancestor)?.path;
                separators.iter().find_map(|sep| {
                    let candidate = self.registry.at(&path::join(ancestor_path, sep, part));
                    if last {
                        self.validated(candidate, type_hint)
                    } else {
                        candidate.filter(|id| self.is_namespace(*id))
                    }
                })
            })?;

            if last {
                resolved = Some(found);
            }
            current = found;
        }

        resolved
    }

    fn validated(&self, id: Option<ObjectId>, type_hint: Option<ObjectType>) -> Option<ObjectId> {
        let id = id?;
        match type_hint {
            Some(expected) if self.object_type(id) != Some(expected) => None,
            _ => Some(id),
        }
    }

    fn object_type(&self, id: ObjectId) -> Option<ObjectType> {
        self.registry.get(id).map(|o| o.object_type())
    }

    fn is_namespace(&self, id: ObjectId) -> bool {
        self.registry.get(id).map_or(false, |o| o.is_namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::object::Scope;

    fn module(registry: &mut Registry, ns: ObjectId, name: &str) -> ObjectId {
        registry.register(ns, name, ObjectType::Module, Scope::Instance).unwrap().0
    }

    fn method(registry: &mut Registry, ns: ObjectId, name: &str) -> ObjectId {
        registry.register(ns, name, ObjectType::Method, Scope::Instance).unwrap().0
    }

    #[test]
    fn test_lexical_walk_finds_outer_constant() {
        let mut registry = Registry::new();
        let root = registry.root();
        let a = module(&mut registry, root, "A");
        let b = module(&mut registry, a, "B");
        let c = module(&mut registry, b, "C");
        let target = module(&mut registry, a, "Target");

        let resolver = Resolver::new(&registry);
        let found = resolver.resolve(c, "Target", &ResolveOptions::new());
        assert_eq!(found, Some(ObjectRef::Object(target)));
    }

    #[test]
    fn test_methods_not_visible_two_levels_up() {
        let mut registry = Registry::new();
        let root = registry.root();
        let a = module(&mut registry, root, "A");
        let b = module(&mut registry, a, "B");
        let c = module(&mut registry, b, "C");
        method(&mut registry, a, "helper");
        let near = method(&mut registry, b, "near");

        let resolver = Resolver::new(&registry);
        assert_eq!(resolver.resolve(c, "helper", &ResolveOptions::new()), None);
        assert_eq!(resolver.resolve(c, "near", &ResolveOptions::new()), Some(ObjectRef::Object(near)));
    }

    #[test]
    fn test_type_hint_rejects_mismatch() {
        let mut registry = Registry::new();
        let root = registry.root();
        let a = module(&mut registry, root, "A");
        registry.register(a, "build", ObjectType::Method, Scope::Class).unwrap();

        let resolver = Resolver::new(&registry);
        let options = ResolveOptions::new().type_hint(Some(ObjectType::Class));
        assert_eq!(resolver.resolve(a, "build", &options), None);
        let options = ResolveOptions::new().type_hint(Some(ObjectType::Method));
        assert!(resolver.resolve(a, "build", &options).is_some());
    }

    #[test]
    fn test_type_hint_continues_to_later_ancestor() {
        let mut registry = Registry::new();
        let root = registry.root();
        let m = module(&mut registry, root, "M");
        registry.register(m, "Foo", ObjectType::Method, Scope::Class).unwrap();
        let (p, _) = registry.register(root, "P", ObjectType::Class, Scope::Instance).unwrap();
        let (foo, _) = registry.register(p, "Foo", ObjectType::Class, Scope::Instance).unwrap();
        let (c, _) = registry.register(root, "C", ObjectType::Class, Scope::Instance).unwrap();
        registry.get_mut(c).unwrap().set_superclass(Some(ObjectRef::Object(p)));
        registry.add_mixin(c, ObjectRef::Object(m), Scope::Instance).unwrap();

        let resolver = Resolver::new(&registry);
        let options = ResolveOptions::new().inherit(true).type_hint(Some(ObjectType::Class));
        assert_eq!(resolver.resolve(c, "Foo", &options), Some(ObjectRef::Object(foo)));
        let any = ResolveOptions::new().inherit(true);
        assert_eq!(resolver.resolve(c, "Foo", &any).map(|r| r.path(&registry)), Some("M::Foo".to_string()));
    }

    #[test]
    fn test_root_qualified_name() {
        let mut registry = Registry::new();
        let root = registry.root();
        let outer = module(&mut registry, root, "Config");
        let a = module(&mut registry, root, "A");
        module(&mut registry, a, "Config");

        let resolver = Resolver::new(&registry);
        assert_eq!(
            resolver.resolve(a, "::Config", &ResolveOptions::new()),
            Some(ObjectRef::Object(outer))
        );
    }

    #[test]
    fn test_cyclic_mixins_terminate() {
        let mut registry = Registry::new();
        let root = registry.root();
        let a = module(&mut registry, root, "A");
        let b = module(&mut registry, root, "B");
        registry.add_mixin(a, ObjectRef::Object(b), Scope::Instance).unwrap();
        registry.add_mixin(b, ObjectRef::Object(a), Scope::Instance).unwrap();

        let resolver = Resolver::new(&registry);
        assert_eq!(resolver.inheritance_tree(a), vec![a, b]);
        assert_eq!(resolver.resolve(a, "missing", &ResolveOptions::new().inherit(true)), None);
    }

    #[test]
    fn test_fallback_proxy() {
        let mut registry = Registry::new();
        let root = registry.root();
        let a = module(&mut registry, root, "A");
        let resolver = Resolver::new(&registry);
        let options = ResolveOptions::new().proxy_fallback(true);
        match resolver.resolve(a, "Later", &options) {
            Some(ObjectRef::Proxy(proxy)) => {
                assert_eq!(proxy.namespace, a);
                assert_eq!(proxy.provisional_path(&registry), "A::Later");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
