//! # レジストリのスナップショット
//!
//! バッチ処理の結果をJSONとして保存し、再解析せずにレジストリを復元します。
//! オブジェクト同士の参照はIDではなくパスで保存し、プロキシは
//! 名前空間のパス・名前・種類の組として保存します。

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::frontend::error::{ParserError, RegistryError, Result};
use crate::registry::path;
use crate::registry::{
    AttributeSlot, CodeObject, Docstring, ObjectKind, ObjectRef, ObjectType, Parameter, Proxy, Registry, Scope,
    SourceLocation, Visibility,
};

/// スナップショットの形式のバージョン
pub const SNAPSHOT_VERSION: u32 = 1;

/// 保存された参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefRecord {
    /// 登録済みのオブジェクト
    Object { path: String },
    /// 未解決の参照
    Proxy {
        namespace: String,
        name: String,
        type_hint: Option<ObjectType>,
    },
}

/// 保存された属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub scope: Scope,
    pub name: String,
    pub read: Option<String>,
    pub write: Option<String>,
}

/// 保存されたオブジェクト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: String,
    pub path: String,
    pub namespace: Option<String>,
    pub object_type: ObjectType,
    #[serde(default)]
    pub docstring: Docstring,
    #[serde(default)]
    pub files: Vec<SourceLocation>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub superclass: Option<RefRecord>,
    #[serde(default)]
    pub instance_mixins: Vec<RefRecord>,
    #[serde(default)]
    pub class_mixins: Vec<RefRecord>,
    /// 別名のメソッドのパスと元の名前
    #[serde(default)]
    pub aliases: Vec<(String, String)>,
    #[serde(default)]
    pub attributes: Vec<AttributeRecord>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub module_function: bool,
    #[serde(default)]
    pub value: Option<String>,
}

/// レジストリのスナップショット
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub version: u32,
    pub objects: Vec<ObjectRecord>,
}

impl RegistrySnapshot {
    /// レジストリからスナップショットを作成
    pub fn from_registry(registry: &Registry) -> Self {
        let root = registry.root();
        let objects = registry
            .get(root)
            .map(|object| (root, object))
            .into_iter()
            .chain(registry.objects())
            .map(|(_, object)| record_of(registry, object))
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            objects,
        }
    }

    /// JSONとして保存
    pub fn save(&self, file: impl AsRef<Path>) -> Result<()> {
        let file = file.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(file, json).map_err(|e| ParserError::io(file, e))?;
        info!("スナップショットを保存しました: {} ({} オブジェクト)", file.display(), self.objects.len());
        Ok(())
    }

    /// JSONから読み込む
    pub fn load(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        let json = fs::read_to_string(file).map_err(|e| ParserError::io(file, e))?;
        let snapshot: Self = serde_json::from_str(&json)?;
        debug!("スナップショットを読み込みました: {}", file.display());
        Ok(snapshot)
    }

    /// レジストリを復元する
    ///
    /// 名前空間が先に格納されるよう、パスの深さ順に格納してから参照を張り直します。
    pub fn into_registry(self) -> Result<Registry> {
        let mut registry = Registry::new();
        let mut records = self.objects;
        records.sort_by_key(|record| depth(&record.path));

        for record in &records {
            let namespace = match &record.namespace {
                Some(namespace_path) => Some(
                    registry
                        .at(namespace_path)
                        .ok_or_else(|| RegistryError::InvalidName(record.path.clone()))?,
                ),
                None => None,
            };
            let mut object = CodeObject::new(
                record.name.clone(),
                record.path.clone(),
                namespace,
                ObjectKind::empty(record.object_type),
                record.scope,
            );
            object.docstring = record.docstring.clone();
            object.files = record.files.clone();
            object.visibility = record.visibility;
            object.source = record.source.clone();
            object.signature = record.signature.clone();
            object.dynamic = record.dynamic;
            if let Some(value) = &record.value {
                object.set_value(value.clone());
            }
            if let Some(data) = object.method_data_mut() {
                data.parameters = record.parameters.clone();
                data.explicit = record.explicit;
                data.module_function = record.module_function;
            }
            registry.put(object)?;
        }

        for record in records {
            let id = registry
                .at(&record.path)
                .ok_or_else(|| RegistryError::InvalidName(record.path.clone()))?;
            let superclass = record.superclass.as_ref().map(|r| reference_of(&registry, r));
            let instance_mixins: Vec<ObjectRef> = record.instance_mixins.iter().map(|r| reference_of(&registry, r)).collect();
            let class_mixins: Vec<ObjectRef> = record.class_mixins.iter().map(|r| reference_of(&registry, r)).collect();
            let aliases: Vec<_> = record
                .aliases
                .iter()
                .filter_map(|(alias_path, old)| registry.at(alias_path).map(|alias| (alias, old.clone())))
                .collect();
            let attributes: Vec<_> = record
                .attributes
                .iter()
                .map(|attribute| {
                    let slot = AttributeSlot {
                        read: attribute.read.as_deref().and_then(|p| registry.at(p)),
                        write: attribute.write.as_deref().and_then(|p| registry.at(p)),
                    };
                    (attribute.scope, attribute.name.clone(), slot)
                })
                .collect();

            let object = registry.try_get_mut(id)?;
            object.set_superclass(superclass);
            if let Some(data) = object.namespace_data_mut() {
                data.instance_mixins = instance_mixins;
                data.class_mixins = class_mixins;
                data.aliases = aliases.into_iter().collect();
                for (scope, name, slot) in attributes {
                    data.attributes_mut(scope).insert(name, slot);
                }
            }
        }

        info!("スナップショットから {} 個のオブジェクトを復元しました", registry.len());
        Ok(registry)
    }
}

fn depth(object_path: &str) -> usize {
    if object_path.is_empty() {
        0
    } else {
        path::segments(object_path).len()
    }
}

fn record_of(registry: &Registry, object: &CodeObject) -> ObjectRecord {
    let path_of = |id| registry.get(id).map(|o: &CodeObject| o.path.clone());
    let refs = |references: &[ObjectRef]| references.iter().map(|r| ref_record(registry, r)).collect::<Vec<_>>();

    let mut record = ObjectRecord {
        name: object.name.clone(),
        path: object.path.clone(),
        namespace: object.namespace.and_then(path_of),
        object_type: object.object_type(),
        docstring: object.docstring.clone(),
        files: object.files.clone(),
        visibility: object.visibility,
        scope: object.scope,
        source: object.source.clone(),
        signature: object.signature.clone(),
        dynamic: object.dynamic,
        superclass: object.superclass().map(|r| ref_record(registry, r)),
        instance_mixins: Vec::new(),
        class_mixins: Vec::new(),
        aliases: Vec::new(),
        attributes: Vec::new(),
        parameters: Vec::new(),
        explicit: false,
        module_function: false,
        value: object.value().map(str::to_string),
    };

    if let Some(data) = object.namespace_data() {
        record.instance_mixins = refs(data.instance_mixins.as_slice());
        record.class_mixins = refs(data.class_mixins.as_slice());
        record.aliases = data
            .aliases
            .iter()
            .filter_map(|(alias, old)| path_of(*alias).map(|p| (p, old.clone())))
            .collect();
        for scope in [Scope::Instance, Scope::Class] {
            for (name, slot) in data.attributes(scope) {
                record.attributes.push(AttributeRecord {
                    scope,
                    name: name.clone(),
                    read: slot.read.and_then(path_of),
                    write: slot.write.and_then(path_of),
                });
            }
        }
    }
    if let Some(data) = object.method_data() {
        record.parameters = data.parameters.clone();
        record.explicit = data.explicit;
        record.module_function = data.module_function;
    }
    record
}

fn ref_record(registry: &Registry, reference: &ObjectRef) -> RefRecord {
    match reference {
        ObjectRef::Object(id) => RefRecord::Object {
            path: registry.get(*id).map(|o| o.path.clone()).unwrap_or_default(),
        },
        ObjectRef::Proxy(proxy) => RefRecord::Proxy {
            namespace: registry.get(proxy.namespace).map(|o| o.path.clone()).unwrap_or_default(),
            name: proxy.name.clone(),
            type_hint: proxy.type_hint,
        },
    }
}

fn reference_of(registry: &Registry, record: &RefRecord) -> ObjectRef {
    let root = registry.root();
    match record {
        RefRecord::Object { path } => match registry.at(path) {
            Some(id) => ObjectRef::Object(id),
            None => ObjectRef::Proxy(Proxy::new(root, format!("{}{}", path::NAMESPACE_SEPARATOR, path), None)),
        },
        RefRecord::Proxy {
            namespace,
            name,
            type_hint,
        } => ObjectRef::Proxy(Proxy::new(registry.at(namespace).unwrap_or(root), name.clone(), *type_hint)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::driver::LoadOrderCoordinator;

    fn build(source: &str) -> Registry {
        let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
        coordinator.add_source("lib.rb", source);
        let mut registry = Registry::new();
        coordinator.run(&mut registry).unwrap();
        registry
    }

    #[test]
    fn test_restored_registry_keeps_links() {
        let registry = build(
            "module Mixin; end\n# Base docs\nclass Base\n  include Mixin\n  include Missing\n  attr_accessor :name\n  def run(a = 1); end\n  alias go run\nend\nclass Child < Base\n  VERSION = '1'\nend\n",
        );
        let snapshot = RegistrySnapshot::from_registry(&registry);
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: RegistrySnapshot = serde_json::from_str(&json).unwrap();
        let restored = restored.into_registry().unwrap();

        assert_eq!(restored.len(), registry.len());
        let base = restored.object_at("Base").unwrap();
        assert_eq!(base.docstring.text, "Base docs");
        let data = base.namespace_data().unwrap();
        assert_eq!(data.instance_mixins.len(), 2);
        assert!(matches!(data.instance_mixins[0], ObjectRef::Proxy(_)));
        assert_eq!(data.instance_mixins[1].path(&restored), "Mixin");
        assert_eq!(data.instance_attributes["name"].read, restored.at("Base#name"));
        assert_eq!(data.aliases.values().next().map(String::as_str), Some("run"));

        let child = restored.object_at("Child").unwrap();
        assert_eq!(child.superclass().unwrap().path(&restored), "Base");
        assert_eq!(child.children(), &[restored.at("Child::VERSION").unwrap()]);
        let run = restored.object_at("Base#run").unwrap();
        assert_eq!(run.method_data().unwrap().parameters[0].default.as_deref(), Some("1"));
    }

    #[test]
    fn test_save_and_load_file() {
        let directory = tempfile::tempdir().unwrap();
        let file = directory.path().join("registry.json");
        let registry = build("module A\n  def self.x; end\nend\n");
        RegistrySnapshot::from_registry(&registry).save(&file).unwrap();

        let restored = RegistrySnapshot::load(&file).unwrap().into_registry().unwrap();
        assert!(restored.at("A::x").is_some());
        assert!(matches!(
            RegistrySnapshot::load(directory.path().join("missing.json")),
            Err(ParserError::Io { .. })
        ));
    }
}
