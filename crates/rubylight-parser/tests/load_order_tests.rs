use std::fs;

use rubylight_parser::{
    DiagnosticKind, LoadOrderCoordinator, ObjectRef, ObjectType, ParserConfig, Registry, RegistrySnapshot, Scope,
    Visibility,
};
use tempfile::tempdir;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_subclass_before_superclass_file() {
    init_logger();
    let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
    coordinator.add_source("b.rb", "# Child class\nclass B < A\n  def run; end\nend\n");
    coordinator.add_source("a.rb", "# Parent class\nclass A\n  def setup; end\nend\n");

    let mut registry = Registry::new();
    let report = coordinator.run(&mut registry).unwrap();

    assert_eq!(report.files, 2);
    assert_eq!(report.deferrals, 1);
    assert_eq!(report.unresolved(), 0);
    let b = registry.object_at("B").unwrap();
    let superclass = b.superclass().unwrap();
    assert!(matches!(superclass, ObjectRef::Object(_)));
    assert_eq!(superclass.path(&registry), "A");
    assert_eq!(b.docstring.summary(), "Child class");
    assert!(registry.at("B#run").is_some());
}

#[test]
fn test_missing_namespace_terminates_with_placeholder() {
    init_logger();
    let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
    coordinator.add_source("x.rb", "class Missing::X\n  def go; end\nend\n");

    let mut registry = Registry::new();
    let report = coordinator.run(&mut registry).unwrap();

    assert_eq!(report.deferrals, 1);
    assert_eq!(report.diagnostics.count(DiagnosticKind::Deferred), 1);
    assert_eq!(report.diagnostics.count(DiagnosticKind::RetryExhausted), 1);
    assert_eq!(report.unresolved(), 1);
    let placeholder = registry.object_at("Missing").unwrap();
    assert_eq!(placeholder.object_type(), ObjectType::Module);
    assert!(placeholder.dynamic);
    assert!(registry.at("Missing::X#go").is_some());
}

#[test]
fn test_missing_superclass_terminates_with_proxy() {
    init_logger();
    let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
    coordinator.add_source("b.rb", "class B < Nowhere\nend\n");

    let mut registry = Registry::new();
    let report = coordinator.run(&mut registry).unwrap();

    assert_eq!(report.deferrals, 1);
    assert_eq!(report.diagnostics.count(DiagnosticKind::RetryExhausted), 1);
    let superclass = registry.object_at("B").unwrap().superclass().unwrap();
    assert!(matches!(superclass, ObjectRef::Proxy(_)));
    assert!(!superclass.is_resolved(&registry));
    assert_eq!(registry.unresolved_references().len(), 1);
}

#[test]
fn test_undocumentable_statement_is_skipped() {
    init_logger();
    let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
    coordinator.add_source("m.rb", "class Host\n  include helper_module\n  def ok; end\nend\n");

    let mut registry = Registry::new();
    let report = coordinator.run(&mut registry).unwrap();

    assert_eq!(report.undocumentable(), 1);
    assert!(registry.at("Host#ok").is_some());
}

#[test]
fn test_add_directory_skips_excluded() {
    init_logger();
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("lib/shop")).unwrap();
    fs::create_dir_all(root.join("vendor/gems")).unwrap();
    fs::write(root.join("lib/shop.rb"), "module Shop\nend\n").unwrap();
    fs::write(root.join("lib/shop/cart.rb"), "class Shop::Cart < Shop::Base\nend\n").unwrap();
    fs::write(root.join("lib/shop/base.rb"), "class Shop::Base\nend\n").unwrap();
    fs::write(root.join("lib/README.md"), "# Shop\n").unwrap();
    fs::write(root.join("vendor/gems/ignored.rb"), "module Ignored\nend\n").unwrap();

    let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
    assert_eq!(coordinator.add_directory(root).unwrap(), 3);

    let mut registry = Registry::new();
    let report = coordinator.run(&mut registry).unwrap();
    assert_eq!(report.files, 3);
    assert!(registry.at("Ignored").is_none());
    assert_eq!(
        registry.object_at("Shop::Cart").unwrap().superclass().unwrap().path(&registry),
        "Shop::Base"
    );
}

#[test]
fn test_config_file_controls_batch() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join(".rubylight.toml");
    fs::write(&config_path, "max_retries = 0\nexclude_dirs = [\"spec\"]\n").unwrap();

    let config = ParserConfig::load(&config_path).unwrap();
    assert_eq!(config.max_retries, 0);
    assert!(config.is_excluded_dir("spec"));
    assert!(!config.is_excluded_dir("vendor"));
    assert_eq!(config.include, vec!["rb".to_string()]);

    let mut coordinator = LoadOrderCoordinator::new(config);
    coordinator.add_source("b.rb", "class B < A\nend\n");
    let mut registry = Registry::new();
    let report = coordinator.run(&mut registry).unwrap();
    assert_eq!(report.deferrals, 0);
    assert_eq!(report.diagnostics.count(DiagnosticKind::RetryExhausted), 0);
    assert_eq!(report.unresolved(), 1);
}

#[test]
fn test_snapshot_restores_registry() {
    init_logger();
    let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
    coordinator.add_source(
        "lib.rb",
        "module Greeting\n  def hello; end\nend\n\n# Base\nclass Base\nend\n\nclass Person < Base\n  include Greeting\n  attr_accessor :name\n  private\n  def secret; end\nend\n",
    );
    let mut registry = Registry::new();
    coordinator.run(&mut registry).unwrap();

    let dir = tempdir().unwrap();
    let cache = dir.path().join("registry.json");
    RegistrySnapshot::from_registry(&registry).save(&cache).unwrap();
    let restored = RegistrySnapshot::load(&cache).unwrap().into_registry().unwrap();

    assert_eq!(restored.len(), registry.len());
    for (_, object) in registry.objects() {
        let copy = restored.object_at(&object.path).unwrap();
        assert_eq!(copy.object_type(), object.object_type());
    }
    let person = restored.object_at("Person").unwrap();
    assert_eq!(person.superclass().unwrap().path(&restored), "Base");
    let mixins = person.namespace_data().unwrap().mixins(Scope::Instance);
    assert_eq!(mixins.len(), 1);
    assert_eq!(mixins[0].path(&restored), "Greeting");
    assert!(person.namespace_data().unwrap().attributes(Scope::Instance).contains_key("name"));
    assert_eq!(restored.object_at("Person#secret").unwrap().visibility, Visibility::Private);
    assert_eq!(restored.object_at("Base").unwrap().docstring.summary(), "Base");
}

#[test]
fn test_guard_clauses_do_not_shift_definitions() {
    let mut coordinator = LoadOrderCoordinator::new(ParserConfig::default());
    coordinator.add_source(
        "guard.rb",
        "class A\n  def m(x)\n    return if x\n    1\n  end\n\n  def n; end\nend\n\nclass B; end\n",
    );
    let mut registry = Registry::new();
    coordinator.run(&mut registry).unwrap();

    let mut paths: Vec<String> = registry.objects().map(|(_, o)| o.path.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec!["A", "A#m", "A#n", "B"]);
}
