//! `include` / `extend` / `prepend` のハンドラー

use log::trace;

use super::{read_constant_path, split_arguments, Handler, HandlerContext, HandlerResult};
use crate::frontend::error::HandlerError;
use crate::frontend::lexer::TokenKind;
use crate::frontend::segmenter::Statement;
use crate::registry::{ObjectRef, ObjectType, Scope};

const MIXIN_METHODS: &[&str] = &["include", "extend", "prepend"];

pub struct MixinHandler;

impl Handler for MixinHandler {
    fn name(&self) -> &'static str {
        "mixin"
    }

    fn matches(&self, statement: &Statement) -> bool {
        let header = &statement.header;
        header.len() > 1
            && header[0].kind == TokenKind::Identifier
            && MIXIN_METHODS.contains(&header[0].text.as_str())
    }

    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let keyword = statement.header[0].text.as_str();
        let scope = match (keyword, context.scope) {
            ("extend", _) | (_, Scope::Class) => Scope::Class,
            _ => Scope::Instance,
        };

        let mut mixins = Vec::new();
        for argument in split_arguments(&statement.header[1..]) {
            let reference = match argument.first() {
                Some(token) if token.kind == TokenKind::SelfKw && argument.len() == 1 => {
                    ObjectRef::Object(context.namespace)
                }
                _ => match read_constant_path(argument, 0) {
                    Some((name, next)) if next == argument.len() => {
                        context.reference_or_proxy(&name, Some(ObjectType::Module))
                    }
                    _ => {
                        return Err(HandlerError::undocumentable(
                            format!("{} の引数を解析できません", keyword),
                            statement.line,
                        ))
                    }
                },
            };
            mixins.push(reference);
        }

        // 先頭の引数が継承系列で最も手前に来る
        let namespace = context.namespace;
        for reference in mixins.into_iter().rev() {
            let added = context.registry.add_mixin(namespace, reference, scope)?;
            trace!("{} ({}): 追加={}", keyword, scope, added);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::frontend::segmenter::segment;
    use crate::handlers::Processor;
    use crate::registry::Registry;

    fn process(registry: &mut Registry, source: &str) -> Diagnostics {
        let processor = Processor::new();
        let mut diagnostics = Diagnostics::new();
        {
            let mut context = HandlerContext::new(registry, &mut diagnostics, &processor, "mixin.rb");
            processor.process_statements(&segment(source), &mut context).unwrap();
        }
        diagnostics
    }

    fn mixin_paths(registry: &Registry, path: &str, scope: Scope) -> Vec<String> {
        registry
            .object_at(path)
            .and_then(|o| o.namespace_data())
            .map(|data| data.mixins(scope).iter().map(|m| m.path(registry)).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_include_order_and_extend() {
        let mut registry = Registry::new();
        process(
            &mut registry,
            "module A; end\nmodule B; end\nmodule C; end\nclass Foo\n  include A, B\n  include C\n  extend A\nend\n",
        );
        assert_eq!(mixin_paths(&registry, "Foo", Scope::Instance), vec!["C", "A", "B"]);
        assert_eq!(mixin_paths(&registry, "Foo", Scope::Class), vec!["A"]);
    }

    #[test]
    fn test_unknown_mixin_becomes_proxy() {
        let mut registry = Registry::new();
        process(&mut registry, "class Foo\n  include Comparable\nend\n");
        let foo = registry.object_at("Foo").unwrap();
        let mixins = &foo.namespace_data().unwrap().instance_mixins;
        assert!(matches!(mixins[0], ObjectRef::Proxy(_)));
        assert_eq!(registry.unresolved_references().len(), 1);
    }

    #[test]
    fn test_extend_self() {
        let mut registry = Registry::new();
        process(&mut registry, "module Helpers\n  extend self\nend\n");
        assert_eq!(mixin_paths(&registry, "Helpers", Scope::Class), vec!["Helpers"]);
    }

    #[test]
    fn test_non_constant_argument_is_undocumentable() {
        let mut registry = Registry::new();
        let diagnostics = process(&mut registry, "class Foo\n  include helpers.first\nend\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(mixin_paths(&registry, "Foo", Scope::Instance).is_empty());
    }
}
