//! メソッド定義（`def`）のハンドラー

use super::{read_constant_path, split_arguments, Handler, HandlerContext, HandlerResult};
use crate::frontend::error::HandlerError;
use crate::frontend::lexer::{Token, TokenKind};
use crate::frontend::segmenter::{join_tokens, Statement};
use crate::registry::{ObjectId, ObjectRef, ObjectType, Parameter, ResolveOptions, Scope, Visibility};

pub struct MethodHandler;

impl Handler for MethodHandler {
    fn name(&self) -> &'static str {
        "method"
    }

    fn matches(&self, statement: &Statement) -> bool {
        statement.first_keyword() == Some(TokenKind::Def)
    }

    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let tokens = &statement.header;
        let definition = parse_definition(tokens, context)
            .ok_or_else(|| HandlerError::undocumentable("メソッド名を解析できません", statement.line))?;

        let (parameters, explicit) = parse_parameters(&tokens[definition.next..]);

        if definition.scope == Scope::Instance && context.module_function {
            let instance = define(context, statement, definition.namespace, &definition.name, Scope::Instance)?;
            set_method_data(context, instance, &parameters, explicit, false, Visibility::Private)?;
            let singleton = define(context, statement, definition.namespace, &definition.name, Scope::Class)?;
            set_method_data(context, singleton, &parameters, explicit, true, Visibility::Public)?;
            return Ok(());
        }

        let id = define(context, statement, definition.namespace, &definition.name, definition.scope)?;
        let visibility = context.visibility;
        set_method_data(context, id, &parameters, explicit, false, visibility)
    }
}

/// def の名前部分の解析結果
struct Definition {
    namespace: ObjectId,
    name: String,
    scope: Scope,
    /// 引数リストの開始位置
    next: usize,
}

fn parse_definition(tokens: &[Token], context: &HandlerContext<'_>) -> Option<Definition> {
    let first = tokens.get(1)?;
    let has_receiver = tokens.get(2).map_or(false, |t| t.kind == TokenKind::Dot);

    if first.kind == TokenKind::SelfKw && has_receiver {
        let name = tokens.get(3)?;
        return Some(Definition {
            namespace: context.namespace,
            name: name.text.clone(),
            scope: Scope::Class,
            next: 4,
        });
    }

    if first.kind == TokenKind::Constant {
        if let Some((receiver, after)) = read_constant_path(tokens, 1) {
            if tokens.get(after).map_or(false, |t| t.kind == TokenKind::Dot) {
                let name = tokens.get(after + 1)?;
                let options = ResolveOptions::new().inherit(true);
                let namespace = match context.registry.resolve(context.namespace, &receiver, &options) {
                    Some(ObjectRef::Object(id)) if context.registry.get(id).map_or(false, |o| o.is_namespace()) => id,
                    _ => context.namespace,
                };
                return Some(Definition {
                    namespace,
                    name: name.text.clone(),
                    scope: Scope::Class,
                    next: after + 2,
                });
            }
        }
    }

    Some(Definition {
        namespace: context.namespace,
        name: first.text.clone(),
        scope: context.scope,
        next: 2,
    })
}

/// 引数リストを解析し、括弧で明示されていたかどうかも返す
pub(crate) fn parse_parameters(tokens: &[Token]) -> (Vec<Parameter>, bool) {
    match tokens.first().map(|t| t.kind) {
        None | Some(TokenKind::Equal) => (Vec::new(), false),
        Some(TokenKind::LeftParen) => {
            let close = matching_paren(tokens).unwrap_or(tokens.len());
            let inner = &tokens[1..close.min(tokens.len())];
            let parameters = split_arguments(inner).into_iter().filter_map(parse_parameter).collect();
            (parameters, true)
        }
        Some(_) => {
            let parameters = split_arguments(tokens).into_iter().filter_map(parse_parameter).collect();
            (parameters, false)
        }
    }
}

fn matching_paren(tokens: &[Token]) -> Option<usize> {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_parameter(tokens: &[Token]) -> Option<Parameter> {
    let first = tokens.first()?;
    if first.kind == TokenKind::Label {
        let default = (tokens.len() > 1).then(|| join_tokens(&tokens[1..]));
        return Some(Parameter::new(first.text.clone(), default));
    }
    match tokens.iter().position(|t| t.kind == TokenKind::Equal) {
        Some(index) => {
            let name: String = tokens[..index].iter().map(|t| t.text.as_str()).collect();
            Some(Parameter::new(name, Some(join_tokens(&tokens[index + 1..]))))
        }
        None => {
            let name: String = tokens.iter().map(|t| t.text.as_str()).collect();
            Some(Parameter::new(name, None))
        }
    }
}

fn define(
    context: &mut HandlerContext<'_>,
    statement: &Statement,
    namespace: ObjectId,
    name: &str,
    scope: Scope,
) -> Result<ObjectId, HandlerError> {
    context.register(statement, namespace, name, ObjectType::Method, scope)
}

fn set_method_data(
    context: &mut HandlerContext<'_>,
    id: ObjectId,
    parameters: &[Parameter],
    explicit: bool,
    module_function: bool,
    visibility: Visibility,
) -> HandlerResult {
    let object = context.registry.try_get_mut(id)?;
    object.visibility = visibility;
    if let Some(data) = object.method_data_mut() {
        data.parameters = parameters.to_vec();
        data.explicit = explicit;
        data.module_function = module_function;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::frontend::segmenter::segment;
    use crate::handlers::Processor;
    use crate::registry::Registry;

    fn process(registry: &mut Registry, source: &str) {
        let processor = Processor::new();
        let mut diagnostics = Diagnostics::new();
        let mut context = HandlerContext::new(registry, &mut diagnostics, &processor, "m.rb");
        processor.process_statements(&segment(source), &mut context).unwrap();
    }

    fn parameters(registry: &Registry, path: &str) -> Vec<String> {
        registry
            .object_at(path)
            .and_then(|o| o.method_data())
            .map(|data| data.parameters.iter().map(|p| p.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_instance_and_class_methods() {
        let mut registry = Registry::new();
        process(
            &mut registry,
            "class Foo\n  # Runs it\n  def run(a, b = 1, *rest, key:, opt: 2, **opts, &blk)\n  end\n  def self.build; end\nend\n",
        );
        let run = registry.object_at("Foo#run").unwrap();
        assert_eq!(run.docstring.text, "Runs it");
        assert_eq!(run.signature.as_deref(), Some("def run(a, b = 1, *rest, key:, opt: 2, **opts, &blk)"));
        assert_eq!(
            parameters(&registry, "Foo#run"),
            vec!["a", "b = 1", "*rest", "key:", "opt: 2", "**opts", "&blk"]
        );
        assert!(run.method_data().unwrap().explicit);
        assert!(registry.at("Foo::build").is_some());
    }

    #[test]
    fn test_parameters_without_parens() {
        let mut registry = Registry::new();
        process(&mut registry, "def helper a, b = 2\n  a + b\nend\n");
        assert_eq!(parameters(&registry, "#helper"), vec!["a", "b = 2"]);
        assert!(!registry.object_at("#helper").unwrap().method_data().unwrap().explicit);
    }

    #[test]
    fn test_operator_and_setter_names() {
        let mut registry = Registry::new();
        process(&mut registry, "class V\n  def ==(other); end\n  def name=(value); end\n  def [](i); end\nend\n");
        assert!(registry.at("V#==").is_some());
        assert!(registry.at("V#name=").is_some());
        assert!(registry.at("V#[]").is_some());
    }

    #[test]
    fn test_endless_method() {
        let mut registry = Registry::new();
        process(&mut registry, "class V\n  def double(x) = x * 2\n  def answer = 42\nend\n");
        assert_eq!(parameters(&registry, "V#double"), vec!["x"]);
        assert!(registry.at("V#answer").is_some());
    }

    #[test]
    fn test_module_function_creates_both_copies() {
        let mut registry = Registry::new();
        process(&mut registry, "module Util\n  module_function\n  def helper; end\nend\n");
        let instance = registry.object_at("Util#helper").unwrap();
        let singleton = registry.object_at("Util::helper").unwrap();
        assert_eq!(instance.visibility, Visibility::Private);
        assert_eq!(singleton.visibility, Visibility::Public);
        assert!(singleton.method_data().unwrap().module_function);
    }

    #[test]
    fn test_method_on_constant_receiver() {
        let mut registry = Registry::new();
        process(&mut registry, "module Outer\nend\ndef Outer.setup; end\n");
        assert!(registry.at("Outer::setup").is_some());
    }
}
