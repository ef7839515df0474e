//! 定数・クラス変数の代入のハンドラー

use super::{read_constant_path, Handler, HandlerContext, HandlerResult};
use crate::frontend::lexer::{Token, TokenKind};
use crate::frontend::segmenter::{join_tokens, Statement};
use crate::registry::{ObjectType, Scope};

/// `Foo = value` / `A::B = value`
///
/// `Foo = Struct.new(...)` も通常の定数として扱います。
pub struct ConstantHandler;

impl Handler for ConstantHandler {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn matches(&self, statement: &Statement) -> bool {
        match read_constant_path(&statement.header, 0) {
            Some((_, next)) => statement.header.get(next).map_or(false, |t| t.kind == TokenKind::Equal),
            None => false,
        }
    }

    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let (qualified, next) = match read_constant_path(&statement.header, 0) {
            Some(found) => found,
            None => return Ok(()),
        };
        let (owner, name) = context.split_namespace(&qualified, statement.line)?;
        let id = context.register(statement, owner, &name, ObjectType::Constant, Scope::Instance)?;
        let value = assigned_value(&statement.header[next + 1..]);
        context.registry.try_get_mut(id)?.set_value(value);
        Ok(())
    }
}

/// `@@name = value`
pub struct ClassVariableHandler;

impl Handler for ClassVariableHandler {
    fn name(&self) -> &'static str {
        "class_variable"
    }

    fn matches(&self, statement: &Statement) -> bool {
        let header = &statement.header;
        header.len() > 2 && header[0].kind == TokenKind::ClassVar && header[1].kind == TokenKind::Equal
    }

    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let name = statement.header[0].text.clone();
        let namespace = context.namespace;
        let id = context.register(statement, namespace, &name, ObjectType::ClassVariable, Scope::Instance)?;
        let value = assigned_value(&statement.header[2..]);
        context.registry.try_get_mut(id)?.set_value(value);
        Ok(())
    }
}

/// 代入の右辺（ブロックを開く場合はその手前まで）
fn assigned_value(tokens: &[Token]) -> String {
    let end = tokens
        .iter()
        .position(|t| matches!(t.kind, TokenKind::Do | TokenKind::BlockBrace))
        .unwrap_or(tokens.len());
    join_tokens(&tokens[..end])
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
        let mut context = HandlerContext::new(registry, &mut diagnostics, &processor, "c.rb");
        processor.process_statements(&segment(source), &mut context).unwrap();
    }

    #[test]
    fn test_constants_and_values() {
        let mut registry = Registry::new();
        process(
            &mut registry,
            "module Config\n  # Default port\n  PORT = 8080\n  NAMES = %w[a b].freeze\nend\nConfig::HOST = \"localhost\"\n",
        );
        let port = registry.object_at("Config::PORT").unwrap();
        assert_eq!(port.value(), Some("8080"));
        assert_eq!(port.docstring.text, "Default port");
        assert_eq!(registry.object_at("Config::NAMES").unwrap().value(), Some("%w[a b].freeze"));
        assert_eq!(registry.object_at("Config::HOST").unwrap().value(), Some("\"localhost\""));
    }

    #[test]
    fn test_struct_assignment_is_constant() {
        let mut registry = Registry::new();
        process(&mut registry, "Point = Struct.new(:x, :y) do\n  def norm; end\nend\n");
        let point = registry.object_at("Point").unwrap();
        assert_eq!(point.object_type(), ObjectType::Constant);
        assert_eq!(point.value(), Some("Struct.new(:x, :y)"));
    }

    #[test]
    fn test_comparison_is_not_assignment() {
        let mut registry = Registry::new();
        process(&mut registry, "FOO == 1\n");
        assert!(registry.at("FOO").is_none());
    }

    #[test]
    fn test_class_variable() {
        let mut registry = Registry::new();
        process(&mut registry, "class Counter\n  @@count = 0\nend\n");
        let count = registry.object_at("Counter::@@count").unwrap();
        assert_eq!(count.object_type(), ObjectType::ClassVariable);
        assert_eq!(count.value(), Some("0"));
    }
}
