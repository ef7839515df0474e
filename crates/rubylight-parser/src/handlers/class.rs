//! クラス定義（`class Foo < Bar`・`class << self`）のハンドラー

use log::debug;

use super::{read_constant_path, Handler, HandlerContext, HandlerResult};
use crate::frontend::error::HandlerError;
use crate::frontend::lexer::{Token, TokenKind};
use crate::frontend::segmenter::Statement;
use crate::registry::{ObjectId, ObjectRef, ObjectType, Proxy, ResolveOptions, Scope};

pub struct ClassHandler;

impl Handler for ClassHandler {
    fn name(&self) -> &'static str {
        "class"
    }

    fn matches(&self, statement: &Statement) -> bool {
        statement.first_keyword() == Some(TokenKind::Class)
    }

    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let tokens = &statement.header;
        if tokens.get(1).map_or(false, |t| t.kind == TokenKind::LeftShift) {
            return process_singleton_class(statement, context);
        }

        let (qualified, next) = read_constant_path(tokens, 1)
            .ok_or_else(|| HandlerError::undocumentable("クラス名を解析できません", statement.line))?;

        let superclass_name = if tokens.get(next).map_or(false, |t| t.kind == TokenKind::Less) {
            Some(
                superclass_name(&tokens[next + 1..])
                    .ok_or_else(|| HandlerError::undocumentable("スーパークラスを解析できません", statement.line))?,
            )
        } else {
            None
        };

        let (owner, name) = context.split_namespace(&qualified, statement.line)?;

        // 自身と同じ名前のスーパークラスは外側の名前空間から探す
        let superclass = match &superclass_name {
            Some(superclass) if *superclass == qualified => {
                let outer = context.namespace;
                Some(resolve_outer_superclass(context, outer, superclass, statement.line)?)
            }
            Some(superclass) => Some(context.resolve_reference(superclass, Some(ObjectType::Class), statement.line)?),
            None => None,
        };

        let id = context.register(statement, owner, &name, ObjectType::Class, Scope::Instance)?;
        let object = context.registry.try_get_mut(id)?;
        if object.object_type() != ObjectType::Class {
            debug!("'{}' は{}として記述済みのためクラス定義の本体のみ処理します", object.path, object.object_type());
        } else if let Some(superclass) = superclass {
            object.set_superclass(Some(superclass));
        }

        context.process_body(statement.statements(), id, Scope::Instance)
    }
}

/// `class << self` / `class << Foo`
fn process_singleton_class(statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
    let tokens = &statement.header;
    let target = match tokens.get(2) {
        Some(token) if token.kind == TokenKind::SelfKw => context.namespace,
        Some(_) => {
            let (name, _) = read_constant_path(tokens, 2)
                .ok_or_else(|| HandlerError::undocumentable("特異クラスの対象を解析できません", statement.line))?;
            context.resolve_namespace(&name, statement.line)?
        }
        None => return Err(HandlerError::undocumentable("特異クラスの対象がありません", statement.line)),
    };
    context.process_body(statement.statements(), target, Scope::Class)
}

/// `< ` の後ろからスーパークラス名を取り出す
///
/// - `Bar` / `::A::Bar`
/// - `Struct.new(...)` は `Struct`
/// - `DelegateClass(Bar)` は `Bar`
fn superclass_name(tokens: &[Token]) -> Option<String> {
    let (name, next) = read_constant_path(tokens, 0)?;
    match tokens.get(next).map(|t| t.kind) {
        Some(TokenKind::LeftParen) => read_constant_path(tokens, next + 1).map(|(inner, _)| inner).or(Some(name)),
        _ => Some(name),
    }
}

/// `class Foo < Foo` のような定義で、外側にある同名のクラスを探す
fn resolve_outer_superclass(
    context: &mut HandlerContext<'_>,
    namespace: ObjectId,
    name: &str,
    line: usize,
) -> Result<ObjectRef, HandlerError> {
    let outer = context
        .registry
        .get(namespace)
        .and_then(|o| o.namespace)
        .unwrap_or_else(|| context.registry.root());
    let options = ResolveOptions::new().inherit(true).type_hint(Some(ObjectType::Class));
    match context.registry.resolve(outer, name, &options) {
        Some(reference @ ObjectRef::Object(_)) => Ok(reference),
        _ => {
            context.report_unresolved(name, line);
            Ok(ObjectRef::Proxy(Proxy::new(outer, name, Some(ObjectType::Class))))
        }
    }
}
