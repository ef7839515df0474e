//! モジュール定義のハンドラー

use super::{read_constant_path, Handler, HandlerContext, HandlerResult};
use crate::frontend::error::HandlerError;
use crate::frontend::lexer::TokenKind;
use crate::frontend::segmenter::Statement;
use crate::registry::{ObjectType, Scope};

pub struct ModuleHandler;

impl Handler for ModuleHandler {
    fn name(&self) -> &'static str {
        "module"
    }

    fn matches(&self, statement: &Statement) -> bool {
        statement.first_keyword() == Some(TokenKind::Module)
    }

    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let (qualified, _) = read_constant_path(&statement.header, 1)
            .ok_or_else(|| HandlerError::undocumentable("モジュール名を解析できません", statement.line))?;
        let (owner, name) = context.split_namespace(&qualified, statement.line)?;
        let id = context.register(statement, owner, &name, ObjectType::Module, Scope::Instance)?;
        context.process_body(statement.statements(), id, Scope::Instance)
    }
}
