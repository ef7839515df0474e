//! `alias` / `alias_method` のハンドラー

use log::debug;

use super::{literal_name, split_arguments, Handler, HandlerContext, HandlerResult};
use crate::frontend::error::HandlerError;
use crate::frontend::lexer::TokenKind;
use crate::frontend::segmenter::Statement;
use crate::registry::{path, ObjectType};

pub struct AliasHandler;

impl Handler for AliasHandler {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn matches(&self, statement: &Statement) -> bool {
        match statement.header.first() {
            Some(token) if token.kind == TokenKind::Alias => true,
            Some(token) => token.is_ident("alias_method") && statement.header.len() > 1,
            None => false,
        }
    }

    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let header = &statement.header;
        let names = if header[0].kind == TokenKind::Alias {
            // グローバル変数の別名は対象外
            if header.iter().skip(1).any(|t| t.kind == TokenKind::GlobalVar) {
                return Ok(());
            }
            header[1..].iter().filter_map(literal_name).collect::<Vec<_>>()
        } else {
            split_arguments(&header[1..])
                .into_iter()
                .filter_map(|argument| match argument {
                    [token] => literal_name(token),
                    _ => None,
                })
                .collect()
        };

        let (new_name, old_name) = match names.as_slice() {
            [new_name, old_name] => (new_name.clone(), old_name.clone()),
            _ => return Err(HandlerError::undocumentable("エイリアスの名前を解析できません", statement.line)),
        };

        let namespace = context.namespace;
        let scope = context.scope;
        let separator = path::separator(ObjectType::Method, scope);
        let original_path = path::join(context.namespace_path(), separator, &old_name);
        let original = context.registry.object_at(&original_path).cloned();

        let id = context.register(statement, namespace, &new_name, ObjectType::Method, scope)?;
        let object = context.registry.try_get_mut(id)?;
        object.dynamic = true;
        object.signature = Some(format!("def {}", new_name));
        match &original {
            Some(original) => {
                object.visibility = original.visibility;
                if object.docstring.is_blank() {
                    object.docstring = original.docstring.clone();
                }
                if let (Some(data), Some(original_data)) = (object.method_data_mut(), original.method_data()) {
                    *data = original_data.clone();
                }
            }
            None => {
                debug!("{}: 別名の元 '{}' が未登録です", context.file, original_path);
                object.visibility = context.visibility;
            }
        }

        if let Some(data) = context.registry.try_get_mut(namespace)?.namespace_data_mut() {
            data.aliases.insert(id, old_name);
        }
        Ok(())
    }
}
