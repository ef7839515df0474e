//! 可視性の変更（`private` / `protected` / `public` / `module_function` など）のハンドラー
//!
//! - 引数なし: 以降の定義の可視性を変更します
//! - シンボル引数: 既存のメソッドの可視性を変更します
//! - 定義を伴う形（`private def foo`・`private attr_reader :x`）: 内側の文をその可視性で処理します

use log::debug;

use super::{literal_name, split_arguments, sub_statement, Handler, HandlerContext, HandlerResult};
use crate::frontend::lexer::TokenKind;
use crate::frontend::segmenter::Statement;
use crate::registry::{path, ObjectType, Scope, Visibility};

const VISIBILITY_METHODS: &[&str] = &[
    "private",
    "protected",
    "public",
    "module_function",
    "private_class_method",
    "public_class_method",
];

pub struct VisibilityHandler;

impl Handler for VisibilityHandler {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn matches(&self, statement: &Statement) -> bool {
        statement.header.first().map_or(false, |t| {
            t.kind == TokenKind::Identifier && VISIBILITY_METHODS.contains(&t.text.as_str())
        })
    }

    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let keyword = statement.header[0].text.as_str();
        let (visibility, scope) = match keyword {
            "private_class_method" => (Visibility::Private, Scope::Class),
            "public_class_method" => (Visibility::Public, Scope::Class),
            "module_function" => (Visibility::Private, context.scope),
            other => (Visibility::from_keyword(other).unwrap_or_default(), context.scope),
        };

        if statement.header.len() == 1 {
            match keyword {
                "module_function" => context.module_function = true,
                "private_class_method" | "public_class_method" => {}
                _ => {
                    context.visibility = visibility;
                    context.module_function = false;
                }
            }
            return Ok(());
        }

        let arguments = split_arguments(&statement.header[1..]);
        let names: Vec<String> = arguments
            .iter()
            .filter_map(|argument| match argument {
                [token] if matches!(token.kind, TokenKind::Symbol | TokenKind::StringLiteral) => literal_name(token),
                _ => None,
            })
            .collect();

        if names.is_empty() || names.len() != arguments.len() {
            return process_inline(statement, context, keyword, visibility);
        }

        for name in names {
            if keyword == "module_function" {
                copy_as_module_function(statement, context, &name)?;
            } else {
                apply_visibility(context, &name, scope, visibility);
            }
        }
        Ok(())
    }
}

/// `private def foo ... end` のように定義を伴う形
fn process_inline(
    statement: &Statement,
    context: &mut HandlerContext<'_>,
    keyword: &str,
    visibility: Visibility,
) -> HandlerResult {
    let inner = sub_statement(statement, 1);
    let saved = (context.visibility, context.module_function);
    match keyword {
        "module_function" => context.module_function = true,
        _ => context.visibility = visibility,
    }
    let result = context.process_statement(&inner);
    (context.visibility, context.module_function) = saved;
    result
}

fn apply_visibility(context: &mut HandlerContext<'_>, name: &str, scope: Scope, visibility: Visibility) {
    let separator = path::separator(ObjectType::Method, scope);
    let method_path = path::join(context.namespace_path(), separator, name);
    match context.registry.at(&method_path).and_then(|id| context.registry.get_mut(id)) {
        Some(method) => method.visibility = visibility,
        None => debug!("{}: 可視性を変更するメソッド '{}' が見つかりません", context.file, method_path),
    }
}

/// 既存のインスタンスメソッドをクラスメソッドとしても公開し、元を private にする
fn copy_as_module_function(statement: &Statement, context: &mut HandlerContext<'_>, name: &str) -> HandlerResult {
    let instance_path = path::join(context.namespace_path(), path::INSTANCE_SEPARATOR, name);
    let original = match context.registry.at(&instance_path) {
        Some(id) => id,
        None => {
            debug!("{}: module_function の対象 '{}' が見つかりません", context.file, instance_path);
            return Ok(());
        }
    };
    let source = context.registry.try_get(original)?.clone();
    let namespace = context.namespace;
    let (copy, _) = context.registry.register(namespace, name, ObjectType::Method, Scope::Class)?;
    let object = context.registry.try_get_mut(copy)?;
    object.docstring = source.docstring.clone();
    object.signature = source.signature.clone();
    object.source = source.source.clone();
    object.visibility = Visibility::Public;
    object.add_file(context.file.clone(), statement.line);
    if let (Some(data), Some(original_data)) = (object.method_data_mut(), source.method_data()) {
        data.parameters = original_data.parameters.clone();
        data.explicit = original_data.explicit;
        data.module_function = true;
    }
    context.registry.try_get_mut(original)?.visibility = Visibility::Private;
    Ok(())
}
