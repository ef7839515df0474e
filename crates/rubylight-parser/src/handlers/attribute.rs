//! `attr_reader` / `attr_writer` / `attr_accessor` / `attr` のハンドラー
//!
//! 属性ごとにリーダー・ライターのメソッドを登録し、名前空間の属性表にも記録します。

use super::{literal_name, split_arguments, Handler, HandlerContext, HandlerResult};
use crate::frontend::error::HandlerError;
use crate::frontend::lexer::TokenKind;
use crate::frontend::segmenter::Statement;
use crate::registry::{ObjectId, ObjectType, Parameter};

const ATTRIBUTE_METHODS: &[&str] = &["attr_reader", "attr_writer", "attr_accessor", "attr"];

pub struct AttributeHandler;

impl Handler for AttributeHandler {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn matches(&self, statement: &Statement) -> bool {
        let header = &statement.header;
        header.len() > 1
            && header[0].kind == TokenKind::Identifier
            && ATTRIBUTE_METHODS.contains(&header[0].text.as_str())
    }

    fn process(&self, statement: &Statement, context: &mut HandlerContext<'_>) -> HandlerResult {
        let keyword = statement.header[0].text.as_str();
        let arguments = split_arguments(&statement.header[1..]);

        let (mut read, mut write) = match keyword {
            "attr_reader" | "attr" => (true, false),
            "attr_writer" => (false, true),
            _ => (true, true),
        };

        let mut names = Vec::new();
        for argument in &arguments {
            match argument {
                [token] if matches!(token.kind, TokenKind::Symbol | TokenKind::StringLiteral) => {
                    if let Some(name) = literal_name(token) {
                        names.push(name);
                    }
                }
                // 旧形式の `attr :name, true`
                [token] if keyword == "attr" && token.kind == TokenKind::ValueKeyword => {
                    if token.text == "true" {
                        write = true;
                    }
                    read = true;
                }
                _ => {}
            }
        }
        if names.is_empty() {
            return Err(HandlerError::undocumentable(
                format!("{} の属性名を解析できません", keyword),
                statement.line,
            ));
        }

        let namespace = context.namespace;
        let scope = context.scope;
        for name in names {
            let reader = if read {
                Some(define_accessor(context, statement, namespace, &name, None)?)
            } else {
                None
            };
            let writer = if write {
                let setter = format!("{}=", name);
                Some(define_accessor(context, statement, namespace, &setter, Some("value"))?)
            } else {
                None
            };
            // 既存の属性は今回定義した側だけ更新する
            if let Some(data) = context.registry.try_get_mut(namespace)?.namespace_data_mut() {
                let slot = data.attributes_mut(scope).entry(name).or_default();
                if reader.is_some() {
                    slot.read = reader;
                }
                if writer.is_some() {
                    slot.write = writer;
                }
            }
        }
        Ok(())
    }
}

fn define_accessor(
    context: &mut HandlerContext<'_>,
    statement: &Statement,
    namespace: ObjectId,
    name: &str,
    parameter: Option<&str>,
) -> Result<ObjectId, HandlerError> {
    let scope = context.scope;
    let visibility = context.visibility;
    let id = context.register(statement, namespace, name, ObjectType::Method, scope)?;
    let object = context.registry.try_get_mut(id)?;
    object.dynamic = true;
    object.visibility = visibility;
    object.signature = Some(match parameter {
        Some(parameter) => format!("def {}({})", name, parameter),
        None => format!("def {}", name),
    });
    if let Some(data) = object.method_data_mut() {
        data.parameters = parameter.map(|p| Parameter::new(p, None)).into_iter().collect();
        data.explicit = parameter.is_some();
    }
    Ok(id)
}
