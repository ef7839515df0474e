//! # パス計算
//!
//! オブジェクトの正規パスの組み立てと分解を行います。
//! インスタンスメソッドは `#`、それ以外（クラスメソッドを含む）は `::` で連結します。
//! ルートのパスは空文字列で、ルート直下のオブジェクトは名前そのもの
//! （インスタンスメソッドは `#name`）になります。

use super::object::{ObjectType, Scope};

/// 名前空間の区切り
pub const NAMESPACE_SEPARATOR: &str = "::";
/// インスタンスメソッドの区切り
pub const INSTANCE_SEPARATOR: &str = "#";
/// ルートのパス
pub const ROOT_PATH: &str = "";

/// オブジェクトの種類とスコープから区切り文字を決める
pub fn separator(object_type: ObjectType, scope: Scope) -> &'static str {
    if object_type == ObjectType::Method && scope == Scope::Instance {
        INSTANCE_SEPARATOR
    } else {
        NAMESPACE_SEPARATOR
    }
}

/// 名前空間のパスと名前を連結
pub fn join(namespace_path: &str, separator: &str, name: &str) -> String {
    if namespace_path.is_empty() {
        if separator == INSTANCE_SEPARATOR {
            format!("{}{}", INSTANCE_SEPARATOR, name)
        } else {
            name.to_string()
        }
    } else {
        format!("{}{}{}", namespace_path, separator, name)
    }
}

/// ルート修飾（`::Foo`）された名前かどうか
pub fn is_root_qualified(name: &str) -> bool {
    name.starts_with(NAMESPACE_SEPARATOR)
}

/// 名前を区切り文字ごとの部分に分解する
///
/// `"A::B#c"` は `[(None, "A"), (Some("::"), "B"), (Some("#"), "c")]` になります。
/// 先頭の区切りはそのまま最初の部分に付きます。
pub fn segments(name: &str) -> Vec<(Option<&'static str>, &str)> {
    let mut parts = Vec::new();
    let mut separator: Option<&'static str> = None;
    let mut rest = name;

    loop {
        let next = [NAMESPACE_SEPARATOR, INSTANCE_SEPARATOR]
            .iter()
            .filter_map(|sep| rest.find(sep).map(|index| (index, *sep)))
            .min_by_key(|(index, _)| *index);

        match next {
            Some((0, sep)) => {
                separator = Some(sep);
                rest = &rest[sep.len()..];
            }
            Some((index, sep)) => {
                parts.push((separator, &rest[..index]));
                separator = Some(sep);
                rest = &rest[index + sep.len()..];
            }
            None => {
                parts.push((separator, rest));
                return parts;
            }
        }
    }
}

/// パスから最後の名前を取り出す
pub fn last_name(path: &str) -> &str {
    match segments(path).last() {
        Some((_, name)) => name,
        None => path,
    }
}

/// オブジェクト名として有効かどうか
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(char::is_whitespace)
        && !name.contains(NAMESPACE_SEPARATOR)
        && !name.contains(INSTANCE_SEPARATOR)
}
