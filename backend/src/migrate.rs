//! Upgrades older tree documents in place before they are deserialized.
//!
//! Older documents may lack timestamps, `parentId`, `kind`, `type` tags or an
//! empty `children` array. Every load runs this pass; it only ever adds fields.

use serde_json::{Map, Value};

use crate::models::nodes::{FileKind, ROOT_ID};

pub fn upgrade(document: &mut Value, now: &str) -> usize {
    upgrade_folder(document, now)
}

fn upgrade_folder(folder: &mut Value, now: &str) -> usize {
    let Some(object) = folder.as_object_mut() else {
        return 0;
    };
    let mut patched = false;

    if is_missing(object, "type") {
        object.insert("type".into(), Value::from("folder"));
        patched = true;
    }
    if !object.get("children").is_some_and(Value::is_array) {
        object.insert("children".into(), Value::Array(Vec::new()));
        patched = true;
    }

    let folder_id = object
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(ROOT_ID)
        .to_string();

    let mut count = usize::from(patched);
    if let Some(Value::Array(children)) = object.get_mut("children") {
        for child in children {
            count += if is_file(child) {
                upgrade_file(child, &folder_id, now)
            } else {
                upgrade_folder(child, now)
            };
        }
    }
    count
}

fn upgrade_file(file: &mut Value, parent_id: &str, now: &str) -> usize {
    let Some(object) = file.as_object_mut() else {
        return 0;
    };
    let mut patched = false;

    if is_missing(object, "type") {
        object.insert("type".into(), Value::from("file"));
        patched = true;
    }
    if is_missing(object, "uploadedAt") {
        object.insert("uploadedAt".into(), Value::from(now));
        patched = true;
    }
    if is_missing(object, "lastUpdated") {
        object.insert("lastUpdated".into(), Value::from(now));
        patched = true;
    }
    if object.get("parentId").and_then(Value::as_str) != Some(parent_id) {
        object.insert("parentId".into(), Value::from(parent_id));
        patched = true;
    }
    if is_missing(object, "kind") {
        let name = object.get("name").and_then(Value::as_str).unwrap_or_default();
        let kind = serde_json::to_value(FileKind::infer(name, None)).unwrap_or(Value::Null);
        object.insert("kind".into(), kind);
        patched = true;
    }

    usize::from(patched)
}

fn is_file(node: &Value) -> bool {
    match node.get("type").and_then(Value::as_str) {
        Some(tag) => tag == "file",
        None => node.get("children").is_none(),
    }
}

fn is_missing(object: &Map<String, Value>, key: &str) -> bool {
    object.get(key).is_none_or(Value::is_null)
}
