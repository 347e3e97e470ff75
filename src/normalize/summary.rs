use super::value::RawValue;
use serde_json::{json, Value};

const SCALAR_PREVIEW: usize = 1000;
const ITEM_PREVIEW: usize = 500;
const MAX_KEYS: usize = 50;

/// 描述原始结果的形状，用于调试响应
pub fn summarize(raw: &RawValue) -> Value {
    match raw {
        RawValue::Null => json!({"kind": "none"}),
        RawValue::Bool(_) | RawValue::Number(_) => json!({
            "kind": "scalar",
            "type": raw.type_name(),
            "preview": truncate(&raw.to_string(), SCALAR_PREVIEW),
        }),
        RawValue::String(s) => json!({
            "kind": "scalar",
            "type": raw.type_name(),
            "preview": truncate(s, SCALAR_PREVIEW),
        }),
        RawValue::Sequence(items) => json!({
            "kind": "list",
            "len": items.len(),
            "firstType": items.first().map(RawValue::type_name),
            "firstPreview": items.first().map(|item| truncate(&item.to_string(), ITEM_PREVIEW)),
        }),
        RawValue::Mapping(entries) => json!({
            "kind": "dict",
            "keys": entries.iter().take(MAX_KEYS).map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
        }),
        RawValue::Object(object) => {
            let mut attrs = object.attribute_names();
            attrs.truncate(MAX_KEYS);
            json!({
                "kind": "object",
                "type": object.type_name(),
                "attrs": attrs,
                "repr": truncate(&format!("{:?}", object), ITEM_PREVIEW),
            })
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
