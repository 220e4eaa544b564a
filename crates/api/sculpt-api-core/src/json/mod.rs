use serde_json::{json, Map, Value as JsonValue};
use thiserror::Error;

use crate::Value;

/// Errors produced while parsing shorthand value JSON.
#[derive(Debug, Error)]
pub enum JsonError {
    #[error("value json parse error: {0}")]
    ValueParse(#[from] serde_json::Error),
}

/// Normalize shorthand `Value` JSON into the canonical `{ "type": ..., "data": ... }`
/// representation understood by the serde derives on [`Value`]. This helper accepts
/// both shorthand objects such as `{ "vec3": [1, 2, 3] }` and primitive aliases
/// like `1.0`, `"text"` or `[0, 1, 0]`.
///
/// Numeric arrays of length 2/3/4 become `vec2`/`vec3`/`vec4`; any other array becomes a
/// `list` of normalized items.
pub fn normalize_value_json(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Number(n) => json!({ "type": "float", "data": n }),
        JsonValue::Bool(b) => json!({ "type": "bool", "data": b }),
        JsonValue::String(s) => json!({ "type": "text", "data": s }),
        JsonValue::Array(arr) => {
            let all_numbers = arr.iter().all(|x| x.is_number());
            if all_numbers {
                match arr.len() {
                    2 => return json!({ "type": "vec2", "data": arr }),
                    3 => return json!({ "type": "vec3", "data": arr }),
                    4 => return json!({ "type": "vec4", "data": arr }),
                    _ => {}
                }
            }
            let data: Vec<JsonValue> = arr.into_iter().map(normalize_value_json).collect();
            json!({ "type": "list", "data": data })
        }
        JsonValue::Object(obj) => {
            if obj.contains_key("type") && obj.contains_key("data") {
                return JsonValue::Object(obj);
            }
            if let Some(text) = obj.get("text").and_then(|x| x.as_str()) {
                return json!({ "type": "text", "data": text });
            }
            if let Some(path) = obj.get("file").and_then(|x| x.as_str()) {
                return json!({ "type": "file", "data": path });
            }
            if let Some(f) = obj.get("float").and_then(|x| x.as_f64()) {
                return json!({ "type": "float", "data": f });
            }
            if let Some(b) = obj.get("bool").and_then(|x| x.as_bool()) {
                return json!({ "type": "bool", "data": b });
            }
            for tag in ["vec2", "vec3", "vec4", "color"] {
                if let Some(arr) = obj.get(tag).and_then(|x| x.as_array()) {
                    return json!({ "type": tag, "data": arr });
                }
            }
            if let Some(list_items) = obj.get("list").and_then(|x| x.as_array()) {
                let data: Vec<JsonValue> = list_items
                    .iter()
                    .cloned()
                    .map(normalize_value_json)
                    .collect();
                return json!({ "type": "list", "data": data });
            }
            if let Some(record) = obj.get("record").and_then(|x| x.as_object()) {
                let mut data = Map::new();
                for (key, val) in record.iter() {
                    data.insert(key.clone(), normalize_value_json(val.clone()));
                }
                return json!({ "type": "record", "data": JsonValue::Object(data) });
            }

            JsonValue::Object(obj)
        }
        other => other,
    }
}

/// Normalize shorthand value JSON, then deserialize it into the strongly typed [`Value`].
pub fn parse_value(value: JsonValue) -> Result<Value, JsonError> {
    let normalized = normalize_value_json(value);
    Ok(serde_json::from_value(normalized)?)
}

/// Convert a [`Value`] into the compact shorthand accepted by [`parse_value`].
pub fn value_to_shorthand_json(value: &Value) -> JsonValue {
    match value {
        Value::Float(f) => json!(*f),
        Value::Bool(b) => json!(*b),
        Value::Vec2(a) => json!({ "vec2": a }),
        Value::Vec3(a) => json!({ "vec3": a }),
        Value::Vec4(a) => json!({ "vec4": a }),
        Value::Color(a) => json!({ "color": a }),
        Value::Text(s) => json!(s),
        Value::File(p) => json!({ "file": p }),
        Value::List(items) => {
            let data: Vec<JsonValue> = items.iter().map(value_to_shorthand_json).collect();
            json!({ "list": data })
        }
        Value::Record(map) => {
            let mut obj = Map::new();
            for (key, val) in map.iter() {
                obj.insert(key.clone(), value_to_shorthand_json(val));
            }
            json!({ "record": JsonValue::Object(obj) })
        }
    }
}
