use super::types::Value;
use serde_json::Value as Json;

/// Convert a CDP `RemoteObject` into our tagged `Value`.
pub fn remote_object_to_value(remote: &Json) -> Value {
    let kind = remote
        .get("type")
        .and_then(Json::as_str)
        .unwrap_or("undefined")
        .to_string();

    if let Some(object_id) = remote.get("objectId").and_then(Json::as_str) {
        return Value::Object {
            object_id: object_id.to_string(),
            kind,
            preview: Vec::new(),
        };
    }

    if let Some(reason) = remote.get("unserializableValue").and_then(Json::as_str) {
        return Value::Unserializable {
            reason: reason.to_string(),
        };
    }

    let literal = match remote.get("value") {
        Some(Json::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    };

    Value::Primitive { kind, literal }
}

/// Render CDP `exceptionDetails` into a short human-readable message.
pub fn exception_message(details: &Json) -> String {
    details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Json::as_str)
        .or_else(|| details.get("text").and_then(Json::as_str))
        .unwrap_or("evaluation threw")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitive_number_converts_to_literal() {
        let remote = json!({"type": "number", "value": 4});
        match remote_object_to_value(&remote) {
            Value::Primitive { kind, literal } => {
                assert_eq!(kind, "number");
                assert_eq!(literal, "4");
            }
            other => panic!("expected primitive, got {:?}", other),
        }
    }

    #[test]
    fn object_with_object_id_converts_to_object_handle() {
        let remote = json!({"type": "object", "objectId": "1.2.3", "className": "Array"});
        match remote_object_to_value(&remote) {
            Value::Object { object_id, .. } => assert_eq!(object_id, "1.2.3"),
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn unserializable_value_is_tagged() {
        let remote = json!({"type": "number", "unserializableValue": "NaN"});
        match remote_object_to_value(&remote) {
            Value::Unserializable { reason } => assert_eq!(reason, "NaN"),
            other => panic!("expected unserializable, got {:?}", other),
        }
    }
}
