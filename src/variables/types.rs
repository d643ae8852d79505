/// A JS value as reported through CDP's `RemoteObject` shape, tagged by
/// kind rather than statically typed (§9 "Dynamic JSON values").
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Primitive { kind: String, literal: String },
    Object { object_id: String, kind: String, preview: Vec<(String, String)> },
    Unserializable { reason: String },
}

impl Value {
    pub fn kind(&self) -> &str {
        match self {
            Value::Primitive { kind, .. } => kind,
            Value::Object { kind, .. } => kind,
            Value::Unserializable { .. } => "unserializable",
        }
    }
}

/// `globals()` never reports these implementation-provided names (§4.5).
pub const GLOBAL_DENY_LIST: &[&str] = &["console", "process", "Buffer", "global", "require"];
