use fe2o3_amqp::types::messaging::MessageId;
use fe2o3_amqp::types::primitives::{OrderedMap, SimpleValue, Uuid, Value};
use serde_json::json;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

fn uuid_to_string(uuid: &Uuid) -> String {
    uuid::Uuid::from_bytes(*uuid.as_inner()).to_string()
}

/// Extracts a string representation from a `MessageId`.
pub(crate) fn message_id_to_string(id: &MessageId) -> String {
    match id {
        MessageId::String(s) => s.clone(),
        MessageId::Ulong(n) => n.to_string(),
        MessageId::Uuid(u) => uuid_to_string(u),
        // Hex-encode binary IDs
        MessageId::Binary(b) => hex(b),
    }
}

/// Renders an application property value as the string the pipeline works with.
///
/// Binary and decimal values are hex-encoded; the original typed value is
/// kept alongside for re-sending.
pub(crate) fn simple_value_to_string(val: &SimpleValue) -> String {
    match val {
        SimpleValue::Null => String::new(),
        SimpleValue::String(s) => s.clone(),
        SimpleValue::Bool(b) => b.to_string(),
        SimpleValue::Ubyte(n) => n.to_string(),
        SimpleValue::Ushort(n) => n.to_string(),
        SimpleValue::Uint(n) => n.to_string(),
        SimpleValue::Ulong(n) => n.to_string(),
        SimpleValue::Byte(n) => n.to_string(),
        SimpleValue::Short(n) => n.to_string(),
        SimpleValue::Int(n) => n.to_string(),
        SimpleValue::Long(n) => n.to_string(),
        SimpleValue::Float(f) => f.0.to_string(),
        SimpleValue::Double(d) => d.0.to_string(),
        SimpleValue::Decimal32(d) => hex(&d.clone().into_inner()),
        SimpleValue::Decimal64(d) => hex(&d.clone().into_inner()),
        SimpleValue::Decimal128(d) => hex(&d.clone().into_inner()),
        SimpleValue::Char(c) => c.to_string(),
        SimpleValue::Timestamp(t) => t.milliseconds().to_string(),
        SimpleValue::Uuid(u) => uuid_to_string(u),
        SimpleValue::Binary(b) => hex(b),
        SimpleValue::Symbol(s) => s.to_string(),
    }
}

/// Converts a map key to a string. Non-string keys fall back to their debug form.
fn value_to_key(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        Value::Symbol(s) => s.to_string(),
        other => format!("{:?}", other),
    }
}

/// Converts an AMQP value into JSON for the archive.
pub(crate) fn value_to_json(val: &Value) -> serde_json::Value {
    match val {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Ubyte(n) => json!(n),
        Value::Ushort(n) => json!(n),
        Value::Uint(n) => json!(n),
        Value::Ulong(n) => json!(n),
        Value::Byte(n) => json!(n),
        Value::Short(n) => json!(n),
        Value::Int(n) => json!(n),
        Value::Long(n) => json!(n),
        Value::Float(f) => json!(f64::from(f.0)),
        Value::Double(d) => json!(d.0),
        Value::Decimal32(d) => json!(hex(&d.clone().into_inner())),
        Value::Decimal64(d) => json!(hex(&d.clone().into_inner())),
        Value::Decimal128(d) => json!(hex(&d.clone().into_inner())),
        Value::Char(c) => json!(c.to_string()),
        Value::Timestamp(t) => json!(t.milliseconds()),
        Value::Uuid(u) => json!(uuid_to_string(u)),
        Value::Binary(b) => json!(hex(b)),
        Value::String(s) => json!(s),
        Value::Symbol(s) => json!(s.to_string()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(map_to_json(map)),
        other => json!(format!("{:?}", other)),
    }
}

pub(crate) fn map_to_json(map: &OrderedMap<Value, Value>) -> serde_json::Map<String, serde_json::Value> {
    map.iter()
        .map(|(k, v)| (value_to_key(k), value_to_json(v)))
        .collect()
}
