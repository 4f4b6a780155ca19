use crate::error::StoreError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Response for a failed store or codec operation.
pub fn store_err(id: &str, e: &StoreError) -> serde_json::Value {
    let details = match e {
        StoreError::DuplicateKey {
            collection,
            id: record_id,
        }
        | StoreError::NotFound {
            collection,
            id: record_id,
        } => Some(json!({ "collection": collection, "id": record_id })),
        _ => None,
    };
    err(id, e.code(), e.to_string(), details)
}
