use crate::error::StoreResult;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::types::{AppState, Request};
use crate::model::Class;
use crate::store::{Record, RemoveSummary, Store};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) => Ok(v.to_string()),
        None => Err(err(
            &req.id,
            "bad_params",
            format!("missing params.{key}"),
            None,
        )),
    }
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Decodes `params` as a record. With `new_id` set, a missing or empty
/// `id` is filled with a fresh uuid first.
pub fn record_from_params<T: DeserializeOwned>(req: &Request, new_id: bool) -> Result<T, Value> {
    let mut params = req.params.clone();
    let Some(obj) = params.as_object_mut() else {
        return Err(err(&req.id, "bad_params", "params must be an object", None));
    };
    if new_id {
        fill_id(obj);
    }
    decode(req, params)
}

pub fn fill_id(obj: &mut serde_json::Map<String, Value>) {
    let missing = match obj.get("id") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    if missing {
        obj.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    }
}

pub fn decode<T: DeserializeOwned>(req: &Request, value: Value) -> Result<T, Value> {
    serde_json::from_value(value).map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

/// Whether a change to this collection invalidates the cached averages.
fn affects_averages(collection: &str) -> bool {
    collection != Class::COLLECTION
}

pub fn handle_list<R: Record + Serialize>(state: &mut AppState, req: &Request) -> Value {
    let key = R::COLLECTION;
    let Some(store) = state.store.as_ref() else {
        return ok(&req.id, json!({ key: [] }));
    };
    match store.list::<R>() {
        Ok(records) => ok(&req.id, json!({ key: records })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn handle_get<R: Record + Serialize>(state: &mut AppState, req: &Request) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store.get::<R>(&id) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Inserts the record in `params`; fails on an existing id.
pub fn handle_create<R>(state: &mut AppState, req: &Request) -> Value
where
    R: Record + Serialize + DeserializeOwned,
{
    if state.store.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let record: R = match record_from_params(req, true) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    write_record(state, req, record, false)
}

/// Inserts or replaces the record in `params`, which must carry its id.
pub fn handle_update<R>(state: &mut AppState, req: &Request) -> Value
where
    R: Record + Serialize + DeserializeOwned,
{
    if state.store.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let record: R = match record_from_params(req, false) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    write_record(state, req, record, true)
}

pub fn write_record<R: Record + Serialize>(
    state: &mut AppState,
    req: &Request,
    record: R,
    upsert: bool,
) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if record.id().is_empty() {
        return err(&req.id, "bad_params", "id must not be empty", None);
    }
    let written = if upsert {
        store.upsert(&record)
    } else {
        store.insert(&record)
    };
    if let Err(e) = written {
        return store_err(&req.id, &e);
    }
    if affects_averages(R::COLLECTION) {
        if let Err(e) = state.recompute_averages() {
            return store_err(&req.id, &e);
        }
    }
    ok(&req.id, json!({ "record": record }))
}

/// Runs a cascading delete for `params.id` and refreshes the averages.
pub fn handle_remove(
    state: &mut AppState,
    req: &Request,
    remove: fn(&Store, &str) -> StoreResult<RemoveSummary>,
) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let outcome = remove(store, &id)
        .map(|summary| json!({ "id": id, "removed": summary }))
        .map_err(|e| store_err(&req.id, &e));
    finish_write(state, req, outcome)
}

/// Refreshes the averages after a write that may have stopped partway,
/// then answers with the write's own outcome.
pub fn finish_write(state: &mut AppState, req: &Request, outcome: Result<Value, Value>) -> Value {
    let refreshed = state.recompute_averages();
    match outcome {
        Err(resp) => {
            if let Err(e) = refreshed {
                warn!(error = %e, "averages not refreshed after failed write");
            }
            resp
        }
        Ok(result) => match refreshed {
            Ok(()) => ok(&req.id, result),
            Err(e) => store_err(&req.id, &e),
        },
    }
}
