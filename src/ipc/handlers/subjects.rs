use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::Subject;
use crate::store::Store;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(helpers::handle_list::<Subject>(state, req)),
        "subjects.get" => Some(helpers::handle_get::<Subject>(state, req)),
        "subjects.create" => Some(helpers::handle_create::<Subject>(state, req)),
        "subjects.update" => Some(helpers::handle_update::<Subject>(state, req)),
        "subjects.delete" => Some(helpers::handle_remove(state, req, Store::remove_subject)),
        _ => None,
    }
}
