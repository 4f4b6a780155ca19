use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::Class;
use crate::store::Store;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(helpers::handle_list::<Class>(state, req)),
        "classes.get" => Some(helpers::handle_get::<Class>(state, req)),
        "classes.create" => Some(helpers::handle_create::<Class>(state, req)),
        "classes.update" => Some(helpers::handle_update::<Class>(state, req)),
        // Takes the class's students and every grade tagged with it.
        "classes.delete" => Some(helpers::handle_remove(state, req, Store::remove_class)),
        _ => None,
    }
}
