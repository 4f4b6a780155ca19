use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::store::{Store, StudentIndex};
use serde_json::json;

fn lookup(state: &AppState, req: &Request, index_name: &str, value: &str) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(index) = StudentIndex::from_name(index_name) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown student index: {index_name}"),
            None,
        );
    };
    match store.students_by_index(index, value) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_by_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match helpers::required_str(req, "classeId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    lookup(state, req, "classeId", &class_id)
}

fn handle_students_by_index(state: &mut AppState, req: &Request) -> serde_json::Value {
    let index = match helpers::required_str(req, "index") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let value = match helpers::required_str(req, "value") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    lookup(state, req, &index, &value)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(helpers::handle_list::<Student>(state, req)),
        "students.get" => Some(helpers::handle_get::<Student>(state, req)),
        "students.byClass" => Some(handle_students_by_class(state, req)),
        "students.byIndex" => Some(handle_students_by_index(state, req)),
        "students.create" => Some(helpers::handle_create::<Student>(state, req)),
        "students.update" => Some(helpers::handle_update::<Student>(state, req)),
        "students.delete" => Some(helpers::handle_remove(state, req, Store::remove_student)),
        _ => None,
    }
}
