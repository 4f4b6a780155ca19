use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::Term;
use crate::reports;
use serde_json::json;

fn handle_student_card_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match helpers::required_str(req, "alunnoId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match reports::student_card(store, &state.averages, &student_id) {
        Ok(model) => ok(&req.id, json!(model)),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_class_stats_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match helpers::required_str(req, "classeId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match reports::class_stats(store, &state.averages, &class_id) {
        Ok(model) => ok(&req.id, json!(model)),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_class_register_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match helpers::required_str(req, "classeId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject_id = match helpers::required_str(req, "materiaId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let term = match req
        .params
        .get("quadrimestre")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| "missing params.quadrimestre".to_string())
        .and_then(Term::try_from)
    {
        Ok(t) => t,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match reports::class_register(store, &state.averages, &class_id, &subject_id, term) {
        Ok(model) => ok(&req.id, json!(model)),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentCardModel" => Some(handle_student_card_model(state, req)),
        "reports.classStatsModel" => Some(handle_class_stats_model(state, req)),
        "reports.classRegisterModel" => Some(handle_class_register_model(state, req)),
        _ => None,
    }
}
