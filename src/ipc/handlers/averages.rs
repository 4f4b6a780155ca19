use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::store::StudentIndex;
use serde_json::json;
use std::collections::HashSet;

/// Cached averages, optionally narrowed to a student, a subject or the
/// students of a class.
fn handle_averages_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = helpers::optional_str(req, "alunnoId");
    let subject_id = helpers::optional_str(req, "materiaId");
    let class_students: Option<HashSet<String>> = match helpers::optional_str(req, "classeId") {
        None => None,
        Some(class_id) => {
            let Some(store) = state.store.as_ref() else {
                return err(&req.id, "no_workspace", "select a workspace first", None);
            };
            match store.students_by_index(StudentIndex::Class, &class_id) {
                Ok(students) => Some(students.into_iter().map(|s| s.id).collect()),
                Err(e) => return store_err(&req.id, &e),
            }
        }
    };

    let averages: Vec<_> = state
        .averages
        .iter()
        .filter(|a| student_id.as_ref().map_or(true, |s| &a.student_id == s))
        .filter(|a| subject_id.as_ref().map_or(true, |m| &a.subject_id == m))
        .filter(|a| {
            class_students
                .as_ref()
                .map_or(true, |ids| ids.contains(&a.student_id))
        })
        .collect();
    ok(&req.id, json!({ "averages": averages }))
}

fn handle_averages_recompute(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.store.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    match state.recompute_averages() {
        Ok(()) => ok(&req.id, json!({ "count": state.averages.len() })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "averages.list" => Some(handle_averages_list(state, req)),
        "averages.recompute" => Some(handle_averages_recompute(state, req)),
        _ => None,
    }
}
