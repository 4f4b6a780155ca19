use crate::calc;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::model::{Grade, Student, Term, Verification};
use crate::scale::{self, GradeLevel};
use crate::store::{GradeIndex, Store};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

/// Fills in the fields a grade form can leave out: the class comes from
/// the student, the value from the verification answers.
fn complete_grade_params(store: &Store, req: &Request, new_id: bool) -> Result<Grade, Value> {
    let mut params = req.params.clone();
    let Some(obj) = params.as_object_mut() else {
        return Err(err(&req.id, "bad_params", "params must be an object", None));
    };
    if new_id {
        helpers::fill_id(obj);
    }

    let has_class = obj
        .get("classeId")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.is_empty());
    if !has_class {
        let Some(student_id) = obj.get("alunnoId").and_then(|v| v.as_str()) else {
            return Err(err(&req.id, "bad_params", "missing params.alunnoId", None));
        };
        let student: Student = store
            .get(student_id)
            .map_err(|e| store_err(&req.id, &e))?;
        obj.insert("classeId".into(), Value::String(student.class_id));
    }

    let has_value = obj.get("valore").is_some_and(|v| !v.is_null());
    if !has_value {
        let Some(raw) = obj.get("tipoVerifica").filter(|v| !v.is_null()).cloned() else {
            return Err(err(
                &req.id,
                "bad_params",
                "missing params.valore or params.tipoVerifica",
                None,
            ));
        };
        let verification: Verification = helpers::decode(req, raw)?;
        if verification.correct_answers > verification.total_questions {
            return Err(err(
                &req.id,
                "bad_params",
                "risposteEsatte exceeds numeroDomande",
                None,
            ));
        }
        let level = scale::score_from_answers(
            verification.correct_answers,
            verification.total_questions,
        );
        obj.insert("valore".into(), Value::String(level.code().to_string()));
    }

    helpers::decode(req, params)
}

fn handle_grades_save(state: &mut AppState, req: &Request, upsert: bool) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let grade = match complete_grade_params(store, req, !upsert) {
        Ok(g) => g,
        Err(resp) => return resp,
    };
    helpers::write_record(state, req, grade, upsert)
}

fn handle_grades_by_index(state: &mut AppState, req: &Request) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let index_name = match helpers::required_str(req, "index") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Terms arrive as numbers from the UI.
    let value = match req.params.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return err(&req.id, "bad_params", "missing params.value", None),
    };
    let Some(index) = GradeIndex::from_name(&index_name) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown grade index: {index_name}"),
            None,
        );
    };
    match store.grades_by_index(index, &value) {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_grades_by_class(state: &mut AppState, req: &Request) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match helpers::required_str(req, "classeId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store.grades_by_class(&class_id) {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_grades_by_student(state: &mut AppState, req: &Request) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match helpers::required_str(req, "alunnoId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store.grades_by_student(&student_id) {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Batch entry for one subject, class, date and term. Each entry carries
/// either a `valore` code or `risposteEsatte` against the shared
/// `numeroDomande`, and optionally its own `id`.
fn handle_grades_create_many(state: &mut AppState, req: &Request) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = match helpers::required_str(req, "materiaId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_id = match helpers::required_str(req, "classeId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let date = match helpers::required_str(req, "data") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let note = helpers::optional_str(req, "note").unwrap_or_default();
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
    let total_questions = req.params.get("numeroDomande").and_then(|v| v.as_u64());
    let verification_note = helpers::optional_str(req, "noteVerifica").unwrap_or_default();
    let Some(entries) = req.params.get("entries").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing params.entries", None);
    };

    let mut grades = Vec::new();
    let mut skipped = Vec::new();
    for entry in entries {
        let Some(student_id) = entry.get("alunnoId").and_then(|v| v.as_str()) else {
            return err(&req.id, "bad_params", "entry without alunnoId", None);
        };
        let (value, verification) = if let Some(code) = entry.get("valore").and_then(|v| v.as_str())
        {
            let Some(level) = GradeLevel::from_code(code) else {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown grade value: {code}"),
                    None,
                );
            };
            (level, None)
        } else if let Some(correct) = entry.get("risposteEsatte").and_then(|v| v.as_i64()) {
            let Some(total) = total_questions else {
                return err(
                    &req.id,
                    "bad_params",
                    "risposteEsatte given without params.numeroDomande",
                    None,
                );
            };
            let Ok(total) = u32::try_from(total) else {
                return err(&req.id, "bad_params", "numeroDomande out of range", None);
            };
            if correct < 0 || correct > i64::from(total) {
                warn!(student = student_id, correct, total, "answers out of range, entry skipped");
                skipped.push(json!({
                    "alunnoId": student_id,
                    "risposteEsatte": correct,
                    "reason": "answers_out_of_range",
                }));
                continue;
            }
            let correct = correct as u32;
            (
                scale::score_from_answers(correct, total),
                Some(Verification {
                    total_questions: total,
                    correct_answers: correct,
                    verification_date: date.clone(),
                    verification_note: verification_note.clone(),
                }),
            )
        } else {
            skipped.push(json!({ "alunnoId": student_id, "reason": "no_value" }));
            continue;
        };

        let id = match entry.get("id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        grades.push(Grade {
            id,
            student_id: student_id.to_string(),
            subject_id: subject_id.clone(),
            class_id: class_id.clone(),
            value,
            date: date.clone(),
            note: entry
                .get("note")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| note.clone()),
            term,
            verification,
        });
    }

    let mut inserted = Vec::new();
    let mut failure = None;
    for grade in &grades {
        if let Err(e) = store.insert(grade) {
            failure = Some(e);
            break;
        }
        inserted.push(grade.id.clone());
    }
    // Grades inserted before a failure stay stored.
    let outcome = match failure {
        None => Ok(json!({ "inserted": inserted, "skipped": skipped })),
        Some(e) => {
            let mut resp = store_err(&req.id, &e);
            resp["error"]["details"]["inserted"] = json!(inserted);
            Err(resp)
        }
    };
    helpers::finish_write(state, req, outcome)
}

fn handle_score_from_answers(_state: &mut AppState, req: &Request) -> Value {
    let correct = req.params.get("risposteEsatte").and_then(|v| v.as_u64());
    let total = req.params.get("numeroDomande").and_then(|v| v.as_u64());
    let (Some(correct), Some(total)) = (correct, total) else {
        return err(
            &req.id,
            "bad_params",
            "missing params.risposteEsatte or params.numeroDomande",
            None,
        );
    };
    let (Ok(correct), Ok(total)) = (u32::try_from(correct), u32::try_from(total)) else {
        return err(&req.id, "bad_params", "answer counts out of range", None);
    };
    if correct > total {
        return err(
            &req.id,
            "bad_params",
            "risposteEsatte exceeds numeroDomande",
            None,
        );
    }
    let level = scale::score_from_answers(correct, total);
    ok(
        &req.id,
        json!({
            "valore": level,
            "label": level.label(),
            "percentuale": scale::percentage(correct, total),
        }),
    )
}

/// Level spread over all grades, or the ones of one subject and/or class.
fn handle_grades_distribution(state: &mut AppState, req: &Request) -> Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let subject_id = helpers::optional_str(req, "materiaId");
    let class_id = helpers::optional_str(req, "classeId");
    let grades = match store.list::<Grade>() {
        Ok(g) => g,
        Err(e) => return store_err(&req.id, &e),
    };
    let selected: Vec<Grade> = grades
        .into_iter()
        .filter(|g| subject_id.as_ref().map_or(true, |m| &g.subject_id == m))
        .filter(|g| class_id.as_ref().map_or(true, |c| &g.class_id == c))
        .collect();
    ok(
        &req.id,
        json!({
            "total": selected.len(),
            "distribution": calc::grade_distribution(&selected),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "grades.list" => Some(helpers::handle_list::<Grade>(state, req)),
        "grades.get" => Some(helpers::handle_get::<Grade>(state, req)),
        "grades.byIndex" => Some(handle_grades_by_index(state, req)),
        "grades.byClass" => Some(handle_grades_by_class(state, req)),
        "grades.byStudent" => Some(handle_grades_by_student(state, req)),
        "grades.create" => Some(handle_grades_save(state, req, false)),
        "grades.createMany" => Some(handle_grades_create_many(state, req)),
        "grades.update" => Some(handle_grades_save(state, req, true)),
        "grades.delete" => Some(helpers::handle_remove(state, req, Store::remove_grade)),
        "grades.scoreFromAnswers" => Some(handle_score_from_answers(state, req)),
        "grades.distribution" => Some(handle_grades_distribution(state, req)),
        _ => None,
    }
}
