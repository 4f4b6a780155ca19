use crate::error::StoreResult;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use crate::snapshot::{self, CollisionPolicy};
use crate::store::Store;
use anyhow::Context;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Returns the text inline, or writes it to `params.path` when given.
fn handle_export(
    state: &mut AppState,
    req: &Request,
    export: fn(&Store) -> StoreResult<String>,
) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let text = match export(store) {
        Ok(t) => t,
        Err(e) => return store_err(&req.id, &e),
    };
    let Some(path) = helpers::optional_str(req, "path").map(PathBuf::from) else {
        return ok(&req.id, json!({ "text": text }));
    };
    let written = write_text(&path, &text);
    match written {
        Ok(()) => {
            info!(path = %path.display(), bytes = text.len(), "snapshot written");
            ok(
                &req.id,
                json!({ "path": path.to_string_lossy(), "bytes": text.len() }),
            )
        }
        Err(e) => err(&req.id, "io_failed", format!("{e:#}"), None),
    }
}

fn write_text(path: &std::path::Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    std::fs::write(path, text)
        .with_context(|| format!("failed to write snapshot {}", path.to_string_lossy()))
}

/// The payload comes from `params.text` or from the file at `params.path`.
fn input_text(req: &Request) -> Result<String, serde_json::Value> {
    if let Some(text) = helpers::optional_str(req, "text") {
        return Ok(text);
    }
    let Some(path) = helpers::optional_str(req, "path") else {
        return Err(err(
            &req.id,
            "bad_params",
            "missing params.text or params.path",
            None,
        ));
    };
    std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read snapshot {path}"))
        .map_err(|e| err(&req.id, "io_failed", format!("{e:#}"), None))
}

fn handle_import_full(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let text = match input_text(req) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let summary = match snapshot::import_full(store, &text) {
        Ok(s) => s,
        Err(e) => return store_err(&req.id, &e),
    };
    if let Err(e) = state.recompute_averages() {
        return store_err(&req.id, &e);
    }
    ok(&req.id, json!({ "imported": summary }))
}

fn handle_import_grades(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let policy = match helpers::optional_str(req, "collisionPolicy") {
        None => CollisionPolicy::default(),
        Some(name) => match CollisionPolicy::parse(&name) {
            Some(p) => p,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown collisionPolicy: {name}"),
                    Some(json!({ "allowed": ["skip", "abort"] })),
                )
            }
        },
    };
    let text = match input_text(req) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let report = match snapshot::import_grades(store, &text, policy) {
        Ok(r) => r,
        Err(e) => return store_err(&req.id, &e),
    };
    if let Err(e) = state.recompute_averages() {
        return store_err(&req.id, &e);
    }
    ok(
        &req.id,
        json!({ "report": report, "collisionPolicy": policy.as_str() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "snapshot.exportFull" => Some(handle_export(state, req, snapshot::export_full)),
        "snapshot.exportGrades" => Some(handle_export(state, req, snapshot::export_grades)),
        "snapshot.importFull" => Some(handle_import_full(state, req)),
        "snapshot.importGrades" => Some(handle_import_grades(state, req)),
        _ => None,
    }
}
