use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::warn;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match helpers::required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    match state.open_workspace(&path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            warn!(workspace = %path.display(), error = %e, "workspace open failed");
            store_err(&req.id, &e)
        }
    }
}

fn handle_store_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match store.counts() {
        Ok(counts) => ok(
            &req.id,
            json!({ "counts": counts, "averages": state.averages.len() }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Empties every collection. The default classes and subjects come back only
/// on the next open of the workspace.
fn handle_store_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = store.clear_all() {
        return store_err(&req.id, &e);
    }
    warn!("store cleared");
    if let Err(e) = state.recompute_averages() {
        return store_err(&req.id, &e);
    }
    ok(&req.id, json!({ "cleared": true }))
}

fn handle_integrity_check(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match store.check_references() {
        Ok(dangling) => ok(
            &req.id,
            json!({ "ok": dangling.is_empty(), "dangling": dangling }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "store.stats" => Some(handle_store_stats(state, req)),
        "store.clear" => Some(handle_store_clear(state, req)),
        "integrity.check" => Some(handle_integrity_check(state, req)),
        _ => None,
    }
}
