use crate::backup;
use crate::error::StoreError;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Store errors keep their own code; anything else is a file problem.
fn bundle_err(id: &str, e: &anyhow::Error) -> serde_json::Value {
    match e.downcast_ref::<StoreError>() {
        Some(store_error) => store_err(id, store_error),
        None => err(id, "io_failed", format!("{e:#}"), None),
    }
}

fn handle_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match helpers::required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };
    match backup::export_bundle(store, &out_path) {
        Ok(summary) => {
            info!(out = %out_path.display(), "workspace bundle exported");
            ok(
                &req.id,
                json!({
                    "path": out_path.to_string_lossy(),
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "snapshotSha256": summary.snapshot_sha256,
                    "counts": summary.counts,
                }),
            )
        }
        Err(e) => bundle_err(&req.id, &e),
    }
}

/// Replaces the gradebook with the bundle's snapshot.
fn handle_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match helpers::required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    let outcome = match backup::import_bundle(store, &in_path) {
        Ok(summary) => {
            info!(from = %in_path.display(), format = %summary.bundle_format_detected, "workspace bundle imported");
            Ok(json!({
                "bundleFormatDetected": summary.bundle_format_detected,
                "imported": summary.restored,
            }))
        }
        Err(e) => Err(bundle_err(&req.id, &e)),
    };
    helpers::finish_write(state, req, outcome)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_import_workspace_bundle(state, req)),
        _ => None,
    }
}
