mod test_support;

use serde_json::json;
use test_support::{request, request_err_code, request_ok, select_workspace, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("registro-router-smoke");
    let bundle_out = workspace.path().join("out").join("smoke.registro.zip");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").is_some_and(|v| v.is_null()));

    select_workspace(&mut stdin, &mut reader, workspace.path());

    let calls = [
        ("store.stats", json!({})),
        ("integrity.check", json!({})),
        ("classes.list", json!({})),
        ("classes.get", json!({ "id": "1" })),
        ("subjects.list", json!({})),
        ("subjects.get", json!({ "id": "2" })),
        ("students.list", json!({})),
        ("students.byClass", json!({ "classeId": "1" })),
        ("students.byIndex", json!({ "index": "classeId", "value": "1" })),
        ("grades.list", json!({})),
        ("grades.byIndex", json!({ "index": "quadrimestre", "value": 1 })),
        ("grades.byClass", json!({ "classeId": "1" })),
        ("grades.byStudent", json!({ "alunnoId": "nobody" })),
        ("grades.scoreFromAnswers", json!({ "risposteEsatte": 7, "numeroDomande": 10 })),
        ("grades.distribution", json!({})),
        ("averages.list", json!({})),
        ("averages.recompute", json!({})),
        ("snapshot.exportFull", json!({})),
        ("snapshot.exportGrades", json!({})),
        ("reports.classStatsModel", json!({ "classeId": "1" })),
        (
            "backup.exportWorkspaceBundle",
            json!({ "outPath": bundle_out.to_string_lossy() }),
        ),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        request_ok(&mut stdin, &mut reader, &format!("c{i}"), method, params);
    }
    assert!(bundle_out.is_file());

    let code = request_err_code(&mut stdin, &mut reader, "u1", "grades.teleport", json!({}));
    assert_eq!(code, "not_implemented");
}

#[test]
fn requests_before_workspace_select_are_refused() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    // Listing is allowed and simply empty.
    let classes = request_ok(&mut stdin, &mut reader, "1", "classes.list", json!({}));
    assert_eq!(classes["classes"], json!([]));

    for (i, method) in [
        "classes.create",
        "grades.create",
        "store.stats",
        "snapshot.exportFull",
        "snapshot.importFull",
        "averages.recompute",
        "reports.studentCardModel",
        "backup.exportWorkspaceBundle",
    ]
    .into_iter()
    .enumerate()
    {
        let code = request_err_code(&mut stdin, &mut reader, &format!("n{i}"), method, json!({}));
        assert_eq!(code, "no_workspace", "{method}");
    }
}

#[test]
fn malformed_lines_get_bad_json_and_the_loop_continues() {
    use std::io::{BufRead, Write};

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    let resp: serde_json::Value = serde_json::from_str(line.trim()).expect("json response");
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("bad_json"));

    let health = request(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(health["ok"], json!(true));
}

#[test]
fn missing_params_are_bad_params() {
    let workspace = temp_dir("registro-router-params");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, workspace.path());

    for (i, (method, params)) in [
        ("workspace.select", json!({})),
        ("classes.get", json!({})),
        ("students.byClass", json!({})),
        ("students.byIndex", json!({ "index": "nome", "value": "x" })),
        ("grades.byIndex", json!({ "index": "valore", "value": "ottimo" })),
        ("grades.scoreFromAnswers", json!({ "risposteEsatte": 11, "numeroDomande": 10 })),
        ("snapshot.importGrades", json!({ "text": "{}", "collisionPolicy": "merge" })),
        ("classes.create", json!({ "anno": "2024/2025" })),
    ]
    .into_iter()
    .enumerate()
    {
        let code = request_err_code(&mut stdin, &mut reader, &format!("p{i}"), method, params);
        assert_eq!(code, "bad_params", "{method}");
    }
}
