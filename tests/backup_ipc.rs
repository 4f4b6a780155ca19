mod test_support;

use serde_json::json;
use test_support::{request_err_code, request_ok, select_workspace, spawn_sidecar, temp_dir};

#[test]
fn bundle_import_restores_the_exported_gradebook() {
    let workspace = temp_dir("registro-backup-ipc");
    let out = temp_dir("registro-backup-ipc-out");
    let bundle = out.path().join("registro.zip");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, workspace.path());

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "id": "s1", "nome": "Pia", "cognome": "Ferri", "classeId": "1" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.create",
        json!({ "id": "g1", "alunnoId": "s1", "materiaId": "1", "valore": "ottimo", "data": "2024-10-01", "quadrimestre": 1 }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], json!("registro-bundle-v1"));
    assert_eq!(exported["entryCount"], json!(2));
    assert_eq!(exported["counts"]["grades"], json!(1));

    request_ok(&mut stdin, &mut reader, "4", "students.delete", json!({ "id": "s1" }));
    request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.create",
        json!({ "id": "c9", "nome": "5E" }),
    );
    let averages = request_ok(&mut stdin, &mut reader, "6", "averages.list", json!({}));
    assert_eq!(averages["averages"], json!([]));

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["bundleFormatDetected"], json!("registro-bundle-v1"));
    assert_eq!(imported["imported"]["grades"], json!(1));

    let student = request_ok(&mut stdin, &mut reader, "8", "students.get", json!({ "id": "s1" }));
    assert_eq!(student["record"]["cognome"], json!("Ferri"));
    let code = request_err_code(&mut stdin, &mut reader, "9", "classes.get", json!({ "id": "c9" }));
    assert_eq!(code, "not_found");
    let averages = request_ok(&mut stdin, &mut reader, "10", "averages.list", json!({}));
    assert_eq!(averages["averages"][0]["mediaFinale"], json!("ottimo"));

    // Failed imports keep the current gradebook.
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "11",
        "backup.importWorkspaceBundle",
        json!({ "inPath": out.path().join("missing.zip").to_string_lossy() }),
    );
    assert_eq!(code, "io_failed");

    let not_a_snapshot = out.path().join("notes.json");
    std::fs::write(&not_a_snapshot, r#"{"appunti":[]}"#).expect("write file");
    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "12",
        "backup.importWorkspaceBundle",
        json!({ "inPath": not_a_snapshot.to_string_lossy() }),
    );
    assert_eq!(code, "invalid_format");

    let stats = request_ok(&mut stdin, &mut reader, "13", "store.stats", json!({}));
    assert_eq!(stats["counts"]["students"], json!(1));
    assert_eq!(stats["counts"]["grades"], json!(1));
}

#[test]
fn plain_snapshot_file_restores_through_the_bundle_method() {
    let workspace = temp_dir("registro-backup-plain");
    let out = temp_dir("registro-backup-plain-out");
    let file = out.path().join("registro.json");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, workspace.path());

    std::fs::write(
        &file,
        json!({
            "classi": [{ "id": "c1", "nome": "4D", "anno": "2024/2025" }],
            "alunni": [{ "id": "s1", "nome": "Ada", "cognome": "Neri", "classeId": "c1" }],
            "version": "1.0",
        })
        .to_string(),
    )
    .expect("write snapshot");

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "backup.importWorkspaceBundle",
        json!({ "inPath": file.to_string_lossy() }),
    );
    assert_eq!(imported["bundleFormatDetected"], json!("registro-snapshot-json"));
    let stats = request_ok(&mut stdin, &mut reader, "2", "store.stats", json!({}));
    assert_eq!(stats["counts"]["classes"], json!(1));
    assert_eq!(stats["counts"]["subjects"], json!(0));
    assert_eq!(stats["counts"]["students"], json!(1));
}
