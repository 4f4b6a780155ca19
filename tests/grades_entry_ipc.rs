mod test_support;

use serde_json::json;
use test_support::{request_err_code, request_ok, select_workspace, spawn_sidecar, temp_dir};

#[test]
fn create_derives_class_and_value_from_context() {
    let workspace = temp_dir("registro-grades-create");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, workspace.path());

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({ "id": "s1", "nome": "Giulia", "cognome": "Neri", "classeId": "2" }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.create",
        json!({
            "alunnoId": "s1",
            "materiaId": "2",
            "data": "2025-03-10",
            "quadrimestre": 2,
            "tipoVerifica": {
                "numeroDomande": 12,
                "risposteEsatte": 10,
                "dataVerifica": "2025-03-10",
                "noteVerifica": "frazioni"
            }
        }),
    );
    let grade = &created["record"];
    assert_eq!(grade["classeId"], json!("2"));
    // 10/12 = 83.3% -> distinto
    assert_eq!(grade["valore"], json!("distinto"));
    assert_eq!(grade["note"], json!(""));
    assert_eq!(grade["tipoVerifica"]["risposteEsatte"], json!(10));
    let grade_id = grade["id"].as_str().expect("generated id").to_string();

    let fetched = request_ok(&mut stdin, &mut reader, "3", "grades.get", json!({ "id": grade_id }));
    assert_eq!(fetched["record"], created["record"]);

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "4",
        "grades.create",
        json!({ "alunnoId": "ghost", "materiaId": "2", "valore": "buono", "data": "2025-03-10", "quadrimestre": 1 }),
    );
    assert_eq!(code, "not_found");

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "5",
        "grades.create",
        json!({ "alunnoId": "s1", "materiaId": "2", "valore": "buono", "data": "2025-03-10", "quadrimestre": 3 }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "6",
        "grades.create",
        json!({ "alunnoId": "s1", "materiaId": "2", "data": "2025-03-10", "quadrimestre": 1 }),
    );
    assert_eq!(code, "bad_params");
}

#[test]
fn create_many_scores_answers_and_skips_out_of_range_entries() {
    let workspace = temp_dir("registro-grades-batch");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, workspace.path());

    for (i, id) in ["a", "b", "c", "d"].into_iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{i}"),
            "students.create",
            json!({ "id": id, "nome": "N", "cognome": id, "classeId": "1" }),
        );
    }

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "batch",
        "grades.createMany",
        json!({
            "materiaId": "3",
            "classeId": "1",
            "data": "2024-12-02",
            "quadrimestre": 1,
            "note": "verifica storia",
            "numeroDomande": 10,
            "entries": [
                { "alunnoId": "a", "risposteEsatte": 10 },
                { "alunnoId": "b", "risposteEsatte": 11 },
                { "alunnoId": "c", "valore": "sufficiente" },
                { "alunnoId": "d" }
            ]
        }),
    );
    assert_eq!(result["inserted"].as_array().map(|a| a.len()), Some(2));
    let skipped = result["skipped"].as_array().expect("skipped");
    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0]["alunnoId"], json!("b"));
    assert_eq!(skipped[0]["reason"], json!("answers_out_of_range"));
    assert_eq!(skipped[1]["reason"], json!("no_value"));

    let grades = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        "grades.byStudent",
        json!({ "alunnoId": "a" }),
    );
    let a = &grades["grades"][0];
    assert_eq!(a["valore"], json!("ottimo"));
    assert_eq!(a["note"], json!("verifica storia"));
    assert_eq!(a["tipoVerifica"]["numeroDomande"], json!(10));
    assert_eq!(a["tipoVerifica"]["dataVerifica"], json!("2024-12-02"));

    let dist = request_ok(
        &mut stdin,
        &mut reader,
        "dist",
        "grades.distribution",
        json!({ "materiaId": "3" }),
    );
    assert_eq!(dist["total"], json!(2));
    let shares = dist["distribution"].as_array().expect("distribution");
    assert_eq!(shares.len(), 6);
    assert_eq!(shares[0]["valore"], json!("ottimo"));
    assert_eq!(shares[0]["percentage"], json!(50.0));
    assert_eq!(shares[4]["label"], json!("Sufficiente"));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "bad",
        "grades.createMany",
        json!({
            "materiaId": "3",
            "classeId": "1",
            "data": "2024-12-02",
            "quadrimestre": 1,
            "entries": [{ "alunnoId": "a", "risposteEsatte": 3 }]
        }),
    );
    assert_eq!(code, "bad_params");
}

#[test]
fn score_from_answers_reports_level_label_and_percentage() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let scored = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.scoreFromAnswers",
        json!({ "risposteEsatte": 2, "numeroDomande": 3 }),
    );
    assert_eq!(scored["valore"], json!("discreto"));
    assert_eq!(scored["label"], json!("Discreto"));
    assert_eq!(scored["percentuale"], json!(67));

    let zero = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.scoreFromAnswers",
        json!({ "risposteEsatte": 0, "numeroDomande": 0 }),
    );
    assert_eq!(zero["valore"], json!("non-sufficiente"));
    assert_eq!(zero["percentuale"], json!(0));
}

#[test]
fn batch_stopped_by_a_taken_id_keeps_earlier_grades_in_the_averages() {
    let workspace = temp_dir("registro-grades-batch-partial");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, workspace.path());

    for (i, id) in ["a", "b"].into_iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{i}"),
            "students.create",
            json!({ "id": id, "nome": "N", "cognome": id, "classeId": "1" }),
        );
    }
    request_ok(
        &mut stdin,
        &mut reader,
        "taken",
        "grades.create",
        json!({ "id": "taken", "alunnoId": "b", "materiaId": "4", "valore": "buono", "data": "2024-10-01", "quadrimestre": 1 }),
    );

    let resp = test_support::request(
        &mut stdin,
        &mut reader,
        "batch",
        "grades.createMany",
        json!({
            "materiaId": "6",
            "classeId": "1",
            "data": "2024-12-09",
            "quadrimestre": 1,
            "entries": [
                { "id": "fresh", "alunnoId": "a", "valore": "ottimo" },
                { "id": "taken", "alunnoId": "b", "valore": "discreto" }
            ]
        }),
    );
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("duplicate_key"));
    assert_eq!(resp["error"]["details"]["inserted"], json!(["fresh"]));

    let averages = request_ok(
        &mut stdin,
        &mut reader,
        "avg",
        "averages.list",
        json!({ "alunnoId": "a", "materiaId": "6" }),
    );
    assert_eq!(averages["averages"][0]["mediaFinale"], json!("ottimo"));
    let fetched = request_ok(&mut stdin, &mut reader, "get", "grades.get", json!({ "id": "taken" }));
    assert_eq!(fetched["record"]["valore"], json!("buono"));
}
