//! JSON snapshots of the store.
//!
//! Full shape: `{classi, materie, alunni, voti, timestamp, version}`.
//! Grades-only shape: `{voti, timestamp, version}`.

use crate::error::{StoreError, StoreResult};
use crate::model::{Class, Grade, Student, Subject};
use crate::store::{Record, Store};
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{info, warn};

pub const FORMAT_VERSION: &str = "1.0";

const KEY_CLASSES: &str = "classi";
const KEY_SUBJECTS: &str = "materie";
const KEY_STUDENTS: &str = "alunni";
const KEY_GRADES: &str = "voti";

#[derive(Serialize)]
struct FullSnapshot<'a> {
    classi: &'a [Class],
    materie: &'a [Subject],
    alunni: &'a [Student],
    voti: &'a [Grade],
    timestamp: String,
    version: &'static str,
}

#[derive(Serialize)]
struct GradesSnapshot<'a> {
    voti: &'a [Grade],
    timestamp: String,
    version: &'static str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub classes: usize,
    pub subjects: usize,
    pub students: usize,
    pub grades: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Leave the existing grade, report the id and go on.
    #[default]
    Skip,
    /// Refuse the whole payload before inserting anything.
    Abort,
}

impl CollisionPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skip" => Some(CollisionPolicy::Skip),
            "abort" => Some(CollisionPolicy::Abort),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CollisionPolicy::Skip => "skip",
            CollisionPolicy::Abort => "abort",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradesImportReport {
    pub inserted: usize,
    pub skipped_ids: Vec<String>,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn export_full(store: &Store) -> StoreResult<String> {
    let classes = store.list::<Class>()?;
    let subjects = store.list::<Subject>()?;
    let students = store.list::<Student>()?;
    let grades = store.list::<Grade>()?;
    let snap = FullSnapshot {
        classi: &classes,
        materie: &subjects,
        alunni: &students,
        voti: &grades,
        timestamp: timestamp(),
        version: FORMAT_VERSION,
    };
    Ok(serde_json::to_string_pretty(&snap)?)
}

pub fn export_grades(store: &Store) -> StoreResult<String> {
    let grades = store.list::<Grade>()?;
    let snap = GradesSnapshot {
        voti: &grades,
        timestamp: timestamp(),
        version: FORMAT_VERSION,
    };
    Ok(serde_json::to_string_pretty(&snap)?)
}

fn parse_root(text: &str) -> StoreResult<Map<String, Value>> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| StoreError::InvalidFormat(format!("payload is not valid JSON: {e}")))?;
    let Value::Object(map) = root else {
        return Err(StoreError::InvalidFormat(
            "snapshot root must be a JSON object".to_string(),
        ));
    };
    if let Some(v) = map.get("version").and_then(|v| v.as_str()) {
        if v != FORMAT_VERSION {
            warn!(version = v, "snapshot version differs from {}", FORMAT_VERSION);
        }
    }
    Ok(map)
}

/// Decodes `root[key]`. Absent or null means the key is not in the payload.
fn take_array<T: DeserializeOwned>(
    root: &mut Map<String, Value>,
    key: &str,
) -> StoreResult<Option<Vec<T>>> {
    match root.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Array(_)) => serde_json::from_value(v)
            .map(Some)
            .map_err(|e| StoreError::InvalidFormat(format!("{key}: {e}"))),
        Some(_) => Err(StoreError::InvalidFormat(format!("{key} must be an array"))),
    }
}

fn upsert_all<R: Record>(store: &Store, records: &[R]) -> StoreResult<usize> {
    for r in records {
        store.upsert(r)?;
    }
    Ok(records.len())
}

/// Replaces the whole store with the snapshot's contents.
///
/// The payload is decoded completely before anything is deleted, so a bad
/// file leaves the store as it was.
pub fn import_full(store: &Store, text: &str) -> StoreResult<ImportSummary> {
    let mut root = parse_root(text)?;
    let classes = take_array::<Class>(&mut root, KEY_CLASSES)?;
    let subjects = take_array::<Subject>(&mut root, KEY_SUBJECTS)?;
    let students = take_array::<Student>(&mut root, KEY_STUDENTS)?;
    let grades = take_array::<Grade>(&mut root, KEY_GRADES)?;
    if classes.is_none() && subjects.is_none() && students.is_none() && grades.is_none() {
        return Err(StoreError::InvalidFormat(format!(
            "expected at least one of {KEY_CLASSES}, {KEY_SUBJECTS}, {KEY_STUDENTS}, {KEY_GRADES}"
        )));
    }

    store.clear_all()?;
    // Parents before children.
    let summary = ImportSummary {
        classes: upsert_all(store, classes.as_deref().unwrap_or_default())?,
        subjects: upsert_all(store, subjects.as_deref().unwrap_or_default())?,
        students: upsert_all(store, students.as_deref().unwrap_or_default())?,
        grades: upsert_all(store, grades.as_deref().unwrap_or_default())?,
    };
    info!(
        classes = summary.classes,
        subjects = summary.subjects,
        students = summary.students,
        grades = summary.grades,
        "full snapshot imported"
    );
    Ok(summary)
}

/// Adds the snapshot's grades next to the existing ones.
pub fn import_grades(
    store: &Store,
    text: &str,
    policy: CollisionPolicy,
) -> StoreResult<GradesImportReport> {
    let mut root = parse_root(text)?;
    let Some(grades) = take_array::<Grade>(&mut root, KEY_GRADES)? else {
        return Err(StoreError::InvalidFormat(format!(
            "expected a {KEY_GRADES} array"
        )));
    };

    if policy == CollisionPolicy::Abort {
        let mut seen = HashSet::new();
        for g in &grades {
            if !seen.insert(g.id.as_str()) || store.contains::<Grade>(&g.id)? {
                return Err(StoreError::DuplicateKey {
                    collection: Grade::COLLECTION,
                    id: g.id.clone(),
                });
            }
        }
    }

    let mut report = GradesImportReport::default();
    for g in &grades {
        match store.insert(g) {
            Ok(()) => report.inserted += 1,
            Err(StoreError::DuplicateKey { id, .. }) => {
                warn!(grade_id = %id, "grade already present, skipped");
                report.skipped_ids.push(id);
            }
            Err(e) => return Err(e),
        }
    }
    info!(
        inserted = report.inserted,
        skipped = report.skipped_ids.len(),
        policy = policy.as_str(),
        "grades snapshot imported"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Term;
    use crate::scale::GradeLevel;
    use serde_json::json;

    fn sorted_ids<R: Record>(store: &Store) -> Vec<String> {
        let mut ids: Vec<String> = store
            .list::<R>()
            .expect("list")
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    fn grade(id: &str, student_id: &str) -> Grade {
        Grade {
            id: id.into(),
            student_id: student_id.into(),
            subject_id: "1".into(),
            class_id: "1".into(),
            value: GradeLevel::Fair,
            date: "2025-01-20".into(),
            note: "dettato".into(),
            term: Term::FIRST,
            verification: None,
        }
    }

    fn populated() -> Store {
        let store = Store::open_in_memory(true).expect("open");
        store
            .insert(&Student {
                id: "s1".into(),
                first_name: "Giulia".into(),
                last_name: "Conti".into(),
                birth_date: Some("2016-04-02".into()),
                class_id: "1".into(),
            })
            .expect("student");
        store.insert(&grade("g1", "s1")).expect("g1");
        store.insert(&grade("g2", "s1")).expect("g2");
        store
    }

    #[test]
    fn full_export_has_expected_shape() {
        let store = populated();
        let v: Value = serde_json::from_str(&export_full(&store).expect("export")).expect("json");
        for key in ["classi", "materie", "alunni", "voti", "timestamp", "version"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["version"], "1.0");
        assert_eq!(v["alunni"][0]["cognome"], "Conti");
        assert_eq!(v["voti"].as_array().map(|a| a.len()), Some(2));

        let g: Value = serde_json::from_str(&export_grades(&store).expect("export")).expect("json");
        assert!(g.get("classi").is_none());
        assert!(g.get("alunni").is_none());
        assert_eq!(g["voti"].as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn full_roundtrip_restores_every_collection() {
        let store = populated();
        let before = (
            store.list::<Class>().expect("c"),
            store.list::<Subject>().expect("m"),
            store.list::<Student>().expect("s"),
            store.list::<Grade>().expect("g"),
        );
        let text = export_full(&store).expect("export");
        store.clear_all().expect("wipe");
        let summary = import_full(&store, &text).expect("import");
        assert_eq!(
            summary,
            ImportSummary { classes: 3, subjects: 7, students: 1, grades: 2 }
        );
        let after = (
            store.list::<Class>().expect("c"),
            store.list::<Subject>().expect("m"),
            store.list::<Student>().expect("s"),
            store.list::<Grade>().expect("g"),
        );
        assert_eq!(before, after);
    }

    #[test]
    fn full_import_replaces_existing_records() {
        let store = populated();
        let payload = json!({
            "classi": [{ "id": "x", "nome": "4D", "anno": "2025/2026" }]
        });
        import_full(&store, &payload.to_string()).expect("import");
        assert_eq!(sorted_ids::<Class>(&store), vec!["x"]);
        assert!(sorted_ids::<Subject>(&store).is_empty());
        assert!(sorted_ids::<Student>(&store).is_empty());
        assert!(sorted_ids::<Grade>(&store).is_empty());
    }

    #[test]
    fn full_import_rejects_unrecognized_payloads() {
        let store = populated();
        for bad in [
            "not json",
            "[1, 2]",
            r#"{"timestamp": "x", "version": "1.0"}"#,
            r#"{"classi": null}"#,
            r#"{"classi": {"id": "1"}}"#,
            r#"{"voti": [{"id": "g", "valore": "eccellente"}]}"#,
        ] {
            match import_full(&store, bad) {
                Err(StoreError::InvalidFormat(_)) => {}
                other => panic!("{bad}: expected InvalidFormat, got {other:?}"),
            }
        }
        // Nothing was wiped by the failed attempts.
        assert_eq!(sorted_ids::<Grade>(&store), vec!["g1", "g2"]);
    }

    #[test]
    fn grades_import_is_additive() {
        let store = populated();
        let payload = json!({
            "voti": [grade("g3", "s1"), grade("g4", "s1")],
            "timestamp": "2025-01-01T00:00:00.000Z",
            "version": "1.0"
        });
        let report = import_grades(&store, &payload.to_string(), CollisionPolicy::Skip)
            .expect("import");
        assert_eq!(report.inserted, 2);
        assert!(report.skipped_ids.is_empty());
        let counts = store.counts().expect("counts");
        assert_eq!(counts.grades, 4);
        assert_eq!(counts.classes, 3);
        assert_eq!(counts.subjects, 7);
        assert_eq!(counts.students, 1);
    }

    #[test]
    fn grades_import_requires_voti_array() {
        let store = populated();
        for bad in [r#"{"classi": []}"#, r#"{"voti": "x"}"#, "42"] {
            assert!(matches!(
                import_grades(&store, bad, CollisionPolicy::Skip),
                Err(StoreError::InvalidFormat(_))
            ));
        }
    }

    #[test]
    fn grades_import_skips_collisions_by_default() {
        let store = populated();
        let payload = json!({ "voti": [grade("g1", "s1"), grade("g9", "s1"), grade("g9", "s1")] });
        let report = import_grades(&store, &payload.to_string(), CollisionPolicy::default())
            .expect("import");
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped_ids, vec!["g1", "g9"]);
        assert_eq!(sorted_ids::<Grade>(&store), vec!["g1", "g2", "g9"]);
    }

    #[test]
    fn grades_import_abort_inserts_nothing() {
        let store = populated();
        let payload = json!({ "voti": [grade("g7", "s1"), grade("g2", "s1")] });
        match import_grades(&store, &payload.to_string(), CollisionPolicy::Abort) {
            Err(StoreError::DuplicateKey { id, .. }) => assert_eq!(id, "g2"),
            other => panic!("expected DuplicateKey, got {other:?}"),
        }
        assert_eq!(sorted_ids::<Grade>(&store), vec!["g1", "g2"]);
    }
}
