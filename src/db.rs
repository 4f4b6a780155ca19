use crate::error::{StoreError, StoreResult};
use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "registro.sqlite3";
pub const SCHEMA_VERSION: i64 = 1;

pub fn open_db(workspace: &Path) -> StoreResult<Connection> {
    std::fs::create_dir_all(workspace).map_err(|e| {
        StoreError::StorageUnavailable(format!(
            "cannot create workspace {}: {e}",
            workspace.to_string_lossy()
        ))
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path).map_err(|e| {
        StoreError::StorageUnavailable(format!("cannot open {}: {e}", db_path.to_string_lossy()))
    })?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> StoreResult<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
    if version > SCHEMA_VERSION {
        return Err(StoreError::StorageUnavailable(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    // No SQL foreign keys: parent removal cascades explicitly in the store.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            school_year TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_name ON classes(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_name ON subjects(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            birth_date TEXT,
            class_id TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_last_name ON students(last_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            value TEXT NOT NULL,
            date TEXT NOT NULL,
            note TEXT NOT NULL,
            term INTEGER NOT NULL,
            verification_total INTEGER,
            verification_correct INTEGER,
            verification_date TEXT,
            verification_note TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_subject ON grades(subject_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_class ON grades(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_term ON grades(term)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_date ON grades(date)",
        [],
    )?;

    if version < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))?;
    }
    Ok(())
}

pub fn table_count(conn: &Connection, table: &str) -> StoreResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    Ok(conn.query_row(&sql, [], |r| r.get(0))?)
}
