use crate::db;
use crate::error::{StoreError, StoreResult};
use crate::model::{Class, Grade, Student, Subject, Term, Verification};
use crate::scale::GradeLevel;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// A collection stored in its own table and keyed by `id`.
pub trait Record: Sized {
    /// Table name, also used in error messages.
    const COLLECTION: &'static str;
    const SELECT: &'static str;

    fn id(&self) -> &str;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn write(&self, conn: &Connection, verb: &str) -> rusqlite::Result<usize>;
    /// Order returned by `Store::list`.
    fn sort(records: &mut [Self]);
}

impl Record for Class {
    const COLLECTION: &'static str = "classes";
    const SELECT: &'static str = "SELECT id, name, school_year FROM classes";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Class {
            id: row.get(0)?,
            name: row.get(1)?,
            school_year: row.get(2)?,
        })
    }

    fn write(&self, conn: &Connection, verb: &str) -> rusqlite::Result<usize> {
        conn.execute(
            &format!("{verb} INTO classes(id, name, school_year) VALUES(?, ?, ?)"),
            params![self.id, self.name, self.school_year],
        )
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| locale_cmp(&a.name, &b.name));
    }
}

impl Record for Subject {
    const COLLECTION: &'static str = "subjects";
    const SELECT: &'static str = "SELECT id, name, description FROM subjects";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Subject {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
        })
    }

    fn write(&self, conn: &Connection, verb: &str) -> rusqlite::Result<usize> {
        conn.execute(
            &format!("{verb} INTO subjects(id, name, description) VALUES(?, ?, ?)"),
            params![self.id, self.name, self.description],
        )
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| locale_cmp(&a.name, &b.name));
    }
}

impl Record for Student {
    const COLLECTION: &'static str = "students";
    const SELECT: &'static str =
        "SELECT id, first_name, last_name, birth_date, class_id FROM students";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Student {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            birth_date: row.get(3)?,
            class_id: row.get(4)?,
        })
    }

    fn write(&self, conn: &Connection, verb: &str) -> rusqlite::Result<usize> {
        conn.execute(
            &format!(
                "{verb} INTO students(id, first_name, last_name, birth_date, class_id)
                 VALUES(?, ?, ?, ?, ?)"
            ),
            params![
                self.id,
                self.first_name,
                self.last_name,
                self.birth_date,
                self.class_id
            ],
        )
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| locale_cmp(&a.sort_name(), &b.sort_name()));
    }
}

impl Record for Grade {
    const COLLECTION: &'static str = "grades";
    const SELECT: &'static str = "SELECT id, student_id, subject_id, class_id, value, date, note,
            term, verification_total, verification_correct, verification_date,
            verification_note
         FROM grades";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let code: String = row.get(4)?;
        let value = GradeLevel::from_code(&code).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown grade value {code:?}").into(),
            )
        })?;
        let term_raw: i64 = row.get(7)?;
        let term = Term::try_from(term_raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Integer, e.into())
        })?;
        let total: Option<u32> = row.get(8)?;
        let correct: Option<u32> = row.get(9)?;
        let verification = match (total, correct) {
            (Some(total_questions), Some(correct_answers)) => Some(Verification {
                total_questions,
                correct_answers,
                verification_date: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
                verification_note: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
            }),
            _ => None,
        };
        Ok(Grade {
            id: row.get(0)?,
            student_id: row.get(1)?,
            subject_id: row.get(2)?,
            class_id: row.get(3)?,
            value,
            date: row.get(5)?,
            note: row.get(6)?,
            term,
            verification,
        })
    }

    fn write(&self, conn: &Connection, verb: &str) -> rusqlite::Result<usize> {
        let v = self.verification.as_ref();
        conn.execute(
            &format!(
                "{verb} INTO grades(id, student_id, subject_id, class_id, value, date, note,
                   term, verification_total, verification_correct, verification_date,
                   verification_note)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                self.id,
                self.student_id,
                self.subject_id,
                self.class_id,
                self.value.code(),
                self.date,
                self.note,
                self.term.get(),
                v.map(|v| v.total_questions),
                v.map(|v| v.correct_answers),
                v.map(|v| v.verification_date.as_str()),
                v.map(|v| v.verification_note.as_str()),
            ],
        )
    }

    fn sort(records: &mut [Self]) {
        sort_grades_by_date_desc(records);
    }
}

/// Case and accent insensitive comparison. Ties are broken by accents
/// (unaccented first), then by case (lowercase first), then by raw string.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| accent_key(a).cmp(&accent_key(b)))
        .then_with(|| case_key(a).cmp(case_key(b)))
        .then_with(|| a.cmp(b))
}

fn accent_key(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

fn case_key(s: &str) -> impl Iterator<Item = bool> + '_ {
    s.chars().map(char::is_uppercase)
}

fn collation_key(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'ö' | 'õ' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

fn parse_grade_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc())
}

/// Most recent first; dates that do not parse go last in stored order.
pub fn sort_grades_by_date_desc(grades: &mut [Grade]) {
    grades.sort_by(|a, b| match (parse_grade_date(&a.date), parse_grade_date(&b.date)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentIndex {
    Class,
}

impl StudentIndex {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "classeId" => Some(StudentIndex::Class),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            StudentIndex::Class => "class_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeIndex {
    Student,
    Subject,
    Class,
    Term,
    Date,
}

impl GradeIndex {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "alunnoId" => Some(GradeIndex::Student),
            "materiaId" => Some(GradeIndex::Subject),
            "classeId" => Some(GradeIndex::Class),
            "quadrimestre" => Some(GradeIndex::Term),
            "data" => Some(GradeIndex::Date),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            GradeIndex::Student => "student_id",
            GradeIndex::Subject => "subject_id",
            GradeIndex::Class => "class_id",
            GradeIndex::Term => "term",
            GradeIndex::Date => "date",
        }
    }
}

/// One deletion in a cascade, executed in list order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CascadeStep {
    GradesOfStudent(String),
    GradesOfSubject(String),
    GradesOfClass(String),
    Grade(String),
    Student(String),
    Subject(String),
    Class(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSummary {
    pub students_removed: usize,
    pub grades_removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub classes: i64,
    pub subjects: i64,
    pub students: i64,
    pub grades: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingKind {
    MissingStudent,
    MissingSubject,
    MissingClass,
    /// The grade's class differs from its student's current class.
    ClassMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingReference {
    pub grade_id: String,
    pub kind: DanglingKind,
    pub reference_id: String,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(workspace: &Path, seed: bool) -> StoreResult<Store> {
        let store = Store {
            conn: db::open_db(workspace)?,
        };
        if seed {
            store.seed_defaults()?;
        }
        info!(workspace = %workspace.to_string_lossy(), "store opened");
        Ok(store)
    }

    pub fn open_in_memory(seed: bool) -> StoreResult<Store> {
        let store = Store {
            conn: db::open_in_memory()?,
        };
        if seed {
            store.seed_defaults()?;
        }
        Ok(store)
    }

    /// Populates default classes and subjects when no class exists yet.
    pub fn seed_defaults(&self) -> StoreResult<bool> {
        if db::table_count(&self.conn, Class::COLLECTION)? > 0 {
            return Ok(false);
        }
        for (id, name) in [("1", "1A"), ("2", "2B"), ("3", "3C")] {
            self.upsert(&Class {
                id: id.to_string(),
                name: name.to_string(),
                school_year: "2024/2025".to_string(),
            })?;
        }
        let subjects = [
            ("1", "Italiano", "Lingua e letteratura italiana"),
            ("2", "Matematica", "Matematica e geometria"),
            ("3", "Storia", "Storia e geografia"),
            ("4", "Scienze", "Scienze naturali e sperimentali"),
            ("5", "Arte", "Arte e immagine"),
            ("6", "Musica", "Educazione musicale"),
            ("7", "Educazione Fisica", "Educazione fisica e sportiva"),
        ];
        for (id, name, description) in subjects {
            self.upsert(&Subject {
                id: id.to_string(),
                name: name.to_string(),
                description: Some(description.to_string()),
            })?;
        }
        info!("seeded default classes and subjects");
        Ok(true)
    }

    pub fn list<R: Record>(&self) -> StoreResult<Vec<R>> {
        let mut records = self.query::<R>(&format!("{} ORDER BY rowid", R::SELECT), &[])?;
        R::sort(&mut records);
        Ok(records)
    }

    pub fn get<R: Record>(&self, id: &str) -> StoreResult<R> {
        self.find::<R>(id)?.ok_or_else(|| StoreError::NotFound {
            collection: R::COLLECTION,
            id: id.to_string(),
        })
    }

    pub fn find<R: Record>(&self, id: &str) -> StoreResult<Option<R>> {
        let sql = format!("{} WHERE id = ?", R::SELECT);
        Ok(self
            .conn
            .query_row(&sql, [id], |row| R::from_row(row))
            .optional()?)
    }

    pub fn contains<R: Record>(&self, id: &str) -> StoreResult<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?", R::COLLECTION);
        let hit: Option<i64> = self.conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
        Ok(hit.is_some())
    }

    pub fn insert<R: Record>(&self, record: &R) -> StoreResult<()> {
        match record.write(&self.conn, "INSERT") {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateKey {
                    collection: R::COLLECTION,
                    id: record.id().to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn upsert<R: Record>(&self, record: &R) -> StoreResult<()> {
        record.write(&self.conn, "INSERT OR REPLACE")?;
        Ok(())
    }

    pub fn students_by_index(&self, index: StudentIndex, value: &str) -> StoreResult<Vec<Student>> {
        let sql = format!(
            "{} WHERE {} = ? ORDER BY rowid",
            Student::SELECT,
            index.column()
        );
        self.query::<Student>(&sql, &[&value])
    }

    pub fn grades_by_index(&self, index: GradeIndex, value: &str) -> StoreResult<Vec<Grade>> {
        let sql = format!(
            "{} WHERE {} = ? ORDER BY rowid",
            Grade::SELECT,
            index.column()
        );
        if index == GradeIndex::Term {
            let term: i64 = match value.trim().parse() {
                Ok(t) => t,
                Err(_) => return Ok(Vec::new()),
            };
            return self.query::<Grade>(&sql, &[&term]);
        }
        self.query::<Grade>(&sql, &[&value])
    }

    pub fn grades_by_class(&self, class_id: &str) -> StoreResult<Vec<Grade>> {
        let mut grades = self.grades_by_index(GradeIndex::Class, class_id)?;
        sort_grades_by_date_desc(&mut grades);
        Ok(grades)
    }

    pub fn grades_by_student(&self, student_id: &str) -> StoreResult<Vec<Grade>> {
        let mut grades = self.grades_by_index(GradeIndex::Student, student_id)?;
        sort_grades_by_date_desc(&mut grades);
        Ok(grades)
    }

    pub fn remove_class(&self, id: &str) -> StoreResult<RemoveSummary> {
        self.ensure_exists::<Class>(id)?;
        let mut steps = Vec::new();
        for student in self.students_by_index(StudentIndex::Class, id)? {
            steps.push(CascadeStep::GradesOfStudent(student.id.clone()));
            steps.push(CascadeStep::Student(student.id));
        }
        steps.push(CascadeStep::GradesOfClass(id.to_string()));
        steps.push(CascadeStep::Class(id.to_string()));
        self.run_cascade(steps)
    }

    pub fn remove_subject(&self, id: &str) -> StoreResult<RemoveSummary> {
        self.ensure_exists::<Subject>(id)?;
        self.run_cascade(vec![
            CascadeStep::GradesOfSubject(id.to_string()),
            CascadeStep::Subject(id.to_string()),
        ])
    }

    pub fn remove_student(&self, id: &str) -> StoreResult<RemoveSummary> {
        self.ensure_exists::<Student>(id)?;
        self.run_cascade(vec![
            CascadeStep::GradesOfStudent(id.to_string()),
            CascadeStep::Student(id.to_string()),
        ])
    }

    pub fn remove_grade(&self, id: &str) -> StoreResult<RemoveSummary> {
        self.ensure_exists::<Grade>(id)?;
        self.run_cascade(vec![CascadeStep::Grade(id.to_string())])
    }

    pub fn clear_all(&self) -> StoreResult<()> {
        for table in [
            Grade::COLLECTION,
            Student::COLLECTION,
            Subject::COLLECTION,
            Class::COLLECTION,
        ] {
            self.conn.execute(&format!("DELETE FROM {}", table), [])?;
        }
        Ok(())
    }

    pub fn counts(&self) -> StoreResult<StoreCounts> {
        Ok(StoreCounts {
            classes: db::table_count(&self.conn, Class::COLLECTION)?,
            subjects: db::table_count(&self.conn, Subject::COLLECTION)?,
            students: db::table_count(&self.conn, Student::COLLECTION)?,
            grades: db::table_count(&self.conn, Grade::COLLECTION)?,
        })
    }

    /// Grades whose parents are gone or whose class no longer matches the
    /// student's. Nothing is repaired.
    pub fn check_references(&self) -> StoreResult<Vec<DanglingReference>> {
        let class_ids: HashSet<String> = self
            .list::<Class>()?
            .into_iter()
            .map(|c| c.id)
            .collect();
        let subject_ids: HashSet<String> = self
            .list::<Subject>()?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let student_class: HashMap<String, String> = self
            .list::<Student>()?
            .into_iter()
            .map(|s| (s.id, s.class_id))
            .collect();

        let mut out = Vec::new();
        for g in self.list::<Grade>()? {
            let mut push = |kind, reference_id: &str| {
                out.push(DanglingReference {
                    grade_id: g.id.clone(),
                    kind,
                    reference_id: reference_id.to_string(),
                })
            };
            match student_class.get(&g.student_id) {
                None => push(DanglingKind::MissingStudent, &g.student_id),
                Some(cid) if *cid != g.class_id => push(DanglingKind::ClassMismatch, cid),
                Some(_) => {}
            }
            if !subject_ids.contains(&g.subject_id) {
                push(DanglingKind::MissingSubject, &g.subject_id);
            }
            if !class_ids.contains(&g.class_id) {
                push(DanglingKind::MissingClass, &g.class_id);
            }
        }
        Ok(out)
    }

    fn ensure_exists<R: Record>(&self, id: &str) -> StoreResult<()> {
        if self.contains::<R>(id)? {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                collection: R::COLLECTION,
                id: id.to_string(),
            })
        }
    }

    // Each step commits on its own. A failure leaves earlier steps applied.
    fn run_cascade(&self, steps: Vec<CascadeStep>) -> StoreResult<RemoveSummary> {
        let mut summary = RemoveSummary::default();
        for step in steps {
            let (sql, id) = match &step {
                CascadeStep::GradesOfStudent(id) => ("DELETE FROM grades WHERE student_id = ?", id),
                CascadeStep::GradesOfSubject(id) => ("DELETE FROM grades WHERE subject_id = ?", id),
                CascadeStep::GradesOfClass(id) => ("DELETE FROM grades WHERE class_id = ?", id),
                CascadeStep::Grade(id) => ("DELETE FROM grades WHERE id = ?", id),
                CascadeStep::Student(id) => ("DELETE FROM students WHERE id = ?", id),
                CascadeStep::Subject(id) => ("DELETE FROM subjects WHERE id = ?", id),
                CascadeStep::Class(id) => ("DELETE FROM classes WHERE id = ?", id),
            };
            let n = self.conn.execute(sql, [id])?;
            debug!(?step, removed = n, "cascade step");
            match step {
                CascadeStep::Student(_) => summary.students_removed += n,
                CascadeStep::Subject(_) | CascadeStep::Class(_) => {}
                _ => summary.grades_removed += n,
            }
        }
        Ok(summary)
    }

    fn query<R: Record>(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<R>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, |row| R::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
