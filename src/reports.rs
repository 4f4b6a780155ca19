use crate::calc::{self, LevelShare};
use crate::error::StoreResult;
use crate::model::{Class, ComputedAverage, Grade, Student, Subject, Term};
use crate::scale::GradeLevel;
use crate::store::{GradeIndex, Record, Store, StudentIndex};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCard {
    pub subject: Subject,
    pub term1_grades: Vec<Grade>,
    pub term2_grades: Vec<Grade>,
    pub average: Option<ComputedAverage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCardModel {
    pub student: Student,
    pub class: Option<Class>,
    pub total_grades: usize,
    pub subjects_with_grades: usize,
    pub subjects: Vec<SubjectCard>,
}

/// Individual report card: every subject the student has grades or an
/// average in, grades split by term in list order.
pub fn student_card(
    store: &Store,
    averages: &[ComputedAverage],
    student_id: &str,
) -> StoreResult<StudentCardModel> {
    let student: Student = store.get(student_id)?;
    let class = store.find::<Class>(&student.class_id)?;
    let grades = store.grades_by_student(student_id)?;
    let subjects_with_grades = grades
        .iter()
        .map(|g| g.subject_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let mut cards = Vec::new();
    for subject in store.list::<Subject>()? {
        let (term1_grades, term2_grades): (Vec<Grade>, Vec<Grade>) = grades
            .iter()
            .filter(|g| g.subject_id == subject.id)
            .cloned()
            .partition(|g| g.term == Term::FIRST);
        let average = averages
            .iter()
            .find(|a| a.student_id == student.id && a.subject_id == subject.id)
            .cloned();
        if term1_grades.is_empty() && term2_grades.is_empty() && average.is_none() {
            continue;
        }
        cards.push(SubjectCard {
            subject,
            term1_grades,
            term2_grades,
            average,
        });
    }

    Ok(StudentCardModel {
        student,
        class,
        total_grades: grades.len(),
        subjects_with_grades,
        subjects: cards,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub subject: Subject,
    pub grade_count: usize,
    pub distribution: Vec<LevelShare>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalRow {
    pub student_id: String,
    pub name: String,
    /// One entry per subject in `ClassStatsModel::subject_ids` order.
    pub finals: Vec<Option<GradeLevel>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatsModel {
    pub class: Class,
    pub student_count: usize,
    pub grade_count: usize,
    pub subject_count: usize,
    pub grades_per_student: usize,
    pub subjects: Vec<SubjectStats>,
    pub subject_ids: Vec<String>,
    pub finals: Vec<FinalRow>,
}

pub fn class_stats(
    store: &Store,
    averages: &[ComputedAverage],
    class_id: &str,
) -> StoreResult<ClassStatsModel> {
    let class: Class = store.get(class_id)?;
    let mut students = store.students_by_index(StudentIndex::Class, class_id)?;
    Student::sort(&mut students);
    let grades = store.grades_by_index(GradeIndex::Class, class_id)?;
    let subjects = store.list::<Subject>()?;

    let grades_per_student = if students.is_empty() {
        0
    } else {
        (grades.len() as f64 / students.len() as f64).round() as usize
    };

    let mut subject_stats = Vec::new();
    for subject in &subjects {
        let of_subject: Vec<Grade> = grades
            .iter()
            .filter(|g| g.subject_id == subject.id)
            .cloned()
            .collect();
        if of_subject.is_empty() {
            continue;
        }
        subject_stats.push(SubjectStats {
            subject: subject.clone(),
            grade_count: of_subject.len(),
            distribution: calc::grade_distribution(&of_subject),
        });
    }

    let finals = students
        .iter()
        .map(|s| FinalRow {
            student_id: s.id.clone(),
            name: s.sort_name(),
            finals: subjects
                .iter()
                .map(|m| {
                    averages
                        .iter()
                        .find(|a| a.student_id == s.id && a.subject_id == m.id)
                        .and_then(|a| a.final_average)
                })
                .collect(),
        })
        .collect();

    Ok(ClassStatsModel {
        class,
        student_count: students.len(),
        grade_count: grades.len(),
        subject_count: subjects.len(),
        grades_per_student,
        subjects: subject_stats,
        subject_ids: subjects.into_iter().map(|m| m.id).collect(),
        finals,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRow {
    pub student_id: String,
    pub name: String,
    /// One entry per date in `ClassRegisterModel::dates`.
    pub cells: Vec<Option<Grade>>,
    pub term_average: Option<GradeLevel>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRegisterModel {
    pub class: Class,
    pub subject: Subject,
    pub term: Term,
    pub student_count: usize,
    pub grade_count: usize,
    /// Distinct grade dates, ascending. Empty when the period has no grades.
    pub dates: Vec<String>,
    pub rows: Vec<RegisterRow>,
}

/// Register sheet for one class, subject and term: a column per grade
/// date and a row per student of the class.
pub fn class_register(
    store: &Store,
    averages: &[ComputedAverage],
    class_id: &str,
    subject_id: &str,
    term: Term,
) -> StoreResult<ClassRegisterModel> {
    let class: Class = store.get(class_id)?;
    let subject: Subject = store.get(subject_id)?;
    let mut students = store.students_by_index(StudentIndex::Class, class_id)?;
    Student::sort(&mut students);
    let grades: Vec<Grade> = store
        .grades_by_index(GradeIndex::Class, class_id)?
        .into_iter()
        .filter(|g| g.subject_id == subject_id && g.term == term)
        .collect();

    let dates: Vec<String> = grades
        .iter()
        .map(|g| g.date.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rows = students
        .iter()
        .map(|s| RegisterRow {
            student_id: s.id.clone(),
            name: s.sort_name(),
            cells: dates
                .iter()
                .map(|d| {
                    grades
                        .iter()
                        .find(|g| g.student_id == s.id && &g.date == d)
                        .cloned()
                })
                .collect(),
            term_average: averages
                .iter()
                .find(|a| a.student_id == s.id && a.subject_id == subject_id)
                .and_then(|a| if term == Term::FIRST { a.term1 } else { a.term2 }),
        })
        .collect();

    Ok(ClassRegisterModel {
        class,
        subject,
        term,
        student_count: students.len(),
        grade_count: grades.len(),
        dates,
        rows,
    })
}
