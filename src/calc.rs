use crate::model::{ComputedAverage, Grade, Student, Subject, Term};
use crate::scale::{level_from_numeric_average, GradeLevel};
use serde::Serialize;
use std::collections::HashMap;

/// Mean of the levels' weights mapped back onto the scale.
pub fn term_average<I>(levels: I) -> Option<GradeLevel>
where
    I: IntoIterator<Item = GradeLevel>,
{
    let mut sum: u32 = 0;
    let mut n: u32 = 0;
    for l in levels {
        sum += u32::from(l.weight());
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some(level_from_numeric_average(sum as f64 / n as f64))
}

/// Combines the two term averages. With only one present it is the final.
pub fn final_average(term1: Option<GradeLevel>, term2: Option<GradeLevel>) -> Option<GradeLevel> {
    match (term1, term2) {
        (Some(a), Some(b)) => Some(level_from_numeric_average(
            (f64::from(a.weight()) + f64::from(b.weight())) / 2.0,
        )),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[derive(Default)]
struct PairGrades {
    term1: Vec<GradeLevel>,
    term2: Vec<GradeLevel>,
}

/// Averages for every (student, subject) pair that has grades.
///
/// Pairs come out in student order, then subject order, as given. Grades
/// pointing at a student or subject not in the inputs are ignored.
pub fn compute_averages(
    students: &[Student],
    subjects: &[Subject],
    grades: &[Grade],
) -> Vec<ComputedAverage> {
    let mut by_pair: HashMap<(&str, &str), PairGrades> = HashMap::new();
    for g in grades {
        let entry = by_pair
            .entry((g.student_id.as_str(), g.subject_id.as_str()))
            .or_default();
        if g.term == Term::FIRST {
            entry.term1.push(g.value);
        } else {
            entry.term2.push(g.value);
        }
    }

    let mut out = Vec::new();
    for student in students {
        for subject in subjects {
            let Some(pair) = by_pair.get(&(student.id.as_str(), subject.id.as_str())) else {
                continue;
            };
            let term1 = term_average(pair.term1.iter().copied());
            let term2 = term_average(pair.term2.iter().copied());
            let final_avg = final_average(term1, term2);
            if term1.is_none() && term2.is_none() && final_avg.is_none() {
                continue;
            }
            out.push(ComputedAverage {
                student_id: student.id.clone(),
                subject_id: subject.id.clone(),
                term1,
                term2,
                final_average: final_avg,
            });
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelShare {
    #[serde(rename = "valore")]
    pub level: GradeLevel,
    pub label: &'static str,
    pub count: usize,
    /// Share of all grades in the set, two decimals.
    pub percentage: f64,
}

/// How a set of grades spreads over the six levels, highest level first.
pub fn grade_distribution(grades: &[Grade]) -> Vec<LevelShare> {
    let total = grades.len();
    if total == 0 {
        return Vec::new();
    }
    GradeLevel::ALL
        .into_iter()
        .map(|level| {
            let count = grades.iter().filter(|g| g.value == level).count();
            let pct = (count as f64 / total as f64) * 100.0;
            LevelShare {
                level,
                label: level.label(),
                count,
                percentage: (pct * 100.0).round() / 100.0,
            }
        })
        .collect()
}
