//! Records held by the store.
//!
//! Field names on the wire follow the snapshot format written by earlier
//! versions of the gradebook, so files exported there import here unchanged.

use crate::scale::GradeLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "anno", default)]
    pub school_year: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(
        rename = "descrizione",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    #[serde(rename = "nome")]
    pub first_name: String,
    #[serde(rename = "cognome")]
    pub last_name: String,
    #[serde(
        rename = "dataNascita",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub birth_date: Option<String>,
    #[serde(rename = "classeId")]
    pub class_id: String,
}

impl Student {
    /// "lastName firstName", the key students are listed by.
    pub fn sort_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

/// Grading period within a school year. Only 1 and 2 exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Term(u8);

impl Term {
    pub const FIRST: Term = Term(1);
    pub const SECOND: Term = Term(2);

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Term {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 | 2 => Ok(Term(v)),
            other => Err(format!("term must be 1 or 2, got {other}")),
        }
    }
}

impl TryFrom<i64> for Term {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        u8::try_from(v)
            .map_err(|_| format!("term must be 1 or 2, got {v}"))
            .and_then(Term::try_from)
    }
}

impl From<Term> for u8 {
    fn from(t: Term) -> u8 {
        t.0
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    #[serde(rename = "numeroDomande")]
    pub total_questions: u32,
    #[serde(rename = "risposteEsatte")]
    pub correct_answers: u32,
    #[serde(rename = "dataVerifica", default)]
    pub verification_date: String,
    #[serde(rename = "noteVerifica", default)]
    pub verification_note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub id: String,
    #[serde(rename = "alunnoId")]
    pub student_id: String,
    #[serde(rename = "materiaId")]
    pub subject_id: String,
    #[serde(rename = "classeId")]
    pub class_id: String,
    #[serde(rename = "valore")]
    pub value: GradeLevel,
    #[serde(rename = "data")]
    pub date: String,
    #[serde(default)]
    pub note: String,
    #[serde(rename = "quadrimestre")]
    pub term: Term,
    #[serde(
        rename = "tipoVerifica",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub verification: Option<Verification>,
}

/// Derived per (student, subject) summary. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputedAverage {
    #[serde(rename = "alunnoId")]
    pub student_id: String,
    #[serde(rename = "materiaId")]
    pub subject_id: String,
    #[serde(rename = "quadrimestre1")]
    pub term1: Option<GradeLevel>,
    #[serde(rename = "quadrimestre2")]
    pub term2: Option<GradeLevel>,
    #[serde(rename = "mediaFinale")]
    pub final_average: Option<GradeLevel>,
}
