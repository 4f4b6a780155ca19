use serde::{Deserialize, Serialize};

/// Qualitative grade levels used by Italian primary schools.
///
/// Weights are not evenly spaced: `Insufficient` sits at 4, two points below
/// `Sufficient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GradeLevel {
    #[serde(rename = "non-sufficiente")]
    Insufficient,
    #[serde(rename = "sufficiente")]
    Sufficient,
    #[serde(rename = "discreto")]
    Fair,
    #[serde(rename = "buono")]
    Good,
    #[serde(rename = "distinto")]
    Distinguished,
    #[serde(rename = "ottimo")]
    Excellent,
}

impl GradeLevel {
    /// Highest first, the order reports and distributions use.
    pub const ALL: [GradeLevel; 6] = [
        GradeLevel::Excellent,
        GradeLevel::Distinguished,
        GradeLevel::Good,
        GradeLevel::Fair,
        GradeLevel::Sufficient,
        GradeLevel::Insufficient,
    ];

    pub fn weight(self) -> u8 {
        match self {
            GradeLevel::Excellent => 10,
            GradeLevel::Distinguished => 9,
            GradeLevel::Good => 8,
            GradeLevel::Fair => 7,
            GradeLevel::Sufficient => 6,
            GradeLevel::Insufficient => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeLevel::Excellent => "Ottimo",
            GradeLevel::Distinguished => "Distinto",
            GradeLevel::Good => "Buono",
            GradeLevel::Fair => "Discreto",
            GradeLevel::Sufficient => "Sufficiente",
            GradeLevel::Insufficient => "Non Sufficiente",
        }
    }

    /// Wire code stored in the database and in snapshots.
    pub fn code(self) -> &'static str {
        match self {
            GradeLevel::Excellent => "ottimo",
            GradeLevel::Distinguished => "distinto",
            GradeLevel::Good => "buono",
            GradeLevel::Fair => "discreto",
            GradeLevel::Sufficient => "sufficiente",
            GradeLevel::Insufficient => "non-sufficiente",
        }
    }

    pub fn from_code(code: &str) -> Option<GradeLevel> {
        GradeLevel::ALL.into_iter().find(|l| l.code() == code)
    }
}

/// Grade for a quiz-style verification.
///
/// Thresholds are inclusive lower bounds checked top-down on the unrounded
/// percentage. Zero questions yields `Insufficient`.
pub fn score_from_answers(correct: u32, total: u32) -> GradeLevel {
    if total == 0 {
        return GradeLevel::Insufficient;
    }
    let pct = (correct as f64 / total as f64) * 100.0;
    if pct >= 90.0 {
        GradeLevel::Excellent
    } else if pct >= 80.0 {
        GradeLevel::Distinguished
    } else if pct >= 70.0 {
        GradeLevel::Good
    } else if pct >= 60.0 {
        GradeLevel::Fair
    } else if pct >= 50.0 {
        GradeLevel::Sufficient
    } else {
        GradeLevel::Insufficient
    }
}

/// Maps a numeric mean of weights back onto the scale.
///
/// Breakpoints are the midpoints between adjacent weights, except the
/// sufficient/insufficient break which sits at 6 itself.
pub fn level_from_numeric_average(x: f64) -> GradeLevel {
    if x >= 9.5 {
        GradeLevel::Excellent
    } else if x >= 8.5 {
        GradeLevel::Distinguished
    } else if x >= 7.5 {
        GradeLevel::Good
    } else if x >= 6.5 {
        GradeLevel::Fair
    } else if x >= 6.0 {
        GradeLevel::Sufficient
    } else {
        GradeLevel::Insufficient
    }
}

/// Whole-number percentage for display next to a verification result.
pub fn percentage(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}
