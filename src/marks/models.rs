//! Mark Record Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectMark {
    pub subject: String,
    pub marks: f64,
    pub total: f64,
}

impl SubjectMark {
    /// Percentage with two decimals, `0.00` for a zero total
    pub fn percentage(&self) -> String {
        if self.total > 0.0 {
            format!("{:.2}", self.marks / self.total * 100.0)
        } else {
            "0.00".to_string()
        }
    }
}

/// One exam's results for a student
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    pub id: String,
    pub student_id: String,
    pub exam_type: String,
    pub subjects: Vec<SubjectMark>,
    pub date: DateTime<Utc>,
}

/// POST /api/marks body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMarks {
    pub student_id: String,
    pub exam_type: String,
    pub subjects: Vec<SubjectMark>,
}
