//! Marks Store
//! Mission: Keep exam results per student and render them as downloadable reports

use crate::error::{PortalError, PortalResult};
use crate::marks::models::{MarkRecord, NewMarks};
use crate::storage::Collection;
use chrono::Utc;
use std::fmt::Write;
use tracing::info;
use uuid::Uuid;

pub const CSV_HEADER: &str = "Exam Type,Subject,Marks Obtained,Total Marks,Percentage,Date";

pub struct MarksStore {
    marks: Collection<MarkRecord>,
}

impl MarksStore {
    pub fn new(marks: Collection<MarkRecord>) -> Self {
        Self { marks }
    }

    /// The student id is stored as given
    pub fn add(&self, new_marks: NewMarks) -> PortalResult<MarkRecord> {
        if new_marks.student_id.trim().is_empty() {
            return Err(PortalError::Validation("Student id is required".to_string()));
        }
        let exam_type = new_marks.exam_type.trim().to_string();
        if exam_type.is_empty() {
            return Err(PortalError::Validation("Exam type is required".to_string()));
        }
        if new_marks.subjects.is_empty() {
            return Err(PortalError::Validation(
                "At least one subject is required".to_string(),
            ));
        }

        let record = MarkRecord {
            id: Uuid::new_v4().to_string(),
            student_id: new_marks.student_id,
            exam_type,
            subjects: new_marks.subjects,
            date: Utc::now(),
        };

        let record = self.marks.mutate(|all| {
            all.push(record.clone());
            Ok::<_, PortalError>(record)
        })?;

        info!(
            mark_id = %record.id,
            student_id = %record.student_id,
            subjects = record.subjects.len(),
            "📊 Marks recorded"
        );
        Ok(record)
    }

    pub fn list_for_student(&self, student_id: &str) -> Vec<MarkRecord> {
        self.marks.read(|all| {
            all.iter()
                .filter(|m| m.student_id == student_id)
                .cloned()
                .collect()
        })
    }

    /// One CSV row per subject across all of the student's records
    pub fn csv_report(&self, student_id: &str) -> String {
        let records = self.list_for_student(student_id);

        let mut csv = String::with_capacity(64 * (records.len() + 1));
        csv.push_str(CSV_HEADER);
        csv.push('\n');
        for record in &records {
            let date = record.date.format("%Y-%m-%d");
            for sub in &record.subjects {
                let _ = writeln!(
                    csv,
                    "{},{},{},{},{}%,{}",
                    quote(&record.exam_type),
                    quote(&sub.subject),
                    sub.marks,
                    sub.total,
                    sub.percentage(),
                    date
                );
            }
        }
        csv
    }
}

/// `Report_<name>.csv` with whitespace runs collapsed to `_`
pub fn report_filename(student_name: &str) -> String {
    let name = student_name.split_whitespace().collect::<Vec<_>>().join("_");
    if name.is_empty() {
        "Report_Student.csv".to_string()
    } else {
        format!("Report_{}.csv", name)
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
