//! Student Request Models

use crate::auth::models::{NewUser, Profile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// New-student fields a teacher proposes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl NewStudent {
    /// Registration fields with the role fixed to student
    pub fn to_new_user(&self) -> NewUser {
        NewUser {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            password: None,
            profile: Profile::Student {
                roll_number: self.roll_number.clone(),
                class_name: self.class_name.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemovalTarget {
    pub student_id: String,
}

/// What the teacher is asking for, as `{"type": ..., "studentData": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "studentData", rename_all = "lowercase")]
pub enum RequestPayload {
    Add(NewStudent),
    Delete(RemovalTarget),
}

impl RequestPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestPayload::Add(_) => "add",
            RequestPayload::Delete(_) => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Account change carried out once a request is approved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Provisioning {
    Pending,
    Completed {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRequest {
    pub id: String,
    #[serde(flatten)]
    pub payload: RequestPayload,
    pub teacher_id: String,
    pub teacher_name: String,
    pub reason: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub reviewer_name: Option<String>,
    #[serde(default)]
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning: Option<Provisioning>,
}

impl StudentRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// Teacher submission body
#[derive(Debug, Clone, Deserialize)]
pub struct RequestSubmission {
    #[serde(flatten)]
    pub payload: RequestPayload,
    #[serde(default)]
    pub reason: String,
}

/// Admin review body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewBody {
    #[serde(default)]
    pub note: Option<String>,
}

/// Who performed a review
#[derive(Debug, Clone)]
pub struct Reviewer {
    pub id: String,
    pub name: String,
}
