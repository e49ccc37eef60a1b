//! Request Ledger
//! Mission: Record teacher requests and enforce their one-way review lifecycle

use crate::error::{PortalError, PortalResult};
use crate::requests::models::{
    Provisioning, RequestPayload, RequestStatus, RequestSubmission, Reviewer, StudentRequest,
};
use crate::storage::Collection;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct RequestLedger {
    requests: Collection<StudentRequest>,
}

impl RequestLedger {
    pub fn new(requests: Collection<StudentRequest>) -> Self {
        Self { requests }
    }

    /// Store a new `pending` request.
    ///
    /// The submitting teacher is trusted as given; the HTTP layer checks roles.
    pub fn create(
        &self,
        submission: RequestSubmission,
        teacher_id: &str,
        teacher_name: &str,
    ) -> PortalResult<StudentRequest> {
        validate_payload(&submission.payload)?;

        let request = StudentRequest {
            id: Uuid::new_v4().to_string(),
            payload: submission.payload,
            teacher_id: teacher_id.to_string(),
            teacher_name: teacher_name.to_string(),
            reason: submission.reason.trim().to_string(),
            status: RequestStatus::Pending,
            reviewed_by: None,
            reviewer_name: None,
            review_note: None,
            created_at: Utc::now(),
            reviewed_at: None,
            provisioning: None,
        };

        let stored = self.requests.mutate(|all| {
            all.push(request.clone());
            Ok::<_, PortalError>(request)
        })?;

        info!(
            request_id = %stored.id,
            teacher_id = %teacher_id,
            kind = stored.payload.kind(),
            "📝 Student request submitted"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &str) -> PortalResult<StudentRequest> {
        self.requests
            .read(|all| all.iter().find(|r| r.id == id).cloned())
            .ok_or(PortalError::NotFound("Request"))
    }

    pub fn list_pending(&self) -> Vec<StudentRequest> {
        self.requests
            .read(|all| all.iter().filter(|r| r.is_pending()).cloned().collect())
    }

    /// Insertion order
    pub fn list_all(&self) -> Vec<StudentRequest> {
        self.requests.snapshot()
    }

    pub fn list_by_teacher(&self, teacher_id: &str) -> Vec<StudentRequest> {
        self.requests.read(|all| {
            all.iter()
                .filter(|r| r.teacher_id == teacher_id)
                .cloned()
                .collect()
        })
    }

    pub fn approve(
        &self,
        id: &str,
        reviewer: &Reviewer,
        note: Option<String>,
    ) -> PortalResult<StudentRequest> {
        self.review(id, reviewer, note, RequestStatus::Approved)
    }

    pub fn reject(
        &self,
        id: &str,
        reviewer: &Reviewer,
        note: Option<String>,
    ) -> PortalResult<StudentRequest> {
        self.review(id, reviewer, note, RequestStatus::Rejected)
    }

    /// Take ownership of provisioning for a retry.
    ///
    /// Only one caller can hold a request in `pending` provisioning; a second
    /// claim is refused until the first one records its outcome.
    pub fn claim_provisioning(&self, id: &str) -> PortalResult<StudentRequest> {
        self.requests.mutate(|all| {
            let request = all
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(PortalError::NotFound("Request"))?;
            if request.status != RequestStatus::Approved {
                return Err(PortalError::Validation(
                    "Only approved requests can be provisioned".to_string(),
                ));
            }
            match request.provisioning {
                Some(Provisioning::Pending) => return Err(PortalError::ProvisioningInProgress),
                Some(Provisioning::Completed { .. }) => {
                    return Err(PortalError::Validation(
                        "Request is already provisioned".to_string(),
                    ))
                }
                None | Some(Provisioning::Failed { .. }) => {}
            }
            request.provisioning = Some(Provisioning::Pending);
            Ok(request.clone())
        })
    }

    /// Settle a claimed provisioning with its outcome.
    ///
    /// Refused unless the request is still `pending`, so one caller's
    /// result never replaces another's.
    pub fn record_provisioning(
        &self,
        id: &str,
        outcome: Provisioning,
    ) -> PortalResult<StudentRequest> {
        self.requests.mutate(|all| {
            let request = all
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(PortalError::NotFound("Request"))?;
            if request.status != RequestStatus::Approved
                || request.provisioning != Some(Provisioning::Pending)
            {
                return Err(PortalError::Validation(
                    "Request provisioning is not in progress".to_string(),
                ));
            }
            request.provisioning = Some(outcome);
            Ok(request.clone())
        })
    }

    /// Mark provisioning left `pending` by a previous process as failed.
    ///
    /// Provisioning runs in-process, so nothing can still be working on it
    /// at startup. Returns how many requests were reset.
    pub fn recover_interrupted(&self) -> PortalResult<usize> {
        let reset = self.requests.mutate(|all| {
            let mut reset = 0;
            for request in all.iter_mut() {
                if request.provisioning == Some(Provisioning::Pending) {
                    request.provisioning = Some(Provisioning::Failed {
                        error: "Interrupted before completion".to_string(),
                    });
                    reset += 1;
                }
            }
            Ok::<_, PortalError>(reset)
        })?;

        if reset > 0 {
            warn!(count = reset, "Interrupted provisioning marked as failed");
        }
        Ok(reset)
    }

    fn review(
        &self,
        id: &str,
        reviewer: &Reviewer,
        note: Option<String>,
        verdict: RequestStatus,
    ) -> PortalResult<StudentRequest> {
        let reviewed = self.requests.mutate(|all| {
            let request = all
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(PortalError::NotFound("Request"))?;
            if !request.is_pending() {
                return Err(PortalError::NotPending);
            }

            request.status = verdict;
            request.reviewed_by = Some(reviewer.id.clone());
            request.reviewer_name = Some(reviewer.name.clone());
            request.review_note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
            request.reviewed_at = Some(Utc::now());
            if verdict == RequestStatus::Approved {
                request.provisioning = Some(Provisioning::Pending);
            }
            Ok(request.clone())
        })?;

        info!(
            request_id = %id,
            reviewer_id = %reviewer.id,
            status = ?verdict,
            "Student request reviewed"
        );
        Ok(reviewed)
    }
}

fn validate_payload(payload: &RequestPayload) -> PortalResult<()> {
    match payload {
        RequestPayload::Add(student) => {
            if student.first_name.trim().is_empty() || student.last_name.trim().is_empty() {
                return Err(PortalError::Validation(
                    "Student first and last name are required".to_string(),
                ));
            }
            crate::auth::user_store::validate_email(&student.email)?;
        }
        RequestPayload::Delete(target) => {
            if target.student_id.trim().is_empty() {
                return Err(PortalError::Validation("Student id is required".to_string()));
            }
        }
    }
    Ok(())
}
