//! Approval Workflow
//! Mission: Turn admin decisions on student requests into account changes
//!
//! Approving an add-request creates the student account (credentials go out
//! through the notifier). Approving a delete-request deactivates the student.
//! Either change is tracked as the request's provisioning state: `pending`
//! while it runs, then `completed` or `failed`. A failed change can be
//! retried with `retry_provisioning`.

use crate::auth::models::{Role, User};
use crate::auth::user_store::UserStore;
use crate::error::{PortalError, PortalResult};
use crate::requests::ledger::RequestLedger;
use crate::requests::models::{
    Provisioning, RequestPayload, RequestStatus, Reviewer, StudentRequest,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct ApprovalWorkflow {
    ledger: Arc<RequestLedger>,
    users: Arc<UserStore>,
}

impl ApprovalWorkflow {
    pub fn new(ledger: Arc<RequestLedger>, users: Arc<UserStore>) -> Self {
        Self { ledger, users }
    }

    pub async fn approve(
        &self,
        id: &str,
        reviewer: &Reviewer,
        note: Option<String>,
    ) -> PortalResult<StudentRequest> {
        let request = self.ledger.get(id)?;
        if !request.is_pending() {
            return Err(PortalError::NotPending);
        }

        // An unknown removal target leaves the request open for review
        if let RequestPayload::Delete(target) = &request.payload {
            self.existing_student(&target.student_id)?;
        }

        self.ledger.approve(id, reviewer, note)?;
        self.provision(id, &request.payload, false).await
    }

    pub fn reject(
        &self,
        id: &str,
        reviewer: &Reviewer,
        note: Option<String>,
    ) -> PortalResult<StudentRequest> {
        self.ledger.reject(id, reviewer, note)
    }

    /// Re-run the account change of an approved request whose provisioning
    /// failed.
    ///
    /// Refused while another attempt is still running. An existing student
    /// with the requested email is linked instead of registered twice.
    pub async fn retry_provisioning(&self, id: &str) -> PortalResult<StudentRequest> {
        let request = self.ledger.get(id)?;
        if request.status != RequestStatus::Approved {
            return Err(PortalError::Validation(
                "Only approved requests can be provisioned".to_string(),
            ));
        }
        if let Some(Provisioning::Completed { .. }) = request.provisioning {
            return Ok(request);
        }

        let claimed = self.ledger.claim_provisioning(id)?;
        info!(request_id = %id, kind = claimed.payload.kind(), "🔁 Retrying provisioning");
        self.provision(id, &claimed.payload, true).await
    }

    /// Apply the change for a request whose provisioning is `pending` and
    /// record the outcome
    async fn provision(
        &self,
        id: &str,
        payload: &RequestPayload,
        link_existing: bool,
    ) -> PortalResult<StudentRequest> {
        let outcome = match payload {
            RequestPayload::Add(student) => {
                let linked = if link_existing {
                    self.users
                        .find_by_email(&student.email)
                        .ok()
                        .filter(|u| u.role() == Role::Student)
                } else {
                    None
                };
                match linked {
                    Some(existing) => {
                        info!(request_id = %id, user_id = %existing.id, "Linked existing student account");
                        Ok(existing.id)
                    }
                    None => self
                        .users
                        .create_user(student.to_new_user())
                        .await
                        .map(|user| user.id),
                }
            }
            RequestPayload::Delete(target) => self
                .existing_student(&target.student_id)
                .and_then(|student| self.users.deactivate(&student.id))
                .map(|user| user.id),
        };

        match outcome {
            Ok(user_id) => {
                info!(
                    request_id = %id,
                    user_id = %user_id,
                    kind = payload.kind(),
                    "✅ Student request carried out"
                );
                self.ledger
                    .record_provisioning(id, Provisioning::Completed { user_id })
            }
            Err(e) => {
                let reason = e.to_string();
                error!(request_id = %id, kind = payload.kind(), "❌ Student request failed: {}", reason);
                if let Err(record_err) = self.ledger.record_provisioning(
                    id,
                    Provisioning::Failed {
                        error: reason.clone(),
                    },
                ) {
                    warn!(request_id = %id, "Could not record provisioning failure: {}", record_err);
                }
                Err(match payload {
                    RequestPayload::Add(_) => PortalError::ApprovedButRegistrationFailed(reason),
                    RequestPayload::Delete(_) => {
                        PortalError::ApprovedButDeactivationFailed(reason)
                    }
                })
            }
        }
    }

    fn existing_student(&self, student_id: &str) -> PortalResult<User> {
        let user = self
            .users
            .find_by_id(student_id)
            .map_err(|_| PortalError::NotFound("Student"))?;
        if user.role() != Role::Student {
            return Err(PortalError::NotFound("Student"));
        }
        Ok(user)
    }
}
