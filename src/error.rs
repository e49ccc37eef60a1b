//! Portal Errors
//! Mission: One taxonomy for every failure the account and request lifecycle can report

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type PortalResult<T> = std::result::Result<T, PortalError>;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("User with this email already exists")]
    DuplicateEmail,

    #[error("User with this name and role already exists")]
    DuplicatePerson,

    #[error("An admin account already exists")]
    AdminAlreadyExists,

    #[error("User not registered. Please contact Admin.")]
    NotRegistered,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive. Please contact Admin.")]
    AccountInactive,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("Request has already been reviewed")]
    NotPending,

    #[error("Provisioning for this request is still in progress")]
    ProvisioningInProgress,

    #[error("Failed to deliver account credentials: {0}")]
    NotificationDeliveryFailed(String),

    #[error("Request approved but student registration failed: {0}")]
    ApprovedButRegistrationFailed(String),

    #[error("Request approved but student deactivation failed: {0}")]
    ApprovedButDeactivationFailed(String),

    #[error("Unauthorized. {0}")]
    Unauthorized(&'static str),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("{0}")]
    WeakPassword(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl PortalError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::DuplicateEmail
            | PortalError::DuplicatePerson
            | PortalError::AdminAlreadyExists
            | PortalError::NotPending
            | PortalError::ProvisioningInProgress => StatusCode::CONFLICT,
            PortalError::NotRegistered
            | PortalError::InvalidCredentials
            | PortalError::IncorrectCurrentPassword
            | PortalError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PortalError::AccountInactive | PortalError::Forbidden => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::WeakPassword(_) | PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::NotificationDeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            PortalError::ApprovedButRegistrationFailed(_)
            | PortalError::ApprovedButDeactivationFailed(_)
            | PortalError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Malformed or incomplete request bodies
impl From<JsonRejection> for PortalError {
    fn from(rejection: JsonRejection) -> Self {
        PortalError::Validation(rejection.body_text())
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", self);
        }

        // Infrastructure details stay in the log
        let message = match &self {
            PortalError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
