//! Student Request API Endpoints
//! Mission: Let teachers propose roster changes and admins review them

use crate::api::{extract::AppJson, AppState};
use crate::auth::{
    middleware::authorize,
    models::{Claims, Role, User},
};
use crate::error::PortalResult;
use crate::requests::models::{RequestSubmission, ReviewBody, Reviewer};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

fn reviewer(admin: &User) -> Reviewer {
    Reviewer {
        id: admin.id.clone(),
        name: admin.full_name(),
    }
}

/// Submit a request - POST /api/student-requests (Teacher only)
pub async fn submit_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<RequestSubmission>,
) -> PortalResult<Json<Value>> {
    let teacher = authorize(&state.users, &claims, &[Role::Teacher])?;
    let request = state
        .ledger
        .create(payload, &teacher.id, &teacher.full_name())?;

    Ok(Json(json!({
        "success": true,
        "requestId": request.id,
        "message": "Request submitted successfully",
    })))
}

/// All requests - GET /api/student-requests (Admin only)
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> PortalResult<Json<Value>> {
    authorize(&state.users, &claims, &[Role::Admin])?;

    Ok(Json(json!({
        "success": true,
        "requests": state.ledger.list_all(),
    })))
}

/// Requests awaiting review - GET /api/student-requests/pending (Admin only)
pub async fn list_pending(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> PortalResult<Json<Value>> {
    authorize(&state.users, &claims, &[Role::Admin])?;

    Ok(Json(json!({
        "success": true,
        "requests": state.ledger.list_pending(),
    })))
}

/// Caller's own submissions - GET /api/student-requests/mine (Teacher only)
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> PortalResult<Json<Value>> {
    let teacher = authorize(&state.users, &claims, &[Role::Teacher])?;

    Ok(Json(json!({
        "success": true,
        "requests": state.ledger.list_by_teacher(&teacher.id),
    })))
}

/// POST /api/student-requests/:id/approve (Admin only)
pub async fn approve_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<String>,
    body: Option<AppJson<ReviewBody>>,
) -> PortalResult<Json<Value>> {
    let admin = authorize(&state.users, &claims, &[Role::Admin])?;
    let AppJson(body) = body.unwrap_or_default();

    let request = state
        .workflow
        .approve(&request_id, &reviewer(&admin), body.note)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Request approved successfully",
        "request": request,
    })))
}

/// POST /api/student-requests/:id/reject (Admin only)
pub async fn reject_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<String>,
    body: Option<AppJson<ReviewBody>>,
) -> PortalResult<Json<Value>> {
    let admin = authorize(&state.users, &claims, &[Role::Admin])?;
    let AppJson(body) = body.unwrap_or_default();

    let request = state
        .workflow
        .reject(&request_id, &reviewer(&admin), body.note)?;

    Ok(Json(json!({
        "success": true,
        "message": "Request rejected successfully",
        "request": request,
    })))
}

/// POST /api/student-requests/:id/retry (Admin only)
pub async fn retry_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<String>,
) -> PortalResult<Json<Value>> {
    authorize(&state.users, &claims, &[Role::Admin])?;

    let request = state.workflow.retry_provisioning(&request_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Student account provisioned",
        "request": request,
    })))
}
