//! Marks API Endpoints
//! Mission: Record exam results and serve them back as JSON or CSV

use crate::api::{extract::AppJson, AppState};
use crate::auth::{
    middleware::{authorize, ANY_ROLE},
    models::{Claims, Role},
};
use crate::error::{PortalError, PortalResult};
use crate::marks::{models::NewMarks, store::report_filename};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Value};

/// Add marks - POST /api/marks (Admin or Teacher)
pub async fn add_marks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<NewMarks>,
) -> PortalResult<Json<Value>> {
    authorize(&state.users, &claims, &[Role::Admin, Role::Teacher])?;

    let record = state.marks.add(payload)?;

    Ok(Json(json!({
        "success": true,
        "message": "Marks added successfully",
        "markId": record.id,
    })))
}

/// GET /api/marks/:studentId
pub async fn list_marks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<String>,
) -> PortalResult<Json<Value>> {
    authorize_reader(&state, &claims, &student_id)?;

    Ok(Json(json!({
        "success": true,
        "marks": state.marks.list_for_student(&student_id),
    })))
}

/// GET /api/marks/:studentId/download
pub async fn download_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(student_id): Path<String>,
) -> PortalResult<Response> {
    authorize_reader(&state, &claims, &student_id)?;

    let student_name = state
        .users
        .find_by_id(&student_id)
        .map(|u| u.full_name())
        .unwrap_or_else(|_| "Student".to_string());
    let filename = report_filename(&student_name).replace('"', "");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        state.marks.csv_report(&student_id),
    )
        .into_response())
}

/// Students only see their own marks
fn authorize_reader(state: &AppState, claims: &Claims, student_id: &str) -> PortalResult<()> {
    let caller = authorize(&state.users, claims, ANY_ROLE)?;
    if caller.role() == Role::Student && caller.id != student_id {
        return Err(PortalError::Forbidden);
    }
    Ok(())
}
