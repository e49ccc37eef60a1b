//! Authentication API Endpoints
//! Mission: Provide registration, login and account management endpoints

use crate::api::{extract::AppJson, AppState};
use crate::auth::{
    middleware::{authorize, ANY_ROLE},
    models::{
        AdminRegistration, ChangePasswordRequest, Claims, LoginRequest, LoginResponse, NewUser,
        ProfileEdit, PublicUser, Role,
    },
};
use crate::error::{PortalError, PortalResult};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::info;

/// Admin self-registration - POST /api/admin/register
pub async fn register_admin(
    State(state): State<AppState>,
    AppJson(payload): AppJson<AdminRegistration>,
) -> PortalResult<Json<Value>> {
    let admin = state.users.create_admin(payload).await?;

    Ok(Json(json!({
        "success": true,
        "userId": admin.id,
        "message": "Admin user created successfully",
    })))
}

/// Login endpoint - POST /api/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> PortalResult<Json<LoginResponse>> {
    state
        .auth
        .login(&payload.email, &payload.password)
        .await
        .map(Json)
}

/// Register any account - POST /api/register (Admin only)
pub async fn register_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<NewUser>,
) -> PortalResult<Json<Value>> {
    let admin = authorize(&state.users, &claims, &[Role::Admin])?;

    let generated = payload.password.is_none();
    let user = state.users.create_user(payload).await?;

    info!(
        admin_id = %admin.id,
        user_id = %user.id,
        "Admin registered {} ({})",
        user.email,
        user.role()
    );

    let message = if generated {
        "User created successfully and credentials delivered"
    } else {
        "User created successfully"
    };

    Ok(Json(json!({
        "success": true,
        "userId": user.id,
        "message": message,
    })))
}

/// Change own password - POST /api/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> PortalResult<Json<Value>> {
    let caller = authorize(&state.users, &claims, ANY_ROLE)?;

    if let Some(user_id) = payload.user_id.as_deref() {
        if user_id != caller.id {
            return Err(PortalError::Forbidden);
        }
    }

    state
        .auth
        .change_password(&caller.id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password changed successfully",
    })))
}

/// Get current user info - GET /api/auth/me
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> PortalResult<Json<Value>> {
    let user = authorize(&state.users, &claims, ANY_ROLE)?;

    Ok(Json(json!({
        "success": true,
        "user": PublicUser::from(&user),
    })))
}

/// List all users - GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> PortalResult<Json<Value>> {
    authorize(
        &state.users,
        &claims,
        &[Role::Admin, Role::Teacher, Role::Staff, Role::Parent],
    )?;

    Ok(Json(json!({
        "success": true,
        "users": state.users.list_all(),
    })))
}

/// Edit a profile - PATCH /api/users/:id (Admin only)
pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
    AppJson(payload): AppJson<ProfileEdit>,
) -> PortalResult<Json<Value>> {
    authorize(&state.users, &claims, &[Role::Admin])?;

    let user = state.users.update_profile(&user_id, payload)?;

    Ok(Json(json!({
        "success": true,
        "user": PublicUser::from(&user),
    })))
}
