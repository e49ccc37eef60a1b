//! HTTP surface
//! Mission: Wire every portal service into one axum router

pub mod extract;

use crate::auth::{
    api as auth_api, auth_middleware, models::User, password::PasswordService, AuthService,
    JwtHandler, UserStore,
};
use crate::config::Config;
use crate::marks::{api as marks_api, models::MarkRecord, MarksStore};
use crate::middleware::{rate_limit_middleware, request_logging, RateLimitConfig, RateLimiter};
use crate::notify::Notifier;
use crate::requests::{
    api as requests_api, models::StudentRequest, ApprovalWorkflow, RequestLedger,
};
use crate::storage::{open_repository, Collection};
use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub const USERS_COLLECTION: &str = "users";
pub const MARKS_COLLECTION: &str = "marks";
pub const REQUESTS_COLLECTION: &str = "student_requests";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub auth: Arc<AuthService>,
    pub jwt: Arc<JwtHandler>,
    pub ledger: Arc<RequestLedger>,
    pub workflow: Arc<ApprovalWorkflow>,
    pub marks: Arc<MarksStore>,
}

impl AppState {
    pub fn new(
        users: Arc<UserStore>,
        jwt: Arc<JwtHandler>,
        ledger: Arc<RequestLedger>,
        marks: Arc<MarksStore>,
    ) -> Self {
        Self {
            auth: Arc::new(AuthService::new(users.clone(), jwt.clone())),
            workflow: Arc::new(ApprovalWorkflow::new(ledger.clone(), users.clone())),
            users,
            jwt,
            ledger,
            marks,
        }
    }

    /// Open all collections with the configured backend
    pub fn open(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("failed to create {}", config.data_dir.display()))?;

        let users: Collection<User> = Collection::open(open_repository(
            config.storage,
            &config.data_dir,
            USERS_COLLECTION,
        )?)?;
        let marks: Collection<MarkRecord> = Collection::open(open_repository(
            config.storage,
            &config.data_dir,
            MARKS_COLLECTION,
        )?)?;
        let requests: Collection<StudentRequest> = Collection::open(open_repository(
            config.storage,
            &config.data_dir,
            REQUESTS_COLLECTION,
        )?)?;

        info!(
            backend = config.storage.as_str(),
            data_dir = %config.data_dir.display(),
            users = users.len(),
            marks = marks.len(),
            requests = requests.len(),
            "💾 Collections loaded"
        );

        let users = Arc::new(UserStore::new(
            users,
            PasswordService::new(config.bcrypt_cost),
            notifier,
            config.login_url.clone(),
        ));
        let jwt = Arc::new(JwtHandler::with_expiration(
            config.jwt_secret.clone(),
            config.jwt_expiration_hours,
        ));

        let ledger = Arc::new(RequestLedger::new(requests));
        ledger.recover_interrupted()?;

        Ok(Self::new(
            users,
            jwt,
            ledger,
            Arc::new(MarksStore::new(marks)),
        ))
    }
}

pub fn create_router(state: AppState, login_limit: RateLimiter) -> Router {
    let login_routes = Router::new()
        .route("/api/login", post(auth_api::login))
        .route_layer(middleware::from_fn_with_state(
            login_limit,
            rate_limit_middleware,
        ));

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/admin/register", post(auth_api::register_admin))
        .merge(login_routes);

    let protected_routes = Router::new()
        .route("/api/register", post(auth_api::register_user))
        .route("/api/change-password", post(auth_api::change_password))
        .route("/api/auth/me", get(auth_api::get_current_user))
        .route("/api/users", get(auth_api::list_users))
        .route("/api/users/:id", patch(auth_api::update_user))
        .route("/api/marks", post(marks_api::add_marks))
        .route("/api/marks/:studentId", get(marks_api::list_marks))
        .route(
            "/api/marks/:studentId/download",
            get(marks_api::download_report),
        )
        .route(
            "/api/student-requests",
            get(requests_api::list_requests).post(requests_api::submit_request),
        )
        .route(
            "/api/student-requests/pending",
            get(requests_api::list_pending),
        )
        .route("/api/student-requests/mine", get(requests_api::list_mine))
        .route(
            "/api/student-requests/:id/approve",
            post(requests_api::approve_request),
        )
        .route(
            "/api/student-requests/:id/reject",
            post(requests_api::reject_request),
        )
        .route(
            "/api/student-requests/:id/retry",
            post(requests_api::retry_request),
        )
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Login throttle from config
pub fn login_limiter(config: &Config) -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
        max_requests: config.login_rate_limit.max(1),
        window: config.login_window(),
    })
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "school-portal",
    }))
}
