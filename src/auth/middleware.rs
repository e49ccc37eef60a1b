//! Authentication Middleware
//! Mission: Protect API endpoints with JWT validation and role checks

use crate::auth::{
    jwt::JwtHandler,
    models::{Claims, Role, User},
    user_store::UserStore,
};
use crate::error::{PortalError, PortalResult};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

/// Validates `Authorization: Bearer <jwt>` and stores the claims on the request
pub async fn auth_middleware(
    State(jwt_handler): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, PortalError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or(PortalError::Unauthorized("Missing authorization token"))?;

    let token = header
        .to_str()
        .ok()
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(PortalError::Unauthorized(
            "Invalid authorization format. Use: Bearer {token}",
        ))?;

    let claims = jwt_handler
        .validate_token(token)
        .map_err(|_| PortalError::Unauthorized("Invalid or expired token"))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Resolve the caller behind `claims` and require one of `allowed` roles.
///
/// The stored account is authoritative: a token for a deactivated or
/// vanished user is refused even before it expires.
pub fn authorize(users: &UserStore, claims: &Claims, allowed: &[Role]) -> PortalResult<User> {
    let user = users
        .find_by_id(&claims.sub)
        .map_err(|_| PortalError::Unauthorized("Unknown account"))?;

    if !user.is_active() {
        return Err(PortalError::AccountInactive);
    }

    if !allowed.contains(&user.role()) {
        warn!(
            user_id = %user.id,
            role = %user.role(),
            "Rejected call outside role"
        );
        return Err(PortalError::Forbidden);
    }

    Ok(user)
}

pub const ANY_ROLE: &[Role] = &[
    Role::Admin,
    Role::Teacher,
    Role::Student,
    Role::Parent,
    Role::Staff,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{NewUser, Profile};
    use crate::auth::password::PasswordService;
    use crate::notify::RecordingNotifier;
    use crate::storage::{Collection, MemoryRepository};
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    fn jwt() -> Arc<JwtHandler> {
        Arc::new(JwtHandler::new("middleware-secret".to_string()))
    }

    fn app(jwt: Arc<JwtHandler>) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|Extension(claims): Extension<Claims>| async move { claims.email }),
            )
            .route_layer(middleware::from_fn_with_state(jwt, auth_middleware))
    }

    async fn status_for(app: Router, auth: Option<&str>) -> StatusCode {
        let mut builder = HttpRequest::builder().uri("/whoami");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    async fn test_store() -> (UserStore, User) {
        let store = UserStore::new(
            Collection::open(Box::new(MemoryRepository::new("users"))).unwrap(),
            PasswordService::new(4),
            Arc::new(RecordingNotifier::new()),
            String::new(),
        );
        let teacher = store
            .create_user(NewUser {
                first_name: "Raj".to_string(),
                last_name: "Patel".to_string(),
                email: "raj@school.org".to_string(),
                phone: None,
                password: Some("Teach#Pass1".to_string()),
                profile: Profile::Teacher {
                    designation: None,
                    subject: None,
                },
            })
            .await
            .unwrap();
        (store, teacher)
    }

    #[tokio::test]
    async fn test_missing_and_malformed_tokens_rejected() {
        let jwt = jwt();
        assert_eq!(status_for(app(jwt.clone()), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(app(jwt.clone()), Some("Token abc")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(app(jwt), Some("Bearer not.a.jwt")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_valid_token_passes_claims_through() {
        let jwt = jwt();
        let (_, teacher) = test_store().await;
        let (token, _) = jwt.generate_token(&teacher).unwrap();

        let bearer = format!("Bearer {}", token);
        assert_eq!(status_for(app(jwt), Some(&bearer)).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_authorize_checks_stored_role_and_status() {
        let jwt = jwt();
        let (store, teacher) = test_store().await;
        let (token, _) = jwt.generate_token(&teacher).unwrap();
        let claims = jwt.validate_token(&token).unwrap();

        assert_eq!(
            authorize(&store, &claims, &[Role::Teacher]).unwrap().id,
            teacher.id
        );
        assert!(matches!(
            authorize(&store, &claims, &[Role::Admin]).unwrap_err(),
            PortalError::Forbidden
        ));

        store.deactivate(&teacher.id).unwrap();
        assert!(matches!(
            authorize(&store, &claims, ANY_ROLE).unwrap_err(),
            PortalError::AccountInactive
        ));

        let mut stranger = claims.clone();
        stranger.sub = "nobody".to_string();
        assert!(matches!(
            authorize(&store, &stranger, ANY_ROLE).unwrap_err(),
            PortalError::Unauthorized(_)
        ));
    }
}
