//! Authentication Service
//! Mission: Check credentials, issue session tokens and rotate passwords

use crate::auth::{
    jwt::JwtHandler,
    models::{LoginResponse, PublicUser},
    user_store::UserStore,
};
use crate::error::{PortalError, PortalResult};
use std::sync::Arc;
use tracing::{info, warn};

pub struct AuthService {
    users: Arc<UserStore>,
    jwt: Arc<JwtHandler>,
}

impl AuthService {
    pub fn new(users: Arc<UserStore>, jwt: Arc<JwtHandler>) -> Self {
        Self { users, jwt }
    }

    pub async fn login(&self, email: &str, password: &str) -> PortalResult<LoginResponse> {
        info!("🔐 Login attempt: {}", email);

        let user = self.users.find_by_email(email).map_err(|e| match e {
            PortalError::NotFound(_) => PortalError::NotRegistered,
            other => other,
        })?;

        if !self
            .users
            .passwords()
            .verify_async(password, &user.password_hash)
            .await
        {
            warn!("❌ Failed login attempt: {}", email);
            return Err(PortalError::InvalidCredentials);
        }

        // Checked after the password so status is not revealed to guessers
        if !user.is_active() {
            warn!(user_id = %user.id, "Login refused for inactive account");
            return Err(PortalError::AccountInactive);
        }

        let (token, expires_in) = self.jwt.generate_token(&user)?;

        info!(
            "✅ Login successful: {} ({})",
            user.email,
            user.role().as_str()
        );

        Ok(LoginResponse {
            success: true,
            token,
            expires_in,
            user: PublicUser::from(&user),
        })
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> PortalResult<()> {
        let user = self.users.find_by_id(user_id)?;

        let passwords = self.users.passwords();
        if !passwords
            .verify_async(current_password, &user.password_hash)
            .await
        {
            warn!(user_id = %user_id, "Password change with wrong current password");
            return Err(PortalError::IncorrectCurrentPassword);
        }
        passwords.check_policy(new_password)?;

        let new_hash = passwords.hash_async(new_password).await?;
        self.users.update_password(user_id, new_hash)
    }
}
