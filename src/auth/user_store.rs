//! Credential Store
//! Mission: Own every user account and enforce its uniqueness rules at write time

use crate::auth::models::{
    AdminRegistration, NewUser, Profile, ProfileEdit, PublicUser, Role, User, UserStatus,
};
use crate::auth::password::PasswordService;
use crate::error::{PortalError, PortalResult};
use crate::notify::{CredentialNotice, Notifier};
use crate::storage::Collection;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct UserStore {
    users: Collection<User>,
    passwords: PasswordService,
    notifier: Arc<dyn Notifier>,
    login_url: String,
}

impl UserStore {
    pub fn new(
        users: Collection<User>,
        passwords: PasswordService,
        notifier: Arc<dyn Notifier>,
        login_url: String,
    ) -> Self {
        if !users.read(|all| all.iter().any(|u| u.role() == Role::Admin)) {
            warn!("⚠️  No admin user found. Register one via POST /api/admin/register");
        }
        Self {
            users,
            passwords,
            notifier,
            login_url,
        }
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.passwords
    }

    /// Register an account of any role.
    ///
    /// Without a supplied password one is generated, the account is flagged
    /// for first login and the credentials are sent through the notifier.
    /// If that delivery fails the new record is removed again.
    pub async fn create_user(&self, new_user: NewUser) -> PortalResult<User> {
        let first_name = required("First name", &new_user.first_name)?;
        let last_name = required("Last name", &new_user.last_name)?;
        let email = validate_email(&new_user.email)?;
        let profile = new_user.profile.normalized();
        let role = profile.role();

        // Cheap rejection before paying for bcrypt; re-checked under the lock
        self.users
            .read(|all| check_unique(all, &email, &first_name, &last_name, role))?;

        let (plain, generated) = match new_user.password {
            Some(password) => {
                self.passwords.check_policy(&password)?;
                (password, false)
            }
            None => (self.passwords.generate(), true),
        };
        let password_hash = self.passwords.hash_async(&plain).await?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            first_name,
            last_name,
            email,
            phone: clean(new_user.phone),
            password_hash,
            is_first_login: generated,
            created_at: Utc::now(),
            status: UserStatus::Active,
            profile,
        };

        let stored = self.users.mutate(|all| {
            check_unique(all, &user.email, &user.first_name, &user.last_name, role)?;
            all.push(user.clone());
            Ok::<_, PortalError>(user)
        })?;

        info!(
            user_id = %stored.id,
            role = %role,
            "✅ Created user: {}",
            stored.email
        );

        if generated {
            let notice = CredentialNotice {
                recipient: stored.email.clone(),
                display_name: stored.full_name(),
                role,
                password: plain,
                login_url: self.login_url.clone(),
            };

            if let Err(e) = self.notifier.send_credentials(&notice).await {
                warn!(user_id = %stored.id, "Credential delivery failed, rolling back: {:#}", e);
                if let Err(rollback) = self.remove(&stored.id) {
                    error!(user_id = %stored.id, "Rollback after failed delivery failed: {}", rollback);
                }
                return Err(PortalError::NotificationDeliveryFailed(e.to_string()));
            }
        }

        Ok(stored)
    }

    /// One-time admin self-registration with a chosen password
    pub async fn create_admin(&self, registration: AdminRegistration) -> PortalResult<User> {
        let first_name = required("First name", &registration.first_name)?;
        let last_name = required("Last name", &registration.last_name)?;
        let email = validate_email(&registration.email)?;

        if self.users.read(|all| all.iter().any(|u| u.role() == Role::Admin)) {
            return Err(PortalError::AdminAlreadyExists);
        }
        self.passwords.check_policy(&registration.password)?;
        let password_hash = self.passwords.hash_async(&registration.password).await?;

        let admin = User {
            id: Uuid::new_v4().to_string(),
            first_name,
            last_name,
            email,
            phone: clean(registration.phone),
            password_hash,
            is_first_login: false,
            created_at: Utc::now(),
            status: UserStatus::Active,
            profile: Profile::Admin,
        };

        let stored = self.users.mutate(|all| {
            if all.iter().any(|u| u.role() == Role::Admin) {
                return Err(PortalError::AdminAlreadyExists);
            }
            if all.iter().any(|u| u.email_matches(&admin.email)) {
                return Err(PortalError::DuplicateEmail);
            }
            all.push(admin.clone());
            Ok(admin)
        })?;

        info!(user_id = %stored.id, "🔐 Admin account registered: {}", stored.email);
        Ok(stored)
    }

    pub fn find_by_email(&self, email: &str) -> PortalResult<User> {
        self.users
            .read(|all| all.iter().find(|u| u.email_matches(email)).cloned())
            .ok_or(PortalError::NotFound("User"))
    }

    pub fn find_by_id(&self, id: &str) -> PortalResult<User> {
        self.users
            .read(|all| all.iter().find(|u| u.id == id).cloned())
            .ok_or(PortalError::NotFound("User"))
    }

    /// Store a new hash and clear the first-login flag
    pub fn update_password(&self, id: &str, new_hash: String) -> PortalResult<()> {
        self.users.mutate(|all| {
            let user = all
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(PortalError::NotFound("User"))?;
            user.password_hash = new_hash;
            user.is_first_login = false;
            Ok::<_, PortalError>(())
        })?;

        info!(user_id = %id, "🔑 Password updated");
        Ok(())
    }

    pub fn update_profile(&self, id: &str, edit: ProfileEdit) -> PortalResult<User> {
        let first_name = edit
            .first_name
            .as_deref()
            .map(|v| required("First name", v))
            .transpose()?;
        let last_name = edit
            .last_name
            .as_deref()
            .map(|v| required("Last name", v))
            .transpose()?;
        let email = edit.email.as_deref().map(validate_email).transpose()?;

        let updated = self.users.mutate(|all| {
            let index = all
                .iter()
                .position(|u| u.id == id)
                .ok_or(PortalError::NotFound("User"))?;

            let mut user = all[index].clone();
            if let Some(first_name) = first_name {
                user.first_name = first_name;
            }
            if let Some(last_name) = last_name {
                user.last_name = last_name;
            }
            if let Some(email) = email {
                user.email = email;
            }
            if edit.phone.is_some() {
                user.phone = clean(edit.phone);
            }
            if let Some(profile) = edit.profile {
                if profile.role() != user.role() {
                    return Err(PortalError::Validation(
                        "Role cannot be changed by a profile edit".to_string(),
                    ));
                }
                user.profile = profile.normalized();
            }

            let others: Vec<User> = all
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, u)| u.clone())
                .collect();
            check_unique(
                &others,
                &user.email,
                &user.first_name,
                &user.last_name,
                user.role(),
            )?;

            all[index] = user.clone();
            Ok(user)
        })?;

        info!(user_id = %id, "✏️  Profile updated");
        Ok(updated)
    }

    /// Soft delete: the record stays, logins are refused
    pub fn deactivate(&self, id: &str) -> PortalResult<User> {
        let user = self.users.mutate(|all| {
            let user = all
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(PortalError::NotFound("User"))?;
            user.status = UserStatus::Inactive;
            Ok::<_, PortalError>(user.clone())
        })?;

        info!(user_id = %id, "🚫 User deactivated: {}", user.email);
        Ok(user)
    }

    /// All users with password hashes stripped
    pub fn list_all(&self) -> Vec<PublicUser> {
        self.users
            .read(|all| all.iter().map(PublicUser::from).collect())
    }

    fn remove(&self, id: &str) -> PortalResult<()> {
        self.users.mutate(|all| {
            all.retain(|u| u.id != id);
            Ok::<_, PortalError>(())
        })
    }
}

fn check_unique(
    all: &[User],
    email: &str,
    first_name: &str,
    last_name: &str,
    role: Role,
) -> PortalResult<()> {
    if role == Role::Admin && all.iter().any(|u| u.role() == Role::Admin) {
        return Err(PortalError::AdminAlreadyExists);
    }
    if all.iter().any(|u| u.email_matches(email)) {
        return Err(PortalError::DuplicateEmail);
    }
    if all
        .iter()
        .any(|u| u.first_name == first_name && u.last_name == last_name && u.role() == role)
    {
        return Err(PortalError::DuplicatePerson);
    }
    Ok(())
}

fn required(field: &str, value: &str) -> PortalResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PortalError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Shape check only: `local@domain.tld`, no whitespace
pub(crate) fn validate_email(email: &str) -> PortalResult<String> {
    let email = email.trim();
    let invalid = || PortalError::Validation("Email is invalid".to_string());

    if email.is_empty() {
        return Err(PortalError::Validation("Email is required".to_string()));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(email.to_string()),
        _ => Err(invalid()),
    }
}
