//! JWT Token Handler
//! Mission: Issue and validate signed, expiring session tokens

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

pub const DEFAULT_EXPIRATION_HOURS: i64 = 24;

/// JWT Handler for token operations
pub struct JwtHandler {
    secret: String,
    expiration_hours: i64,
}

impl JwtHandler {
    pub fn new(secret: String) -> Self {
        Self::with_expiration(secret, DEFAULT_EXPIRATION_HOURS)
    }

    pub fn with_expiration(secret: String, expiration_hours: i64) -> Self {
        Self {
            secret,
            expiration_hours: expiration_hours.max(1),
        }
    }

    /// Returns the token and its lifetime in seconds
    pub fn generate_token(&self, user: &User) -> Result<(String, usize)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::hours(self.expiration_hours))
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let expires_in = (self.expiration_hours * 3600) as usize;

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role(),
            iat: now.timestamp() as usize,
            exp: expiration,
        };

        debug!(
            "Generating JWT for {} ({}), expires in {}h",
            user.email, user.id, self.expiration_hours
        );

        self.encode_claims(&claims).map(|token| (token, expires_in))
    }

    pub(crate) fn encode_claims(&self, claims: &Claims) -> Result<String> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to generate JWT")
    }

    /// Validate signature and expiry, returning the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .context("Invalid or expired token")?;

        debug!("Validated JWT for {}", decoded.claims.email);

        Ok(decoded.claims)
    }
}
