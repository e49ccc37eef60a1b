//! Password Service
//! Mission: Generate, hash, verify and vet account passwords

use crate::error::PortalError;
use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use rand::{seq::SliceRandom, Rng};

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
pub const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

pub const DEFAULT_COST: u32 = 10;
const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;
const MIN_POLICY_LENGTH: usize = 8;

#[derive(Debug, Clone)]
pub struct PasswordService {
    cost: u32,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordService {
    /// `cost` is clamped into the range bcrypt accepts
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Random 10-12 character password with at least one of each class.
    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let length = rng.gen_range(10..=12);

        let symbols = SYMBOLS.as_bytes();
        let all: Vec<u8> = [UPPERCASE, LOWERCASE, DIGITS, symbols].concat();

        let mut chars: Vec<u8> = Vec::with_capacity(length);
        for class in [UPPERCASE, LOWERCASE, DIGITS, symbols] {
            chars.push(class[rng.gen_range(0..class.len())]);
        }
        while chars.len() < length {
            chars.push(all[rng.gen_range(0..all.len())]);
        }
        chars.shuffle(&mut rng);

        chars.into_iter().map(char::from).collect()
    }

    pub fn hash(&self, plain: &str) -> Result<String> {
        hash(plain, self.cost).context("Failed to hash password")
    }

    /// Malformed hashes never verify
    pub fn verify(&self, plain: &str, hashed: &str) -> bool {
        verify(plain, hashed).unwrap_or(false)
    }

    /// `hash` on the blocking pool, for use inside request handlers
    pub async fn hash_async(&self, plain: &str) -> Result<String> {
        let service = self.clone();
        let plain = plain.to_string();
        tokio::task::spawn_blocking(move || service.hash(&plain))
            .await
            .context("Password hashing task failed")?
    }

    /// `verify` on the blocking pool
    pub async fn verify_async(&self, plain: &str, hashed: &str) -> bool {
        let service = self.clone();
        let (plain, hashed) = (plain.to_string(), hashed.to_string());
        tokio::task::spawn_blocking(move || service.verify(&plain, &hashed))
            .await
            .unwrap_or(false)
    }

    /// Strength rules for passwords people choose themselves
    pub fn check_policy(&self, plain: &str) -> Result<(), PortalError> {
        if plain.chars().count() < MIN_POLICY_LENGTH {
            return Err(PortalError::WeakPassword(
                "Password must be at least 8 characters",
            ));
        }
        if !plain.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PortalError::WeakPassword(
                "Password must contain at least one uppercase letter",
            ));
        }
        if !plain.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PortalError::WeakPassword(
                "Password must contain at least one lowercase letter",
            ));
        }
        if !plain.chars().any(|c| c.is_ascii_digit()) {
            return Err(PortalError::WeakPassword(
                "Password must contain at least one number",
            ));
        }
        if !plain.chars().any(|c| SYMBOLS.contains(c)) {
            return Err(PortalError::WeakPassword(
                "Password must contain at least one special character",
            ));
        }
        Ok(())
    }
}
