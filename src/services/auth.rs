//! Librarian authentication service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    circulation::validate_username,
    config::AuthConfig,
    error::{AppError, AppResult},
    models::librarian::{Librarian, LibrarianClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate a librarian and return a JWT token
    pub async fn login(&self, username: &str, password: &str) -> AppResult<(String, Librarian)> {
        let username = username.trim();
        if !validate_username(username) {
            return Err(AppError::Validation("Invalid username format".to_string()));
        }

        let librarian = self
            .repository
            .librarians
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !verify_password(&librarian.password_hash, password)? {
            tracing::warn!(username = %username, "Rejected login attempt");
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let now = Utc::now().timestamp();
        let claims = LibrarianClaims {
            sub: librarian.username.clone(),
            librarian_id: librarian.librarian_id,
            iat: now,
            exp: now + (self.config.jwt_expiration_hours as i64 * 3600),
        };
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        tracing::info!(username = %librarian.username, "Librarian logged in");
        Ok((token, librarian))
    }

    /// Decode and check a bearer token
    pub fn validate_token(&self, token: &str) -> AppResult<LibrarianClaims> {
        LibrarianClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))
    }

    /// Account of the authenticated librarian
    pub async fn me(&self, librarian_id: i32) -> AppResult<Librarian> {
        self.repository
            .librarians
            .get_by_id(librarian_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Librarian {} not found", librarian_id)))
    }

    /// Seed the configured default account. Returns true when it was created.
    pub async fn ensure_default_librarian(&self) -> AppResult<bool> {
        let username = self.config.default_username.trim();
        if !validate_username(username) {
            return Err(AppError::Validation(format!(
                "Default librarian username '{}' is not a valid username",
                username
            )));
        }

        let hash = hash_password(&self.config.default_password)?;
        let created = self
            .repository
            .librarians
            .create_if_absent(username, &hash)
            .await?;
        if created {
            tracing::info!(username = %username, "Created default librarian account");
        }
        Ok(created)
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
