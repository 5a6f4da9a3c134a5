//! Authentication service: registration, login and session tokens

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{NewUser, RegisterUser, Role, User, UserClaims},
    repository::UsersStore,
};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersStore>,
    config: AuthConfig,
}

/// Emails are matched case-insensitively
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersStore>, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Session lifetime in seconds
    pub fn token_lifetime_secs(&self) -> i64 {
        self.config.jwt_expiration_hours as i64 * 3600
    }

    /// Register a new account. No session is issued.
    pub async fn register(&self, data: RegisterUser) -> AppResult<User> {
        data.validate()?;
        if data.name.trim().is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        let role: Role = data.role.parse().map_err(AppError::Validation)?;
        let email = normalize_email(&data.email);

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AppError::AccountExists("User already exists".to_string()));
        }

        let password_hash = self.hash_password(&data.password)?;
        let user = self
            .users
            .create(&NewUser {
                name: data.name.trim().to_string(),
                email,
                password_hash,
                role,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Check credentials and issue a signed session token
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let email = normalize_email(email);
        let user = match self.users.get_by_email(&email).await? {
            Some(user) => user,
            None => {
                tracing::warn!("login attempt for unknown account");
                return Err(AppError::UnknownAccount("User not found".to_string()));
            }
        };

        if !self.verify_password(&user, password)? {
            tracing::warn!(user_id = user.id, "login rejected: wrong password");
            return Err(AppError::InvalidCredential("Incorrect password".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok((token, user))
    }

    /// Validate a bearer token into its claims
    pub fn verify_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret).map_err(|e| {
            tracing::debug!("token rejected: {}", e);
            AppError::Authentication("Not authorized - invalid or expired token".to_string())
        })
    }

    /// Profile of the token's principal
    pub async fn me(&self, claims: &UserClaims) -> AppResult<User> {
        self.users
            .get_by_id(claims.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + self.token_lifetime_secs(),
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
