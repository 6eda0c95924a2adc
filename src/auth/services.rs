use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::jwt::{IssuedToken, JwtKeys, TokenError};
use crate::auth::password::{HashError, Hasher};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, User};
use crate::error::AppError;

/// Registration and login over a `UserStore`.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: Hasher,
    keys: JwtKeys,
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub email: String,
    pub token: IssuedToken,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, hasher: Hasher, keys: JwtKeys) -> Self {
        Self {
            users,
            hasher,
            keys,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    /// Checks the email is free, hashes the password and stores the user.
    /// No hash is computed when the email is already taken.
    pub async fn register(&self, name: String, email: String, password: String) -> Result<User, AppError> {
        require_present("email", &email)?;
        require_present("password", &password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(%email, "email already registered");
            return Err(AppError::DuplicateUser);
        }

        let hasher = self.hasher.clone();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::internal(format!("hash task: {e}")))?
            .map_err(|e| AppError::internal(e.to_string()))?;

        // a concurrent registration may have won since the lookup; the store
        // reports that as a duplicate
        let user = self
            .users
            .insert(NewUser {
                name,
                email,
                password_hash,
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Unknown email and wrong password both yield `InvalidCredentials`.
    pub async fn login(&self, email: String, password: String) -> Result<LoginOutcome, AppError> {
        require_present("email", &email)?;
        require_present("password", &password)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            // match the Argon2 cost of a real verify
            let hasher = self.hasher.clone();
            let _ = tokio::task::spawn_blocking(move || hasher.verify_decoy(&password)).await;
            warn!(%email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let hasher = self.hasher.clone();
        let stored = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| AppError::internal(format!("verify task: {e}")))?;

        match verified {
            Ok(true) => {}
            Ok(false) => {
                warn!(%email, user_id = %user.id, "login invalid password");
                return Err(AppError::InvalidCredentials);
            }
            Err(HashError::Malformed(e)) => {
                warn!(error = %e, user_id = %user.id, "stored password hash unreadable");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(AppError::internal(e.to_string())),
        }

        let token = self.keys.issue(&user.email).map_err(|e| match e {
            TokenError::Encode(msg) => AppError::internal(msg),
            TokenError::Invalid => AppError::InvalidToken,
        })?;

        info!(user_id = %user.id, email = %user.email, expires_at = %token.expires_at, "user logged in");
        Ok(LoginOutcome {
            email: user.email,
            token,
        })
    }
}

fn require_present(field: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::malformed(format!("{field} is required")));
    }
    Ok(())
}
