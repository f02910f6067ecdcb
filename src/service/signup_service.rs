use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use crate::{
    auth::AuthService,
    domain::*,
    email::EmailSender,
    error::{AppError, Result},
    repository::{PendingUserRepository, UserRepository},
};

pub const PENDING_NOT_FOUND: &str =
    "No pending registration found or code expired. Please sign up again.";

#[derive(Debug, Clone)]
pub struct NewSignup {
    pub name: String,
    pub email: String,
    pub password: String,
    pub sport: Option<String>,
}

/// Email-ownership proof: pending signup, emailed code, promotion to a verified user.
pub struct SignupService {
    user_repo: Arc<dyn UserRepository>,
    pending_repo: Arc<dyn PendingUserRepository>,
    email: Arc<dyn EmailSender>,
    code_ttl: Duration,
    email_timeout: StdDuration,
}

impl SignupService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        pending_repo: Arc<dyn PendingUserRepository>,
        email: Arc<dyn EmailSender>,
        code_ttl: Duration,
        email_timeout: StdDuration,
    ) -> Self {
        Self {
            user_repo,
            pending_repo,
            email,
            code_ttl,
            email_timeout,
        }
    }

    /// Stores (or replaces) the pending signup and mails a fresh code.
    /// Returns the normalized email the code was issued for.
    pub async fn request_signup(&self, signup: NewSignup) -> Result<String> {
        let email = normalize_email(&signup.email);

        match self.pending_repo.purge_stale().await {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Purged {} stale pending signups", n),
            Err(e) => tracing::warn!("Failed to purge stale pending signups: {}", e),
        }

        if let Some(existing) = self.user_repo.find_by_email(&email).await? {
            if existing.is_verified {
                return Err(AppError::BadRequest("User already exists and is verified".to_string()));
            }
            return Err(AppError::Conflict("An account with this email already exists".to_string()));
        }

        let password_hash = AuthService::hash_password(&signup.password).await?;
        let code = generate_otp_code();

        self.pending_repo
            .upsert(NewPendingUser {
                name: signup.name.trim().to_string(),
                email: email.clone(),
                sport: signup.sport.filter(|s| !s.trim().is_empty()),
                password_hash,
                otp_code: code.clone(),
                otp_expires: Utc::now() + self.code_ttl,
            })
            .await?;

        // Delivery problems never fail the signup; the code stays valid server-side.
        match tokio::time::timeout(self.email_timeout, self.email.send_otp(&email, &code)).await {
            Ok(Ok(())) => tracing::info!("Sent verification code to {} via {}", email, self.email.name()),
            Ok(Err(e)) => tracing::warn!("Failed to send verification code to {}: {}", email, e),
            Err(_) => tracing::warn!("Timed out sending verification code to {}", email),
        }

        Ok(email)
    }

    pub async fn verify_code(&self, email: &str, code: &str) -> Result<User> {
        let email = normalize_email(email);

        let pending = self
            .pending_repo
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound(PENDING_NOT_FOUND.to_string()))?;

        if !pending.code_matches(code.trim()) {
            return Err(AppError::BadRequest("Invalid verification code".to_string()));
        }

        if pending.is_code_expired(Utc::now()) {
            return Err(AppError::BadRequest("Verification code expired".to_string()));
        }

        let user = self.pending_repo.promote(&pending).await?;
        tracing::info!("Verified new account {}", user.email);
        Ok(user)
    }
}
