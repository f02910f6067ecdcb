use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::{SaltString, rand_core::OsRng};
use chrono::{Duration, Utc};
use cookie::{Cookie, SameSite};
use sqlx::SqlitePool;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, Result},
};

pub mod session;

use session::{Session, SessionStore};

pub const SESSION_COOKIE: &str = "session";

pub struct AuthService {
    session_store: SessionStore,
    session_duration_hours: i64,
    secure_cookies: bool,
    admin_email: Option<String>,
    admin_password: Option<String>,
}

impl AuthService {
    pub fn new(pool: SqlitePool, config: &AuthConfig) -> Self {
        Self {
            session_store: SessionStore::new(pool, &config.session_secret),
            session_duration_hours: config.session_duration_hours,
            secure_cookies: config.secure_cookies,
            admin_email: config.admin_email.clone().filter(|e| !e.is_empty()),
            admin_password: config.admin_password.clone().filter(|p| !p.is_empty()),
        }
    }

    pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        let argon2 = Argon2::default();

        Ok(argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }

    pub async fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// True when the pair literally matches the configured fallback admin
    /// credentials. Both halves are always compared.
    pub fn is_admin_fallback(&self, email: &str, password: &str) -> bool {
        let (Some(admin_email), Some(admin_password)) =
            (self.admin_email.as_deref(), self.admin_password.as_deref())
        else {
            return false;
        };

        let email_ok = email.as_bytes().ct_eq(admin_email.as_bytes());
        let password_ok = password.as_bytes().ct_eq(admin_password.as_bytes());
        (email_ok & password_ok).into()
    }

    pub async fn create_session(&self, user_id: Uuid) -> Result<(Session, String)> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(self.session_duration_hours);

        let session = self.session_store
            .create(user_id, &token, expires_at)
            .await?;

        Ok((session, token))
    }

    pub async fn validate_session(&self, token: &str) -> Result<Option<Session>> {
        self.session_store.find_by_token(token).await
    }

    pub async fn invalidate_session(&self, token: &str) -> Result<()> {
        self.session_store.delete_by_token(token).await
    }

    pub async fn invalidate_user_sessions(&self, user_id: Uuid) -> Result<()> {
        self.session_store.delete_by_user(user_id).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        self.session_store.cleanup_expired().await
    }

    pub fn create_session_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token.to_string()))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .secure(self.secure_cookies)
            .max_age(cookie::time::Duration::hours(self.session_duration_hours))
            .build()
    }

    pub fn create_logout_cookie() -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(cookie::time::Duration::seconds(0))
            .build()
    }
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(admin_email: Option<&str>, admin_password: Option<&str>) -> AuthService {
        let pool = SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        let config = AuthConfig {
            admin_email: admin_email.map(str::to_string),
            admin_password: admin_password.map(str::to_string),
            ..AuthConfig::default()
        };
        AuthService::new(pool, &config)
    }

    #[tokio::test]
    async fn password_round_trip() {
        let hash = AuthService::hash_password("hunter22").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(AuthService::verify_password("hunter22", &hash).await.unwrap());
        assert!(!AuthService::verify_password("hunter23", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn admin_fallback_requires_exact_pair() {
        let auth = service(Some("admin@beacon.local"), Some("s3cret"));
        assert!(auth.is_admin_fallback("admin@beacon.local", "s3cret"));
        assert!(!auth.is_admin_fallback("admin@beacon.local", "s3cre"));
        assert!(!auth.is_admin_fallback("Admin@beacon.local", "s3cret"));
        assert!(!auth.is_admin_fallback("", ""));
    }

    #[tokio::test]
    async fn admin_fallback_disabled_without_config() {
        let auth = service(None, Some("s3cret"));
        assert!(!auth.is_admin_fallback("", "s3cret"));

        let auth = service(Some(""), Some(""));
        assert!(!auth.is_admin_fallback("", ""));
    }

    #[test]
    fn tokens_are_random_hex() {
        let a = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, generate_token());
    }
}
