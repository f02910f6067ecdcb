use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

/// A signup waiting for its emailed code.
#[derive(Debug, Clone)]
pub struct PendingUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub sport: Option<String>,
    pub password_hash: String,
    pub otp_code: String,
    pub otp_expires: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPendingUser {
    pub name: String,
    pub email: String,
    pub sport: Option<String>,
    pub password_hash: String,
    pub otp_code: String,
    pub otp_expires: DateTime<Utc>,
}

impl PendingUser {
    pub fn code_matches(&self, code: &str) -> bool {
        self.otp_code == code
    }

    pub fn is_code_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.otp_expires
    }
}

/// Six ASCII digits, uniform over 100000..=999999.
pub fn generate_otp_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999u32).to_string()
}
