use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub payments: PaymentConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub otp: OtpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub uploads_dir: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Keys the digest under which session tokens are stored.
    pub session_secret: String,
    pub session_duration_hours: i64,
    pub secure_cookies: bool,
    /// Fallback admin login, compared literally against the submitted pair.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Razorpay credentials and the registration fee charged per application.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PaymentConfig {
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub api_base_url: String,
    /// Minor currency units (paise for INR).
    pub registration_fee_minor: i64,
    pub currency: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OtpConfig {
    pub code_ttl_minutes: i64,
    /// Pending signups older than this are treated as gone, whatever their code expiry says.
    pub pending_retention_minutes: i64,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("payments.registration_fee_minor", 50_000)?
            .set_default("otp.code_ttl_minutes", 10)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with BEACON__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("BEACON").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl PaymentConfig {
    pub fn is_configured(&self) -> bool {
        self.key_id.as_deref().is_some_and(|k| !k.is_empty())
            && self.key_secret.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            uploads_dir: "uploads".to_string(),
            max_upload_bytes: 2 * 1024 * 1024,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://beacon.db?mode=rwc".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: "change-me-in-production".to_string(),
            session_duration_hours: 24,
            secure_cookies: false,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            key_id: None,
            key_secret: None,
            api_base_url: "https://api.razorpay.com/v1".to_string(),
            registration_fee_minor: 50_000,
            currency: "INR".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_address: "Beacon Scholarship <no-reply@beacon.local>".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_ttl_minutes: 10,
            pending_retention_minutes: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_registration_fee() {
        let settings = Settings::default();
        assert_eq!(settings.payments.registration_fee_minor, 50_000);
        assert_eq!(settings.payments.currency, "INR");
        assert_eq!(settings.otp.code_ttl_minutes, 10);
        assert!(!settings.payments.is_configured());
    }

    #[test]
    fn empty_gateway_key_is_not_configured() {
        let payments = PaymentConfig {
            key_id: Some(String::new()),
            key_secret: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(!payments.is_configured());
    }
}
