pub mod signup_service;
pub mod application_service;
pub mod payment_service;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use sqlx::SqlitePool;

use crate::auth::AuthService;
use crate::config::Settings;
use crate::email::EmailSender;
use crate::payments::PaymentGateway;
use crate::repository::*;
use application_service::ApplicationService;
use payment_service::PaymentService;
use signup_service::SignupService;

pub use payment_service::{CheckoutOrder, VerificationOutcome};
pub use signup_service::NewSignup;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub pending_user_repo: Arc<dyn PendingUserRepository>,
    pub application_repo: Arc<dyn ApplicationRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub auth_service: Arc<AuthService>,
    pub signup_service: Arc<SignupService>,
    pub application_service: Arc<ApplicationService>,
    pub payment_service: Arc<PaymentService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    /// Wires the SQLite repositories and the services on top of them. The
    /// outbound collaborators are passed in so tests can substitute fakes.
    pub fn new(
        db_pool: SqlitePool,
        settings: &Settings,
        email_sender: Arc<dyn EmailSender>,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let pending_user_repo: Arc<dyn PendingUserRepository> = Arc::new(
            SqlitePendingUserRepository::new(
                db_pool.clone(),
                Duration::minutes(settings.otp.pending_retention_minutes),
            ),
        );
        let application_repo: Arc<dyn ApplicationRepository> =
            Arc::new(SqliteApplicationRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(db_pool.clone(), &settings.auth));

        let signup_service = Arc::new(SignupService::new(
            user_repo.clone(),
            pending_user_repo.clone(),
            email_sender,
            Duration::minutes(settings.otp.code_ttl_minutes),
            StdDuration::from_secs(settings.email.timeout_secs),
        ));
        let application_service = Arc::new(ApplicationService::new(application_repo.clone()));
        let payment_service = Arc::new(PaymentService::new(
            application_repo.clone(),
            payment_repo.clone(),
            gateway,
            &settings.payments,
        ));

        Self {
            user_repo,
            pending_user_repo,
            application_repo,
            payment_repo,
            auth_service,
            signup_service,
            application_service,
            payment_service,
            db_pool,
        }
    }
}
