use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod user_repository;
pub mod pending_user_repository;
pub mod application_repository;
pub mod payment_repository;

pub use user_repository::SqliteUserRepository;
pub use pending_user_repository::SqlitePendingUserRepository;
pub use application_repository::SqliteApplicationRepository;
pub use payment_repository::SqlitePaymentRepository;

/// Count of records created in one calendar month, keyed `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total: i64,
    pub admins: i64,
    pub regular_users: i64,
    pub recent_users: i64,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn get_password_hash(&self, email: &str) -> Result<Option<String>>;
    async fn list(&self) -> Result<Vec<User>>;
    async fn update(&self, id: Uuid, update: UpdateUserRequest) -> Result<User>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn counts(&self, recent_since: DateTime<Utc>) -> Result<UserCounts>;
    async fn monthly_signups(&self, since: DateTime<Utc>) -> Result<Vec<MonthlyCount>>;
}

#[async_trait]
pub trait PendingUserRepository: Send + Sync {
    /// Inserts or replaces the pending signup for `pending.email`.
    async fn upsert(&self, pending: NewPendingUser) -> Result<PendingUser>;
    /// Only returns records still inside the retention window.
    async fn find_by_email(&self, email: &str) -> Result<Option<PendingUser>>;
    /// Creates the verified user and removes the pending record in one transaction.
    async fn promote(&self, pending: &PendingUser) -> Result<User>;
    async fn purge_stale(&self) -> Result<u64>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>>;
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Application>>;
    /// Upserts one section for the owner, leaving every other column untouched.
    async fn save_section(&self, user_id: Uuid, update: &SectionUpdate) -> Result<Application>;
    async fn create_empty(&self, user_id: Uuid) -> Result<Application>;
    async fn set_order(&self, id: Uuid, order_id: &str, amount: i64) -> Result<Application>;
    async fn update_approval(&self, id: Uuid, status: ApprovalStatus) -> Result<Option<Application>>;
    async fn list_with_owner(&self) -> Result<Vec<ApplicationWithOwner>>;
    async fn stats(&self) -> Result<ApplicationStats>;
    async fn monthly_submissions(&self, since: DateTime<Utc>) -> Result<Vec<MonthlyCount>>;
}

/// Effect of an authentic gateway confirmation.
#[derive(Debug, Clone)]
pub enum PaymentRecordOutcome {
    Recorded { application: Application, payment: Payment },
    AlreadyRecorded { application: Application },
    UnknownOrder,
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: NewPayment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Payment>>;
    async fn find_by_application(&self, application_id: Uuid) -> Result<Vec<Payment>>;
    /// Marks the application holding the order as paid and appends a `paid`
    /// record, atomically.
    async fn record_verified(
        &self,
        confirmation: &GatewayConfirmation,
        currency: &str,
    ) -> Result<PaymentRecordOutcome>;
    async fn list_with_owner(&self) -> Result<Vec<PaymentWithOwner>>;
    async fn stats(&self) -> Result<PaymentStats>;
}
