use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Application, ApplicationStats, ApplicationWithOwner, ApprovalStatus, OwnerRef,
        PaymentStatus, SectionUpdate,
    },
    error::{AppError, Result},
    repository::{ApplicationRepository, MonthlyCount},
};

// Section columns hold JSON documents; NULL means the section was never saved.
#[derive(FromRow)]
pub(crate) struct ApplicationRow {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) personal_info: Option<String>,
    pub(crate) academic_info: Option<String>,
    pub(crate) sports_info: Option<String>,
    pub(crate) additional_info: Option<String>,
    pub(crate) documents: Option<String>,
    pub(crate) payment_status: String,
    pub(crate) approval_status: String,
    pub(crate) razorpay_order_id: Option<String>,
    pub(crate) razorpay_payment_id: Option<String>,
    pub(crate) order_amount: Option<i64>,
    pub(crate) created_at: NaiveDateTime,
    pub(crate) updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct ApplicationOwnerRow {
    #[sqlx(flatten)]
    application: ApplicationRow,
    owner_name: Option<String>,
    owner_email: Option<String>,
}

pub(crate) const APPLICATION_COLUMNS: &str = "id, user_id, personal_info, academic_info, \
    sports_info, additional_info, documents, payment_status, approval_status, \
    razorpay_order_id, razorpay_payment_id, order_amount, created_at, updated_at";

pub struct SqliteApplicationRepository {
    pool: SqlitePool,
}

impl SqliteApplicationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn row_to_application(row: ApplicationRow) -> Result<Application> {
        Ok(Application {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            personal_info: parse_document(row.personal_info)?,
            academic_info: parse_document(row.academic_info)?,
            sports_info: parse_document(row.sports_info)?,
            additional_info: parse_document(row.additional_info)?,
            documents: parse_document(row.documents)?,
            payment_status: parse_payment_status(&row.payment_status)?,
            approval_status: parse_approval_status(&row.approval_status)?,
            razorpay_order_id: row.razorpay_order_id,
            razorpay_payment_id: row.razorpay_payment_id,
            order_amount: row.order_amount,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn fetch_required(&self, id: Uuid) -> Result<Application> {
        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve application".to_string())
        })
    }
}

fn parse_document<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>> {
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| AppError::Database(format!("Corrupt section document: {}", e)))
    })
    .transpose()
}

pub(crate) fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
    match s {
        "pending" => Ok(PaymentStatus::Pending),
        "completed" => Ok(PaymentStatus::Completed),
        "failed" => Ok(PaymentStatus::Failed),
        _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
    }
}

fn parse_approval_status(s: &str) -> Result<ApprovalStatus> {
    match s {
        "pending" => Ok(ApprovalStatus::Pending),
        "viewed" => Ok(ApprovalStatus::Viewed),
        "approved" => Ok(ApprovalStatus::Approved),
        "rejected" => Ok(ApprovalStatus::Rejected),
        _ => Err(AppError::Database(format!("Invalid approval status: {}", s))),
    }
}

#[async_trait]
impl ApplicationRepository for SqliteApplicationRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            &format!("SELECT {} FROM applications WHERE id = ?", APPLICATION_COLUMNS)
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_application).transpose()
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            &format!("SELECT {} FROM applications WHERE user_id = ?", APPLICATION_COLUMNS)
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_application).transpose()
    }

    async fn save_section(&self, user_id: Uuid, update: &SectionUpdate) -> Result<Application> {
        let column = update.section().column();
        let document = update.to_document()?;
        let now = Utc::now().naive_utc();

        // The UNIQUE(user_id) constraint turns concurrent first saves into one row.
        let sql = format!(
            r#"
            INSERT INTO applications (id, user_id, {column}, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                {column} = excluded.{column},
                updated_at = excluded.updated_at
            "#,
            column = column
        );

        sqlx::query(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(user_id.to_string())
            .bind(document)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

        self.find_by_user(user_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve saved application".to_string())
        })
    }

    async fn create_empty(&self, user_id: Uuid) -> Result<Application> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO applications (id, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_user(user_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created application".to_string())
        })
    }

    async fn set_order(&self, id: Uuid, order_id: &str, amount: i64) -> Result<Application> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE applications
            SET razorpay_order_id = ?, order_amount = ?, updated_at = ?
            WHERE id = ? AND payment_status != 'completed'
            "#
        )
        .bind(order_id)
        .bind(amount)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Payment already completed".to_string()));
        }

        self.fetch_required(id).await
    }

    async fn update_approval(&self, id: Uuid, status: ApprovalStatus) -> Result<Option<Application>> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            "UPDATE applications SET approval_status = ?, updated_at = ? WHERE id = ?"
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.fetch_required(id).await.map(Some)
    }

    async fn list_with_owner(&self) -> Result<Vec<ApplicationWithOwner>> {
        let rows = sqlx::query_as::<_, ApplicationOwnerRow>(
            r#"
            SELECT a.id, a.user_id, a.personal_info, a.academic_info, a.sports_info,
                   a.additional_info, a.documents, a.payment_status, a.approval_status,
                   a.razorpay_order_id, a.razorpay_payment_id, a.order_amount,
                   a.created_at, a.updated_at,
                   u.name AS owner_name, u.email AS owner_email
            FROM applications a
            LEFT JOIN users u ON u.id = a.user_id
            ORDER BY a.created_at DESC
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let user = match (row.owner_name, row.owner_email) {
                    (Some(name), Some(email)) => Some(OwnerRef { name, email }),
                    _ => None,
                };
                Ok(ApplicationWithOwner {
                    application: Self::row_to_application(row.application)?,
                    user,
                })
            })
            .collect()
    }

    async fn stats(&self) -> Result<ApplicationStats> {
        let (total, paid, pending_payments, approved) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN payment_status = 'completed' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN payment_status = 'pending' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN approval_status = 'approved' THEN 1 ELSE 0 END), 0)
            FROM applications
            "#
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ApplicationStats { total, paid, pending_payments, approved })
    }

    async fn monthly_submissions(&self, since: DateTime<Utc>) -> Result<Vec<MonthlyCount>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT strftime('%Y-%m', created_at) AS month, COUNT(*)
            FROM applications
            WHERE created_at >= ?
            GROUP BY month
            ORDER BY month
            "#
        )
        .bind(since.naive_utc())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(month, count)| MonthlyCount { month, count }).collect())
    }
}
