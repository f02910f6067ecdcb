use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Application, GatewayConfirmation, NewPayment, OwnerRef, Payment, PaymentRecordStatus,
        PaymentStats, PaymentStatus, PaymentWithOwner,
    },
    error::{AppError, Result},
    repository::{
        application_repository::{ApplicationRow, SqliteApplicationRepository, APPLICATION_COLUMNS},
        PaymentRecordOutcome, PaymentRepository,
    },
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    user_id: String,
    application_id: String,
    razorpay_order_id: String,
    razorpay_payment_id: Option<String>,
    razorpay_signature: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct PaymentOwnerRow {
    #[sqlx(flatten)]
    payment: PaymentRow,
    owner_name: Option<String>,
    owner_email: Option<String>,
    applicant_name: Option<String>,
}

const PAYMENT_COLUMNS: &str = "id, user_id, application_id, razorpay_order_id, \
    razorpay_payment_id, razorpay_signature, amount, currency, status, created_at, updated_at";

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            application_id: Uuid::parse_str(&row.application_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            razorpay_order_id: row.razorpay_order_id,
            razorpay_payment_id: row.razorpay_payment_id,
            razorpay_signature: row.razorpay_signature,
            amount: row.amount,
            currency: row.currency,
            status: Self::parse_record_status(&row.status)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_record_status(s: &str) -> Result<PaymentRecordStatus> {
        match s {
            "created" => Ok(PaymentRecordStatus::Created),
            "paid" => Ok(PaymentRecordStatus::Paid),
            "failed" => Ok(PaymentRecordStatus::Failed),
            _ => Err(AppError::Database(format!("Invalid payment record status: {}", s))),
        }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: NewPayment) -> Result<Payment> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, application_id, razorpay_order_id, razorpay_payment_id,
                razorpay_signature, amount, currency, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(payment.user_id.to_string())
        .bind(payment.application_id.to_string())
        .bind(&payment.razorpay_order_id)
        .bind(&payment.razorpay_payment_id)
        .bind(&payment.razorpay_signature)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            &format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS)
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            &format!(
                "SELECT {} FROM payments WHERE user_id = ? ORDER BY created_at DESC",
                PAYMENT_COLUMNS
            )
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn find_by_application(&self, application_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            &format!(
                "SELECT {} FROM payments WHERE application_id = ? ORDER BY created_at DESC",
                PAYMENT_COLUMNS
            )
        )
        .bind(application_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn record_verified(
        &self,
        confirmation: &GatewayConfirmation,
        currency: &str,
    ) -> Result<PaymentRecordOutcome> {
        let mut tx = self.pool.begin().await?;
        let select_by_order = format!(
            "SELECT {} FROM applications WHERE razorpay_order_id = ?",
            APPLICATION_COLUMNS
        );

        let Some(row) = sqlx::query_as::<_, ApplicationRow>(&select_by_order)
            .bind(&confirmation.order_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(PaymentRecordOutcome::UnknownOrder);
        };
        let application = SqliteApplicationRepository::row_to_application(row)?;

        if !application.payment_status.can_transition_to(PaymentStatus::Completed) {
            if application.payment_status == PaymentStatus::Completed {
                return already_recorded(application, &confirmation.payment_id);
            }
            return Err(AppError::Conflict(format!(
                "Payment is {} and cannot be completed",
                application.payment_status.as_str()
            )));
        }

        let now = Utc::now().naive_utc();

        // Guarded on the current status so a concurrent verification of the
        // same order cannot record a second paid row.
        let updated = sqlx::query(
            r#"
            UPDATE applications
            SET payment_status = 'completed', razorpay_payment_id = ?, updated_at = ?
            WHERE id = ? AND payment_status = 'pending'
            "#
        )
        .bind(&confirmation.payment_id)
        .bind(now)
        .bind(application.id.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            let application = self
                .find_application(&confirmation.order_id)
                .await?
                .ok_or_else(|| AppError::Database("Application vanished during verification".to_string()))?;
            return already_recorded(application, &confirmation.payment_id);
        }

        let payment_id = Uuid::new_v4();
        let amount = application.order_amount.unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, application_id, razorpay_order_id, razorpay_payment_id,
                razorpay_signature, amount, currency, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(payment_id.to_string())
        .bind(application.user_id.to_string())
        .bind(application.id.to_string())
        .bind(&confirmation.order_id)
        .bind(&confirmation.payment_id)
        .bind(&confirmation.signature)
        .bind(amount)
        .bind(currency)
        .bind(PaymentRecordStatus::Paid.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let app_row = sqlx::query_as::<_, ApplicationRow>(&select_by_order)
            .bind(&confirmation.order_id)
            .fetch_one(&mut *tx)
            .await?;
        let payment_row = sqlx::query_as::<_, PaymentRow>(
            &format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS)
        )
        .bind(payment_id.to_string())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PaymentRecordOutcome::Recorded {
            application: SqliteApplicationRepository::row_to_application(app_row)?,
            payment: Self::row_to_payment(payment_row)?,
        })
    }

    async fn list_with_owner(&self) -> Result<Vec<PaymentWithOwner>> {
        let rows = sqlx::query_as::<_, PaymentOwnerRow>(
            r#"
            SELECT p.id, p.user_id, p.application_id, p.razorpay_order_id,
                   p.razorpay_payment_id, p.razorpay_signature, p.amount, p.currency,
                   p.status, p.created_at, p.updated_at,
                   u.name AS owner_name, u.email AS owner_email,
                   json_extract(a.personal_info, '$.fullName') AS applicant_name
            FROM payments p
            LEFT JOIN users u ON u.id = p.user_id
            LEFT JOIN applications a ON a.id = p.application_id
            ORDER BY p.created_at DESC
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
                Ok(PaymentWithOwner {
                    payment: Self::row_to_payment(row.payment)?,
                    user,
                    applicant_name: row.applicant_name,
                })
            })
            .collect()
    }

    async fn stats(&self) -> Result<PaymentStats> {
        let (paid_minor, count, paid_count, failed_count) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN status = 'paid' THEN amount ELSE 0 END), 0),
                   COUNT(*),
                   COALESCE(SUM(CASE WHEN status = 'paid' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
            FROM payments
            "#
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(PaymentStats {
            total_revenue: paid_minor as f64 / 100.0,
            count,
            paid_count,
            failed_count,
        })
    }
}

/// A completed order only replays for the payment that completed it.
fn already_recorded(application: Application, payment_id: &str) -> Result<PaymentRecordOutcome> {
    if application.razorpay_payment_id.as_deref() != Some(payment_id) {
        return Err(AppError::Conflict(
            "Order was already paid with a different payment".to_string(),
        ));
    }
    Ok(PaymentRecordOutcome::AlreadyRecorded { application })
}

impl SqlitePaymentRepository {
    async fn find_application(&self, order_id: &str) -> Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            &format!("SELECT {} FROM applications WHERE razorpay_order_id = ?", APPLICATION_COLUMNS)
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SqliteApplicationRepository::row_to_application).transpose()
    }
}
