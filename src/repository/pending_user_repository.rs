use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{NewPendingUser, PendingUser, User, UserRole},
    error::{AppError, Result},
    repository::{
        user_repository::{SqliteUserRepository, UserRow, USER_COLUMNS},
        PendingUserRepository,
    },
};

#[derive(FromRow)]
struct PendingUserRow {
    id: String,
    name: String,
    email: String,
    sport: Option<String>,
    password_hash: String,
    otp_code: String,
    otp_expires: NaiveDateTime,
    created_at: NaiveDateTime,
}

/// Pending signups, with a creation-based retention window enforced on every read.
pub struct SqlitePendingUserRepository {
    pool: SqlitePool,
    retention: Duration,
}

impl SqlitePendingUserRepository {
    pub fn new(pool: SqlitePool, retention: Duration) -> Self {
        Self { pool, retention }
    }

    fn cutoff(&self) -> NaiveDateTime {
        (Utc::now() - self.retention).naive_utc()
    }

    fn row_to_pending(row: PendingUserRow) -> Result<PendingUser> {
        Ok(PendingUser {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            name: row.name,
            email: row.email,
            sport: row.sport,
            password_hash: row.password_hash,
            otp_code: row.otp_code,
            otp_expires: DateTime::from_naive_utc_and_offset(row.otp_expires, Utc),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl PendingUserRepository for SqlitePendingUserRepository {
    async fn upsert(&self, pending: NewPendingUser) -> Result<PendingUser> {
        let now = Utc::now().naive_utc();

        // A repeated signup replaces name, password and code, and restarts both windows.
        sqlx::query(
            r#"
            INSERT INTO pending_users (id, name, email, sport, password_hash, otp_code, otp_expires, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                name = excluded.name,
                sport = excluded.sport,
                password_hash = excluded.password_hash,
                otp_code = excluded.otp_code,
                otp_expires = excluded.otp_expires,
                created_at = excluded.created_at
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&pending.name)
        .bind(&pending.email)
        .bind(&pending.sport)
        .bind(&pending.password_hash)
        .bind(&pending.otp_code)
        .bind(pending.otp_expires.naive_utc())
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_email(&pending.email).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve pending signup".to_string())
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<PendingUser>> {
        let row = sqlx::query_as::<_, PendingUserRow>(
            r#"
            SELECT id, name, email, sport, password_hash, otp_code, otp_expires, created_at
            FROM pending_users
            WHERE email = ? AND created_at > ?
            "#
        )
        .bind(email)
        .bind(self.cutoff())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_pending).transpose()
    }

    async fn promote(&self, pending: &PendingUser) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, sport, password_hash, role, is_verified, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#
        )
        .bind(&id)
        .bind(&pending.name)
        .bind(&pending.email)
        .bind(&pending.sport)
        .bind(&pending.password_hash)
        .bind(UserRole::User.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.message().contains("UNIQUE") => {
                AppError::Conflict("User already exists and is verified".to_string())
            }
            other => AppError::from(other),
        })?;

        sqlx::query("DELETE FROM pending_users WHERE id = ?")
            .bind(pending.id.to_string())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, UserRow>(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS)
        )
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        SqliteUserRepository::row_to_user(row)
    }

    async fn purge_stale(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pending_users WHERE created_at <= ?")
            .bind(self.cutoff())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
