mod common;

use beacon::{
    domain::{
        AcademicInfo, GatewayConfirmation, NewPendingUser, NewUser, PaymentRecordStatus,
        PaymentStatus, PersonalInfo, SectionUpdate, UserRole,
    },
    error::AppError,
    repository::{
        ApplicationRepository, PaymentRecordOutcome, PaymentRepository, PendingUserRepository,
        SqliteApplicationRepository, SqlitePaymentRepository, SqlitePendingUserRepository,
        SqliteUserRepository, UserRepository,
    },
};
use chrono::{Duration, Utc};
use common::test_pool;
use uuid::Uuid;

fn pending(email: &str, code: &str) -> NewPendingUser {
    NewPendingUser {
        name: "Kiran".to_string(),
        email: email.to_string(),
        sport: Some("Cricket".to_string()),
        password_hash: "hash".to_string(),
        otp_code: code.to_string(),
        otp_expires: Utc::now() + Duration::minutes(10),
    }
}

async fn verified_user(repo: &SqliteUserRepository, email: &str) -> anyhow::Result<Uuid> {
    let user = repo
        .create(NewUser {
            name: "Meera".to_string(),
            email: email.to_string(),
            sport: None,
            password_hash: "hash".to_string(),
            role: UserRole::User,
            is_verified: true,
        })
        .await?;
    Ok(user.id)
}

#[tokio::test]
async fn repeated_signup_replaces_pending_code() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqlitePendingUserRepository::new(pool.clone(), Duration::minutes(10));

    repo.upsert(pending("kiran@example.com", "111111")).await?;
    repo.upsert(pending("kiran@example.com", "222222")).await?;

    let found = repo.find_by_email("kiran@example.com").await?.expect("pending row");
    assert_eq!(found.otp_code, "222222");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pending_users")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);

    Ok(())
}

#[tokio::test]
async fn pending_rows_past_retention_are_invisible_and_purged() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqlitePendingUserRepository::new(pool.clone(), Duration::minutes(10));

    repo.upsert(pending("old@example.com", "123456")).await?;
    repo.upsert(pending("new@example.com", "654321")).await?;

    sqlx::query("UPDATE pending_users SET created_at = ? WHERE email = ?")
        .bind((Utc::now() - Duration::minutes(11)).naive_utc())
        .bind("old@example.com")
        .execute(&pool)
        .await?;

    assert!(repo.find_by_email("old@example.com").await?.is_none());
    assert!(repo.find_by_email("new@example.com").await?.is_some());

    assert_eq!(repo.purge_stale().await?, 1);
    assert_eq!(repo.purge_stale().await?, 0);

    Ok(())
}

#[tokio::test]
async fn promotion_creates_verified_user_and_consumes_pending() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let pending_repo = SqlitePendingUserRepository::new(pool.clone(), Duration::minutes(10));
    let user_repo = SqliteUserRepository::new(pool.clone());

    let record = pending_repo.upsert(pending("kiran@example.com", "123456")).await?;
    let user = pending_repo.promote(&record).await?;

    assert!(user.is_verified);
    assert_eq!(user.role, UserRole::User);
    assert_eq!(user.sport.as_deref(), Some("Cricket"));
    assert!(pending_repo.find_by_email("kiran@example.com").await?.is_none());
    assert!(user_repo.find_by_email("kiran@example.com").await?.is_some());

    Ok(())
}

#[tokio::test]
async fn failed_promotion_keeps_pending_row() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let pending_repo = SqlitePendingUserRepository::new(pool.clone(), Duration::minutes(10));
    let user_repo = SqliteUserRepository::new(pool.clone());

    verified_user(&user_repo, "kiran@example.com").await?;
    let record = pending_repo.upsert(pending("kiran@example.com", "123456")).await?;

    let err = pending_repo.promote(&record).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(pending_repo.find_by_email("kiran@example.com").await?.is_some());

    Ok(())
}

#[tokio::test]
async fn section_saves_leave_other_sections_alone() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let user_repo = SqliteUserRepository::new(pool.clone());
    let repo = SqliteApplicationRepository::new(pool.clone());
    let user_id = verified_user(&user_repo, "meera@example.com").await?;

    repo.save_section(
        user_id,
        &SectionUpdate::PersonalInfo(PersonalInfo {
            full_name: Some("Meera Iyer".to_string()),
            ..Default::default()
        }),
    )
    .await?;
    let saved = repo
        .save_section(
            user_id,
            &SectionUpdate::AcademicInfo(AcademicInfo {
                is_studying: Some(false),
                ..Default::default()
            }),
        )
        .await?;

    let personal = saved.personal_info.expect("personal info kept");
    assert_eq!(personal.full_name.as_deref(), Some("Meera Iyer"));
    assert_eq!(saved.academic_info.and_then(|a| a.is_studying), Some(false));
    assert!(saved.sports_info.is_none());

    // Overwriting a section replaces it wholesale.
    let saved = repo
        .save_section(user_id, &SectionUpdate::PersonalInfo(PersonalInfo::default()))
        .await?;
    assert_eq!(saved.personal_info, Some(PersonalInfo::default()));
    assert!(saved.academic_info.is_some());

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM applications")
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);

    Ok(())
}

#[tokio::test]
async fn verified_payment_is_recorded_once() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let user_repo = SqliteUserRepository::new(pool.clone());
    let app_repo = SqliteApplicationRepository::new(pool.clone());
    let payment_repo = SqlitePaymentRepository::new(pool.clone());

    let user_id = verified_user(&user_repo, "meera@example.com").await?;
    let application = app_repo.create_empty(user_id).await?;
    app_repo.set_order(application.id, "order_abc", 50_000).await?;

    let confirmation = GatewayConfirmation {
        order_id: "order_abc".to_string(),
        payment_id: "pay_xyz".to_string(),
        signature: "sig".to_string(),
    };

    match payment_repo.record_verified(&confirmation, "INR").await? {
        PaymentRecordOutcome::Recorded { application, payment } => {
            assert_eq!(application.payment_status, PaymentStatus::Completed);
            assert_eq!(application.razorpay_payment_id.as_deref(), Some("pay_xyz"));
            assert_eq!(payment.status, PaymentRecordStatus::Paid);
            assert_eq!(payment.amount, 50_000);
        }
        other => panic!("expected Recorded, got {:?}", other),
    }

    assert!(matches!(
        payment_repo.record_verified(&confirmation, "INR").await?,
        PaymentRecordOutcome::AlreadyRecorded { .. }
    ));
    assert_eq!(payment_repo.find_by_application(application.id).await?.len(), 1);

    // Only the payment that completed the order replays successfully.
    let other_payment = GatewayConfirmation {
        payment_id: "pay_other".to_string(),
        ..confirmation.clone()
    };
    assert!(matches!(
        payment_repo.record_verified(&other_payment, "INR").await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(payment_repo.find_by_application(application.id).await?.len(), 1);

    // A paid application cannot take a new order.
    assert!(matches!(
        app_repo.set_order(application.id, "order_def", 50_000).await,
        Err(AppError::Conflict(_))
    ));

    let unknown = GatewayConfirmation {
        order_id: "order_missing".to_string(),
        ..confirmation
    };
    assert!(matches!(
        payment_repo.record_verified(&unknown, "INR").await?,
        PaymentRecordOutcome::UnknownOrder
    ));

    let stats = payment_repo.stats().await?;
    assert_eq!(stats.paid_count, 1);
    assert_eq!(stats.total_revenue, 500.0);

    Ok(())
}
