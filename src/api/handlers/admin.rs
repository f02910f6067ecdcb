use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
    Json,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{extract::ValidatedJson, middleware::auth::CurrentUser, state::AppState},
    domain::{
        Application, ApplicationStats, ApplicationWithOwner, ApprovalStatus, PaymentStats,
        PaymentWithOwner, UpdateUserRequest, User, UserRole,
    },
    error::{AppError, Result},
    repository::{MonthlyCount, UserCounts},
};

const CHART_MONTHS: u32 = 6;

#[derive(Debug, Serialize)]
pub struct ApplicationsResponse {
    pub applications: Vec<ApplicationWithOwner>,
    pub stats: ApplicationStats,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
    pub stats: UserCounts,
}

#[derive(Debug, Serialize)]
pub struct PaymentsResponse {
    pub payments: Vec<PaymentWithOwner>,
    pub stats: PaymentStats,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ChartPoint {
    /// `YYYY-MM`
    pub month: String,
    pub label: String,
    pub users: i64,
    pub applications: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub users: UserCounts,
    pub applications: ApplicationStats,
    pub chart_data: Vec<ChartPoint>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApprovalRequest {
    pub approval_status: ApprovalStatus,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_verified: Option<bool>,
}

pub async fn list_applications(State(state): State<AppState>) -> Result<Json<ApplicationsResponse>> {
    let service = &state.service_context.application_service;
    let (applications, stats) = tokio::join!(service.list_with_owner(), service.stats());

    Ok(Json(ApplicationsResponse {
        applications: applications?,
        stats: stats?,
    }))
}

pub async fn update_application(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateApprovalRequest>,
) -> Result<Json<Application>> {
    let application = state
        .service_context
        .application_service
        .set_approval(id, req.approval_status)
        .await?;

    tracing::info!(
        "{} set application {} to {}",
        current.user.email, id, req.approval_status.as_str()
    );

    Ok(Json(application))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<UsersResponse>> {
    let user_repo = &state.service_context.user_repo;
    let (users, stats) = tokio::join!(
        user_repo.list(),
        user_repo.counts(Utc::now() - Duration::days(7)),
    );

    Ok(Json(UsersResponse {
        users: users?,
        stats: stats?,
    }))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AdminUpdateUserRequest>,
) -> Result<Json<User>> {
    let update = UpdateUserRequest {
        name: req.name.map(|n| n.trim().to_string()),
        role: req.role,
        is_verified: req.is_verified,
    };

    let user = state.service_context.user_repo.update(id, update).await?;
    Ok(Json(user))
}

/// Removes the account and its sessions. Applications and payments stay for the record.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if id == current.user.id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }

    let services = &state.service_context;
    services.auth_service.invalidate_user_sessions(id).await?;
    services.user_repo.delete(id).await?;

    tracing::info!("{} deleted user {}", current.user.email, id);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_payments(State(state): State<AppState>) -> Result<Json<PaymentsResponse>> {
    let service = &state.service_context.payment_service;
    let (payments, stats) = tokio::join!(service.list_with_owner(), service.stats());

    Ok(Json(PaymentsResponse {
        payments: payments?,
        stats: stats?,
    }))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let services = &state.service_context;
    let now = Utc::now();
    let months = recent_months(now, CHART_MONTHS);
    let since = months
        .first()
        .and_then(|first| first.and_hms_opt(0, 0, 0))
        .map(|start| Utc.from_utc_datetime(&start))
        .unwrap_or(now);

    let (users, applications, signups, submissions) = tokio::join!(
        services.user_repo.counts(now - Duration::days(7)),
        services.application_service.stats(),
        services.user_repo.monthly_signups(since),
        services.application_repo.monthly_submissions(since),
    );

    Ok(Json(StatsResponse {
        users: users?,
        applications: applications?,
        chart_data: chart_data(&months, &signups?, &submissions?),
    }))
}

/// First day of each of the last `count` calendar months, oldest first.
fn recent_months(now: DateTime<Utc>, count: u32) -> Vec<NaiveDate> {
    let (mut year, mut month) = (now.year(), now.month());
    let mut months = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) {
            months.push(first);
        }
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    months.reverse();
    months
}

fn chart_data(months: &[NaiveDate], signups: &[MonthlyCount], submissions: &[MonthlyCount]) -> Vec<ChartPoint> {
    let count_for = |series: &[MonthlyCount], key: &str| {
        series
            .iter()
            .find(|m| m.month == key)
            .map(|m| m.count)
            .unwrap_or(0)
    };

    months
        .iter()
        .map(|first| {
            let key = first.format("%Y-%m").to_string();
            ChartPoint {
                label: first.format("%b %Y").to_string(),
                users: count_for(signups, &key),
                applications: count_for(submissions, &key),
                month: key,
            }
        })
        .collect()
}
