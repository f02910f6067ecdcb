use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Application, Payment, SectionProgress, User},
    error::Result,
};

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub application: Option<Application>,
    pub progress: SectionProgress,
    pub payments: Vec<Payment>,
    pub user: User,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<DashboardResponse>> {
    let services = &state.service_context;
    let user_id = current.user.id;

    let (application, payments) = tokio::join!(
        services.application_service.load(user_id),
        services.payment_service.payments_for_user(user_id),
    );
    let application = application?;

    let progress = application
        .as_ref()
        .map(Application::progress)
        .unwrap_or_else(SectionProgress::empty);

    Ok(Json(DashboardResponse {
        application,
        progress,
        payments: payments?,
        user: current.user,
    }))
}
