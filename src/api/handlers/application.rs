use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::{
    api::{extract::ValidatedJson, middleware::auth::CurrentUser, state::AppState},
    domain::{Application, Section, SectionProgress},
    error::Result,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SaveSectionRequest {
    pub section: Section,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct SaveSectionResponse {
    pub message: String,
    pub application: Application,
}

/// The caller's application, or `{}` before anything has been saved.
pub async fn load(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Value>> {
    let application = state
        .service_context
        .application_service
        .load(current.user.id)
        .await?;

    Ok(Json(match application {
        Some(application) => serde_json::to_value(application)?,
        None => Value::Object(Default::default()),
    }))
}

pub async fn save_section(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<SaveSectionRequest>,
) -> Result<Json<SaveSectionResponse>> {
    let application = state
        .service_context
        .application_service
        .save_section(current.user.id, req.section, req.data)
        .await?;

    Ok(Json(SaveSectionResponse {
        message: format!("{} saved", req.section.as_str()),
        application,
    }))
}

pub async fn progress(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<SectionProgress>> {
    let progress = state
        .service_context
        .application_service
        .progress(current.user.id)
        .await?;

    Ok(Json(progress))
}
