use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

use crate::api::state::AppState;

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": "Beacon Scholarship API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Scholarship registration, payment and review",
        "status": "operational",
        "paymentsConfigured": state.service_context.payment_service.is_configured(),
        "endpoints": {
            "health": "/health",
            "auth": "/auth/login",
            "signup": "/auth/signup",
            "application": "/user/application/save-section",
            "register": "/register",
            "admin": "/admin"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
