use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    api::{extract::ValidatedJson, state::AppState},
    domain::SessionUser,
    error::Result,
    service::NewSignup,
};

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100, message = "is required"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "must be at least 6 characters"))]
    pub password: String,
    pub sport: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub message: String,
    pub user: SessionUser,
}

pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<Json<SignupResponse>> {
    let email = state
        .service_context
        .signup_service
        .request_signup(NewSignup {
            name: req.name,
            email: req.email,
            password: req.password,
            sport: req.sport,
        })
        .await?;

    Ok(Json(SignupResponse {
        message: "Verification code sent to your email".to_string(),
        email,
    }))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>> {
    let user = state
        .service_context
        .signup_service
        .verify_code(&req.email, &req.otp)
        .await?;

    Ok(Json(VerifyOtpResponse {
        message: "Email verified successfully. You can now log in.".to_string(),
        user: SessionUser::from(&user),
    }))
}
