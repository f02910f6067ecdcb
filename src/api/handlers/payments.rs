use axum::{
    extract::State,
    http::StatusCode,
    Extension,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{extract::ValidatedJson, middleware::auth::CurrentUser, state::AppState},
    domain::{GatewayConfirmation, Payment, PaymentStatus},
    error::Result,
    service::VerificationOutcome,
};

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, message = "is required"))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, message = "is required"))]
    pub razorpay_signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentFailedRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub razorpay_order_id: String,
    #[validate(length(max = 500, message = "is too long"))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentFailedResponse {
    pub message: String,
    pub payment: Payment,
}

/// No session required: the gateway signature is the credential.
pub async fn verify(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyPaymentRequest>,
) -> Result<(StatusCode, Json<VerifyPaymentResponse>)> {
    let confirmation = GatewayConfirmation {
        order_id: req.razorpay_order_id,
        payment_id: req.razorpay_payment_id,
        signature: req.razorpay_signature,
    };

    let outcome = state
        .service_context
        .payment_service
        .verify(confirmation)
        .await?;

    Ok(match outcome {
        VerificationOutcome::Verified { application, .. } => (
            StatusCode::OK,
            Json(VerifyPaymentResponse {
                success: true,
                message: "Payment verified successfully".to_string(),
                application_id: Some(application.id),
                payment_status: Some(application.payment_status),
            }),
        ),
        VerificationOutcome::InvalidSignature => (
            StatusCode::BAD_REQUEST,
            Json(VerifyPaymentResponse {
                success: false,
                message: "Invalid payment signature".to_string(),
                application_id: None,
                payment_status: None,
            }),
        ),
    })
}

pub async fn failed(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ValidatedJson(req): ValidatedJson<PaymentFailedRequest>,
) -> Result<Json<PaymentFailedResponse>> {
    let payment = state
        .service_context
        .payment_service
        .record_failure(current.user.id, &req.razorpay_order_id, req.reason.as_deref())
        .await?;

    Ok(Json(PaymentFailedResponse {
        message: "Payment failure recorded. You can retry the payment.".to_string(),
        payment,
    }))
}
