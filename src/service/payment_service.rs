use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::PaymentConfig,
    domain::*,
    error::{AppError, Result},
    payments::{OrderRequest, PaymentGateway},
    repository::{ApplicationRepository, PaymentRecordOutcome, PaymentRepository},
};

/// What the browser needs to open checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOrder {
    pub order_id: String,
    pub application_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Verified {
        application: Application,
        /// `None` when this confirmation had already been recorded.
        payment: Option<Payment>,
    },
    InvalidSignature,
}

pub struct PaymentService {
    application_repo: Arc<dyn ApplicationRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    fee_minor: i64,
    currency: String,
}

impl PaymentService {
    pub fn new(
        application_repo: Arc<dyn ApplicationRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        config: &PaymentConfig,
    ) -> Self {
        Self {
            application_repo,
            payment_repo,
            gateway,
            fee_minor: config.registration_fee_minor,
            currency: config.currency.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.gateway.is_some()
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>> {
        self.gateway
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("Payment gateway is not configured".to_string()))
    }

    /// Creates a gateway order for the caller's application once every
    /// required section is complete. The order id is stored only after the
    /// gateway has confirmed it.
    pub async fn create_order(&self, user_id: Uuid) -> Result<CheckoutOrder> {
        let gateway = self.gateway()?;

        let application = match self.application_repo.find_by_user(user_id).await? {
            Some(application) => application,
            None => self.application_repo.create_empty(user_id).await?,
        };

        if application.payment_status == PaymentStatus::Completed {
            return Err(AppError::Conflict("Registration fee already paid".to_string()));
        }

        if let Some(summary) = application.incomplete_summary() {
            return Err(AppError::Validation(summary));
        }

        let order = gateway
            .create_order(&OrderRequest {
                amount: self.fee_minor,
                currency: self.currency.clone(),
                receipt: format!("receipt_{}", application.id.simple()),
            })
            .await?;

        let application = self
            .application_repo
            .set_order(application.id, &order.id, order.amount)
            .await?;

        tracing::info!(
            "Created order {} for application {} ({} {})",
            order.id, application.id, order.amount, order.currency
        );

        Ok(CheckoutOrder {
            order_id: order.id,
            application_id: application.id,
            amount: order.amount,
            currency: order.currency,
            key: gateway.public_key().to_string(),
        })
    }

    pub async fn verify(&self, confirmation: GatewayConfirmation) -> Result<VerificationOutcome> {
        let gateway = self.gateway()?;

        if !gateway.verify_signature(&confirmation) {
            tracing::warn!("Rejected payment signature for order {}", confirmation.order_id);
            return Ok(VerificationOutcome::InvalidSignature);
        }

        match self.payment_repo.record_verified(&confirmation, &self.currency).await? {
            PaymentRecordOutcome::Recorded { application, payment } => {
                tracing::info!(
                    "Payment {} completed application {}",
                    confirmation.payment_id, application.id
                );
                Ok(VerificationOutcome::Verified { application, payment: Some(payment) })
            }
            PaymentRecordOutcome::AlreadyRecorded { application } => {
                tracing::debug!("Order {} was already verified", confirmation.order_id);
                Ok(VerificationOutcome::Verified { application, payment: None })
            }
            PaymentRecordOutcome::UnknownOrder => Err(AppError::NotFound(
                "No application found for this order".to_string(),
            )),
        }
    }

    /// Keeps an audit row for a checkout the gateway reported as failed. The
    /// application stays payable so the user can retry with a new order.
    pub async fn record_failure(&self, user_id: Uuid, order_id: &str, reason: Option<&str>) -> Result<Payment> {
        let application = self
            .application_repo
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

        if application.razorpay_order_id.as_deref() != Some(order_id) {
            return Err(AppError::BadRequest("Order does not match the current application order".to_string()));
        }

        if application.payment_status == PaymentStatus::Completed {
            return Err(AppError::Conflict("Registration fee already paid".to_string()));
        }

        tracing::warn!(
            "Checkout failed for order {}: {}",
            order_id,
            reason.unwrap_or("no reason given")
        );

        self.payment_repo
            .create(NewPayment {
                user_id,
                application_id: application.id,
                razorpay_order_id: order_id.to_string(),
                razorpay_payment_id: None,
                razorpay_signature: None,
                amount: application.order_amount.unwrap_or(self.fee_minor),
                currency: self.currency.clone(),
                status: PaymentRecordStatus::Failed,
            })
            .await
    }

    pub async fn payments_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>> {
        self.payment_repo.find_by_user(user_id).await
    }

    pub async fn list_with_owner(&self) -> Result<Vec<PaymentWithOwner>> {
        self.payment_repo.list_with_owner().await
    }

    pub async fn stats(&self) -> Result<PaymentStats> {
        self.payment_repo.stats().await
    }
}
