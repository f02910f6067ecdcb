use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::PaymentConfig,
    domain::GatewayConfirmation,
    error::{AppError, Result},
    payments::signature,
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OrderRequest {
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Key id handed to the browser checkout. Never the secret.
    fn public_key(&self) -> &str;
    fn verify_signature(&self, confirmation: &GatewayConfirmation) -> bool;
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder>;
}

/// Razorpay orders API over HTTPS with basic auth.
pub struct RazorpayGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    /// `None` when the key pair is incomplete; callers decide how loudly to complain.
    pub fn from_config(config: &PaymentConfig) -> Result<Option<Self>> {
        let (Some(key_id), Some(key_secret)) = (&config.key_id, &config.key_secret) else {
            return Ok(None);
        };
        if !config.is_configured() {
            return Ok(None);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Some(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            key_id: key_id.clone(),
            key_secret: key_secret.clone(),
        }))
    }
}

#[derive(Deserialize)]
struct RazorpayErrorBody {
    error: RazorpayErrorDetail,
}

#[derive(Deserialize)]
struct RazorpayErrorDetail {
    description: Option<String>,
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn public_key(&self) -> &str {
        &self.key_id
    }

    fn verify_signature(&self, confirmation: &GatewayConfirmation) -> bool {
        signature::verify(
            &self.key_secret,
            &confirmation.order_id,
            &confirmation.payment_id,
            &confirmation.signature,
        )
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Razorpay request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<RazorpayErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.description)
                .unwrap_or_else(|| "no error description".to_string());
            return Err(AppError::External(format!(
                "Razorpay order creation failed ({}): {}",
                status, detail
            )));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| AppError::External(format!("Unexpected Razorpay response: {}", e)))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeGateway;

#[cfg(any(test, feature = "test-utils"))]
mod fake {
    use std::sync::atomic::{AtomicU64, Ordering};

    use tokio::sync::Mutex;

    use super::*;

    /// In-process gateway that issues sequential order ids and signs with a
    /// known secret.
    pub struct FakeGateway {
        key_id: String,
        key_secret: String,
        next_order: AtomicU64,
        orders: Mutex<Vec<OrderRequest>>,
        fail: bool,
    }

    impl FakeGateway {
        pub fn new(key_secret: &str) -> Self {
            Self {
                key_id: "rzp_test_fake".to_string(),
                key_secret: key_secret.to_string(),
                next_order: AtomicU64::new(1),
                orders: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        /// Every order creation answers with an upstream error.
        pub fn unreachable(key_secret: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(key_secret)
            }
        }

        /// Signature the real checkout would hand back for this pair.
        pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
            signature::sign(&self.key_secret, order_id, payment_id)
        }

        pub async fn orders(&self) -> Vec<OrderRequest> {
            self.orders.lock().await.clone()
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        fn public_key(&self) -> &str {
            &self.key_id
        }

        fn verify_signature(&self, confirmation: &GatewayConfirmation) -> bool {
            signature::verify(
                &self.key_secret,
                &confirmation.order_id,
                &confirmation.payment_id,
                &confirmation.signature,
            )
        }

        async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
            if self.fail {
                return Err(AppError::External("gateway unreachable".to_string()));
            }
            let n = self.next_order.fetch_add(1, Ordering::SeqCst);
            self.orders.lock().await.push(request.clone());
            Ok(GatewayOrder {
                id: format!("order_fake{:06}", n),
                amount: request.amount,
                currency: request.currency.clone(),
            })
        }
    }
}
