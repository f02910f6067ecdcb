use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit record of one gateway transaction attempt. Never updated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub application_id: Uuid,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub status: PaymentRecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Created,
    Paid,
    Failed,
}

impl PaymentRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRecordStatus::Created => "created",
            PaymentRecordStatus::Paid => "paid",
            PaymentRecordStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub application_id: Uuid,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentRecordStatus,
}

/// The three opaque values the gateway hands back after checkout.
#[derive(Debug, Clone)]
pub struct GatewayConfirmation {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Payment listing row for the admin back-office.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWithOwner {
    #[serde(flatten)]
    pub payment: Payment,
    pub user: Option<OwnerRef>,
    pub applicant_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRef {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStats {
    /// Sum of paid amounts in major currency units.
    pub total_revenue: f64,
    pub count: i64,
    pub paid_count: i64,
    pub failed_count: i64,
}
