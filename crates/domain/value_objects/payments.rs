use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{payment_methods::InsertPaymentMethodEntity, payments::PaymentEntity},
    value_objects::plans::format_amount,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentModel {
    pub plan_id: Uuid,
    pub return_url: Option<String>,
    pub save_payment_method: Option<bool>,
    pub two_step_payment: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecurringPaymentModel {
    pub plan_id: Uuid,
    pub payment_method_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePaymentModel {
    /// Decimal rubles, e.g. `"299.00"`. Full amount when absent.
    pub amount: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPaymentDto {
    pub payment_id: String,
    pub status: String,
    pub confirmation_url: Option<String>,
    pub amount: String,
    pub currency: String,
}

/// Status as seen by the client after a check or capture.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusDto {
    pub payment_id: String,
    pub status: String,
    pub paid: bool,
    pub amount: String,
    pub currency: String,
    pub subscription_activated: bool,
    pub expire_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryItemDto {
    pub id: Uuid,
    pub payment_id: String,
    pub status: String,
    pub amount: String,
    pub currency: String,
    pub description: String,
    pub is_recurring: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub plan_id: Uuid,
    pub plan_name: Option<String>,
    pub plan_duration: Option<i32>,
}

impl PaymentHistoryItemDto {
    pub fn new(payment: PaymentEntity, plan: Option<(String, i32)>) -> Self {
        let (plan_name, plan_duration) = match plan {
            Some((name, duration)) => (Some(name), Some(duration)),
            None => (None, None),
        };
        Self {
            id: payment.id,
            payment_id: payment.provider_payment_id,
            status: payment.status,
            amount: format_amount(payment.amount_minor),
            currency: payment.currency,
            description: payment.description,
            is_recurring: payment.is_recurring,
            paid_at: payment.paid_at,
            created_at: payment.created_at,
            plan_id: payment.plan_id,
            plan_name,
            plan_duration,
        }
    }
}

/// Everything the repository needs to apply a succeeded payment atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct SettleSucceededPayment {
    pub provider_payment_id: String,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub month_duration: i32,
    pub device_limit: i32,
    pub paid_at: DateTime<Utc>,
    pub payment_method_ref: Option<String>,
    /// Present when the gateway reported a reusable method.
    pub saved_method: Option<InsertPaymentMethodEntity>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementWrite {
    Activated { expires_at: DateTime<Utc>, auto_renewal: bool },
    /// Another trigger already moved the payment to succeeded.
    AlreadySettled,
}
