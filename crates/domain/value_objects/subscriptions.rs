use anyhow::{Context, Result};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;

/// New expiry after paying for `months`. A subscription that is still running
/// is extended from its current end; a lapsed or trial-less one starts now.
pub fn extend_expiry(
    current_expiry: Option<DateTime<Utc>>,
    is_active: bool,
    months: i32,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let starts_at = match current_expiry {
        Some(expires_at) if is_active && expires_at > now => expires_at,
        _ => now,
    };

    let months = u32::try_from(months).context("plan month duration must be positive")?;
    starts_at
        .checked_add_months(Months::new(months))
        .context("failed to compute subscription end date")
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDto {
    pub active: bool,
    pub device_limit: i32,
    pub expire_date: Option<DateTime<Utc>>,
    pub plan_id: Option<Uuid>,
    pub last_payment_id: Option<String>,
    pub auto_renewal: bool,
    pub default_payment_method_id: Option<String>,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            active: value.is_active,
            device_limit: value.device_limit,
            expire_date: value.expires_at,
            plan_id: value.plan_id,
            last_payment_id: value.last_payment_id,
            auto_renewal: value.auto_renewal,
            default_payment_method_id: value.default_payment_method_ref,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRenewalRequest {
    pub enable: bool,
    pub payment_method_id: Option<Uuid>,
}
