use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::subscriptions;

/// One row per user; created together with the account as a trial.
#[derive(Debug, Clone, PartialEq, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub user_id: Uuid,
    pub is_active: bool,
    pub device_limit: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub plan_id: Option<Uuid>,
    pub last_payment_id: Option<String>,
    pub auto_renewal: bool,
    pub default_payment_method_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    /// Active flag set and expiry (if any) still in the future.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub user_id: Uuid,
    pub is_active: bool,
    pub device_limit: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renewal: bool,
}
