use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payments;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub provider_payment_id: String,
    pub status: String,
    pub amount_minor: i32,
    pub currency: String,
    pub description: String,
    pub confirmation_url: Option<String>,
    pub is_recurring: bool,
    pub payment_method_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub provider_payment_id: String,
    pub status: String,
    pub amount_minor: i32,
    pub currency: String,
    pub description: String,
    pub confirmation_url: Option<String>,
    pub is_recurring: bool,
    pub payment_method_ref: Option<String>,
}
