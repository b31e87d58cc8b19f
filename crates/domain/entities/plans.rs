use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::plans;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanEntity {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub month_duration: i32,
    /// Kopecks.
    pub price_minor: i32,
    pub discount_percent: i32,
    pub device_limit: i32,
    pub is_popular: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = plans)]
pub struct InsertPlanEntity {
    pub name: String,
    pub description: String,
    pub month_duration: i32,
    pub price_minor: i32,
    pub discount_percent: i32,
    pub device_limit: i32,
    pub is_popular: bool,
    pub sort_order: i32,
}
