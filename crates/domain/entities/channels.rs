use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::channels;

#[derive(Debug, Clone, PartialEq, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = channels)]
#[serde(rename_all = "camelCase")]
pub struct ChannelEntity {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub language: String,
    pub stream_url: String,
    pub logo_url: Option<String>,
    pub tvg_id: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = channels)]
pub struct InsertChannelEntity {
    pub name: String,
    pub category: String,
    pub language: String,
    pub stream_url: String,
    pub logo_url: Option<String>,
    pub tvg_id: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = channels)]
pub struct UpdateChannelEntity {
    pub name: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub stream_url: Option<String>,
    pub logo_url: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}
