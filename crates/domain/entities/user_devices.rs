use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::user_devices;

#[derive(Debug, Clone, PartialEq, Selectable, Queryable, Insertable)]
#[diesel(table_name = user_devices)]
pub struct UserDeviceEntity {
    pub user_id: Uuid,
    pub device_id: String,
    pub last_active_at: DateTime<Utc>,
}
