use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::user_devices},
};
use domain::{entities::user_devices::UserDeviceEntity, repositories::devices::DeviceRepository};

pub struct DevicePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl DevicePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl DeviceRepository for DevicePostgres {
    async fn list_devices(&self, user_id: Uuid) -> Result<Vec<UserDeviceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = user_devices::table
            .filter(user_devices::user_id.eq(user_id))
            .order(user_devices::last_active_at.desc())
            .select(UserDeviceEntity::as_select())
            .load::<UserDeviceEntity>(&mut conn)?;

        Ok(results)
    }

    async fn touch_device(
        &self,
        user_id: Uuid,
        device_id: String,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(user_devices::table)
            .filter(user_devices::user_id.eq(user_id))
            .filter(user_devices::device_id.eq(device_id))
            .set(user_devices::last_active_at.eq(now))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn add_device_within_limit(
        &self,
        user_id: Uuid,
        device_id: String,
        device_limit: i32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let added = conn
            .build_transaction()
            .serializable()
            .run::<_, diesel::result::Error, _>(|conn| {
                let registered = user_devices::table
                    .filter(user_devices::user_id.eq(user_id))
                    .count()
                    .get_result::<i64>(conn)?;

                if registered >= i64::from(device_limit) {
                    return Ok(false);
                }

                let inserted = insert_into(user_devices::table)
                    .values(&UserDeviceEntity {
                        user_id,
                        device_id,
                        last_active_at: now,
                    })
                    .on_conflict((user_devices::user_id, user_devices::device_id))
                    .do_update()
                    .set(user_devices::last_active_at.eq(now))
                    .execute(conn)?;

                Ok(inserted > 0)
            })?;

        Ok(added)
    }

    async fn remove_device(&self, user_id: Uuid, device_id: String) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let removed = delete(user_devices::table)
            .filter(user_devices::user_id.eq(user_id))
            .filter(user_devices::device_id.eq(device_id))
            .execute(&mut conn)?;

        Ok(removed > 0)
    }
}
