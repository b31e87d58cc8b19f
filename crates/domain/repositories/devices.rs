use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::user_devices::UserDeviceEntity;

#[automock]
#[async_trait]
pub trait DeviceRepository {
    async fn list_devices(&self, user_id: Uuid) -> Result<Vec<UserDeviceEntity>>;

    async fn touch_device(&self, user_id: Uuid, device_id: String, now: DateTime<Utc>)
    -> Result<()>;

    /// Registers the device unless the user already holds `device_limit`
    /// devices. Returns `false` when the limit was hit; the count and insert
    /// run in one transaction.
    async fn add_device_within_limit(
        &self,
        user_id: Uuid,
        device_id: String,
        device_limit: i32,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    async fn remove_device(&self, user_id: Uuid, device_id: String) -> Result<bool>;
}
