use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::channels::{ChannelEntity, InsertChannelEntity, UpdateChannelEntity};

#[automock]
#[async_trait]
pub trait ChannelRepository {
    async fn list_active(&self, category: Option<String>) -> Result<Vec<ChannelEntity>>;

    async fn list_categories(&self) -> Result<Vec<String>>;

    async fn find_by_id(&self, channel_id: Uuid) -> Result<Option<ChannelEntity>>;

    async fn create(&self, channel: InsertChannelEntity) -> Result<ChannelEntity>;

    async fn update(
        &self,
        channel_id: Uuid,
        changes: UpdateChannelEntity,
    ) -> Result<Option<ChannelEntity>>;

    async fn delete(&self, channel_id: Uuid) -> Result<bool>;

    async fn count(&self) -> Result<i64>;

    /// Drops every channel and inserts `channels` in one transaction.
    async fn replace_all(&self, channels: Vec<InsertChannelEntity>) -> Result<usize>;
}
