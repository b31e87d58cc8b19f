use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::channels},
};
use domain::{
    entities::channels::{ChannelEntity, InsertChannelEntity, UpdateChannelEntity},
    repositories::channels::ChannelRepository,
};

pub struct ChannelPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ChannelPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ChannelRepository for ChannelPostgres {
    async fn list_active(&self, category: Option<String>) -> Result<Vec<ChannelEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = channels::table
            .filter(channels::is_active.eq(true))
            .into_boxed();

        if let Some(category) = category {
            query = query.filter(channels::category.eq(category));
        }

        let results = query
            .order((channels::sort_order.asc(), channels::name.asc()))
            .select(ChannelEntity::as_select())
            .load::<ChannelEntity>(&mut conn)?;

        Ok(results)
    }

    async fn list_categories(&self) -> Result<Vec<String>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Ordered by where each category first appears in the channel order.
        let mut rows = channels::table
            .filter(channels::is_active.eq(true))
            .group_by(channels::category)
            .select((channels::category, diesel::dsl::min(channels::sort_order)))
            .load::<(String, Option<i32>)>(&mut conn)?;

        rows.sort_by_key(|(_, first_order)| first_order.unwrap_or(i32::MAX));

        Ok(rows.into_iter().map(|(category, _)| category).collect())
    }

    async fn find_by_id(&self, channel_id: Uuid) -> Result<Option<ChannelEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let channel = channels::table
            .filter(channels::id.eq(channel_id))
            .select(ChannelEntity::as_select())
            .first::<ChannelEntity>(&mut conn)
            .optional()?;

        Ok(channel)
    }

    async fn create(&self, channel: InsertChannelEntity) -> Result<ChannelEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let created = insert_into(channels::table)
            .values(&channel)
            .returning(ChannelEntity::as_returning())
            .get_result::<ChannelEntity>(&mut conn)?;

        Ok(created)
    }

    async fn update(
        &self,
        channel_id: Uuid,
        changes: UpdateChannelEntity,
    ) -> Result<Option<ChannelEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(channels::table)
            .filter(channels::id.eq(channel_id))
            .set(&changes)
            .returning(ChannelEntity::as_returning())
            .get_result::<ChannelEntity>(&mut conn)
            .optional()?;

        Ok(updated)
    }

    async fn delete(&self, channel_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(channels::table)
            .filter(channels::id.eq(channel_id))
            .execute(&mut conn)?;

        Ok(deleted > 0)
    }

    async fn count(&self) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = channels::table.count().get_result::<i64>(&mut conn)?;

        Ok(total)
    }

    async fn replace_all(&self, new_channels: Vec<InsertChannelEntity>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            delete(channels::table).execute(conn)?;

            // Stay well under the Postgres bind-parameter limit.
            let mut inserted = 0;
            for chunk in new_channels.chunks(1000) {
                inserted += insert_into(channels::table).values(chunk).execute(conn)?;
            }
            Ok(inserted)
        })?;

        Ok(inserted)
    }
}
