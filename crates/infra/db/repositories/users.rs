use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, select, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{subscriptions, users},
    },
};
use domain::{
    entities::{
        subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
        users::{InsertUserEntity, UserEntity},
    },
    repositories::users::UserRepository,
};

pub struct UserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for UserPostgres {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = users::table
            .filter(users::id.eq(user_id))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(user)
    }

    async fn find_by_email(&self, email: String) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = users::table
            .filter(users::email.eq(email.to_lowercase()))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(user)
    }

    async fn find_by_username(&self, username: String) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = users::table
            .filter(users::username.eq(username))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(user)
    }

    async fn username_exists(&self, username: String) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let exists = select(diesel::dsl::exists(
            users::table.filter(users::username.eq(username)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(exists)
    }

    async fn create_with_subscription(
        &self,
        user: InsertUserEntity,
        subscription: InsertSubscriptionEntity,
    ) -> Result<(UserEntity, SubscriptionEntity)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let created = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let user = insert_into(users::table)
                .values(&user)
                .returning(UserEntity::as_returning())
                .get_result::<UserEntity>(conn)?;

            let subscription = insert_into(subscriptions::table)
                .values(&InsertSubscriptionEntity {
                    user_id: user.id,
                    ..subscription
                })
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(conn)?;

            Ok((user, subscription))
        })?;

        Ok(created)
    }

    async fn update_phone_number(
        &self,
        user_id: Uuid,
        phone_number: Option<String>,
    ) -> Result<UserEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = update(users::table)
            .filter(users::id.eq(user_id))
            .set((
                users::phone_number.eq(phone_number),
                users::updated_at.eq(Utc::now()),
            ))
            .returning(UserEntity::as_returning())
            .get_result::<UserEntity>(&mut conn)?;

        Ok(user)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = users::table
            .order(users::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(UserEntity::as_select())
            .load::<UserEntity>(&mut conn)?;

        Ok(results)
    }

    async fn count_users(&self) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = users::table.count().get_result::<i64>(&mut conn)?;

        Ok(total)
    }
}
