use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};
use domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::subscriptions::SubscriptionRepository,
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn update_auto_renewal(
        &self,
        user_id: Uuid,
        auto_renewal: bool,
        default_payment_method_ref: Option<String>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        match default_payment_method_ref {
            Some(method_ref) => {
                update(subscriptions::table)
                    .filter(subscriptions::user_id.eq(user_id))
                    .set((
                        subscriptions::auto_renewal.eq(auto_renewal),
                        subscriptions::default_payment_method_ref.eq(Some(method_ref)),
                        subscriptions::updated_at.eq(now),
                    ))
                    .execute(&mut conn)?;
            }
            None => {
                update(subscriptions::table)
                    .filter(subscriptions::user_id.eq(user_id))
                    .set((
                        subscriptions::auto_renewal.eq(auto_renewal),
                        subscriptions::updated_at.eq(now),
                    ))
                    .execute(&mut conn)?;
            }
        }

        Ok(())
    }

    async fn list_due_for_renewal(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = subscriptions::table
            .filter(subscriptions::is_active.eq(true))
            .filter(subscriptions::auto_renewal.eq(true))
            .filter(subscriptions::expires_at.gt(from))
            .filter(subscriptions::expires_at.le(until))
            .order(subscriptions::expires_at.asc())
            .select(SubscriptionEntity::as_select())
            .load::<SubscriptionEntity>(&mut conn)?;

        Ok(results)
    }

    async fn count_active(&self, now: DateTime<Utc>) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = subscriptions::table
            .filter(subscriptions::is_active.eq(true))
            .filter(
                subscriptions::expires_at
                    .is_null()
                    .or(subscriptions::expires_at.gt(now)),
            )
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(total)
    }
}
