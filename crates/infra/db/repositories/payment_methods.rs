use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, delete, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{payment_methods, subscriptions},
    },
};
use domain::{
    entities::payment_methods::PaymentMethodEntity,
    repositories::payment_methods::PaymentMethodRepository,
    value_objects::payment_methods::{DefaultAfterRemoval, default_after_removal},
};

pub struct PaymentMethodPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentMethodPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn point_subscription_at(
    conn: &mut PgConnection,
    user_id: Uuid,
    method_ref: Option<String>,
) -> Result<(), diesel::result::Error> {
    let target = update(subscriptions::table).filter(subscriptions::user_id.eq(user_id));

    match method_ref {
        Some(method_ref) => target
            .set((
                subscriptions::default_payment_method_ref.eq(Some(method_ref)),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?,
        // Nothing left to charge automatically.
        None => target
            .set((
                subscriptions::default_payment_method_ref.eq(None::<String>),
                subscriptions::auto_renewal.eq(false),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?,
    };

    Ok(())
}

#[async_trait]
impl PaymentMethodRepository for PaymentMethodPostgres {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payment_methods::table
            .filter(payment_methods::user_id.eq(user_id))
            .order((
                payment_methods::is_default.desc(),
                payment_methods::created_at.desc(),
            ))
            .select(PaymentMethodEntity::as_select())
            .load::<PaymentMethodEntity>(&mut conn)?;

        Ok(results)
    }

    async fn find_for_user(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> Result<Option<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let method = payment_methods::table
            .filter(payment_methods::id.eq(method_id))
            .filter(payment_methods::user_id.eq(user_id))
            .select(PaymentMethodEntity::as_select())
            .first::<PaymentMethodEntity>(&mut conn)
            .optional()?;

        Ok(method)
    }

    async fn set_default(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> Result<Option<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let method = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let owned = payment_methods::table
                .filter(payment_methods::id.eq(method_id))
                .filter(payment_methods::user_id.eq(user_id))
                .select(PaymentMethodEntity::as_select())
                .first::<PaymentMethodEntity>(conn)
                .optional()?;

            let Some(owned) = owned else {
                return Ok(None);
            };

            update(payment_methods::table)
                .filter(payment_methods::user_id.eq(user_id))
                .filter(payment_methods::is_default.eq(true))
                .set(payment_methods::is_default.eq(false))
                .execute(conn)?;

            let method = update(payment_methods::table)
                .filter(payment_methods::id.eq(owned.id))
                .set(payment_methods::is_default.eq(true))
                .returning(PaymentMethodEntity::as_returning())
                .get_result::<PaymentMethodEntity>(conn)?;

            update(subscriptions::table)
                .filter(subscriptions::user_id.eq(user_id))
                .set((
                    subscriptions::default_payment_method_ref
                        .eq(Some(method.provider_method_id.clone())),
                    subscriptions::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            Ok(Some(method))
        })?;

        Ok(method)
    }

    async fn delete_for_user(&self, user_id: Uuid, method_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let removed = delete(payment_methods::table)
                .filter(payment_methods::id.eq(method_id))
                .filter(payment_methods::user_id.eq(user_id))
                .returning(PaymentMethodEntity::as_returning())
                .get_result::<PaymentMethodEntity>(conn)
                .optional()?;

            let Some(removed) = removed else {
                return Ok(false);
            };

            let remaining = payment_methods::table
                .filter(payment_methods::user_id.eq(user_id))
                .select(PaymentMethodEntity::as_select())
                .load::<PaymentMethodEntity>(conn)?;

            match default_after_removal(&removed, &remaining) {
                DefaultAfterRemoval::Unchanged => {}
                DefaultAfterRemoval::Promote {
                    method_id,
                    provider_method_id,
                } => {
                    update(payment_methods::table)
                        .filter(payment_methods::id.eq(method_id))
                        .set(payment_methods::is_default.eq(true))
                        .execute(conn)?;
                    point_subscription_at(conn, user_id, Some(provider_method_id))?;
                }
                DefaultAfterRemoval::NoneLeft => point_subscription_at(conn, user_id, None)?,
            }

            Ok(true)
        })?;

        Ok(deleted)
    }
}
