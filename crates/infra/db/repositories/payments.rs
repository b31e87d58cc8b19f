use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{payment_methods, payments, plans, subscriptions},
    },
};
use domain::{
    entities::{
        payment_methods::InsertPaymentMethodEntity,
        payments::{InsertPaymentEntity, PaymentEntity},
        subscriptions::SubscriptionEntity,
    },
    repositories::payments::PaymentRepository,
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payments::{SettleSucceededPayment, SettlementWrite},
        subscriptions::extend_expiry,
    },
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[derive(Debug)]
enum SettleTxError {
    Db(diesel::result::Error),
    Expiry(anyhow::Error),
}

impl From<diesel::result::Error> for SettleTxError {
    fn from(err: diesel::result::Error) -> Self {
        SettleTxError::Db(err)
    }
}

impl From<SettleTxError> for anyhow::Error {
    fn from(err: SettleTxError) -> Self {
        match err {
            SettleTxError::Db(err) => err.into(),
            SettleTxError::Expiry(err) => err,
        }
    }
}

/// Inserts or refreshes a saved method and makes it the user's default, so
/// the card just paid with is the one renewals charge. Returns its gateway id.
fn upsert_saved_method(
    conn: &mut PgConnection,
    method: &InsertPaymentMethodEntity,
) -> Result<String, diesel::result::Error> {
    // At most one default per user; clear the others before claiming it.
    update(payment_methods::table)
        .filter(payment_methods::user_id.eq(method.user_id))
        .filter(payment_methods::provider_method_id.ne(&method.provider_method_id))
        .filter(payment_methods::is_default.eq(true))
        .set(payment_methods::is_default.eq(false))
        .execute(conn)?;

    insert_into(payment_methods::table)
        .values((method, payment_methods::is_default.eq(true)))
        .on_conflict(payment_methods::provider_method_id)
        .do_update()
        .set((
            payment_methods::title.eq(&method.title),
            payment_methods::card_expiry_month.eq(&method.card_expiry_month),
            payment_methods::card_expiry_year.eq(&method.card_expiry_year),
            payment_methods::is_default.eq(true),
        ))
        .execute(conn)?;

    Ok(method.provider_method_id.clone())
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn record_payment(&self, payment: InsertPaymentEntity) -> Result<PaymentEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let recorded = insert_into(payments::table)
            .values(&payment)
            .returning(PaymentEntity::as_returning())
            .get_result::<PaymentEntity>(&mut conn)?;

        Ok(recorded)
    }

    async fn find_by_provider_payment_id(
        &self,
        provider_payment_id: String,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .filter(payments::provider_payment_id.eq(provider_payment_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn list_by_user_with_plan(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(PaymentEntity, Option<(String, i32)>)>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payments::table
            .left_join(plans::table)
            .filter(payments::user_id.eq(user_id))
            .order(payments::created_at.desc())
            .select((
                PaymentEntity::as_select(),
                (plans::name, plans::month_duration).nullable(),
            ))
            .load::<(PaymentEntity, Option<(String, i32)>)>(&mut conn)?;

        Ok(results)
    }

    async fn transition_status(
        &self,
        provider_payment_id: String,
        from: PaymentStatus,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(payments::table)
            .filter(payments::provider_payment_id.eq(provider_payment_id))
            .filter(payments::status.eq(from.as_str()))
            .set((
                payments::status.eq(to.as_str()),
                payments::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn settle_succeeded(
        &self,
        settlement: SettleSucceededPayment,
    ) -> Result<SettlementWrite> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<_, SettleTxError, _>(|conn| {
            let guarded = update(payments::table)
                .filter(payments::provider_payment_id.eq(&settlement.provider_payment_id))
                .filter(payments::status.eq_any([
                    PaymentStatus::Pending.as_str(),
                    PaymentStatus::WaitingForCapture.as_str(),
                ]))
                .set((
                    payments::status.eq(PaymentStatus::Succeeded.as_str()),
                    payments::paid_at.eq(Some(settlement.paid_at)),
                    payments::payment_method_ref.eq(&settlement.payment_method_ref),
                    payments::updated_at.eq(settlement.paid_at),
                ))
                .execute(conn)?;

            if guarded == 0 {
                return Ok(SettlementWrite::AlreadySettled);
            }

            let current = subscriptions::table
                .filter(subscriptions::user_id.eq(settlement.user_id))
                .select(SubscriptionEntity::as_select())
                .for_update()
                .first::<SubscriptionEntity>(conn)
                .optional()?;

            let (current_expiry, is_active) = current
                .as_ref()
                .map(|sub| (sub.expires_at, sub.is_active))
                .unwrap_or((None, false));

            let expires_at = extend_expiry(
                current_expiry,
                is_active,
                settlement.month_duration,
                settlement.paid_at,
            )
            .map_err(SettleTxError::Expiry)?;

            let saved_default_ref = match settlement.saved_method.as_ref() {
                Some(method) => Some(upsert_saved_method(conn, method)?),
                None => None,
            };

            let auto_renewal = saved_default_ref.is_some();
            let default_method_ref = saved_default_ref
                .or_else(|| current.and_then(|sub| sub.default_payment_method_ref));

            insert_into(subscriptions::table)
                .values((
                    subscriptions::user_id.eq(settlement.user_id),
                    subscriptions::is_active.eq(true),
                    subscriptions::device_limit.eq(settlement.device_limit),
                    subscriptions::expires_at.eq(Some(expires_at)),
                    subscriptions::plan_id.eq(Some(settlement.plan_id)),
                    subscriptions::last_payment_id.eq(Some(settlement.provider_payment_id.clone())),
                    subscriptions::auto_renewal.eq(auto_renewal),
                    subscriptions::default_payment_method_ref.eq(&default_method_ref),
                    subscriptions::updated_at.eq(settlement.paid_at),
                ))
                .on_conflict(subscriptions::user_id)
                .do_update()
                .set((
                    subscriptions::is_active.eq(true),
                    subscriptions::device_limit.eq(settlement.device_limit),
                    subscriptions::expires_at.eq(Some(expires_at)),
                    subscriptions::plan_id.eq(Some(settlement.plan_id)),
                    subscriptions::last_payment_id.eq(Some(settlement.provider_payment_id.clone())),
                    subscriptions::auto_renewal.eq(auto_renewal),
                    subscriptions::default_payment_method_ref.eq(&default_method_ref),
                    subscriptions::updated_at.eq(settlement.paid_at),
                ))
                .execute(conn)?;

            Ok(SettlementWrite::Activated {
                expires_at,
                auto_renewal,
            })
        })?;

        Ok(outcome)
    }

    async fn count_succeeded(&self) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = payments::table
            .filter(payments::status.eq(PaymentStatus::Succeeded.as_str()))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::repositories::test_support::{
        default_refs, renewal_state, saved_card, seed_user_and_plan, test_pool,
    };

    async fn pay_with_card(
        repo: &PaymentPostgres,
        user_id: Uuid,
        plan_id: Uuid,
        provider_payment_id: &str,
        card_ref: &str,
    ) -> SettlementWrite {
        repo.record_payment(InsertPaymentEntity {
            user_id,
            plan_id,
            provider_payment_id: provider_payment_id.to_string(),
            status: PaymentStatus::Pending.as_str().to_string(),
            amount_minor: 29_900,
            currency: "RUB".to_string(),
            description: "Subscription for 1 month".to_string(),
            confirmation_url: None,
            is_recurring: false,
            payment_method_ref: None,
        })
        .await
        .unwrap();

        repo.settle_succeeded(SettleSucceededPayment {
            provider_payment_id: provider_payment_id.to_string(),
            user_id,
            plan_id,
            month_duration: 1,
            device_limit: 2,
            paid_at: Utc::now(),
            payment_method_ref: Some(card_ref.to_string()),
            saved_method: Some(saved_card(user_id, card_ref)),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL with migrations applied"]
    async fn first_saved_card_becomes_default() {
        let pool = test_pool();
        let (user_id, plan_id) = seed_user_and_plan(&pool);
        let repo = PaymentPostgres::new(Arc::clone(&pool));

        let write = pay_with_card(&repo, user_id, plan_id, "pay-first", "pm-first").await;

        assert!(matches!(
            write,
            SettlementWrite::Activated {
                auto_renewal: true,
                ..
            }
        ));
        assert_eq!(default_refs(&pool, user_id), vec!["pm-first".to_string()]);
        assert_eq!(
            renewal_state(&pool, user_id),
            (true, Some("pm-first".to_string()))
        );
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL with migrations applied"]
    async fn newly_saved_card_replaces_the_renewal_default() {
        let pool = test_pool();
        let (user_id, plan_id) = seed_user_and_plan(&pool);
        let repo = PaymentPostgres::new(Arc::clone(&pool));

        pay_with_card(&repo, user_id, plan_id, "pay-old", "pm-old").await;
        pay_with_card(&repo, user_id, plan_id, "pay-new", "pm-new").await;

        assert_eq!(default_refs(&pool, user_id), vec!["pm-new".to_string()]);
        assert_eq!(
            renewal_state(&pool, user_id),
            (true, Some("pm-new".to_string()))
        );
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL with migrations applied"]
    async fn settling_twice_extends_only_once() {
        let pool = test_pool();
        let (user_id, plan_id) = seed_user_and_plan(&pool);
        let repo = PaymentPostgres::new(Arc::clone(&pool));

        pay_with_card(&repo, user_id, plan_id, "pay-once", "pm-once").await;
        let replay = repo
            .settle_succeeded(SettleSucceededPayment {
                provider_payment_id: "pay-once".to_string(),
                user_id,
                plan_id,
                month_duration: 1,
                device_limit: 2,
                paid_at: Utc::now(),
                payment_method_ref: Some("pm-once".to_string()),
                saved_method: Some(saved_card(user_id, "pm-once")),
            })
            .await
            .unwrap();

        assert_eq!(replay, SettlementWrite::AlreadySettled);
    }
}
