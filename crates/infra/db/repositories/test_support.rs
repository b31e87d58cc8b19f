use chrono::{DateTime, Utc};
use diesel::{
    Connection, PgConnection, RunQueryDsl, insert_into,
    prelude::*,
    r2d2::{ConnectionManager, CustomizeConnection, Error as R2d2Error, Pool},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::entities::{
        payment_methods::InsertPaymentMethodEntity, plans::InsertPlanEntity,
        subscriptions::InsertSubscriptionEntity, users::InsertUserEntity,
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{payment_methods, plans, subscriptions, users},
    },
};

/// Nothing a test writes outlives its pool.
#[derive(Debug)]
struct RollbackOnRelease;

impl CustomizeConnection<PgConnection, R2d2Error> for RollbackOnRelease {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), R2d2Error> {
        conn.begin_test_transaction().map_err(R2d2Error::QueryError)
    }
}

/// One connection, so every repository call sees the same open transaction.
pub fn test_pool() -> Arc<PgPoolSquad> {
    let database_url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL is not set");

    let pool = Pool::builder()
        .max_size(1)
        .connection_customizer(Box::new(RollbackOnRelease))
        .build(ConnectionManager::<PgConnection>::new(database_url))
        .expect("test pool");

    Arc::new(pool)
}

/// A user with an inactive subscription row, plus a one-month plan.
pub fn seed_user_and_plan(pool: &PgPoolSquad) -> (Uuid, Uuid) {
    let mut conn = pool.get().expect("test connection");
    let tag = Uuid::new_v4().simple().to_string();

    let user_id = insert_into(users::table)
        .values(&InsertUserEntity {
            email: format!("{tag}@example.test"),
            username: format!("user_{tag}"),
            password_hash: "not-a-real-hash".to_string(),
            is_admin: false,
        })
        .returning(users::id)
        .get_result::<Uuid>(&mut conn)
        .expect("insert user");

    insert_into(subscriptions::table)
        .values(&InsertSubscriptionEntity {
            user_id,
            is_active: false,
            device_limit: 1,
            expires_at: None,
            auto_renewal: false,
        })
        .execute(&mut conn)
        .expect("insert subscription");

    let plan_id = insert_into(plans::table)
        .values(&InsertPlanEntity {
            name: format!("Plan {tag}"),
            description: String::new(),
            month_duration: 1,
            price_minor: 29_900,
            discount_percent: 0,
            device_limit: 2,
            is_popular: false,
            sort_order: 0,
        })
        .returning(plans::id)
        .get_result::<Uuid>(&mut conn)
        .expect("insert plan");

    (user_id, plan_id)
}

pub fn saved_card(user_id: Uuid, provider_method_id: &str) -> InsertPaymentMethodEntity {
    InsertPaymentMethodEntity {
        user_id,
        provider_method_id: provider_method_id.to_string(),
        method_type: "bank_card".to_string(),
        title: Some("Bank card *4444".to_string()),
        card_first6: Some("555555".to_string()),
        card_last4: Some("4444".to_string()),
        card_expiry_month: Some("12".to_string()),
        card_expiry_year: Some("2030".to_string()),
        card_type: Some("MasterCard".to_string()),
    }
}

/// Stores a card directly and, when it is the default, points the
/// subscription at it with auto-renewal on.
pub fn seed_card(
    pool: &PgPoolSquad,
    user_id: Uuid,
    provider_method_id: &str,
    is_default: bool,
    created_at: DateTime<Utc>,
) -> Uuid {
    let mut conn = pool.get().expect("test connection");

    let method_id = insert_into(payment_methods::table)
        .values((
            &saved_card(user_id, provider_method_id),
            payment_methods::is_default.eq(is_default),
            payment_methods::created_at.eq(created_at),
        ))
        .returning(payment_methods::id)
        .get_result::<Uuid>(&mut conn)
        .expect("insert payment method");

    if is_default {
        diesel::update(subscriptions::table)
            .filter(subscriptions::user_id.eq(user_id))
            .set((
                subscriptions::auto_renewal.eq(true),
                subscriptions::default_payment_method_ref.eq(Some(provider_method_id)),
            ))
            .execute(&mut conn)
            .expect("point subscription at card");
    }

    method_id
}

pub fn default_refs(pool: &PgPoolSquad, user_id: Uuid) -> Vec<String> {
    let mut conn = pool.get().expect("test connection");

    payment_methods::table
        .filter(payment_methods::user_id.eq(user_id))
        .filter(payment_methods::is_default.eq(true))
        .select(payment_methods::provider_method_id)
        .load::<String>(&mut conn)
        .expect("load defaults")
}

/// `(auto_renewal, default_payment_method_ref)` of the user's subscription.
pub fn renewal_state(pool: &PgPoolSquad, user_id: Uuid) -> (bool, Option<String>) {
    let mut conn = pool.get().expect("test connection");

    subscriptions::table
        .filter(subscriptions::user_id.eq(user_id))
        .select((
            subscriptions::auto_renewal,
            subscriptions::default_payment_method_ref,
        ))
        .first::<(bool, Option<String>)>(&mut conn)
        .expect("load subscription")
}
