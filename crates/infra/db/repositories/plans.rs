use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::plans},
};
use domain::{
    entities::plans::{InsertPlanEntity, PlanEntity},
    repositories::plans::PlanRepository,
};

pub struct PlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PlanRepository for PlanPostgres {
    async fn list_plans(&self) -> Result<Vec<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = plans::table
            .order((plans::sort_order.asc(), plans::month_duration.asc()))
            .select(PlanEntity::as_select())
            .load::<PlanEntity>(&mut conn)?;

        Ok(results)
    }

    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plan = plans::table
            .filter(plans::id.eq(plan_id))
            .select(PlanEntity::as_select())
            .first::<PlanEntity>(&mut conn)
            .optional()?;

        Ok(plan)
    }

    async fn seed_if_empty(&self, new_plans: Vec<InsertPlanEntity>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let existing = plans::table.count().get_result::<i64>(conn)?;
            if existing > 0 {
                return Ok(0);
            }

            // Concurrent seeders collide on the unique name; the loser writes nothing.
            insert_into(plans::table)
                .values(&new_plans)
                .on_conflict(plans::name)
                .do_nothing()
                .execute(conn)
        })?;

        Ok(inserted)
    }
}
