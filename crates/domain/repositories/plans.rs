use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::plans::{InsertPlanEntity, PlanEntity};

#[automock]
#[async_trait]
pub trait PlanRepository {
    async fn list_plans(&self) -> Result<Vec<PlanEntity>>;

    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>>;

    /// Inserts the given plans only if the table is empty; returns how many
    /// rows were written.
    async fn seed_if_empty(&self, plans: Vec<InsertPlanEntity>) -> Result<usize>;
}
