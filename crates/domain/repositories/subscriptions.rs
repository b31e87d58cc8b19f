use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn update_auto_renewal(
        &self,
        user_id: Uuid,
        auto_renewal: bool,
        default_payment_method_ref: Option<String>,
    ) -> Result<()>;

    /// Active, auto-renewing subscriptions whose expiry is in `(from, until]`.
    async fn list_due_for_renewal(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SubscriptionEntity>>;

    async fn count_active(&self, now: DateTime<Utc>) -> Result<i64>;
}
