use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_methods::PaymentMethodEntity;

#[automock]
#[async_trait]
pub trait PaymentMethodRepository {
    /// Default first, then newest.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PaymentMethodEntity>>;

    async fn find_for_user(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> Result<Option<PaymentMethodEntity>>;

    /// Clears the previous default and sets this one; the subscription's
    /// default reference follows. Returns `None` when the method does not
    /// belong to the user.
    async fn set_default(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> Result<Option<PaymentMethodEntity>>;

    /// Deletes the method; if it was the default, the newest remaining method
    /// becomes default and the subscription's default reference follows it.
    async fn delete_for_user(&self, user_id: Uuid, method_id: Uuid) -> Result<bool>;
}
