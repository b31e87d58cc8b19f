use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::{
    subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    users::{InsertUserEntity, UserEntity},
};

#[automock]
#[async_trait]
pub trait UserRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>>;

    async fn find_by_email(&self, email: String) -> Result<Option<UserEntity>>;

    async fn find_by_username(&self, username: String) -> Result<Option<UserEntity>>;

    async fn username_exists(&self, username: String) -> Result<bool>;

    /// Inserts the user and its trial subscription in one transaction. The
    /// subscription's `user_id` is overwritten with the new id.
    async fn create_with_subscription(
        &self,
        user: InsertUserEntity,
        subscription: InsertSubscriptionEntity,
    ) -> Result<(UserEntity, SubscriptionEntity)>;

    async fn update_phone_number(
        &self,
        user_id: Uuid,
        phone_number: Option<String>,
    ) -> Result<UserEntity>;

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<UserEntity>>;

    async fn count_users(&self) -> Result<i64>;
}
