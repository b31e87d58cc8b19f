use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    repositories::{
        channels::ChannelRepository, payments::PaymentRepository,
        subscriptions::SubscriptionRepository, users::UserRepository,
    },
    value_objects::users::{AdminStatsDto, AdminUserListDto, AdminUsersQuery, UserDto},
};
use thiserror::Error;
use tracing::error;

use crate::axum_http::error_responses::AppError;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Internal(err) => AppError::Internal(err),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AdminError>;

pub struct AdminUseCase<U, S, C, Pay>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    C: ChannelRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    channel_repo: Arc<C>,
    payment_repo: Arc<Pay>,
}

impl<U, S, C, Pay> AdminUseCase<U, S, C, Pay>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    C: ChannelRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        channel_repo: Arc<C>,
        payment_repo: Arc<Pay>,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            channel_repo,
            payment_repo,
        }
    }

    pub async fn list_users(&self, query: AdminUsersQuery) -> UseCaseResult<AdminUserListDto> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let users = self
            .user_repo
            .list_users(limit, offset)
            .await
            .map_err(|err| {
                error!(limit, offset, db_error = ?err, "admin: failed to list users");
                AdminError::Internal(err)
            })?;
        let total = self.user_repo.count_users().await?;

        let mut listed = Vec::with_capacity(users.len());
        for user in users {
            let subscription = self.subscription_repo.find_by_user_id(user.id).await?;
            listed.push(UserDto::new(user, subscription));
        }

        Ok(AdminUserListDto {
            users: listed,
            total,
            limit,
            offset,
        })
    }

    pub async fn stats(&self) -> UseCaseResult<AdminStatsDto> {
        let (users, active_subscriptions, channels, succeeded_payments) = tokio::try_join!(
            self.user_repo.count_users(),
            self.subscription_repo.count_active(Utc::now()),
            self.channel_repo.count(),
            self.payment_repo.count_succeeded(),
        )
        .map_err(|err| {
            error!(db_error = ?err, "admin: failed to collect stats");
            AdminError::Internal(err)
        })?;

        Ok(AdminStatsDto {
            users,
            active_subscriptions,
            channels,
            succeeded_payments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::{
        entities::users::UserEntity,
        repositories::{
            channels::MockChannelRepository, payments::MockPaymentRepository,
            subscriptions::MockSubscriptionRepository, users::MockUserRepository,
        },
    };
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn user() -> UserEntity {
        UserEntity {
            id: Uuid::new_v4(),
            email: "viewer@example.com".to_string(),
            username: "viewer".to_string(),
            password_hash: "hash".to_string(),
            is_admin: false,
            phone_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn list_users_clamps_page_size() {
        let mut users = MockUserRepository::new();
        users
            .expect_list_users()
            .with(eq(MAX_PAGE_SIZE), eq(0))
            .returning(|_, _| Ok(vec![user()]));
        users.expect_count_users().returning(|| Ok(1));

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_find_by_user_id().returning(|_| Ok(None));

        let usecase = AdminUseCase::new(
            Arc::new(users),
            Arc::new(subscriptions),
            Arc::new(MockChannelRepository::new()),
            Arc::new(MockPaymentRepository::new()),
        );

        let page = usecase
            .list_users(AdminUsersQuery {
                limit: Some(10_000),
                offset: Some(-5),
            })
            .await
            .unwrap();

        assert_eq!(page.limit, MAX_PAGE_SIZE);
        assert_eq!(page.offset, 0);
        assert_eq!(page.users.len(), 1);
    }

    #[tokio::test]
    async fn stats_collects_all_counters() {
        let mut users = MockUserRepository::new();
        users.expect_count_users().returning(|| Ok(12));
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_count_active().returning(|_| Ok(7));
        let mut channels = MockChannelRepository::new();
        channels.expect_count().returning(|| Ok(340));
        let mut payments = MockPaymentRepository::new();
        payments.expect_count_succeeded().returning(|| Ok(21));

        let stats = AdminUseCase::new(
            Arc::new(users),
            Arc::new(subscriptions),
            Arc::new(channels),
            Arc::new(payments),
        )
        .stats()
        .await
        .unwrap();

        assert_eq!(stats.users, 12);
        assert_eq!(stats.active_subscriptions, 7);
        assert_eq!(stats.channels, 340);
        assert_eq!(stats.succeeded_payments, 21);
    }
}
