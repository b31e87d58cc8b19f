use std::sync::{Arc, LazyLock};

use crates::domain::{
    repositories::{
        devices::DeviceRepository, subscriptions::SubscriptionRepository, users::UserRepository,
    },
    value_objects::{
        devices::DeviceDto,
        users::{ProfileDto, UpdateProfileModel, UserDto},
    },
};
use regex::Regex;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+]{10,15}$").expect("phone regex is valid"));

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Пользователь не найден")]
    UserNotFound,
    #[error("Некорректный формат номера телефона")]
    InvalidPhoneNumber,
    #[error("Устройство не найдено")]
    DeviceNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProfileError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ProfileError::UserNotFound | ProfileError::DeviceNotFound => StatusCode::NOT_FOUND,
            ProfileError::InvalidPhoneNumber => StatusCode::BAD_REQUEST,
            ProfileError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Internal(err) => AppError::Internal(err),
            other => AppError::rejected(other.status_code(), other.to_string()),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ProfileError>;

pub struct ProfileUseCase<U, S, D>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    device_repo: Arc<D>,
}

impl<U, S, D> ProfileUseCase<U, S, D>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, subscription_repo: Arc<S>, device_repo: Arc<D>) -> Self {
        Self {
            user_repo,
            subscription_repo,
            device_repo,
        }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> UseCaseResult<ProfileDto> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "users: failed to load user");
                ProfileError::Internal(err)
            })?
            .ok_or(ProfileError::UserNotFound)?;

        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(ProfileError::Internal)?;

        let active_devices = self.list_devices(user_id).await?;

        Ok(ProfileDto {
            user: UserDto::new(user, subscription),
            active_devices,
        })
    }

    /// Only a present, non-empty phone number is written.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        model: UpdateProfileModel,
    ) -> UseCaseResult<ProfileDto> {
        let phone_number = model
            .phone_number
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty());

        if let Some(phone_number) = phone_number {
            if !PHONE_REGEX.is_match(&phone_number) {
                warn!(%user_id, "users: rejected malformed phone number");
                return Err(ProfileError::InvalidPhoneNumber);
            }

            self.user_repo
                .update_phone_number(user_id, Some(phone_number))
                .await
                .map_err(|err| {
                    error!(%user_id, db_error = ?err, "users: failed to update phone number");
                    ProfileError::Internal(err)
                })?;
            info!(%user_id, "users: phone number updated");
        }

        self.get_profile(user_id).await
    }

    pub async fn list_devices(&self, user_id: Uuid) -> UseCaseResult<Vec<DeviceDto>> {
        let devices = self.device_repo.list_devices(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "users: failed to list devices");
            ProfileError::Internal(err)
        })?;

        Ok(devices.into_iter().map(DeviceDto::from).collect())
    }

    pub async fn remove_device(&self, user_id: Uuid, device_id: String) -> UseCaseResult<()> {
        let removed = self
            .device_repo
            .remove_device(user_id, device_id.clone())
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "users: failed to remove device");
                ProfileError::Internal(err)
            })?;

        if !removed {
            return Err(ProfileError::DeviceNotFound);
        }

        info!(%user_id, %device_id, "users: device removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crates::domain::{
        entities::{user_devices::UserDeviceEntity, users::UserEntity},
        repositories::{
            devices::MockDeviceRepository, subscriptions::MockSubscriptionRepository,
            users::MockUserRepository,
        },
    };
    use mockall::predicate::eq;

    fn user(user_id: Uuid, phone_number: Option<String>) -> UserEntity {
        UserEntity {
            id: user_id,
            email: "viewer@example.com".to_string(),
            username: "viewer".to_string(),
            password_hash: "hash".to_string(),
            is_admin: false,
            phone_number,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn malformed_phone_number_is_rejected_without_writing() {
        let mut users = MockUserRepository::new();
        users.expect_update_phone_number().times(0);

        let usecase = ProfileUseCase::new(
            Arc::new(users),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(MockDeviceRepository::new()),
        );

        let result = usecase
            .update_profile(
                Uuid::new_v4(),
                UpdateProfileModel {
                    phone_number: Some("12-34".to_string()),
                },
            )
            .await;

        assert!(matches!(result, Err(ProfileError::InvalidPhoneNumber)));
    }

    #[tokio::test]
    async fn valid_phone_number_is_stored_and_profile_returned() {
        let user_id = Uuid::new_v4();

        let mut users = MockUserRepository::new();
        users
            .expect_update_phone_number()
            .with(eq(user_id), eq(Some("+79991234567".to_string())))
            .times(1)
            .returning(|id, phone| Ok(user(id, phone)));
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(user(id, Some("+79991234567".to_string())))));

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_find_by_user_id().returning(|_| Ok(None));

        let mut devices = MockDeviceRepository::new();
        devices.expect_list_devices().returning(|id| {
            Ok(vec![UserDeviceEntity {
                user_id: id,
                device_id: "tv".to_string(),
                last_active_at: Utc::now(),
            }])
        });

        let usecase =
            ProfileUseCase::new(Arc::new(users), Arc::new(subscriptions), Arc::new(devices));

        let profile = usecase
            .update_profile(
                user_id,
                UpdateProfileModel {
                    phone_number: Some("+79991234567".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(profile.user.phone_number.as_deref(), Some("+79991234567"));
        assert_eq!(profile.active_devices.len(), 1);
    }

    #[tokio::test]
    async fn removing_unknown_device_is_not_found() {
        let mut devices = MockDeviceRepository::new();
        devices.expect_remove_device().returning(|_, _| Ok(false));

        let usecase = ProfileUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(devices),
        );

        let result = usecase.remove_device(Uuid::new_v4(), "ghost".to_string()).await;

        assert!(matches!(result, Err(ProfileError::DeviceNotFound)));
    }
}
