use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        entities::channels::{ChannelEntity, InsertChannelEntity, UpdateChannelEntity},
        repositories::channels::ChannelRepository,
        value_objects::channels::{
            CreateChannelModel, DEFAULT_CATEGORY, DEFAULT_LANGUAGE, UpdateChannelModel,
        },
    },
    infra::upstream::http_client::UpstreamHttpClient,
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Канал не найден")]
    NotFound,
    #[error("Название и URL потока обязательны")]
    MissingFields,
    #[error("Некорректный URL потока")]
    InvalidStreamUrl,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ChannelError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ChannelError::NotFound => StatusCode::NOT_FOUND,
            ChannelError::MissingFields | ChannelError::InvalidStreamUrl => {
                StatusCode::BAD_REQUEST
            }
            ChannelError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ChannelError> for AppError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Internal(err) => AppError::Internal(err),
            other => AppError::rejected(other.status_code(), other.to_string()),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ChannelError>;

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn validate_stream_url(stream_url: &str) -> UseCaseResult<()> {
    UpstreamHttpClient::parse_target(stream_url)
        .map(|_| ())
        .map_err(|_| ChannelError::InvalidStreamUrl)
}

pub struct ChannelUseCase<C>
where
    C: ChannelRepository + Send + Sync + 'static,
{
    channel_repo: Arc<C>,
}

impl<C> ChannelUseCase<C>
where
    C: ChannelRepository + Send + Sync + 'static,
{
    pub fn new(channel_repo: Arc<C>) -> Self {
        Self { channel_repo }
    }

    pub async fn list_active(&self) -> UseCaseResult<Vec<ChannelEntity>> {
        let channels = self.channel_repo.list_active(None).await.map_err(|err| {
            error!(db_error = ?err, "channels: failed to list channels");
            ChannelError::Internal(err)
        })?;

        Ok(channels)
    }

    pub async fn get(&self, channel_id: Uuid) -> UseCaseResult<ChannelEntity> {
        self.channel_repo
            .find_by_id(channel_id)
            .await
            .map_err(|err| {
                error!(%channel_id, db_error = ?err, "channels: failed to load channel");
                ChannelError::Internal(err)
            })?
            .ok_or(ChannelError::NotFound)
    }

    pub async fn create(&self, model: CreateChannelModel) -> UseCaseResult<ChannelEntity> {
        let name = model.name.trim().to_string();
        let stream_url = model.stream_url.trim().to_string();
        if name.is_empty() || stream_url.is_empty() {
            return Err(ChannelError::MissingFields);
        }
        validate_stream_url(&stream_url)?;

        let channel = self
            .channel_repo
            .create(InsertChannelEntity {
                name,
                category: non_empty(model.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                language: non_empty(model.language).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                stream_url,
                logo_url: non_empty(model.logo_url),
                tvg_id: None,
                sort_order: model.order.unwrap_or(0),
                is_active: model.is_active.unwrap_or(true),
            })
            .await
            .map_err(|err| {
                error!(db_error = ?err, "channels: failed to create channel");
                ChannelError::Internal(err)
            })?;

        info!(channel_id = %channel.id, "channels: channel created");
        Ok(channel)
    }

    pub async fn update(
        &self,
        channel_id: Uuid,
        model: UpdateChannelModel,
    ) -> UseCaseResult<ChannelEntity> {
        let stream_url = non_empty(model.stream_url);
        if let Some(stream_url) = stream_url.as_deref() {
            validate_stream_url(stream_url)?;
        }

        let changes = UpdateChannelEntity {
            name: non_empty(model.name),
            category: non_empty(model.category),
            language: non_empty(model.language),
            stream_url,
            logo_url: model.logo_url.map(|logo| logo.trim().to_string()),
            sort_order: model.order,
            is_active: model.is_active,
            updated_at: Some(Utc::now()),
        };

        let channel = self
            .channel_repo
            .update(channel_id, changes)
            .await
            .map_err(|err| {
                error!(%channel_id, db_error = ?err, "channels: failed to update channel");
                ChannelError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%channel_id, "channels: update of unknown channel");
                ChannelError::NotFound
            })?;

        info!(%channel_id, "channels: channel updated");
        Ok(channel)
    }

    pub async fn delete(&self, channel_id: Uuid) -> UseCaseResult<()> {
        let deleted = self.channel_repo.delete(channel_id).await.map_err(|err| {
            error!(%channel_id, db_error = ?err, "channels: failed to delete channel");
            ChannelError::Internal(err)
        })?;

        if !deleted {
            return Err(ChannelError::NotFound);
        }

        info!(%channel_id, "channels: channel deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::repositories::channels::MockChannelRepository;

    fn channel_from(insert: InsertChannelEntity) -> ChannelEntity {
        ChannelEntity {
            id: Uuid::new_v4(),
            name: insert.name,
            category: insert.category,
            language: insert.language,
            stream_url: insert.stream_url,
            logo_url: insert.logo_url,
            tvg_id: insert.tvg_id,
            sort_order: insert.sort_order,
            is_active: insert.is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_fills_defaults() {
        let mut repo = MockChannelRepository::new();
        repo.expect_create()
            .withf(|channel| {
                channel.category == DEFAULT_CATEGORY
                    && channel.language == DEFAULT_LANGUAGE
                    && channel.is_active
            })
            .returning(|channel| Ok(channel_from(channel)));

        let created = ChannelUseCase::new(Arc::new(repo))
            .create(CreateChannelModel {
                name: "Первый".to_string(),
                stream_url: "https://cdn.example.com/1.m3u8".to_string(),
                logo_url: None,
                category: Some("  ".to_string()),
                language: None,
                order: None,
                is_active: None,
            })
            .await
            .unwrap();

        assert_eq!(created.name, "Первый");
        assert_eq!(created.sort_order, 0);
    }

    #[tokio::test]
    async fn create_rejects_non_http_stream() {
        let mut repo = MockChannelRepository::new();
        repo.expect_create().times(0);

        let result = ChannelUseCase::new(Arc::new(repo))
            .create(CreateChannelModel {
                name: "Первый".to_string(),
                stream_url: "file:///etc/passwd".to_string(),
                logo_url: None,
                category: None,
                language: None,
                order: None,
                is_active: None,
            })
            .await;

        assert!(matches!(result, Err(ChannelError::InvalidStreamUrl)));
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_channel_are_not_found() {
        let mut repo = MockChannelRepository::new();
        repo.expect_update().returning(|_, _| Ok(None));
        repo.expect_delete().returning(|_| Ok(false));
        let usecase = ChannelUseCase::new(Arc::new(repo));

        let updated = usecase
            .update(Uuid::new_v4(), UpdateChannelModel::default())
            .await;
        let deleted = usecase.delete(Uuid::new_v4()).await;

        assert!(matches!(updated, Err(ChannelError::NotFound)));
        assert!(matches!(deleted, Err(ChannelError::NotFound)));
    }
}
