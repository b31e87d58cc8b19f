use std::{collections::HashMap, sync::Arc};

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    domain::{
        entities::channels::InsertChannelEntity,
        repositories::channels::ChannelRepository,
        value_objects::{
            channels::{DEFAULT_LANGUAGE, PlaylistDto, PlaylistRefreshDto},
            m3u::{M3uEntry, parse_m3u},
        },
    },
    infra::upstream::http_client::{UpstreamBody, UpstreamHttpClient},
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::axum_http::error_responses::AppError;

pub const STREAM_CONTENT_TYPE: &str = "application/x-mpegURL";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    async fn fetch_playlist(&self, url: &str) -> AnyResult<String>;

    async fn open_stream(&self, url: &str) -> AnyResult<UpstreamBody>;
}

#[async_trait]
impl PlaylistSource for UpstreamHttpClient {
    async fn fetch_playlist(&self, url: &str) -> AnyResult<String> {
        self.fetch_text(url).await
    }

    async fn open_stream(&self, url: &str) -> AnyResult<UpstreamBody> {
        self.open_stream(url).await
    }
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("URL не указан")]
    MissingUrl,
    #[error("Некорректный URL")]
    InvalidUrl,
    #[error("Адрес недоступен для проксирования")]
    ForbiddenTarget,
    #[error("Плейлист не содержит каналов")]
    EmptyPlaylist,
    #[error("Ошибка при получении данных из источника")]
    Upstream(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PlaylistError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PlaylistError::MissingUrl | PlaylistError::InvalidUrl => StatusCode::BAD_REQUEST,
            PlaylistError::ForbiddenTarget => StatusCode::FORBIDDEN,
            PlaylistError::EmptyPlaylist | PlaylistError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PlaylistError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PlaylistError> for AppError {
    fn from(err: PlaylistError) -> Self {
        match err {
            PlaylistError::Internal(err) => AppError::Internal(err),
            other => AppError::rejected(other.status_code(), other.to_string()),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PlaylistError>;

/// Channel rows in import order: categories keep the order in which they
/// first appear, channels keep file order within a category.
pub fn channel_rows(entries: Vec<M3uEntry>) -> Vec<InsertChannelEntity> {
    let mut groups: Vec<(String, Vec<M3uEntry>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        match index.get(&entry.category) {
            Some(&position) => groups[position].1.push(entry),
            None => {
                index.insert(entry.category.clone(), groups.len());
                groups.push((entry.category.clone(), vec![entry]));
            }
        }
    }

    groups
        .into_iter()
        .flat_map(|(_, entries)| entries)
        .enumerate()
        .map(|(order, entry)| InsertChannelEntity {
            name: entry.name,
            category: entry.category,
            language: DEFAULT_LANGUAGE.to_string(),
            stream_url: entry.stream_url,
            logo_url: entry.logo_url,
            tvg_id: entry.tvg_id,
            sort_order: i32::try_from(order).unwrap_or(i32::MAX),
            is_active: true,
        })
        .collect()
}

pub struct PlaylistUseCase<C, Src>
where
    C: ChannelRepository + Send + Sync + 'static,
    Src: PlaylistSource + Send + Sync + 'static,
{
    channel_repo: Arc<C>,
    source: Arc<Src>,
    playlist_url: String,
}

impl<C, Src> PlaylistUseCase<C, Src>
where
    C: ChannelRepository + Send + Sync + 'static,
    Src: PlaylistSource + Send + Sync + 'static,
{
    pub fn new(channel_repo: Arc<C>, source: Arc<Src>, playlist_url: String) -> Self {
        Self {
            channel_repo,
            source,
            playlist_url,
        }
    }

    pub async fn refresh(&self) -> UseCaseResult<PlaylistRefreshDto> {
        info!(playlist_url = %self.playlist_url, "playlist: refreshing from upstream");

        let content = self
            .source
            .fetch_playlist(&self.playlist_url)
            .await
            .map_err(|err| {
                error!(error = ?err, "playlist: failed to download playlist");
                PlaylistError::Upstream(err)
            })?;

        let rows = channel_rows(parse_m3u(&content));
        if rows.is_empty() {
            warn!("playlist: upstream playlist has no channels; keeping current list");
            return Err(PlaylistError::EmptyPlaylist);
        }

        let mut categories: Vec<&str> = rows.iter().map(|row| row.category.as_str()).collect();
        categories.dedup();
        let category_count = categories.len();

        let imported = self.channel_repo.replace_all(rows).await.map_err(|err| {
            error!(db_error = ?err, "playlist: failed to replace channels");
            PlaylistError::Internal(err)
        })?;

        info!(imported, categories = category_count, "playlist: channels replaced");

        Ok(PlaylistRefreshDto {
            imported,
            categories: category_count,
        })
    }

    pub async fn get_playlist(&self, category: Option<String>) -> UseCaseResult<PlaylistDto> {
        let existing = self.channel_repo.count().await.map_err(PlaylistError::Internal)?;
        if existing == 0 {
            info!("playlist: channel table empty; importing before listing");
            self.refresh().await?;
        }

        let category = category.filter(|category| !category.trim().is_empty());
        let channels = self
            .channel_repo
            .list_active(category)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "playlist: failed to list channels");
                PlaylistError::Internal(err)
            })?;
        let categories = self
            .channel_repo
            .list_categories()
            .await
            .map_err(PlaylistError::Internal)?;

        Ok(PlaylistDto {
            total: channels.len(),
            channels,
            categories,
        })
    }

    async fn proxy(&self, url: Option<String>) -> UseCaseResult<UpstreamBody> {
        let url = url
            .filter(|url| !url.trim().is_empty())
            .ok_or(PlaylistError::MissingUrl)?;
        UpstreamHttpClient::parse_target(&url).map_err(|_| PlaylistError::InvalidUrl)?;
        UpstreamHttpClient::parse_public_target(&url).map_err(|err| {
            warn!(error = %err, "playlist: refused to proxy an internal address");
            PlaylistError::ForbiddenTarget
        })?;

        self.source.open_stream(&url).await.map_err(|err| {
            warn!(error = ?err, "playlist: upstream proxy failed");
            PlaylistError::Upstream(err)
        })
    }

    /// Stream responses are always labelled as HLS playlists.
    pub async fn proxy_stream(&self, url: Option<String>) -> UseCaseResult<UpstreamBody> {
        let mut body = self.proxy(url).await?;
        body.content_type = Some(STREAM_CONTENT_TYPE.to_string());
        Ok(body)
    }

    pub async fn proxy_logo(&self, url: Option<String>) -> UseCaseResult<UpstreamBody> {
        self.proxy(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::repositories::channels::MockChannelRepository;

    const PLAYLIST: &str = "#EXTM3U\n\
#EXTINF:-1 group-title=\"Новости\",Россия 24\n\
http://cdn.example.com/r24.m3u8\n\
#EXTINF:-1 group-title=\"Кино\",Дом кино\n\
http://cdn.example.com/dk.m3u8\n\
#EXTINF:-1 group-title=\"Новости\",РБК\n\
http://cdn.example.com/rbc.m3u8\n";

    fn entry(name: &str, category: &str) -> M3uEntry {
        M3uEntry {
            name: name.to_string(),
            category: category.to_string(),
            logo_url: None,
            tvg_id: None,
            stream_url: format!("http://cdn.example.com/{name}.m3u8"),
        }
    }

    #[test]
    fn rows_group_categories_in_first_seen_order() {
        let rows = channel_rows(vec![
            entry("a", "News"),
            entry("b", "Movies"),
            entry("c", "News"),
        ]);

        let order: Vec<(&str, i32)> = rows
            .iter()
            .map(|row| (row.name.as_str(), row.sort_order))
            .collect();
        assert_eq!(order, vec![("a", 0), ("c", 1), ("b", 2)]);
        assert!(rows.iter().all(|row| row.language == DEFAULT_LANGUAGE));
    }

    #[tokio::test]
    async fn refresh_replaces_channels_from_upstream() {
        let mut source = MockPlaylistSource::new();
        source
            .expect_fetch_playlist()
            .returning(|_| Ok(PLAYLIST.to_string()));

        let mut repo = MockChannelRepository::new();
        repo.expect_replace_all()
            .withf(|rows| rows.len() == 3 && rows[1].name == "РБК")
            .times(1)
            .returning(|rows| Ok(rows.len()));

        let usecase = PlaylistUseCase::new(
            Arc::new(repo),
            Arc::new(source),
            "http://playlist.example.com/list.m3u".to_string(),
        );

        let refreshed = usecase.refresh().await.unwrap();

        assert_eq!(refreshed.imported, 3);
        assert_eq!(refreshed.categories, 2);
    }

    #[tokio::test]
    async fn empty_upstream_playlist_keeps_existing_channels() {
        let mut source = MockPlaylistSource::new();
        source
            .expect_fetch_playlist()
            .returning(|_| Ok("#EXTM3U\n".to_string()));

        let mut repo = MockChannelRepository::new();
        repo.expect_replace_all().times(0);

        let usecase = PlaylistUseCase::new(Arc::new(repo), Arc::new(source), "http://x".to_string());

        assert!(matches!(
            usecase.refresh().await,
            Err(PlaylistError::EmptyPlaylist)
        ));
    }

    #[tokio::test]
    async fn proxy_refuses_non_http_targets() {
        let mut source = MockPlaylistSource::new();
        source.expect_open_stream().times(0);

        let usecase = PlaylistUseCase::new(
            Arc::new(MockChannelRepository::new()),
            Arc::new(source),
            "http://x".to_string(),
        );

        assert!(matches!(
            usecase.proxy_stream(Some("ftp://cdn.example.com/a".to_string())).await,
            Err(PlaylistError::InvalidUrl)
        ));
        assert!(matches!(
            usecase.proxy_logo(None).await,
            Err(PlaylistError::MissingUrl)
        ));
    }

    #[tokio::test]
    async fn proxy_refuses_internal_addresses() {
        let mut source = MockPlaylistSource::new();
        source.expect_open_stream().times(0);

        let usecase = PlaylistUseCase::new(
            Arc::new(MockChannelRepository::new()),
            Arc::new(source),
            "http://x".to_string(),
        );

        for target in [
            "http://127.0.0.1:5432/",
            "http://localhost/admin",
            "http://169.254.169.254/latest/meta-data/",
            "http://[::1]/",
        ] {
            let refused = usecase.proxy_stream(Some(target.to_string())).await;
            assert!(matches!(refused, Err(PlaylistError::ForbiddenTarget)), "{target}");
            assert_eq!(
                PlaylistError::ForbiddenTarget.status_code(),
                axum::http::StatusCode::FORBIDDEN
            );
        }

        assert!(matches!(
            usecase.proxy_logo(Some("http://10.1.2.3/logo.png".to_string())).await,
            Err(PlaylistError::ForbiddenTarget)
        ));
    }

    #[tokio::test]
    async fn proxy_forwards_public_targets() {
        let mut source = MockPlaylistSource::new();
        source
            .expect_open_stream()
            .withf(|url| url == "http://cdn.example.com/logo.png")
            .times(1)
            .returning(|_| {
                Ok(UpstreamBody {
                    content_type: Some("image/png".to_string()),
                    stream: Box::pin(futures_util::stream::empty()),
                })
            });

        let usecase = PlaylistUseCase::new(
            Arc::new(MockChannelRepository::new()),
            Arc::new(source),
            "http://x".to_string(),
        );

        let body = usecase
            .proxy_logo(Some("http://cdn.example.com/logo.png".to_string()))
            .await
            .unwrap();

        assert_eq!(body.content_type.as_deref(), Some("image/png"));
    }
}
