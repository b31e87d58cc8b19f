use crate::{
    auth::{AdminUser, SubscribedUser},
    axum_http::error_responses::AppError,
    config::config_model::DotEnvyConfig,
    usecases::playlist::{PlaylistSource, PlaylistUseCase},
};
use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crates::{
    domain::repositories::channels::ChannelRepository,
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad, repositories::channels::ChannelPostgres,
        },
        upstream::http_client::{UpstreamBody, UpstreamHttpClient},
    },
};
use serde::Deserialize;
use std::sync::Arc;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct PlaylistQuery {
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    url: Option<String>,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    upstream: Arc<UpstreamHttpClient>,
) -> Router {
    let channel_repository = ChannelPostgres::new(Arc::clone(&db_pool));
    let usecase = PlaylistUseCase::new(
        Arc::new(channel_repository),
        upstream,
        config.playlist.url.clone(),
    );

    Router::new()
        .route("/", get(get_playlist::<ChannelPostgres, UpstreamHttpClient>))
        .route(
            "/stream",
            get(proxy_stream::<ChannelPostgres, UpstreamHttpClient>),
        )
        .route("/logo", get(proxy_logo::<ChannelPostgres, UpstreamHttpClient>))
        .route(
            "/refresh",
            post(refresh_playlist::<ChannelPostgres, UpstreamHttpClient>),
        )
        .with_state(Arc::new(usecase))
}

fn streamed(body: UpstreamBody, cache_control: &'static str) -> Response {
    let content_type = body
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or(HeaderValue::from_static(FALLBACK_CONTENT_TYPE));

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, HeaderValue::from_static(cache_control)),
        ],
        Body::from_stream(body.stream),
    )
        .into_response()
}

pub async fn get_playlist<C, Src>(
    State(usecase): State<Arc<PlaylistUseCase<C, Src>>>,
    _subscribed: SubscribedUser,
    Query(query): Query<PlaylistQuery>,
) -> impl IntoResponse
where
    C: ChannelRepository + Send + Sync + 'static,
    Src: PlaylistSource + Send + Sync + 'static,
{
    match usecase.get_playlist(query.category).await {
        Ok(playlist) => (StatusCode::OK, Json(playlist)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn proxy_stream<C, Src>(
    State(usecase): State<Arc<PlaylistUseCase<C, Src>>>,
    Query(query): Query<ProxyQuery>,
) -> impl IntoResponse
where
    C: ChannelRepository + Send + Sync + 'static,
    Src: PlaylistSource + Send + Sync + 'static,
{
    match usecase.proxy_stream(query.url).await {
        Ok(body) => streamed(body, "no-cache"),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn proxy_logo<C, Src>(
    State(usecase): State<Arc<PlaylistUseCase<C, Src>>>,
    Query(query): Query<ProxyQuery>,
) -> impl IntoResponse
where
    C: ChannelRepository + Send + Sync + 'static,
    Src: PlaylistSource + Send + Sync + 'static,
{
    match usecase.proxy_logo(query.url).await {
        Ok(body) => streamed(body, "public, max-age=86400"),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn refresh_playlist<C, Src>(
    State(usecase): State<Arc<PlaylistUseCase<C, Src>>>,
    _admin: AdminUser,
) -> impl IntoResponse
where
    C: ChannelRepository + Send + Sync + 'static,
    Src: PlaylistSource + Send + Sync + 'static,
{
    match usecase.refresh().await {
        Ok(refreshed) => (StatusCode::OK, Json(refreshed)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
