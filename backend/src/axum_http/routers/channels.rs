use crate::{
    auth::{AdminUser, SubscribedUser},
    axum_http::error_responses::AppError,
    usecases::channels::ChannelUseCase,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use crates::{
    domain::{
        repositories::channels::ChannelRepository,
        value_objects::channels::{CreateChannelModel, UpdateChannelModel},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::channels::ChannelPostgres,
    },
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let channel_repository = ChannelPostgres::new(Arc::clone(&db_pool));
    let usecase = ChannelUseCase::new(Arc::new(channel_repository));

    Router::new()
        .route(
            "/",
            get(list_channels::<ChannelPostgres>).post(create_channel::<ChannelPostgres>),
        )
        .route(
            "/:id",
            get(get_channel::<ChannelPostgres>)
                .put(update_channel::<ChannelPostgres>)
                .delete(delete_channel::<ChannelPostgres>),
        )
        .with_state(Arc::new(usecase))
}

pub async fn list_channels<C>(
    State(usecase): State<Arc<ChannelUseCase<C>>>,
    _subscribed: SubscribedUser,
) -> impl IntoResponse
where
    C: ChannelRepository + Send + Sync + 'static,
{
    match usecase.list_active().await {
        Ok(channels) => (StatusCode::OK, Json(channels)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn get_channel<C>(
    State(usecase): State<Arc<ChannelUseCase<C>>>,
    _subscribed: SubscribedUser,
    Path(channel_id): Path<Uuid>,
) -> impl IntoResponse
where
    C: ChannelRepository + Send + Sync + 'static,
{
    match usecase.get(channel_id).await {
        Ok(channel) => (StatusCode::OK, Json(channel)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn create_channel<C>(
    State(usecase): State<Arc<ChannelUseCase<C>>>,
    AdminUser { user_id }: AdminUser,
    Json(model): Json<CreateChannelModel>,
) -> impl IntoResponse
where
    C: ChannelRepository + Send + Sync + 'static,
{
    match usecase.create(model).await {
        Ok(channel) => {
            info!(admin_id = %user_id, channel_id = %channel.id, "channels: created by admin");
            (StatusCode::CREATED, Json(channel)).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn update_channel<C>(
    State(usecase): State<Arc<ChannelUseCase<C>>>,
    AdminUser { user_id }: AdminUser,
    Path(channel_id): Path<Uuid>,
    Json(model): Json<UpdateChannelModel>,
) -> impl IntoResponse
where
    C: ChannelRepository + Send + Sync + 'static,
{
    match usecase.update(channel_id, model).await {
        Ok(channel) => {
            info!(admin_id = %user_id, %channel_id, "channels: updated by admin");
            (StatusCode::OK, Json(channel)).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn delete_channel<C>(
    State(usecase): State<Arc<ChannelUseCase<C>>>,
    AdminUser { user_id }: AdminUser,
    Path(channel_id): Path<Uuid>,
) -> impl IntoResponse
where
    C: ChannelRepository + Send + Sync + 'static,
{
    match usecase.delete(channel_id).await {
        Ok(()) => {
            info!(admin_id = %user_id, %channel_id, "channels: deleted by admin");
            (StatusCode::OK, Json(json!({ "message": "Канал удален" }))).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}
