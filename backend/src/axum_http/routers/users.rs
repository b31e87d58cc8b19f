use crate::{auth::AuthUser, axum_http::error_responses::AppError, usecases::users::ProfileUseCase};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use crates::{
    domain::{
        repositories::{
            devices::DeviceRepository, subscriptions::SubscriptionRepository,
            users::UserRepository,
        },
        value_objects::users::UpdateProfileModel,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            devices::DevicePostgres, subscriptions::SubscriptionPostgres, users::UserPostgres,
        },
    },
};
use serde_json::json;
use std::sync::Arc;

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let device_repository = DevicePostgres::new(Arc::clone(&db_pool));

    let usecase = ProfileUseCase::new(
        Arc::new(user_repository),
        Arc::new(subscription_repository),
        Arc::new(device_repository),
    );

    Router::new()
        .route(
            "/profile",
            get(get_profile::<UserPostgres, SubscriptionPostgres, DevicePostgres>)
                .put(update_profile::<UserPostgres, SubscriptionPostgres, DevicePostgres>),
        )
        .route(
            "/devices",
            get(list_devices::<UserPostgres, SubscriptionPostgres, DevicePostgres>),
        )
        .route(
            "/devices/:device_id",
            delete(remove_device::<UserPostgres, SubscriptionPostgres, DevicePostgres>),
        )
        .with_state(Arc::new(usecase))
}

pub async fn get_profile<U, S, D>(
    State(usecase): State<Arc<ProfileUseCase<U, S, D>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    match usecase.get_profile(user_id).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn update_profile<U, S, D>(
    State(usecase): State<Arc<ProfileUseCase<U, S, D>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(model): Json<UpdateProfileModel>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    match usecase.update_profile(user_id, model).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn list_devices<U, S, D>(
    State(usecase): State<Arc<ProfileUseCase<U, S, D>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    match usecase.list_devices(user_id).await {
        Ok(devices) => (StatusCode::OK, Json(devices)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn remove_device<U, S, D>(
    State(usecase): State<Arc<ProfileUseCase<U, S, D>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(device_id): Path<String>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    match usecase.remove_device(user_id, device_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Устройство удалено" })),
        )
            .into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
