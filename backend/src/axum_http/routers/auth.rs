use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    config::config_model::DotEnvyConfig,
    usecases::auth::AuthUseCase,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{
            devices::DeviceRepository, subscriptions::SubscriptionRepository,
            users::UserRepository,
        },
        value_objects::users::{LoginModel, RegisterModel},
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

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let device_repository = DevicePostgres::new(Arc::clone(&db_pool));

    let usecase = AuthUseCase::new(
        Arc::new(user_repository),
        Arc::new(subscription_repository),
        Arc::new(device_repository),
        config.jwt.clone(),
        config.trial.clone(),
    );

    Router::new()
        .route(
            "/register",
            post(register::<UserPostgres, SubscriptionPostgres, DevicePostgres>),
        )
        .route(
            "/login",
            post(login::<UserPostgres, SubscriptionPostgres, DevicePostgres>),
        )
        .route(
            "/logout",
            post(logout::<UserPostgres, SubscriptionPostgres, DevicePostgres>),
        )
        .route(
            "/me",
            get(me::<UserPostgres, SubscriptionPostgres, DevicePostgres>),
        )
        .with_state(Arc::new(usecase))
}

pub async fn register<U, S, D>(
    State(usecase): State<Arc<AuthUseCase<U, S, D>>>,
    Json(model): Json<RegisterModel>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    match usecase.register(model).await {
        Ok(registered) => (StatusCode::CREATED, Json(registered)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn login<U, S, D>(
    State(usecase): State<Arc<AuthUseCase<U, S, D>>>,
    Json(model): Json<LoginModel>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    match usecase.login(model).await {
        Ok(login) => (StatusCode::OK, Json(login)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn logout<U, S, D>(
    State(usecase): State<Arc<AuthUseCase<U, S, D>>>,
    AuthUser {
        user_id, device_id, ..
    }: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    match usecase.logout(user_id, device_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Выход выполнен успешно" })),
        )
            .into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn me<U, S, D>(
    State(usecase): State<Arc<AuthUseCase<U, S, D>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    D: DeviceRepository + Send + Sync + 'static,
{
    match usecase.me(user_id).await {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
