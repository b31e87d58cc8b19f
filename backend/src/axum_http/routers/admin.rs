use crate::{
    auth::AdminUser, axum_http::error_responses::AppError, usecases::admin::AdminUseCase,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use crates::{
    domain::{
        repositories::{
            channels::ChannelRepository, payments::PaymentRepository,
            subscriptions::SubscriptionRepository, users::UserRepository,
        },
        value_objects::users::AdminUsersQuery,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            channels::ChannelPostgres, payments::PaymentPostgres,
            subscriptions::SubscriptionPostgres, users::UserPostgres,
        },
    },
};
use std::sync::Arc;

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let usecase = AdminUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(ChannelPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool))),
    );

    Router::new()
        .route(
            "/users",
            get(list_users::<UserPostgres, SubscriptionPostgres, ChannelPostgres, PaymentPostgres>),
        )
        .route(
            "/stats",
            get(stats::<UserPostgres, SubscriptionPostgres, ChannelPostgres, PaymentPostgres>),
        )
        .with_state(Arc::new(usecase))
}

pub async fn list_users<U, S, C, Pay>(
    State(usecase): State<Arc<AdminUseCase<U, S, C, Pay>>>,
    _admin: AdminUser,
    Query(query): Query<AdminUsersQuery>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    C: ChannelRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
{
    match usecase.list_users(query).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn stats<U, S, C, Pay>(
    State(usecase): State<Arc<AdminUseCase<U, S, C, Pay>>>,
    _admin: AdminUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    C: ChannelRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
{
    match usecase.stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
