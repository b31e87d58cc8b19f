use crate::{
    auth::AuthUser, axum_http::error_responses::AppError,
    usecases::subscriptions::SubscriptionUseCase,
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
            payment_methods::PaymentMethodRepository, payments::PaymentRepository,
            plans::PlanRepository, subscriptions::SubscriptionRepository,
        },
        value_objects::subscriptions::AutoRenewalRequest,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            payment_methods::PaymentMethodPostgres, payments::PaymentPostgres,
            plans::PlanPostgres, subscriptions::SubscriptionPostgres,
        },
    },
};
use std::sync::Arc;

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let plan_repository = PlanPostgres::new(Arc::clone(&db_pool));
    let payment_repository = PaymentPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let payment_method_repository = PaymentMethodPostgres::new(Arc::clone(&db_pool));

    let usecase = SubscriptionUseCase::new(
        Arc::new(plan_repository),
        Arc::new(payment_repository),
        Arc::new(subscription_repository),
        Arc::new(payment_method_repository),
    );

    Router::new()
        .route(
            "/plans",
            get(list_plans::<PlanPostgres, PaymentPostgres, SubscriptionPostgres, PaymentMethodPostgres>),
        )
        .route(
            "/payments",
            get(list_payments::<PlanPostgres, PaymentPostgres, SubscriptionPostgres, PaymentMethodPostgres>),
        )
        .route(
            "/auto-renewal",
            post(toggle_auto_renewal::<PlanPostgres, PaymentPostgres, SubscriptionPostgres, PaymentMethodPostgres>),
        )
        .with_state(Arc::new(usecase))
}

pub async fn list_plans<P, Pay, S, M>(
    State(usecase): State<Arc<SubscriptionUseCase<P, Pay, S, M>>>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
{
    match usecase.list_plans().await {
        Ok(plans) => (StatusCode::OK, Json(plans)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn list_payments<P, Pay, S, M>(
    State(usecase): State<Arc<SubscriptionUseCase<P, Pay, S, M>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
{
    match usecase.list_payments(user_id).await {
        Ok(payments) => (StatusCode::OK, Json(payments)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn toggle_auto_renewal<P, Pay, S, M>(
    State(usecase): State<Arc<SubscriptionUseCase<P, Pay, S, M>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(request): Json<AutoRenewalRequest>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
{
    match usecase.toggle_auto_renewal(user_id, request).await {
        Ok(subscription) => (StatusCode::OK, Json(subscription)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
