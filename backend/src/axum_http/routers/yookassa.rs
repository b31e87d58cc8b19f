use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    config::config_model::DotEnvyConfig,
    usecases::{payment_gateway::PaymentGateway, payments::PaymentUseCase},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{
            payment_methods::PaymentMethodRepository, payments::PaymentRepository,
            plans::PlanRepository, subscriptions::SubscriptionRepository,
        },
        value_objects::payments::{
            CapturePaymentModel, CreatePaymentModel, CreateRecurringPaymentModel,
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            payment_methods::PaymentMethodPostgres, payments::PaymentPostgres,
            plans::PlanPostgres, subscriptions::SubscriptionPostgres,
        },
    },
    payments::yookassa_client::YooKassaClient,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub const SIGNATURE_HEADER: &str = "yookassa-signature";

type Pay = PaymentPostgres;
type Plans = PlanPostgres;
type Methods = PaymentMethodPostgres;
type Subs = SubscriptionPostgres;
type Gateway = YooKassaClient;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    gateway: Arc<YooKassaClient>,
) -> Router {
    let usecase = PaymentUseCase::new(
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentMethodPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        gateway,
        config.yookassa.return_url.clone(),
        config.payment_polling,
    );

    Router::new()
        .route(
            "/payment",
            post(create_payment::<Pay, Plans, Methods, Subs, Gateway>),
        )
        .route(
            "/recurring-payment",
            post(create_recurring_payment::<Pay, Plans, Methods, Subs, Gateway>),
        )
        .route(
            "/payment/:payment_id/status",
            get(check_status::<Pay, Plans, Methods, Subs, Gateway>),
        )
        .route(
            "/payment/:payment_id/capture",
            post(capture_payment::<Pay, Plans, Methods, Subs, Gateway>),
        )
        .route(
            "/payment-methods",
            get(list_payment_methods::<Pay, Plans, Methods, Subs, Gateway>),
        )
        .route(
            "/payment-methods/:method_id/default",
            post(set_default_payment_method::<Pay, Plans, Methods, Subs, Gateway>),
        )
        .route(
            "/payment-methods/:method_id",
            axum::routing::delete(delete_payment_method::<Pay, Plans, Methods, Subs, Gateway>),
        )
        .route(
            "/webhook",
            post(webhook::<Pay, Plans, Methods, Subs, Gateway>),
        )
        .with_state(Arc::new(usecase))
}

pub async fn create_payment<P, Pl, M, S, G>(
    State(usecase): State<Arc<PaymentUseCase<P, Pl, M, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(model): Json<CreatePaymentModel>,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    Pl: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.create_payment(user_id, model).await {
        Ok(created) => (StatusCode::OK, Json(created)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn create_recurring_payment<P, Pl, M, S, G>(
    State(usecase): State<Arc<PaymentUseCase<P, Pl, M, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(model): Json<CreateRecurringPaymentModel>,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    Pl: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.create_recurring_payment(user_id, model).await {
        Ok(created) => (StatusCode::OK, Json(created)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn check_status<P, Pl, M, S, G>(
    State(usecase): State<Arc<PaymentUseCase<P, Pl, M, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(payment_id): Path<String>,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    Pl: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.check_status(user_id, payment_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn capture_payment<P, Pl, M, S, G>(
    State(usecase): State<Arc<PaymentUseCase<P, Pl, M, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(payment_id): Path<String>,
    model: Option<Json<CapturePaymentModel>>,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    Pl: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let model = model.map(|Json(model)| model).unwrap_or_default();

    match usecase.capture(user_id, payment_id, model).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn list_payment_methods<P, Pl, M, S, G>(
    State(usecase): State<Arc<PaymentUseCase<P, Pl, M, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    Pl: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.list_payment_methods(user_id).await {
        Ok(methods) => (StatusCode::OK, Json(methods)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn set_default_payment_method<P, Pl, M, S, G>(
    State(usecase): State<Arc<PaymentUseCase<P, Pl, M, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(method_id): Path<Uuid>,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    Pl: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.set_default_payment_method(user_id, method_id).await {
        Ok(method) => (StatusCode::OK, Json(method)).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn delete_payment_method<P, Pl, M, S, G>(
    State(usecase): State<Arc<PaymentUseCase<P, Pl, M, S, G>>>,
    AuthUser { user_id, .. }: AuthUser,
    Path(method_id): Path<Uuid>,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    Pl: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.delete_payment_method(user_id, method_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Метод оплаты удален" })),
        )
            .into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

pub async fn webhook<P, Pl, M, S, G>(
    State(usecase): State<Arc<PaymentUseCase<P, Pl, M, S, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    P: PaymentRepository + Send + Sync + 'static,
    Pl: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match usecase.handle_webhook(&body, signature).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}
