use std::{collections::HashMap, sync::Arc};

use crates::{
    domain::{
        entities::{
            payments::{InsertPaymentEntity, PaymentEntity},
            plans::PlanEntity,
        },
        repositories::{
            payment_methods::PaymentMethodRepository, payments::PaymentRepository,
            plans::PlanRepository, subscriptions::SubscriptionRepository,
        },
        value_objects::{
            enums::payment_statuses::PaymentStatus,
            payment_methods::PaymentMethodDto,
            payments::{
                CapturePaymentModel, CreatePaymentModel, CreateRecurringPaymentModel,
                CreatedPaymentDto, PaymentStatusDto,
            },
            plans::{DEFAULT_CURRENCY, format_amount, parse_amount},
        },
    },
    payments::yookassa_client::{
        Amount, Confirmation, CreatePaymentRequest, GatewayPayment, InvalidWebhookSignature,
        PaymentNotFound,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    axum_http::error_responses::AppError,
    config::config_model::PaymentPolling,
    usecases::{
        payment_gateway::PaymentGateway,
        settlement::{Reconciliation, SettlementOutcome, SettlementService, SettlementTrigger},
    },
};

/// Shortest id the gateway ever issues; anything shorter is a client bug.
const MIN_PAYMENT_ID_LEN: usize = 10;
const RETURN_PATH: &str = "/subscription";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Тарифный план не найден")]
    PlanNotFound,
    #[error("Платеж не найден")]
    PaymentNotFound,
    #[error("Метод оплаты не найден")]
    PaymentMethodNotFound,
    #[error("Некорректный ID платежа")]
    InvalidPaymentId,
    #[error("Некорректная сумма")]
    InvalidAmount,
    #[error("Платеж не находится в статусе ожидания захвата")]
    NotWaitingForCapture,
    #[error("Неверная подпись")]
    InvalidSignature,
    #[error("Некорректные данные уведомления")]
    MalformedNotification,
    #[error("Ошибка платежной системы")]
    Gateway(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentError::PlanNotFound
            | PaymentError::PaymentNotFound
            | PaymentError::PaymentMethodNotFound => StatusCode::NOT_FOUND,
            PaymentError::InvalidPaymentId
            | PaymentError::InvalidAmount
            | PaymentError::NotWaitingForCapture
            | PaymentError::MalformedNotification => StatusCode::BAD_REQUEST,
            PaymentError::InvalidSignature => StatusCode::UNAUTHORIZED,
            PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_gateway(err: anyhow::Error) -> Self {
        if err.downcast_ref::<PaymentNotFound>().is_some() {
            PaymentError::PaymentNotFound
        } else {
            PaymentError::Gateway(err)
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Internal(err) => AppError::Internal(err),
            other => AppError::rejected(other.status_code(), other.to_string()),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentError>;

/// Return URL handed to the gateway: the frontend subscription page, without
/// the `{payment_id}` placeholder the gateway cannot fill in.
pub fn normalize_return_url(url: &str) -> String {
    let mut url = url
        .trim()
        .replace("?payment_id={payment_id}", "")
        .replace("&payment_id={payment_id}", "");

    if !url.ends_with(RETURN_PATH) {
        if url.ends_with('/') {
            url.pop();
        }
        url.push_str(RETURN_PATH);
    }
    url
}

fn with_success_flag(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}success=true")
}

fn payment_metadata(user_id: Uuid, plan: &PlanEntity) -> HashMap<String, String> {
    HashMap::from([
        ("user_id".to_string(), user_id.to_string()),
        ("plan_id".to_string(), plan.id.to_string()),
        ("plan_name".to_string(), plan.name.clone()),
        ("plan_duration".to_string(), plan.month_duration.to_string()),
    ])
}

/// Charge of a saved method; shared by user-initiated and scheduled renewals.
pub fn recurring_request(
    user_id: Uuid,
    plan: &PlanEntity,
    provider_method_id: &str,
    return_url: &str,
) -> CreatePaymentRequest {
    let mut metadata = payment_metadata(user_id, plan);
    metadata.insert("is_recurring".to_string(), "true".to_string());

    CreatePaymentRequest {
        amount: Amount {
            value: format_amount(plan.price_minor),
            currency: DEFAULT_CURRENCY.to_string(),
        },
        capture: true,
        confirmation: Some(Confirmation {
            type_: "redirect".to_string(),
            return_url: Some(with_success_flag(&normalize_return_url(return_url))),
            confirmation_url: None,
        }),
        description: format!(
            "Автоплатеж: подписка \"{}\" на {} мес.",
            plan.name, plan.month_duration
        ),
        metadata,
        save_payment_method: None,
        payment_method_id: Some(provider_method_id.to_string()),
    }
}

/// Local row for a payment the gateway just accepted.
pub fn payment_row(
    user_id: Uuid,
    plan: &PlanEntity,
    request: &CreatePaymentRequest,
    gateway: &GatewayPayment,
) -> InsertPaymentEntity {
    InsertPaymentEntity {
        user_id,
        plan_id: plan.id,
        provider_payment_id: gateway.id.clone(),
        status: PaymentStatus::from_str(&gateway.status)
            .unwrap_or(PaymentStatus::Pending)
            .as_str()
            .to_string(),
        amount_minor: plan.price_minor,
        currency: request.amount.currency.clone(),
        description: request.description.clone(),
        confirmation_url: gateway.confirmation_url().map(str::to_string),
        is_recurring: request.payment_method_id.is_some(),
        payment_method_ref: request.payment_method_id.clone(),
    }
}

pub struct PaymentUseCase<Pay, P, M, S, G>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    payment_repo: Arc<Pay>,
    plan_repo: Arc<P>,
    payment_method_repo: Arc<M>,
    subscription_repo: Arc<S>,
    gateway: Arc<G>,
    settlement: Arc<SettlementService<Pay, P, G>>,
    default_return_url: String,
    polling: PaymentPolling,
}

impl<Pay, P, M, S, G> PaymentUseCase<Pay, P, M, S, G>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        payment_repo: Arc<Pay>,
        plan_repo: Arc<P>,
        payment_method_repo: Arc<M>,
        subscription_repo: Arc<S>,
        gateway: Arc<G>,
        default_return_url: String,
        polling: PaymentPolling,
    ) -> Self {
        let settlement = Arc::new(SettlementService::new(
            Arc::clone(&payment_repo),
            Arc::clone(&plan_repo),
            Arc::clone(&gateway),
        ));

        Self {
            payment_repo,
            plan_repo,
            payment_method_repo,
            subscription_repo,
            gateway,
            settlement,
            default_return_url,
            polling,
        }
    }

    async fn load_plan(&self, plan_id: Uuid) -> UseCaseResult<PlanEntity> {
        self.plan_repo
            .find_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%plan_id, db_error = ?err, "payments: failed to load plan");
                PaymentError::Internal(err)
            })?
            .ok_or(PaymentError::PlanNotFound)
    }

    async fn record(
        &self,
        user_id: Uuid,
        plan: &PlanEntity,
        request: &CreatePaymentRequest,
        gateway: &GatewayPayment,
    ) -> UseCaseResult<PaymentEntity> {
        self.payment_repo
            .record_payment(payment_row(user_id, plan, request, gateway))
            .await
            .map_err(|err| {
                error!(%user_id, payment_id = %gateway.id, db_error = ?err, "payments: failed to record payment");
                PaymentError::Internal(err)
            })
    }

    fn created_dto(gateway: &GatewayPayment) -> CreatedPaymentDto {
        CreatedPaymentDto {
            payment_id: gateway.id.clone(),
            status: gateway.status.clone(),
            confirmation_url: gateway.confirmation_url().map(str::to_string),
            amount: gateway.amount.value.clone(),
            currency: gateway.amount.currency.clone(),
        }
    }

    pub async fn create_payment(
        &self,
        user_id: Uuid,
        model: CreatePaymentModel,
    ) -> UseCaseResult<CreatedPaymentDto> {
        let plan = self.load_plan(model.plan_id).await?;
        let two_step = model.two_step_payment.unwrap_or(false);
        let return_url = normalize_return_url(
            model
                .return_url
                .as_deref()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(&self.default_return_url),
        );

        let mut metadata = payment_metadata(user_id, &plan);
        metadata.insert("two_step_payment".to_string(), two_step.to_string());

        let request = CreatePaymentRequest {
            amount: Amount {
                value: format_amount(plan.price_minor),
                currency: DEFAULT_CURRENCY.to_string(),
            },
            capture: !two_step,
            confirmation: Some(Confirmation {
                type_: "redirect".to_string(),
                return_url: Some(return_url),
                confirmation_url: None,
            }),
            description: format!(
                "Подписка \"{}\" на {} мес.",
                plan.name, plan.month_duration
            ),
            metadata,
            save_payment_method: Some(model.save_payment_method.unwrap_or(true)),
            payment_method_id: None,
        };

        let gateway = self
            .gateway
            .create_payment(request.clone(), Uuid::new_v4())
            .await
            .map_err(|err| {
                error!(%user_id, plan_id = %plan.id, error = ?err, "payments: gateway refused payment");
                PaymentError::Gateway(err)
            })?;

        if gateway.confirmation_url().is_none() {
            error!(%user_id, payment_id = %gateway.id, "payments: gateway returned no confirmation url");
            return Err(PaymentError::Gateway(anyhow::anyhow!(
                "payment {} has no confirmation url",
                gateway.id
            )));
        }

        self.record(user_id, &plan, &request, &gateway).await?;
        Arc::clone(&self.settlement).spawn_polling(
            gateway.id.clone(),
            self.polling,
            SettlementTrigger::Polling,
        );

        info!(%user_id, payment_id = %gateway.id, plan = %plan.name, two_step, "payments: payment created");
        Ok(Self::created_dto(&gateway))
    }

    pub async fn create_recurring_payment(
        &self,
        user_id: Uuid,
        model: CreateRecurringPaymentModel,
    ) -> UseCaseResult<CreatedPaymentDto> {
        let method = self
            .payment_method_repo
            .find_for_user(user_id, model.payment_method_id)
            .await
            .map_err(PaymentError::Internal)?
            .ok_or(PaymentError::PaymentMethodNotFound)?;
        let plan = self.load_plan(model.plan_id).await?;

        let request = recurring_request(
            user_id,
            &plan,
            &method.provider_method_id,
            &self.default_return_url,
        );
        let gateway = self
            .gateway
            .create_payment(request.clone(), Uuid::new_v4())
            .await
            .map_err(|err| {
                error!(%user_id, plan_id = %plan.id, error = ?err, "payments: gateway refused recurring payment");
                PaymentError::Gateway(err)
            })?;

        self.record(user_id, &plan, &request, &gateway).await?;
        Arc::clone(&self.settlement).spawn_polling(
            gateway.id.clone(),
            self.polling,
            SettlementTrigger::RecurringPolling,
        );

        info!(%user_id, payment_id = %gateway.id, plan = %plan.name, "payments: recurring payment created");
        Ok(Self::created_dto(&gateway))
    }

    /// Loads the local payment and refuses ids that belong to someone else.
    async fn owned_payment(
        &self,
        user_id: Uuid,
        payment_id: &str,
    ) -> UseCaseResult<Option<PaymentEntity>> {
        if payment_id.len() < MIN_PAYMENT_ID_LEN {
            return Err(PaymentError::InvalidPaymentId);
        }

        let payment = self
            .payment_repo
            .find_by_provider_payment_id(payment_id.to_string())
            .await
            .map_err(PaymentError::Internal)?;

        match payment {
            Some(payment) if payment.user_id != user_id => {
                warn!(%user_id, %payment_id, "payments: access to foreign payment");
                Err(PaymentError::PaymentNotFound)
            }
            other => Ok(other),
        }
    }

    async fn status_dto(
        &self,
        user_id: Uuid,
        reconciliation: Reconciliation,
    ) -> UseCaseResult<PaymentStatusDto> {
        let subscription_activated = reconciliation.outcome.subscription_activated();
        let expire_date = match reconciliation.outcome {
            SettlementOutcome::Activated { expires_at, .. } => Some(expires_at),
            SettlementOutcome::AlreadySettled => self
                .subscription_repo
                .find_by_user_id(user_id)
                .await
                .map_err(PaymentError::Internal)?
                .and_then(|subscription| subscription.expires_at),
            _ => None,
        };

        let gateway = reconciliation.gateway;
        Ok(PaymentStatusDto {
            payment_id: gateway.id,
            status: gateway.status,
            paid: gateway.paid,
            amount: gateway.amount.value,
            currency: gateway.amount.currency,
            subscription_activated,
            expire_date,
        })
    }

    pub async fn check_status(
        &self,
        user_id: Uuid,
        payment_id: String,
    ) -> UseCaseResult<PaymentStatusDto> {
        self.owned_payment(user_id, &payment_id).await?;

        let reconciliation = self
            .settlement
            .reconcile(&payment_id, SettlementTrigger::StatusCheck)
            .await
            .map_err(|err| {
                error!(%user_id, %payment_id, error = ?err, "payments: status check failed");
                PaymentError::from_gateway(err)
            })?;

        self.status_dto(user_id, reconciliation).await
    }

    pub async fn capture(
        &self,
        user_id: Uuid,
        payment_id: String,
        model: CapturePaymentModel,
    ) -> UseCaseResult<PaymentStatusDto> {
        self.owned_payment(user_id, &payment_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound)?;

        let gateway = self
            .gateway
            .get_payment(&payment_id)
            .await
            .map_err(PaymentError::from_gateway)?;

        let gateway = if gateway.paid && gateway.status == PaymentStatus::Succeeded.as_str() {
            gateway
        } else if gateway.status != PaymentStatus::WaitingForCapture.as_str() {
            return Err(PaymentError::NotWaitingForCapture);
        } else {
            let amount = match model.amount.as_deref() {
                Some(value) => Some(Amount {
                    value: format_amount(parse_amount(value).ok_or(PaymentError::InvalidAmount)?),
                    currency: gateway.amount.currency.clone(),
                }),
                None => None,
            };

            let captured = self
                .gateway
                .capture_payment(&payment_id, amount, Uuid::new_v4())
                .await
                .map_err(|err| {
                    error!(%user_id, %payment_id, error = ?err, "payments: capture failed");
                    PaymentError::Gateway(err)
                })?;
            info!(%user_id, %payment_id, status = %captured.status, "payments: payment captured");
            captured
        };

        let reconciliation = self
            .settlement
            .reconcile_snapshot(gateway, SettlementTrigger::Capture)
            .await
            .map_err(PaymentError::Internal)?;

        self.status_dto(user_id, reconciliation).await
    }

    pub async fn list_payment_methods(&self, user_id: Uuid) -> UseCaseResult<Vec<PaymentMethodDto>> {
        let methods = self
            .payment_method_repo
            .list_by_user(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "payments: failed to list payment methods");
                PaymentError::Internal(err)
            })?;

        Ok(methods.into_iter().map(PaymentMethodDto::from).collect())
    }

    pub async fn set_default_payment_method(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> UseCaseResult<PaymentMethodDto> {
        let method = self
            .payment_method_repo
            .set_default(user_id, method_id)
            .await
            .map_err(|err| {
                error!(%user_id, %method_id, db_error = ?err, "payments: failed to set default method");
                PaymentError::Internal(err)
            })?
            .ok_or(PaymentError::PaymentMethodNotFound)?;

        info!(%user_id, %method_id, "payments: default payment method changed");
        Ok(PaymentMethodDto::from(method))
    }

    pub async fn delete_payment_method(&self, user_id: Uuid, method_id: Uuid) -> UseCaseResult<()> {
        let deleted = self
            .payment_method_repo
            .delete_for_user(user_id, method_id)
            .await
            .map_err(|err| {
                error!(%user_id, %method_id, db_error = ?err, "payments: failed to delete method");
                PaymentError::Internal(err)
            })?;

        if !deleted {
            return Err(PaymentError::PaymentMethodNotFound);
        }

        info!(%user_id, %method_id, "payments: payment method deleted");
        Ok(())
    }

    /// Only signature and shape problems are reported back; the gateway
    /// retries on non-2xx, so processing failures are logged and swallowed.
    pub async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> UseCaseResult<()> {
        let signature = signature.ok_or_else(|| {
            warn!("payments: webhook without signature");
            PaymentError::InvalidSignature
        })?;

        let notification = self
            .gateway
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                if err.downcast_ref::<InvalidWebhookSignature>().is_some() {
                    warn!("payments: webhook signature mismatch");
                    PaymentError::InvalidSignature
                } else {
                    warn!(error = ?err, "payments: webhook body is not valid json");
                    PaymentError::MalformedNotification
                }
            })?;

        let event = notification
            .event
            .filter(|event| !event.is_empty())
            .ok_or(PaymentError::MalformedNotification)?;
        let object = notification.object.ok_or(PaymentError::MalformedNotification)?;
        let payment_id = object
            .get("id")
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or(PaymentError::MalformedNotification)?;

        if !event.starts_with("payment.") {
            info!(%event, object_id = %payment_id, "payments: ignoring non-payment notification");
            return Ok(());
        }

        info!(%event, %payment_id, "payments: webhook received");

        let result = match serde_json::from_value::<GatewayPayment>(object) {
            Ok(snapshot) => {
                self.settlement
                    .reconcile_snapshot(snapshot, SettlementTrigger::Webhook)
                    .await
            }
            Err(_) => {
                self.settlement
                    .reconcile(&payment_id, SettlementTrigger::Webhook)
                    .await
            }
        };

        match result {
            Ok(reconciliation) => {
                info!(%event, %payment_id, outcome = ?reconciliation.outcome, "payments: webhook processed");
            }
            Err(err) => {
                error!(%event, %payment_id, error = ?err, "payments: webhook processing failed");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::payment_gateway::MockPaymentGateway;
    use chrono::Utc;
    use crates::{
        domain::{
            entities::payment_methods::PaymentMethodEntity,
            repositories::{
                payment_methods::MockPaymentMethodRepository, payments::MockPaymentRepository,
                plans::MockPlanRepository, subscriptions::MockSubscriptionRepository,
            },
            value_objects::payments::SettlementWrite,
        },
        payments::yookassa_client::WebhookNotification,
    };
    use mockall::predicate::eq;

    type TestUseCase = PaymentUseCase<
        MockPaymentRepository,
        MockPlanRepository,
        MockPaymentMethodRepository,
        MockSubscriptionRepository,
        MockPaymentGateway,
    >;

    const PAYMENT_ID: &str = "2d6a6c5f-000f-5000-9000-1b2c3d4e5f60";

    fn polling() -> PaymentPolling {
        PaymentPolling {
            initial_delay_ms: 60_000,
            interval_ms: 60_000,
            max_attempts: 1,
        }
    }

    fn plan(plan_id: Uuid) -> PlanEntity {
        PlanEntity {
            id: plan_id,
            name: "Базовый".to_string(),
            description: String::new(),
            month_duration: 1,
            price_minor: 299_00,
            discount_percent: 0,
            device_limit: 1,
            is_popular: false,
            sort_order: 1,
            created_at: Utc::now(),
        }
    }

    fn gateway_payment(status: &str) -> GatewayPayment {
        GatewayPayment {
            id: PAYMENT_ID.to_string(),
            status: status.to_string(),
            amount: Amount {
                value: "299.00".to_string(),
                currency: "RUB".to_string(),
            },
            description: None,
            confirmation: Some(Confirmation {
                type_: "redirect".to_string(),
                return_url: None,
                confirmation_url: Some("https://yoomoney.ru/checkout/x".to_string()),
            }),
            payment_method: None,
            metadata: HashMap::new(),
            paid: status == "succeeded",
            payment_method_saved: false,
            captured_at: None,
        }
    }

    fn local_payment(user_id: Uuid, status: PaymentStatus) -> PaymentEntity {
        PaymentEntity {
            id: Uuid::new_v4(),
            user_id,
            plan_id: Uuid::new_v4(),
            provider_payment_id: PAYMENT_ID.to_string(),
            status: status.as_str().to_string(),
            amount_minor: 299_00,
            currency: "RUB".to_string(),
            description: "Подписка".to_string(),
            confirmation_url: None,
            is_recurring: false,
            payment_method_ref: None,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn usecase(
        payments: MockPaymentRepository,
        plans: MockPlanRepository,
        methods: MockPaymentMethodRepository,
        gateway: MockPaymentGateway,
    ) -> TestUseCase {
        PaymentUseCase::new(
            Arc::new(payments),
            Arc::new(plans),
            Arc::new(methods),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(gateway),
            "http://localhost:5173/subscription".to_string(),
            polling(),
        )
    }

    #[test]
    fn return_url_points_at_subscription_page() {
        assert_eq!(
            normalize_return_url("https://tv.example.com"),
            "https://tv.example.com/subscription"
        );
        assert_eq!(
            normalize_return_url("https://tv.example.com/"),
            "https://tv.example.com/subscription"
        );
        assert_eq!(
            normalize_return_url("https://tv.example.com/subscription?payment_id={payment_id}"),
            "https://tv.example.com/subscription"
        );
    }

    #[test]
    fn recurring_request_charges_saved_method() {
        let request = recurring_request(
            Uuid::new_v4(),
            &plan(Uuid::new_v4()),
            "pm-1",
            "https://tv.example.com/subscription",
        );

        assert!(request.capture);
        assert_eq!(request.payment_method_id.as_deref(), Some("pm-1"));
        assert!(request.description.starts_with("Автоплатеж: "));
        assert_eq!(request.metadata.get("is_recurring").map(String::as_str), Some("true"));
        assert_eq!(
            request.confirmation.and_then(|c| c.return_url).as_deref(),
            Some("https://tv.example.com/subscription?success=true")
        );
    }

    #[tokio::test]
    async fn create_payment_records_pending_payment() {
        let user_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();

        let mut plans = MockPlanRepository::new();
        plans
            .expect_find_by_id()
            .with(eq(plan_id))
            .returning(|id| Ok(Some(plan(id))));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment()
            .withf(|request, _| {
                request.capture
                    && request.amount.value == "299.00"
                    && request.description == "Подписка \"Базовый\" на 1 мес."
                    && request.save_payment_method == Some(true)
                    && request
                        .confirmation
                        .as_ref()
                        .and_then(|c| c.return_url.as_deref())
                        == Some("https://tv.example.com/subscription")
            })
            .times(1)
            .returning(|_, _| Ok(gateway_payment("pending")));

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_record_payment()
            .withf(move |row| {
                row.user_id == user_id
                    && row.status == "pending"
                    && row.amount_minor == 299_00
                    && !row.is_recurring
            })
            .times(1)
            .returning(move |row| {
                let mut payment = local_payment(row.user_id, PaymentStatus::Pending);
                payment.plan_id = row.plan_id;
                Ok(payment)
            });

        let created = usecase(payments, plans, MockPaymentMethodRepository::new(), gateway)
            .create_payment(
                user_id,
                CreatePaymentModel {
                    plan_id,
                    return_url: Some("https://tv.example.com".to_string()),
                    save_payment_method: None,
                    two_step_payment: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(created.payment_id, PAYMENT_ID);
        assert_eq!(
            created.confirmation_url.as_deref(),
            Some("https://yoomoney.ru/checkout/x")
        );
    }

    #[tokio::test]
    async fn recurring_payment_with_foreign_method_is_not_found() {
        let mut methods = MockPaymentMethodRepository::new();
        methods.expect_find_for_user().returning(|_, _| Ok(None));

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_payment().times(0);

        let result = usecase(
            MockPaymentRepository::new(),
            MockPlanRepository::new(),
            methods,
            gateway,
        )
        .create_recurring_payment(
            Uuid::new_v4(),
            CreateRecurringPaymentModel {
                plan_id: Uuid::new_v4(),
                payment_method_id: Uuid::new_v4(),
            },
        )
        .await;

        assert!(matches!(result, Err(PaymentError::PaymentMethodNotFound)));
    }

    #[tokio::test]
    async fn short_payment_id_is_rejected() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_get_payment().times(0);

        let result = usecase(
            MockPaymentRepository::new(),
            MockPlanRepository::new(),
            MockPaymentMethodRepository::new(),
            gateway,
        )
        .check_status(Uuid::new_v4(), "abc".to_string())
        .await;

        assert!(matches!(result, Err(PaymentError::InvalidPaymentId)));
    }

    #[tokio::test]
    async fn capture_refuses_pending_payment() {
        let user_id = Uuid::new_v4();

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_by_provider_payment_id()
            .returning(move |_| Ok(Some(local_payment(user_id, PaymentStatus::Pending))));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_get_payment()
            .returning(|_| Ok(gateway_payment("pending")));
        gateway.expect_capture_payment().times(0);

        let result = usecase(
            payments,
            MockPlanRepository::new(),
            MockPaymentMethodRepository::new(),
            gateway,
        )
        .capture(user_id, PAYMENT_ID.to_string(), CapturePaymentModel::default())
        .await;

        assert!(matches!(result, Err(PaymentError::NotWaitingForCapture)));
    }

    #[tokio::test]
    async fn capture_of_waiting_payment_settles_it() {
        let user_id = Uuid::new_v4();

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_by_provider_payment_id()
            .returning(move |_| {
                Ok(Some(local_payment(user_id, PaymentStatus::WaitingForCapture)))
            });
        payments.expect_settle_succeeded().times(1).returning(|_| {
            Ok(SettlementWrite::Activated {
                expires_at: Utc::now(),
                auto_renewal: false,
            })
        });

        let mut plans = MockPlanRepository::new();
        plans.expect_find_by_id().returning(|id| Ok(Some(plan(id))));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_get_payment()
            .returning(|_| Ok(gateway_payment("waiting_for_capture")));
        gateway
            .expect_capture_payment()
            .withf(|_, amount, _| amount.as_ref().is_some_and(|a| a.value == "150.00"))
            .times(1)
            .returning(|_, _, _| Ok(gateway_payment("succeeded")));

        let status = usecase(payments, plans, MockPaymentMethodRepository::new(), gateway)
            .capture(
                user_id,
                PAYMENT_ID.to_string(),
                CapturePaymentModel {
                    amount: Some("150".to_string()),
                },
            )
            .await
            .unwrap();

        assert!(status.subscription_activated);
        assert!(status.expire_date.is_some());
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_unauthorized() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(InvalidWebhookSignature.into()));

        let mut payments = MockPaymentRepository::new();
        payments.expect_find_by_provider_payment_id().times(0);

        let result = usecase(
            payments,
            MockPlanRepository::new(),
            MockPaymentMethodRepository::new(),
            gateway,
        )
        .handle_webhook(b"{}", Some("bad"))
        .await;

        assert!(matches!(result, Err(PaymentError::InvalidSignature)));
    }

    #[tokio::test]
    async fn webhook_without_object_id_is_malformed() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_verify_webhook_signature().returning(|_, _| {
            Ok(WebhookNotification {
                type_: Some("notification".to_string()),
                event: Some("payment.succeeded".to_string()),
                object: Some(serde_json::json!({ "status": "succeeded" })),
            })
        });

        let result = usecase(
            MockPaymentRepository::new(),
            MockPlanRepository::new(),
            MockPaymentMethodRepository::new(),
            gateway,
        )
        .handle_webhook(b"{}", Some("sig"))
        .await;

        assert!(matches!(result, Err(PaymentError::MalformedNotification)));
    }

    #[tokio::test]
    async fn webhook_swallows_processing_failures() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_verify_webhook_signature().returning(|_, _| {
            Ok(WebhookNotification {
                type_: Some("notification".to_string()),
                event: Some("payment.succeeded".to_string()),
                object: Some(serde_json::json!({
                    "id": PAYMENT_ID,
                    "status": "succeeded",
                    "paid": true,
                    "amount": { "value": "299.00", "currency": "RUB" }
                })),
            })
        });

        let mut payments = MockPaymentRepository::new();
        payments
            .expect_find_by_provider_payment_id()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let result = usecase(
            payments,
            MockPlanRepository::new(),
            MockPaymentMethodRepository::new(),
            gateway,
        )
        .handle_webhook(b"{}", Some("sig"))
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn deleting_unknown_method_is_not_found() {
        let mut methods = MockPaymentMethodRepository::new();
        methods
            .expect_delete_for_user()
            .returning(|_, _| Ok(false));

        let result = usecase(
            MockPaymentRepository::new(),
            MockPlanRepository::new(),
            methods,
            MockPaymentGateway::new(),
        )
        .delete_payment_method(Uuid::new_v4(), Uuid::new_v4())
        .await;

        assert!(matches!(result, Err(PaymentError::PaymentMethodNotFound)));
    }

    #[tokio::test]
    async fn set_default_returns_updated_method() {
        let user_id = Uuid::new_v4();
        let method_id = Uuid::new_v4();

        let mut methods = MockPaymentMethodRepository::new();
        methods
            .expect_set_default()
            .with(eq(user_id), eq(method_id))
            .returning(|user_id, method_id| {
                Ok(Some(PaymentMethodEntity {
                    id: method_id,
                    user_id,
                    provider_method_id: "pm-1".to_string(),
                    method_type: "bank_card".to_string(),
                    title: None,
                    card_first6: None,
                    card_last4: Some("4444".to_string()),
                    card_expiry_month: None,
                    card_expiry_year: None,
                    card_type: None,
                    is_default: true,
                    created_at: Utc::now(),
                }))
            });

        let method = usecase(
            MockPaymentRepository::new(),
            MockPlanRepository::new(),
            methods,
            MockPaymentGateway::new(),
        )
        .set_default_payment_method(user_id, method_id)
        .await
        .unwrap();

        assert!(method.is_default);
        assert_eq!(method.payment_method_id, "pm-1");
    }
}
