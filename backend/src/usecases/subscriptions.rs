use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    repositories::{
        payment_methods::PaymentMethodRepository, payments::PaymentRepository,
        plans::PlanRepository, subscriptions::SubscriptionRepository,
    },
    value_objects::{
        payments::PaymentHistoryItemDto,
        plans::{PlanDto, default_plans},
        subscriptions::{AutoRenewalRequest, SubscriptionDto},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Для включения автопродления необходима активная подписка")]
    NoActiveSubscription,
    #[error("Не указан метод оплаты для автопродления")]
    MissingPaymentMethod,
    #[error("Метод оплаты не найден")]
    PaymentMethodNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::NoActiveSubscription | SubscriptionError::MissingPaymentMethod => {
                StatusCode::BAD_REQUEST
            }
            SubscriptionError::PaymentMethodNotFound => StatusCode::NOT_FOUND,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SubscriptionError> for AppError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::Internal(err) => AppError::Internal(err),
            other => AppError::rejected(other.status_code(), other.to_string()),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase<P, Pay, S, M>
where
    P: PlanRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    payment_repo: Arc<Pay>,
    subscription_repo: Arc<S>,
    payment_method_repo: Arc<M>,
}

impl<P, Pay, S, M> SubscriptionUseCase<P, Pay, S, M>
where
    P: PlanRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    M: PaymentMethodRepository + Send + Sync + 'static,
{
    pub fn new(
        plan_repo: Arc<P>,
        payment_repo: Arc<Pay>,
        subscription_repo: Arc<S>,
        payment_method_repo: Arc<M>,
    ) -> Self {
        Self {
            plan_repo,
            payment_repo,
            subscription_repo,
            payment_method_repo,
        }
    }

    /// Seeds the default catalogue on first use.
    pub async fn list_plans(&self) -> UseCaseResult<Vec<PlanDto>> {
        let seeded = self
            .plan_repo
            .seed_if_empty(default_plans())
            .await
            .map_err(|err| {
                error!(db_error = ?err, "subscriptions: failed to seed plans");
                SubscriptionError::Internal(err)
            })?;
        if seeded > 0 {
            info!(seeded, "subscriptions: default plans created");
        }

        let plans = self.plan_repo.list_plans().await.map_err(|err| {
            error!(db_error = ?err, "subscriptions: failed to list plans");
            SubscriptionError::Internal(err)
        })?;

        Ok(plans.into_iter().map(PlanDto::from).collect())
    }

    pub async fn list_payments(&self, user_id: Uuid) -> UseCaseResult<Vec<PaymentHistoryItemDto>> {
        let payments = self
            .payment_repo
            .list_by_user_with_plan(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to list payments");
                SubscriptionError::Internal(err)
            })?;

        Ok(payments
            .into_iter()
            .map(|(payment, plan)| PaymentHistoryItemDto::new(payment, plan))
            .collect())
    }

    pub async fn toggle_auto_renewal(
        &self,
        user_id: Uuid,
        request: AutoRenewalRequest,
    ) -> UseCaseResult<SubscriptionDto> {
        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load subscription");
                SubscriptionError::Internal(err)
            })?
            .filter(|subscription| subscription.is_current(Utc::now()))
            .ok_or(SubscriptionError::NoActiveSubscription)?;

        let default_method_ref = if request.enable {
            let method_id = request
                .payment_method_id
                .ok_or(SubscriptionError::MissingPaymentMethod)?;

            let method = self
                .payment_method_repo
                .set_default(user_id, method_id)
                .await
                .map_err(|err| {
                    error!(%user_id, %method_id, db_error = ?err, "subscriptions: failed to set default method");
                    SubscriptionError::Internal(err)
                })?
                .ok_or_else(|| {
                    warn!(%user_id, %method_id, "subscriptions: auto-renewal with unknown method");
                    SubscriptionError::PaymentMethodNotFound
                })?;

            Some(method.provider_method_id)
        } else {
            subscription.default_payment_method_ref.clone()
        };

        self.subscription_repo
            .update_auto_renewal(user_id, request.enable, default_method_ref.clone())
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to update auto-renewal");
                SubscriptionError::Internal(err)
            })?;

        info!(%user_id, enabled = request.enable, "subscriptions: auto-renewal toggled");

        let mut updated = SubscriptionDto::from(subscription);
        updated.auto_renewal = request.enable;
        updated.default_payment_method_id = default_method_ref;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crates::domain::{
        entities::{
            payment_methods::PaymentMethodEntity, plans::PlanEntity,
            subscriptions::SubscriptionEntity,
        },
        repositories::{
            payment_methods::MockPaymentMethodRepository, payments::MockPaymentRepository,
            plans::MockPlanRepository, subscriptions::MockSubscriptionRepository,
        },
    };
    use mockall::predicate::eq;

    fn subscription(user_id: Uuid, expires_in: Duration) -> SubscriptionEntity {
        SubscriptionEntity {
            user_id,
            is_active: true,
            device_limit: 2,
            expires_at: Some(Utc::now() + expires_in),
            plan_id: None,
            last_payment_id: None,
            auto_renewal: false,
            default_payment_method_ref: None,
            updated_at: Utc::now(),
        }
    }

    fn method(user_id: Uuid, method_id: Uuid) -> PaymentMethodEntity {
        PaymentMethodEntity {
            id: method_id,
            user_id,
            provider_method_id: "pm-gateway-1".to_string(),
            method_type: "bank_card".to_string(),
            title: None,
            card_first6: None,
            card_last4: Some("4444".to_string()),
            card_expiry_month: None,
            card_expiry_year: None,
            card_type: None,
            is_default: true,
            created_at: Utc::now(),
        }
    }

    fn usecase(
        plans: MockPlanRepository,
        subscriptions: MockSubscriptionRepository,
        methods: MockPaymentMethodRepository,
    ) -> SubscriptionUseCase<
        MockPlanRepository,
        MockPaymentRepository,
        MockSubscriptionRepository,
        MockPaymentMethodRepository,
    > {
        SubscriptionUseCase::new(
            Arc::new(plans),
            Arc::new(MockPaymentRepository::new()),
            Arc::new(subscriptions),
            Arc::new(methods),
        )
    }

    #[tokio::test]
    async fn list_plans_seeds_defaults_then_lists() {
        let mut plans = MockPlanRepository::new();
        plans
            .expect_seed_if_empty()
            .withf(|plans| plans.len() == 3)
            .times(1)
            .returning(|plans| Ok(plans.len()));
        plans.expect_list_plans().returning(|| {
            Ok(default_plans()
                .into_iter()
                .map(|plan| PlanEntity {
                    id: Uuid::new_v4(),
                    name: plan.name,
                    description: plan.description,
                    month_duration: plan.month_duration,
                    price_minor: plan.price_minor,
                    discount_percent: plan.discount_percent,
                    device_limit: plan.device_limit,
                    is_popular: plan.is_popular,
                    sort_order: plan.sort_order,
                    created_at: Utc::now(),
                })
                .collect())
        });

        let listed = usecase(
            plans,
            MockSubscriptionRepository::new(),
            MockPaymentMethodRepository::new(),
        )
        .list_plans()
        .await
        .unwrap();

        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].price, "299.00");
    }

    #[tokio::test]
    async fn enabling_requires_an_active_subscription() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_find_by_user_id()
            .returning(|id| Ok(Some(subscription(id, -Duration::days(1)))));
        subscriptions.expect_update_auto_renewal().times(0);

        let result = usecase(
            MockPlanRepository::new(),
            subscriptions,
            MockPaymentMethodRepository::new(),
        )
        .toggle_auto_renewal(
            Uuid::new_v4(),
            AutoRenewalRequest {
                enable: true,
                payment_method_id: Some(Uuid::new_v4()),
            },
        )
        .await;

        assert!(matches!(result, Err(SubscriptionError::NoActiveSubscription)));
    }

    #[tokio::test]
    async fn enabling_with_unknown_method_is_not_found() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_find_by_user_id()
            .returning(|id| Ok(Some(subscription(id, Duration::days(10)))));
        subscriptions.expect_update_auto_renewal().times(0);

        let mut methods = MockPaymentMethodRepository::new();
        methods.expect_set_default().returning(|_, _| Ok(None));

        let result = usecase(MockPlanRepository::new(), subscriptions, methods)
            .toggle_auto_renewal(
                Uuid::new_v4(),
                AutoRenewalRequest {
                    enable: true,
                    payment_method_id: Some(Uuid::new_v4()),
                },
            )
            .await;

        assert!(matches!(result, Err(SubscriptionError::PaymentMethodNotFound)));
    }

    #[tokio::test]
    async fn enabling_stores_method_as_default() {
        let user_id = Uuid::new_v4();
        let method_id = Uuid::new_v4();

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_find_by_user_id()
            .returning(|id| Ok(Some(subscription(id, Duration::days(10)))));
        subscriptions
            .expect_update_auto_renewal()
            .with(eq(user_id), eq(true), eq(Some("pm-gateway-1".to_string())))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut methods = MockPaymentMethodRepository::new();
        methods
            .expect_set_default()
            .with(eq(user_id), eq(method_id))
            .returning(|user_id, method_id| Ok(Some(method(user_id, method_id))));

        let updated = usecase(MockPlanRepository::new(), subscriptions, methods)
            .toggle_auto_renewal(
                user_id,
                AutoRenewalRequest {
                    enable: true,
                    payment_method_id: Some(method_id),
                },
            )
            .await
            .unwrap();

        assert!(updated.auto_renewal);
        assert_eq!(
            updated.default_payment_method_id.as_deref(),
            Some("pm-gateway-1")
        );
    }

    #[tokio::test]
    async fn enabling_without_method_is_rejected() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_find_by_user_id()
            .returning(|id| Ok(Some(subscription(id, Duration::days(10)))));

        let result = usecase(
            MockPlanRepository::new(),
            subscriptions,
            MockPaymentMethodRepository::new(),
        )
        .toggle_auto_renewal(
            Uuid::new_v4(),
            AutoRenewalRequest {
                enable: true,
                payment_method_id: None,
            },
        )
        .await;

        assert!(matches!(result, Err(SubscriptionError::MissingPaymentMethod)));
    }
}
