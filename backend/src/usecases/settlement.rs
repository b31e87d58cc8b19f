use std::{fmt::Display, sync::Arc, time::Duration};

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::{payment_methods::InsertPaymentMethodEntity, payments::PaymentEntity},
        repositories::{payments::PaymentRepository, plans::PlanRepository},
        value_objects::{
            enums::payment_statuses::PaymentStatus,
            payments::{SettleSucceededPayment, SettlementWrite},
        },
    },
    payments::yookassa_client::{GatewayPayment, GatewayPaymentMethod},
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{config::config_model::PaymentPolling, usecases::payment_gateway::PaymentGateway};

/// What caused a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementTrigger {
    Webhook,
    StatusCheck,
    Capture,
    /// Follow-up checks on a payment the user is confirming on the gateway page.
    Polling,
    /// Follow-up checks on a charge against a saved method.
    RecurringPolling,
    AutoRenewal,
}

impl SettlementTrigger {
    /// Whether a `waiting_for_capture` payment is captured before settling.
    /// Follow-up polling of a one-off payment only records the hold; an
    /// explicit capture call has already captured.
    pub fn auto_captures(&self) -> bool {
        matches!(
            self,
            SettlementTrigger::Webhook
                | SettlementTrigger::StatusCheck
                | SettlementTrigger::RecurringPolling
                | SettlementTrigger::AutoRenewal
        )
    }
}

impl Display for SettlementTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SettlementTrigger::Webhook => "webhook",
            SettlementTrigger::StatusCheck => "status_check",
            SettlementTrigger::Capture => "capture",
            SettlementTrigger::Polling => "polling",
            SettlementTrigger::RecurringPolling => "recurring_polling",
            SettlementTrigger::AutoRenewal => "auto_renewal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// The gateway knows the payment, this service never recorded it.
    Untracked,
    /// Same status, unknown status, or a move the state machine refuses.
    Unchanged(PaymentStatus),
    Updated(PaymentStatus),
    Activated {
        expires_at: DateTime<Utc>,
        auto_renewal: bool,
    },
    AlreadySettled,
}

impl SettlementOutcome {
    pub fn subscription_activated(&self) -> bool {
        matches!(
            self,
            SettlementOutcome::Activated { .. } | SettlementOutcome::AlreadySettled
        )
    }
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub gateway: GatewayPayment,
    pub outcome: SettlementOutcome,
}

impl Reconciliation {
    pub fn is_terminal(&self) -> bool {
        PaymentStatus::from_str(&self.gateway.status).is_some_and(|status| status.is_terminal())
    }
}

fn saved_method_row(user_id: Uuid, method: &GatewayPaymentMethod) -> Option<InsertPaymentMethodEntity> {
    let provider_method_id = method.id.clone().filter(|id| !id.is_empty())?;
    let card = method.card.as_ref();

    Some(InsertPaymentMethodEntity {
        user_id,
        provider_method_id,
        method_type: method.type_.clone(),
        title: method.title.clone(),
        card_first6: card.and_then(|card| card.first6.clone()),
        card_last4: card.and_then(|card| card.last4.clone()),
        card_expiry_month: card.and_then(|card| card.expiry_month.clone()),
        card_expiry_year: card.and_then(|card| card.expiry_year.clone()),
        card_type: card.and_then(|card| card.card_type.clone()),
    })
}

/// Applies gateway payment state to the local payment and subscription.
/// Every trigger goes through here, so repeated deliveries are harmless.
pub struct SettlementService<Pay, P, G>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    payment_repo: Arc<Pay>,
    plan_repo: Arc<P>,
    gateway: Arc<G>,
}

impl<Pay, P, G> SettlementService<Pay, P, G>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(payment_repo: Arc<Pay>, plan_repo: Arc<P>, gateway: Arc<G>) -> Self {
        Self {
            payment_repo,
            plan_repo,
            gateway,
        }
    }

    pub async fn reconcile(
        &self,
        provider_payment_id: &str,
        trigger: SettlementTrigger,
    ) -> AnyResult<Reconciliation> {
        let gateway = self.gateway.get_payment(provider_payment_id).await?;
        self.reconcile_snapshot(gateway, trigger).await
    }

    /// Same as [`Self::reconcile`] for callers that already hold the gateway
    /// view of the payment.
    pub async fn reconcile_snapshot(
        &self,
        gateway: GatewayPayment,
        trigger: SettlementTrigger,
    ) -> AnyResult<Reconciliation> {
        let gateway = self.auto_capture(gateway, trigger).await;
        let payment_id = gateway.id.clone();

        let Some(local) = self
            .payment_repo
            .find_by_provider_payment_id(payment_id.clone())
            .await?
        else {
            warn!(%payment_id, %trigger, "settlement: payment is not tracked locally");
            return Ok(Reconciliation {
                gateway,
                outcome: SettlementOutcome::Untracked,
            });
        };

        let current = PaymentStatus::from_str(&local.status).unwrap_or(PaymentStatus::Pending);
        let Some(next) = PaymentStatus::from_str(&gateway.status) else {
            warn!(%payment_id, gateway_status = %gateway.status, "settlement: unknown gateway status");
            return Ok(Reconciliation {
                gateway,
                outcome: SettlementOutcome::Unchanged(current),
            });
        };

        if current == next {
            let outcome = if next == PaymentStatus::Succeeded {
                SettlementOutcome::AlreadySettled
            } else {
                SettlementOutcome::Unchanged(current)
            };
            return Ok(Reconciliation { gateway, outcome });
        }

        if !current.can_transition_to(next) {
            warn!(
                %payment_id,
                %trigger,
                from = %current,
                to = %next,
                "settlement: ignoring out-of-order status"
            );
            return Ok(Reconciliation {
                gateway,
                outcome: SettlementOutcome::Unchanged(current),
            });
        }

        let outcome = if next == PaymentStatus::Succeeded {
            self.settle_succeeded(&local, &gateway, trigger).await?
        } else {
            self.transition(&local, current, next, trigger).await?
        };

        Ok(Reconciliation { gateway, outcome })
    }

    async fn auto_capture(&self, gateway: GatewayPayment, trigger: SettlementTrigger) -> GatewayPayment {
        if !trigger.auto_captures()
            || gateway.status != PaymentStatus::WaitingForCapture.as_str()
        {
            return gateway;
        }

        match self
            .gateway
            .capture_payment(&gateway.id, None, Uuid::new_v4())
            .await
        {
            Ok(captured) => {
                info!(payment_id = %captured.id, %trigger, status = %captured.status, "settlement: payment captured");
                captured
            }
            Err(err) => {
                error!(payment_id = %gateway.id, %trigger, error = ?err, "settlement: auto-capture failed");
                gateway
            }
        }
    }

    async fn transition(
        &self,
        local: &PaymentEntity,
        current: PaymentStatus,
        next: PaymentStatus,
        trigger: SettlementTrigger,
    ) -> AnyResult<SettlementOutcome> {
        let moved = self
            .payment_repo
            .transition_status(local.provider_payment_id.clone(), current, next, Utc::now())
            .await?;

        if !moved {
            warn!(payment_id = %local.provider_payment_id, %trigger, "settlement: status changed concurrently");
            return Ok(SettlementOutcome::Unchanged(current));
        }

        info!(
            payment_id = %local.provider_payment_id,
            user_id = %local.user_id,
            %trigger,
            from = %current,
            to = %next,
            "settlement: payment status updated"
        );
        Ok(SettlementOutcome::Updated(next))
    }

    async fn settle_succeeded(
        &self,
        local: &PaymentEntity,
        gateway: &GatewayPayment,
        trigger: SettlementTrigger,
    ) -> AnyResult<SettlementOutcome> {
        let plan = self
            .plan_repo
            .find_by_id(local.plan_id)
            .await?
            .with_context(|| format!("plan {} of payment {} not found", local.plan_id, local.id))?;

        let saved_method = gateway
            .reusable_method()
            .and_then(|method| saved_method_row(local.user_id, method));
        let payment_method_ref = gateway
            .payment_method
            .as_ref()
            .and_then(|method| method.id.clone())
            .or_else(|| local.payment_method_ref.clone());

        let write = self
            .payment_repo
            .settle_succeeded(SettleSucceededPayment {
                provider_payment_id: local.provider_payment_id.clone(),
                user_id: local.user_id,
                plan_id: plan.id,
                month_duration: plan.month_duration,
                device_limit: plan.device_limit,
                paid_at: Utc::now(),
                payment_method_ref,
                saved_method,
            })
            .await?;

        Ok(match write {
            SettlementWrite::Activated {
                expires_at,
                auto_renewal,
            } => {
                info!(
                    payment_id = %local.provider_payment_id,
                    user_id = %local.user_id,
                    plan = %plan.name,
                    %expires_at,
                    auto_renewal,
                    %trigger,
                    "settlement: subscription activated"
                );
                SettlementOutcome::Activated {
                    expires_at,
                    auto_renewal,
                }
            }
            SettlementWrite::AlreadySettled => {
                info!(payment_id = %local.provider_payment_id, %trigger, "settlement: payment already settled");
                SettlementOutcome::AlreadySettled
            }
        })
    }

    /// Detached follow-up checks for a fresh payment: one after
    /// `initial_delay_ms`, then every `interval_ms` until the payment is
    /// terminal or `max_attempts` checks ran.
    pub fn spawn_polling(
        self: Arc<Self>,
        payment_id: String,
        polling: PaymentPolling,
        trigger: SettlementTrigger,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(polling.initial_delay_ms)).await;

            for attempt in 1..=polling.max_attempts {
                match self.reconcile(&payment_id, trigger).await {
                    Ok(reconciliation) if reconciliation.is_terminal() => {
                        info!(%payment_id, attempt, status = %reconciliation.gateway.status, "settlement: polling finished");
                        return;
                    }
                    Ok(reconciliation) => {
                        info!(%payment_id, attempt, status = %reconciliation.gateway.status, "settlement: payment not final yet");
                    }
                    Err(err) => {
                        warn!(%payment_id, attempt, error = ?err, "settlement: polling check failed");
                    }
                }

                if attempt < polling.max_attempts {
                    tokio::time::sleep(Duration::from_millis(polling.interval_ms)).await;
                }
            }

            info!(%payment_id, "settlement: polling gave up; webhook will settle the payment");
        })
    }
}
