use std::sync::Arc;

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::{
        payments::PaymentRepository, plans::PlanRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::enums::payment_statuses::PaymentStatus,
};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::config_model::PaymentPolling,
    usecases::{
        payment_gateway::PaymentGateway,
        payments::{payment_row, recurring_request},
        settlement::{SettlementService, SettlementTrigger},
    },
};

/// Subscriptions expiring within this window are charged.
pub const RENEWAL_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenewalSummary {
    pub processed: usize,
    pub renewed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Charged but not final yet; polling or the webhook settles them.
    pub pending: usize,
}

enum RenewalResult {
    Renewed,
    Pending,
    Failed,
    Skipped,
}

pub struct AutoRenewalUseCase<S, Pay, P, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    subscription_repo: Arc<S>,
    payment_repo: Arc<Pay>,
    plan_repo: Arc<P>,
    gateway: Arc<G>,
    settlement: Arc<SettlementService<Pay, P, G>>,
    return_url: String,
    polling: PaymentPolling,
}

impl<S, Pay, P, G> AutoRenewalUseCase<S, Pay, P, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        subscription_repo: Arc<S>,
        payment_repo: Arc<Pay>,
        plan_repo: Arc<P>,
        gateway: Arc<G>,
        return_url: String,
        polling: PaymentPolling,
    ) -> Self {
        let settlement = Arc::new(SettlementService::new(
            Arc::clone(&payment_repo),
            Arc::clone(&plan_repo),
            Arc::clone(&gateway),
        ));

        Self {
            subscription_repo,
            payment_repo,
            plan_repo,
            gateway,
            settlement,
            return_url,
            polling,
        }
    }

    pub async fn run_sweep(&self, now: DateTime<Utc>) -> AnyResult<RenewalSummary> {
        let until = now + Duration::hours(RENEWAL_WINDOW_HOURS);
        let due = self
            .subscription_repo
            .list_due_for_renewal(now, until)
            .await
            .context("failed to list subscriptions due for renewal")?;

        info!(due = due.len(), %until, "auto_renewal: sweep started");

        let mut summary = RenewalSummary::default();
        for subscription in due {
            let user_id = subscription.user_id;
            summary.processed += 1;

            match self.renew(subscription, now).await {
                Ok(RenewalResult::Renewed) => summary.renewed += 1,
                Ok(RenewalResult::Pending) => summary.pending += 1,
                Ok(RenewalResult::Skipped) => summary.skipped += 1,
                Ok(RenewalResult::Failed) => summary.failed += 1,
                Err(err) => {
                    error!(%user_id, error = ?err, "auto_renewal: renewal failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            processed = summary.processed,
            renewed = summary.renewed,
            pending = summary.pending,
            skipped = summary.skipped,
            failed = summary.failed,
            "auto_renewal: sweep finished"
        );
        Ok(summary)
    }

    /// A recurring charge from an earlier sweep that has not settled yet.
    async fn has_open_renewal(&self, user_id: Uuid, now: DateTime<Utc>) -> AnyResult<bool> {
        let since = now - Duration::hours(RENEWAL_WINDOW_HOURS);
        let payments = self.payment_repo.list_by_user_with_plan(user_id).await?;

        Ok(payments.iter().any(|(payment, _)| {
            payment.is_recurring
                && payment.created_at > since
                && PaymentStatus::from_str(&payment.status).is_some_and(|status| !status.is_terminal())
        }))
    }

    async fn renew(
        &self,
        subscription: SubscriptionEntity,
        now: DateTime<Utc>,
    ) -> AnyResult<RenewalResult> {
        let user_id = subscription.user_id;

        let (Some(plan_id), Some(method_ref)) = (
            subscription.plan_id,
            subscription.default_payment_method_ref.as_deref(),
        ) else {
            warn!(%user_id, "auto_renewal: no plan or default payment method; skipping");
            return Ok(RenewalResult::Skipped);
        };

        let Some(plan) = self.plan_repo.find_by_id(plan_id).await? else {
            warn!(%user_id, %plan_id, "auto_renewal: plan no longer exists; skipping");
            return Ok(RenewalResult::Skipped);
        };

        if self.has_open_renewal(user_id, now).await? {
            info!(%user_id, "auto_renewal: previous charge still open; skipping");
            return Ok(RenewalResult::Skipped);
        }

        let request = recurring_request(user_id, &plan, method_ref, &self.return_url);
        let gateway = self
            .gateway
            .create_payment(request.clone(), Uuid::new_v4())
            .await
            .context("gateway refused recurring charge")?;

        self.payment_repo
            .record_payment(payment_row(user_id, &plan, &request, &gateway))
            .await
            .context("failed to record recurring payment")?;

        info!(%user_id, payment_id = %gateway.id, plan = %plan.name, status = %gateway.status, "auto_renewal: charge created");

        let payment_id = gateway.id.clone();
        let reconciliation = self
            .settlement
            .reconcile_snapshot(gateway, SettlementTrigger::AutoRenewal)
            .await?;

        if reconciliation.outcome.subscription_activated() {
            return Ok(RenewalResult::Renewed);
        }
        if reconciliation.is_terminal() {
            warn!(%user_id, %payment_id, status = %reconciliation.gateway.status, "auto_renewal: charge was declined");
            return Ok(RenewalResult::Failed);
        }

        Arc::clone(&self.settlement).spawn_polling(
            payment_id,
            self.polling,
            SettlementTrigger::RecurringPolling,
        );
        Ok(RenewalResult::Pending)
    }
}
