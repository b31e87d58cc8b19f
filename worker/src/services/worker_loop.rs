use anyhow::Result;
use backend::usecases::{
    auto_renewal::{AutoRenewalUseCase, RenewalSummary},
    payment_gateway::PaymentGateway,
};
use chrono::Utc;
use crates::domain::repositories::{
    payments::PaymentRepository, plans::PlanRepository, subscriptions::SubscriptionRepository,
};
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Sweeps right away, then once per `every`.
pub async fn run_auto_renewal_loop<S, Pay, P, G>(
    usecase: Arc<AutoRenewalUseCase<S, Pay, P, G>>,
    every: Duration,
) -> Result<()>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    info!(
        interval_secs = every.as_secs(),
        "auto_renewal: starting worker loop"
    );

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_once(&usecase).await;
    }
}

/// A failed sweep is logged and left for the next tick.
pub async fn sweep_once<S, Pay, P, G>(
    usecase: &AutoRenewalUseCase<S, Pay, P, G>,
) -> Option<RenewalSummary>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Pay: PaymentRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    match usecase.run_sweep(Utc::now()).await {
        Ok(summary) => {
            info!(
                processed = summary.processed,
                renewed = summary.renewed,
                failed = summary.failed,
                skipped = summary.skipped,
                pending = summary.pending,
                "auto_renewal: sweep finished"
            );
            Some(summary)
        }
        Err(err) => {
            error!(error = ?err, "auto_renewal: sweep failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::config::config_model::PaymentPolling;
    use crates::{
        domain::repositories::{
            payments::MockPaymentRepository, plans::MockPlanRepository,
            subscriptions::MockSubscriptionRepository,
        },
        payments::yookassa_client::YooKassaClient,
    };

    type TestUseCase = AutoRenewalUseCase<
        MockSubscriptionRepository,
        MockPaymentRepository,
        MockPlanRepository,
        YooKassaClient,
    >;

    fn usecase(subscriptions: MockSubscriptionRepository) -> TestUseCase {
        AutoRenewalUseCase::new(
            Arc::new(subscriptions),
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockPlanRepository::new()),
            Arc::new(YooKassaClient::with_api_base(
                "shop".to_string(),
                "secret".to_string(),
                "http://127.0.0.1:9".to_string(),
            )),
            "http://localhost:5173/subscription".to_string(),
            PaymentPolling {
                initial_delay_ms: 0,
                interval_ms: 0,
                max_attempts: 1,
            },
        )
    }

    #[tokio::test]
    async fn empty_sweep_reports_nothing_processed() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_list_due_for_renewal()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let summary = sweep_once(&usecase(subscriptions)).await;

        assert_eq!(summary, Some(RenewalSummary::default()));
    }

    #[tokio::test]
    async fn failed_sweep_is_swallowed() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_list_due_for_renewal()
            .returning(|_, _| Err(anyhow::anyhow!("database is down")));

        assert_eq!(sweep_once(&usecase(subscriptions)).await, None);
    }
}
