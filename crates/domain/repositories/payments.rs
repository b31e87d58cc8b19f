use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity},
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payments::{SettleSucceededPayment, SettlementWrite},
    },
};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn record_payment(&self, payment: InsertPaymentEntity) -> Result<PaymentEntity>;

    async fn find_by_provider_payment_id(
        &self,
        provider_payment_id: String,
    ) -> Result<Option<PaymentEntity>>;

    /// Newest first, joined with the plan's name and month duration.
    async fn list_by_user_with_plan(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(PaymentEntity, Option<(String, i32)>)>>;

    /// Moves the payment from `from` to `to`. Returns `false` when the stored
    /// status was no longer `from`.
    async fn transition_status(
        &self,
        provider_payment_id: String,
        from: PaymentStatus,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Marks the payment succeeded and activates the subscription in one
    /// transaction, guarded on the stored status not already being succeeded.
    async fn settle_succeeded(&self, settlement: SettleSucceededPayment)
    -> Result<SettlementWrite>;

    async fn count_succeeded(&self) -> Result<i64>;
}
