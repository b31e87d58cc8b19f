use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::payments::yookassa_client::{
    Amount, CreatePaymentRequest, GatewayPayment, WebhookNotification, YooKassaClient,
};
use uuid::Uuid;

/// The slice of the YooKassa API the payment flows depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
        idempotence_key: Uuid,
    ) -> AnyResult<GatewayPayment>;

    async fn get_payment(&self, payment_id: &str) -> AnyResult<GatewayPayment>;

    async fn capture_payment(
        &self,
        payment_id: &str,
        amount: Option<Amount>,
        idempotence_key: Uuid,
    ) -> AnyResult<GatewayPayment>;

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> AnyResult<WebhookNotification>;
}

#[async_trait]
impl PaymentGateway for YooKassaClient {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
        idempotence_key: Uuid,
    ) -> AnyResult<GatewayPayment> {
        self.create_payment(&request, idempotence_key).await
    }

    async fn get_payment(&self, payment_id: &str) -> AnyResult<GatewayPayment> {
        self.get_payment(payment_id).await
    }

    async fn capture_payment(
        &self,
        payment_id: &str,
        amount: Option<Amount>,
        idempotence_key: Uuid,
    ) -> AnyResult<GatewayPayment> {
        self.capture_payment(payment_id, amount, idempotence_key)
            .await
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> AnyResult<WebhookNotification> {
        self.verify_webhook_signature(payload, signature)
    }
}
