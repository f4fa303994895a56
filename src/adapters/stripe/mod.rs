pub mod event;
pub mod signature;

use {
    crate::domain::{
        error::PipelineError,
        id::ProviderPaymentId,
        money::Currency,
        order::Order,
        payment::NewPayment,
        provider::{CheckoutSession, PaymentProvider, WebhookParse},
    },
    axum::http::HeaderMap,
    std::{collections::HashMap, future::Future, pin::Pin},
};

pub const PROVIDER_NAME: &str = "stripe";

/// Immutable Stripe settings, read once at startup.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
    pub signature_tolerance_secs: i64,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"<redacted>")
            .field("webhook_secret", &"<redacted>")
            .field("success_url", &self.success_url)
            .field("cancel_url", &self.cancel_url)
            .field("signature_tolerance_secs", &self.signature_tolerance_secs)
            .finish()
    }
}

pub struct StripeProvider {
    client: stripe::Client,
    config: StripeConfig,
}

impl StripeProvider {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: stripe::Client::new(config.secret_key.clone()),
            config,
        }
    }
}

impl PaymentProvider for StripeProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn create_checkout<'a>(
        &'a self,
        payment: &'a NewPayment,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<CheckoutSession, PipelineError>> + Send + 'a>> {
        Box::pin(async move { self.create_checkout_inner(payment, order).await })
    }

    fn parse_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookParse, PipelineError> {
        let sig = headers
            .get("Stripe-Signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PipelineError::WebhookSignature("missing Stripe-Signature header".into())
            })?;

        signature::verify(
            sig,
            body,
            &self.config.webhook_secret,
            self.config.signature_tolerance_secs,
            chrono::Utc::now().timestamp(),
        )?;

        Ok(event::parse_event(body))
    }
}

impl StripeProvider {
    async fn create_checkout_inner(
        &self,
        payment: &NewPayment,
        order: &Order,
    ) -> Result<CheckoutSession, PipelineError> {
        // Same key for the same local payment: a retried request returns the
        // session Stripe already created instead of opening a second one.
        let client = self
            .client
            .clone()
            .with_strategy(stripe::RequestStrategy::Idempotent(payment.idempotency_key()));

        let metadata = HashMap::from([
            ("payment_id".to_string(), payment.id().to_string()),
            ("order_id".to_string(), order.id.to_string()),
            ("user_id".to_string(), order.user_id.to_string()),
        ]);

        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Payment);
        params.success_url = Some(self.config.success_url.as_str());
        params.cancel_url = Some(self.config.cancel_url.as_str());
        // Payment intent events are keyed by `pi_...`, not the session id;
        // the copied metadata lets reconciliation find the local payment.
        params.payment_intent_data = Some(stripe::CreateCheckoutSessionPaymentIntentData {
            metadata: Some(metadata.clone()),
            ..Default::default()
        });
        params.metadata = Some(metadata);
        params.line_items = Some(vec![stripe::CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency: convert_currency(payment.money().currency()),
                unit_amount: Some(payment.money().amount().value()),
                product_data: Some(stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: format!("ORDER #{}", order.id.simple()),
                    images: order.first_image().map(|url| vec![url.to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = stripe::CheckoutSession::create(&client, params)
            .await
            .map_err(|e| PipelineError::Provider(format!("Stripe API: {e}")))?;

        let checkout_url = session
            .url
            .ok_or_else(|| PipelineError::Provider("checkout session has no url".into()))?;

        Ok(CheckoutSession {
            checkout_url,
            provider_payment_id: ProviderPaymentId::new(session.id.to_string())?,
        })
    }
}

pub fn convert_currency(c: Currency) -> stripe::Currency {
    match c {
        Currency::Vnd => stripe::Currency::VND,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, axum::http::HeaderValue};

    fn provider() -> StripeProvider {
        StripeProvider::new(StripeConfig {
            secret_key: "sk_test_dummy".into(),
            webhook_secret: "whsec_test".into(),
            success_url: "https://shop.test/payment/success".into(),
            cancel_url: "https://shop.test/payment/fail".into(),
            signature_tolerance_secs: signature::DEFAULT_TOLERANCE_SECS,
        })
    }

    fn body() -> String {
        serde_json::json!({
            "id": "evt_sig",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_sig", "amount_total": 20000, "currency": "vnd"}},
        })
        .to_string()
    }

    #[test]
    fn missing_header_is_signature_failure() {
        let err = provider().parse_webhook(&HeaderMap::new(), body().as_bytes());
        assert!(matches!(err, Err(PipelineError::WebhookSignature(_))));
    }

    #[test]
    fn signed_payload_is_parsed() {
        let body = body();
        let header =
            signature::signature_header(&body, "whsec_test", chrono::Utc::now().timestamp());
        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", HeaderValue::from_str(&header).unwrap());

        match provider().parse_webhook(&headers, body.as_bytes()).unwrap() {
            WebhookParse::Event(event) => {
                assert_eq!(event.provider_payment_id.as_str(), "cs_sig");
                assert_eq!(event.amount.value(), 20_000);
            }
            WebhookParse::Ignored { .. } => panic!("expected a whitelisted event"),
        }
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let printed = format!("{:?}", provider().config);
        assert!(!printed.contains("sk_test_dummy"));
        assert!(!printed.contains("whsec_test"));
    }
}
