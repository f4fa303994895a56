//! In-memory provider for local development and tests.
//!
//! Checkout sessions are fabricated from the local payment id. Webhooks carry
//! the normalized event directly as JSON and are authenticated with
//! `X-Mock-Signature: hex(HMAC-SHA256(secret, body))`.

use {
    crate::domain::{
        error::PipelineError,
        id::{EventId, ProviderPaymentId},
        money::MinorUnits,
        order::Order,
        payment::{NewPayment, WebhookEventKind},
        provider::{CheckoutSession, PaymentProvider, ProviderEvent, WebhookParse},
    },
    axum::http::HeaderMap,
    hmac::{Hmac, Mac},
    serde::{Deserialize, Serialize},
    sha2::Sha256,
    std::{
        future::Future,
        pin::Pin,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    },
};

type HmacSha256 = Hmac<Sha256>;

pub const PROVIDER_NAME: &str = "mock";
pub const SIGNATURE_HEADER: &str = "x-mock-signature";

/// Webhook body understood by the mock provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub provider_payment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
}

impl MockWebhook {
    pub fn kind(&self) -> Option<WebhookEventKind> {
        match self.event_type.as_str() {
            "checkout.completed" => Some(WebhookEventKind::CheckoutCompleted),
            "payment.succeeded" => Some(WebhookEventKind::PaymentSucceeded),
            "payment.failed" => Some(WebhookEventKind::PaymentFailed),
            _ => None,
        }
    }
}

pub struct MockProvider {
    webhook_secret: String,
    fail_checkout: bool,
    fixed_session: Option<CheckoutSession>,
    delay: Option<Duration>,
    checkout_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            fail_checkout: false,
            fixed_session: None,
            delay: None,
            checkout_calls: AtomicUsize::new(0),
        }
    }

    /// Every checkout request is rejected as a processor error.
    pub fn failing(webhook_secret: impl Into<String>) -> Self {
        Self {
            fail_checkout: true,
            ..Self::new(webhook_secret)
        }
    }

    /// Return this session instead of one derived from the payment id.
    pub fn with_session(mut self, checkout_url: impl Into<String>, provider_payment_id: &str) -> Self {
        self.fixed_session = ProviderPaymentId::new(provider_payment_id)
            .ok()
            .map(|id| CheckoutSession {
                checkout_url: checkout_url.into(),
                provider_payment_id: id,
            });
        self
    }

    /// Sleep before answering a checkout request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn checkout_calls(&self) -> usize {
        self.checkout_calls.load(Ordering::SeqCst)
    }

    /// Hex signature for `body`, as a sender would put in `X-Mock-Signature`.
    pub fn sign(&self, body: impl AsRef<[u8]>) -> String {
        self.mac(body)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    fn mac(&self, body: impl AsRef<[u8]>) -> Result<HmacSha256, PipelineError> {
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|e| PipelineError::WebhookSignature(e.to_string()))?;
        mac.update(body.as_ref());
        Ok(mac)
    }
}

impl PaymentProvider for MockProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn create_checkout<'a>(
        &'a self,
        payment: &'a NewPayment,
        _order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<CheckoutSession, PipelineError>> + Send + 'a>> {
        Box::pin(async move {
            self.checkout_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_checkout {
                return Err(PipelineError::Provider("mock provider rejected checkout".into()));
            }
            if let Some(session) = &self.fixed_session {
                return Ok(session.clone());
            }
            Ok(CheckoutSession {
                checkout_url: format!("https://mock.pay/checkout/{}", payment.id()),
                provider_payment_id: ProviderPaymentId::new(format!(
                    "mock_{}",
                    payment.id().simple()
                ))?,
            })
        })
    }

    fn parse_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookParse, PipelineError> {
        let sig = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PipelineError::WebhookSignature("missing X-Mock-Signature header".into())
            })?;
        let sig = hex::decode(sig)
            .map_err(|_| PipelineError::WebhookSignature("signature is not hex".into()))?;
        self.mac(body)?
            .verify_slice(&sig)
            .map_err(|_| PipelineError::WebhookSignature("signature mismatch".into()))?;

        let webhook: MockWebhook = match serde_json::from_slice(body) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable mock webhook");
                return Ok(WebhookParse::Ignored {
                    event_id: None,
                    event_type: "unknown".into(),
                });
            }
        };

        let Some(kind) = webhook.kind() else {
            return Ok(WebhookParse::Ignored {
                event_id: Some(webhook.id),
                event_type: webhook.event_type,
            });
        };

        let normalized = normalize(&webhook, kind, body);

        match normalized {
            Ok(event) => Ok(WebhookParse::Event(event)),
            Err(e) => {
                tracing::warn!(event_id = %webhook.id, "skipping invalid mock event: {e}");
                Ok(WebhookParse::Ignored {
                    event_id: Some(webhook.id),
                    event_type: webhook.event_type,
                })
            }
        }
    }
}

fn normalize(
    webhook: &MockWebhook,
    kind: WebhookEventKind,
    body: &[u8],
) -> Result<ProviderEvent, PipelineError> {
    Ok(ProviderEvent {
        event_id: EventId::new(webhook.id.clone())?,
        event_type: webhook.event_type.clone(),
        kind,
        provider_payment_id: ProviderPaymentId::new(webhook.provider_payment_id.clone())?,
        payment_ref: webhook.payment_id,
        amount: MinorUnits::new(webhook.amount)?,
        currency: webhook
            .currency
            .as_deref()
            .unwrap_or("vnd")
            .to_ascii_lowercase(),
        raw: String::from_utf8_lossy(body).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::domain::{
            money::{Currency, Money},
            order::OrderStatus,
        },
        axum::http::HeaderValue,
        chrono::Utc,
        rust_decimal::Decimal,
        uuid::Uuid,
    };

    fn order() -> Order {
        Order {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            total_amount: Decimal::from(20_000),
            status: OrderStatus::Pending,
            items: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payment(order: &Order) -> NewPayment {
        let money = Money::new(MinorUnits::new(20_000).unwrap(), Currency::Vnd);
        NewPayment::new(order.id, order.user_id, PROVIDER_NAME, money)
    }

    fn signed(provider: &MockProvider, body: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&provider.sign(body)).unwrap());
        headers
    }

    #[tokio::test]
    async fn derives_session_from_payment_id() {
        let provider = MockProvider::new("s");
        let order = order();
        let payment = payment(&order);
        let session = provider.create_checkout(&payment, &order).await.unwrap();
        assert!(session.checkout_url.ends_with(&payment.id().to_string()));
        assert!(session.provider_payment_id.as_str().starts_with("mock_"));
        assert_eq!(provider.checkout_calls(), 1);
    }

    #[tokio::test]
    async fn failing_provider_counts_the_attempt() {
        let provider = MockProvider::failing("s");
        let order = order();
        let result = provider.create_checkout(&payment(&order), &order).await;
        assert!(matches!(result, Err(PipelineError::Provider(_))));
        assert_eq!(provider.checkout_calls(), 1);
    }

    #[test]
    fn verifies_and_normalizes_webhook() {
        let provider = MockProvider::new("s");
        let body = serde_json::json!({
            "id": "evt_m1", "type": "payment.failed", "provider_payment_id": "mock_1", "amount": 20000
        })
        .to_string();

        match provider.parse_webhook(&signed(&provider, &body), body.as_bytes()).unwrap() {
            WebhookParse::Event(e) => {
                assert_eq!(e.kind, WebhookEventKind::PaymentFailed);
                assert_eq!(e.currency, "vnd");
            }
            WebhookParse::Ignored { .. } => panic!("expected event"),
        }
    }

    #[test]
    fn rejects_bad_signature_and_ignores_unknown_types() {
        let provider = MockProvider::new("s");
        let body = r#"{"id":"evt_m2","type":"refund.created","provider_payment_id":"mock_1"}"#;

        let mut bad = HeaderMap::new();
        bad.insert(SIGNATURE_HEADER, HeaderValue::from_static("deadbeef"));
        assert!(matches!(
            provider.parse_webhook(&bad, body.as_bytes()),
            Err(PipelineError::WebhookSignature(_))
        ));

        assert!(matches!(
            provider.parse_webhook(&signed(&provider, body), body.as_bytes()).unwrap(),
            WebhookParse::Ignored { .. }
        ));
    }
}
