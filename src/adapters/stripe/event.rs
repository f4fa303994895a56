use {
    crate::domain::{
        error::PipelineError,
        id::{EventId, ProviderPaymentId},
        money::MinorUnits,
        payment::WebhookEventKind,
        provider::{ProviderEvent, WebhookParse},
    },
    serde::Deserialize,
    std::collections::HashMap,
    uuid::Uuid,
};

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String, // evt_xxx, the idempotency key
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value, // typed per event_type below
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StripeEventType {
    #[serde(rename = "checkout.session.completed")]
    CheckoutSessionCompleted,

    #[serde(rename = "payment_intent.succeeded")]
    PaymentIntentSucceeded,

    #[serde(rename = "payment_intent.payment_failed")]
    PaymentIntentPaymentFailed,

    #[serde(other)]
    Unknown,
}

impl StripeEventType {
    pub fn from_wire(s: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(s.to_string())).unwrap_or(Self::Unknown)
    }

    pub fn kind(&self) -> Option<WebhookEventKind> {
        match self {
            Self::CheckoutSessionCompleted => Some(WebhookEventKind::CheckoutCompleted),
            Self::PaymentIntentSucceeded => Some(WebhookEventKind::PaymentSucceeded),
            Self::PaymentIntentPaymentFailed => Some(WebhookEventKind::PaymentFailed),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String, // cs_xxx, matches Payment.provider_payment_id
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    id: String, // pi_xxx
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: Option<String>,
    // Copied from the checkout session via `payment_intent_data.metadata`.
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn payment_ref(metadata: &HashMap<String, String>) -> Option<Uuid> {
    metadata
        .get("payment_id")
        .and_then(|id| Uuid::parse_str(id).ok())
}

fn currency_or_default(currency: Option<String>) -> String {
    currency
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "vnd".to_string())
}

/// Read a verified Stripe payload into a normalized event.
///
/// Anything outside the whitelist, or an object that does not have the
/// expected shape, is `Ignored`: the sender is authentic, so retrying would
/// not change the outcome.
pub fn parse_event(body: &[u8]) -> WebhookParse {
    let event: StripeEvent = match serde_json::from_slice(body) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(error = %e, "verified webhook is not a Stripe event envelope");
            return WebhookParse::Ignored {
                event_id: None,
                event_type: "unknown".into(),
            };
        }
    };

    let event_type = StripeEventType::from_wire(&event.event_type);
    let Some(kind) = event_type.kind() else {
        tracing::info!(event_type = %event.event_type, "unhandled Stripe event type");
        return ignored(event);
    };

    match normalize(&event, kind, body) {
        Ok(normalized) => WebhookParse::Event(normalized),
        Err(e) => {
            tracing::warn!(event_id = %event.id, event_type = %event.event_type, "skipping invalid event data: {e}");
            ignored(event)
        }
    }
}

fn ignored(event: StripeEvent) -> WebhookParse {
    WebhookParse::Ignored {
        event_id: Some(event.id),
        event_type: event.event_type,
    }
}

fn normalize(
    event: &StripeEvent,
    kind: WebhookEventKind,
    body: &[u8],
) -> Result<ProviderEvent, PipelineError> {
    let (object_id, amount, currency, metadata) = match kind {
        WebhookEventKind::CheckoutCompleted => {
            let session: CheckoutSessionObject =
                serde_json::from_value(event.data.object.clone())?;
            (
                session.id,
                session.amount_total.unwrap_or(0),
                session.currency,
                session.metadata,
            )
        }
        WebhookEventKind::PaymentSucceeded | WebhookEventKind::PaymentFailed => {
            let pi: PaymentIntentObject = serde_json::from_value(event.data.object.clone())?;
            (pi.id, pi.amount, pi.currency, pi.metadata)
        }
    };

    Ok(ProviderEvent {
        event_id: EventId::new(event.id.clone())?,
        event_type: event.event_type.clone(),
        kind,
        provider_payment_id: ProviderPaymentId::new(object_id)?,
        payment_ref: payment_ref(&metadata),
        amount: MinorUnits::new(amount)?,
        currency: currency_or_default(currency),
        raw: String::from_utf8_lossy(body).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(event_type: &str, object: serde_json::Value) -> String {
        serde_json::json!({
            "id": "evt_1",
            "object": "event",
            "type": event_type,
            "created": 1_700_000_000,
            "livemode": false,
            "data": { "object": object },
        })
        .to_string()
    }

    #[test]
    fn checkout_completed_uses_session_id_and_total() {
        let body = envelope(
            "checkout.session.completed",
            serde_json::json!({"id": "cs_1", "object": "checkout.session", "amount_total": 500000, "currency": "vnd"}),
        );
        let WebhookParse::Event(event) = parse_event(body.as_bytes()) else {
            panic!("expected event");
        };
        assert_eq!(event.kind, WebhookEventKind::CheckoutCompleted);
        assert_eq!(event.event_id.as_str(), "evt_1");
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.provider_payment_id.as_str(), "cs_1");
        assert_eq!(event.amount.value(), 500_000);
        assert_eq!(event.currency, "vnd");
        assert_eq!(event.raw, body);
    }

    #[test]
    fn missing_amount_total_becomes_zero() {
        let body = envelope(
            "checkout.session.completed",
            serde_json::json!({"id": "cs_2", "amount_total": null}),
        );
        let WebhookParse::Event(event) = parse_event(body.as_bytes()) else {
            panic!("expected event");
        };
        assert!(event.amount.is_zero());
        assert_eq!(event.currency, "vnd");
    }

    #[test]
    fn payment_intent_failed_is_whitelisted() {
        let body = envelope(
            "payment_intent.payment_failed",
            serde_json::json!({"id": "pi_1", "amount": 20000, "currency": "VND"}),
        );
        let WebhookParse::Event(event) = parse_event(body.as_bytes()) else {
            panic!("expected event");
        };
        assert_eq!(event.kind, WebhookEventKind::PaymentFailed);
        assert_eq!(event.provider_payment_id.as_str(), "pi_1");
        assert_eq!(event.amount.value(), 20_000);
        assert_eq!(event.currency, "vnd");
        assert_eq!(event.payment_ref, None);
    }

    #[test]
    fn payment_intent_carries_local_payment_id_from_metadata() {
        let payment_id = Uuid::now_v7();
        let body = envelope(
            "payment_intent.payment_failed",
            serde_json::json!({
                "id": "pi_2",
                "amount": 20000,
                "metadata": {"payment_id": payment_id.to_string(), "order_id": "x"}
            }),
        );
        let WebhookParse::Event(event) = parse_event(body.as_bytes()) else {
            panic!("expected event");
        };
        assert_eq!(event.provider_payment_id.as_str(), "pi_2");
        assert_eq!(event.payment_ref, Some(payment_id));

        let garbled = envelope(
            "payment_intent.succeeded",
            serde_json::json!({"id": "pi_3", "metadata": {"payment_id": "not-a-uuid"}}),
        );
        let WebhookParse::Event(event) = parse_event(garbled.as_bytes()) else {
            panic!("expected event");
        };
        assert_eq!(event.payment_ref, None);
    }

    #[test]
    fn other_types_are_ignored() {
        let body = envelope("charge.succeeded", serde_json::json!({"id": "ch_1"}));
        match parse_event(body.as_bytes()) {
            WebhookParse::Ignored { event_id, event_type } => {
                assert_eq!(event_id.as_deref(), Some("evt_1"));
                assert_eq!(event_type, "charge.succeeded");
            }
            WebhookParse::Event(_) => panic!("charge events are not reconciled"),
        }
    }

    #[test]
    fn malformed_payloads_are_ignored() {
        assert!(matches!(parse_event(b"not json"), WebhookParse::Ignored { event_id: None, .. }));

        let no_id = envelope("payment_intent.succeeded", serde_json::json!({"amount": 1}));
        assert!(matches!(parse_event(no_id.as_bytes()), WebhookParse::Ignored { .. }));

        let negative = envelope(
            "payment_intent.succeeded",
            serde_json::json!({"id": "pi_1", "amount": -5}),
        );
        assert!(matches!(parse_event(negative.as_bytes()), WebhookParse::Ignored { .. }));
    }

    #[test]
    fn wire_names_map_to_closed_enum() {
        assert_eq!(
            StripeEventType::from_wire("payment_intent.succeeded"),
            StripeEventType::PaymentIntentSucceeded
        );
        assert_eq!(StripeEventType::from_wire("invoice.paid"), StripeEventType::Unknown);
        assert_eq!(StripeEventType::Unknown.kind(), None);
    }
}
