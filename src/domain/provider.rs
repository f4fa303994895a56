use {
    super::error::PipelineError,
    super::id::{EventId, ProviderPaymentId},
    super::money::MinorUnits,
    super::order::Order,
    super::payment::{NewPayment, WebhookEventKind},
    axum::http::HeaderMap,
    std::{collections::HashMap, future::Future, pin::Pin, sync::Arc},
    uuid::Uuid,
};

/// What the provider returns after opening a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub provider_payment_id: ProviderPaymentId,
}

/// Verified, whitelisted webhook normalized across providers.
#[derive(Debug, Clone)]
pub struct ProviderEvent {
    pub event_id: EventId,
    /// Type string as sent on the wire; stored in the ledger.
    pub event_type: String,
    pub kind: WebhookEventKind,
    pub provider_payment_id: ProviderPaymentId,
    /// Local payment id echoed back through provider metadata, if present.
    /// Used when the event is keyed by an object other than the one stored
    /// on the payment (a payment intent behind a checkout session).
    pub payment_ref: Option<Uuid>,
    /// Zero when the event type carries no amount.
    pub amount: MinorUnits,
    pub currency: String,
    pub raw: String,
}

/// Outcome of verifying and reading a webhook whose signature checked out.
#[derive(Debug, Clone)]
pub enum WebhookParse {
    Event(ProviderEvent),
    /// Authentic but not something reconciliation acts on.
    Ignored {
        event_id: Option<String>,
        event_type: String,
    },
}

pub trait PaymentProvider: Send + Sync {
    /// Tag stored on `Payment.provider`.
    fn name(&self) -> &str;

    fn create_checkout<'a>(
        &'a self,
        payment: &'a NewPayment,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<CheckoutSession, PipelineError>> + Send + 'a>>;

    /// `Err(WebhookSignature)` when authenticity cannot be proven. The body
    /// is verified as raw bytes before any decoding.
    fn parse_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookParse, PipelineError>;
}

/// Providers available to the service, keyed by lowercase tag.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn PaymentProvider>>,
    default: String,
}

impl ProviderRegistry {
    pub fn new(default: Arc<dyn PaymentProvider>) -> Self {
        let tag = default.name().to_ascii_lowercase();
        let mut providers: HashMap<String, Arc<dyn PaymentProvider>> = HashMap::new();
        providers.insert(tag.clone(), default);
        Self {
            providers,
            default: tag,
        }
    }

    pub fn with(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers
            .insert(provider.name().to_ascii_lowercase(), provider);
        self
    }

    /// Look up by tag, falling back to the default when none is given.
    pub fn resolve(&self, tag: Option<&str>) -> Result<Arc<dyn PaymentProvider>, PipelineError> {
        let key = match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => t.to_ascii_lowercase(),
            None => self.default.clone(),
        };
        self.providers
            .get(&key)
            .cloned()
            .ok_or(PipelineError::UnsupportedProvider(key))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::adapters::mock::MockProvider};

    #[test]
    fn resolves_default_and_named_providers() {
        let registry = ProviderRegistry::new(Arc::new(MockProvider::new("secret")));
        assert_eq!(registry.resolve(None).unwrap().name(), "mock");
        assert_eq!(registry.resolve(Some("  ")).unwrap().name(), "mock");
        assert_eq!(registry.resolve(Some("MOCK")).unwrap().name(), "mock");
        assert!(matches!(
            registry.resolve(Some("payos")),
            Err(PipelineError::UnsupportedProvider(tag)) if tag == "payos"
        ));
    }
}
