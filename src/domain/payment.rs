use {
    super::error::PipelineError,
    super::id::{EventId, ProviderPaymentId},
    super::money::{Currency, MinorUnits, Money},
    super::order::OrderStatus,
    super::provider::CheckoutSession,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Transitions a webhook may apply. A failed attempt can still be paid
    /// (the customer retries inside the same checkout); paid, cancelled and
    /// expired are final.
    pub fn can_transition_to(&self, next: &PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid)
                | (Self::Pending, Self::Failed)
                | (Self::Failed, Self::Paid)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(PipelineError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// Webhook event types that drive reconciliation. Everything else is
/// filtered out by the provider adapter before it reaches the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventKind {
    CheckoutCompleted,
    PaymentSucceeded,
    PaymentFailed,
}

impl WebhookEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutCompleted => "checkout_completed",
            Self::PaymentSucceeded => "payment_succeeded",
            Self::PaymentFailed => "payment_failed",
        }
    }

    pub fn target_status(&self) -> PaymentStatus {
        match self {
            Self::CheckoutCompleted | Self::PaymentSucceeded => PaymentStatus::Paid,
            Self::PaymentFailed => PaymentStatus::Failed,
        }
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What reconciliation does with a mapped payment, given the event kind and
/// the current statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentAction {
    /// Move the payment (and possibly the order) forward.
    Advance {
        old_status: PaymentStatus,
        payment: PaymentStatus,
        order: Option<OrderStatus>,
    },
    /// Payment already holds the target status.
    SameStatus,
    /// Transition not allowed from the current status (stale or
    /// out-of-order delivery). Recorded, not applied.
    LogAnomaly { current: PaymentStatus },
}

pub fn decide(
    kind: WebhookEventKind,
    payment_status: PaymentStatus,
    order_status: OrderStatus,
) -> PaymentAction {
    let target = kind.target_status();

    if target == payment_status {
        return PaymentAction::SameStatus;
    }
    if !payment_status.can_transition_to(&target) {
        return PaymentAction::LogAnomaly {
            current: payment_status,
        };
    }

    // A failed attempt leaves the order open so the customer can pay again.
    let order = match (target, order_status) {
        (PaymentStatus::Paid, OrderStatus::Pending) => Some(OrderStatus::Paid),
        _ => None,
    };

    PaymentAction::Advance {
        old_status: payment_status,
        payment: target,
        order,
    }
}

/// Full payment record from DB (for reads).
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: String,
    pub provider_payment_id: String,
    pub amount: MinorUnits,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub checkout_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// A zero amount means the event did not carry one; nothing to compare.
    pub fn amount_matches(&self, reported: MinorUnits) -> bool {
        reported.is_zero() || reported == self.amount
    }

    pub fn currency_matches(&self, reported: &str) -> bool {
        reported.eq_ignore_ascii_case(self.currency.as_str())
    }
}

/// A payment about to be opened with a provider. Holds the local id so the
/// provider can use it for idempotency and correlation metadata; it is only
/// persisted once the provider has returned a session.
#[derive(Debug, Clone)]
pub struct NewPayment {
    id: Uuid,
    order_id: Uuid,
    user_id: Uuid,
    provider: String,
    money: Money,
}

impl NewPayment {
    pub fn new(order_id: Uuid, user_id: Uuid, provider: impl Into<String>, money: Money) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_id,
            user_id,
            provider: provider.into(),
            money,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn money(&self) -> &Money {
        &self.money
    }

    /// Idempotency key sent with the remote session request, so a retried
    /// call for the same local payment reuses the same session.
    pub fn idempotency_key(&self) -> String {
        format!("pay_{}", self.id.simple())
    }

    pub fn opened(self, session: CheckoutSession) -> OpenedPayment {
        OpenedPayment {
            payment: self,
            session,
        }
    }
}

/// For INSERT: a payment whose remote checkout exists.
#[derive(Debug, Clone)]
pub struct OpenedPayment {
    payment: NewPayment,
    session: CheckoutSession,
}

impl OpenedPayment {
    pub fn id(&self) -> Uuid {
        self.payment.id
    }

    pub fn order_id(&self) -> Uuid {
        self.payment.order_id
    }

    pub fn provider(&self) -> &str {
        &self.payment.provider
    }

    pub fn money(&self) -> &Money {
        &self.payment.money
    }

    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::Pending
    }

    pub fn provider_payment_id(&self) -> &ProviderPaymentId {
        &self.session.provider_payment_id
    }

    pub fn checkout_url(&self) -> &str {
        &self.session.checkout_url
    }
}

/// Ledger row as stored. `payment_id` is `None` when the event could not be
/// matched to a local payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
    pub id: Uuid,
    pub payment_id: Option<Uuid>,
    pub provider_event_id: String,
    pub event_type: String,
    pub raw: String,
    pub created_at: DateTime<Utc>,
}

/// For INSERT into the ledger.
#[derive(Debug, Clone)]
pub struct NewPaymentEvent {
    pub id: Uuid,
    pub payment_id: Option<Uuid>,
    pub provider_event_id: EventId,
    pub event_type: String,
    pub raw: String,
}

/// Result of reconciling one verified webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Event id already in the ledger.
    Duplicate,
    /// No local payment for the provider payment id; event recorded unmapped.
    Unmapped,
    /// Payment exists but its order does not.
    OrphanedPayment(Uuid),
    /// Reported amount or currency differs from the stored payment;
    /// nothing mutated.
    AmountMismatch(Uuid),
    /// Payment already in the target status.
    Unchanged(Uuid),
    /// Transition not allowed from the current status.
    Anomaly(Uuid),
    /// Status transition applied.
    Applied {
        payment_id: Uuid,
        payment_status: PaymentStatus,
        order_status: OrderStatus,
    },
    /// Payment became paid but its order was already closed. The charge
    /// stands and needs a manual refund.
    PaidClosedOrder {
        payment_id: Uuid,
        order_status: OrderStatus,
    },
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Unmapped => "unmapped",
            Self::OrphanedPayment(_) => "orphaned",
            Self::AmountMismatch(_) => "amount_mismatch",
            Self::Unchanged(_) => "unchanged",
            Self::Anomaly(_) => "anomaly",
            Self::Applied { .. } => "applied",
            Self::PaidClosedOrder { .. } => "paid_closed_order",
        }
    }
}
