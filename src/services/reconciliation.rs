use {
    crate::{
        domain::{
            error::PipelineError,
            order::OrderStatus,
            payment::{NewPaymentEvent, PaymentAction, PaymentStatus, ReconcileOutcome, decide},
            provider::{PaymentProvider, ProviderEvent, WebhookParse},
        },
        infra::postgres::{event_repo, lock_key, order_repo, payment_repo},
    },
    axum::http::HeaderMap,
    sqlx::PgPool,
    uuid::Uuid,
};

/// What the webhook endpoint reports back to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookResult {
    Reconciled(ReconcileOutcome),
    /// Verified but not a type we act on. Nothing persisted.
    Ignored { event_type: String },
}

impl WebhookResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reconciled(outcome) => outcome.as_str(),
            Self::Ignored { .. } => "ignored",
        }
    }
}

/// Verify, parse and reconcile one webhook delivery.
pub async fn handle_webhook(
    pool: &PgPool,
    provider: &dyn PaymentProvider,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<WebhookResult, PipelineError> {
    match provider.parse_webhook(headers, body)? {
        WebhookParse::Ignored {
            event_id,
            event_type,
        } => {
            tracing::debug!(
                provider = provider.name(),
                event_id = event_id.as_deref().unwrap_or(""),
                %event_type,
                "ignoring webhook type"
            );
            Ok(WebhookResult::Ignored { event_type })
        }
        WebhookParse::Event(event) => {
            // Correlate every log below with the delivery.
            tracing::Span::current()
                .record("event_id", tracing::field::display(&event.event_id))
                .record("event_type", tracing::field::display(&event.event_type));

            reconcile(pool, provider.name(), &event)
                .await
                .map(WebhookResult::Reconciled)
        }
    }
}

/// Apply a verified provider event: dedup on event id, ledger append, then
/// the payment and order transition, all in one transaction.
pub async fn reconcile(
    pool: &PgPool,
    provider: &str,
    event: &ProviderEvent,
) -> Result<ReconcileOutcome, PipelineError> {
    let mut tx = pool.begin().await?;

    // Serialize all events for this checkout session.
    lock_key(
        &mut tx,
        &format!("{provider}:{}", event.provider_payment_id),
    )
    .await?;

    if event_repo::event_exists(&mut tx, &event.event_id).await? {
        tx.commit().await?;
        return Ok(ReconcileOutcome::Duplicate);
    }

    let mut payment =
        payment_repo::lock_by_provider_payment_id(&mut tx, provider, &event.provider_payment_id)
            .await?;
    // Payment intent events carry their own id; fall back to the local id
    // echoed in metadata.
    if let (None, Some(payment_id)) = (&payment, event.payment_ref) {
        payment = payment_repo::lock_payment(&mut tx, provider, payment_id).await?;
    }

    let ledger_entry = NewPaymentEvent {
        id: Uuid::now_v7(),
        payment_id: payment.as_ref().map(|p| p.id),
        provider_event_id: event.event_id.clone(),
        event_type: event.event_type.clone(),
        raw: event.raw.clone(),
    };

    // Another delivery with the same id may have landed under a different
    // session key; the unique index settles it.
    if !event_repo::insert_event(&mut tx, &ledger_entry).await? {
        tx.commit().await?;
        return Ok(ReconcileOutcome::Duplicate);
    }

    let Some(payment) = payment else {
        tx.commit().await?;
        tracing::warn!(
            event_id = %event.event_id,
            provider_payment_id = %event.provider_payment_id,
            "no local payment for provider session, recorded unmapped"
        );
        return Ok(ReconcileOutcome::Unmapped);
    };

    let Some(order) = order_repo::lock_order(&mut tx, payment.order_id).await? else {
        tx.commit().await?;
        tracing::warn!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            "payment references a missing order"
        );
        return Ok(ReconcileOutcome::OrphanedPayment(payment.id));
    };

    if !payment.amount_matches(event.amount) || !payment.currency_matches(&event.currency) {
        tx.commit().await?;
        tracing::warn!(
            payment_id = %payment.id,
            expected = %payment.amount,
            expected_currency = %payment.currency,
            reported = %event.amount,
            reported_currency = %event.currency,
            "amount mismatch, payment left untouched"
        );
        return Ok(ReconcileOutcome::AmountMismatch(payment.id));
    }

    let outcome = match decide(event.kind, payment.status, order.status) {
        PaymentAction::SameStatus => ReconcileOutcome::Unchanged(payment.id),
        PaymentAction::LogAnomaly { current } => {
            tracing::warn!(
                payment_id = %payment.id,
                from = %current,
                to = %event.kind.target_status(),
                event_type = %event.event_type,
                "invalid status transition, logged as anomaly"
            );
            ReconcileOutcome::Anomaly(payment.id)
        }
        PaymentAction::Advance {
            old_status,
            payment: new_status,
            order: order_status,
        } => {
            payment_repo::update_payment_status(&mut tx, payment.id, new_status).await?;

            let order_status = match order_status {
                Some(status) => {
                    order_repo::update_order_status(&mut tx, order.id, status).await?;
                    status
                }
                None => {
                    order_repo::touch_order(&mut tx, order.id).await?;
                    order.status
                }
            };

            if new_status == PaymentStatus::Paid && order_status != OrderStatus::Paid {
                tracing::warn!(
                    payment_id = %payment.id,
                    order_id = %order.id,
                    order_status = %order_status,
                    "payment captured for a closed order, needs refund"
                );
                ReconcileOutcome::PaidClosedOrder {
                    payment_id: payment.id,
                    order_status,
                }
            } else {
                tracing::info!(
                    payment_id = %payment.id,
                    order_id = %order.id,
                    from = %old_status,
                    to = %new_status,
                    order_status = %order_status,
                    "payment reconciled"
                );
                ReconcileOutcome::Applied {
                    payment_id: payment.id,
                    payment_status: new_status,
                    order_status,
                }
            }
        }
    };

    tx.commit().await?;
    Ok(outcome)
}
