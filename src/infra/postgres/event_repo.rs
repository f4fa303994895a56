use {
    crate::domain::{
        error::PipelineError,
        id::EventId,
        payment::{NewPaymentEvent, PaymentEvent},
    },
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct PaymentEventRow {
    id: Uuid,
    payment_id: Option<Uuid>,
    provider_event_id: String,
    event_type: String,
    raw: String,
    created_at: DateTime<Utc>,
}

impl From<PaymentEventRow> for PaymentEvent {
    fn from(row: PaymentEventRow) -> Self {
        PaymentEvent {
            id: row.id,
            payment_id: row.payment_id,
            provider_event_id: row.provider_event_id,
            event_type: row.event_type,
            raw: row.raw,
            created_at: row.created_at,
        }
    }
}

pub async fn event_exists(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    provider_event_id: &EventId,
) -> Result<bool, PipelineError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM payment_events WHERE provider_event_id = $1)",
    )
    .bind(provider_event_id.as_str())
    .fetch_one(&mut **tx)
    .await?;

    Ok(exists)
}

/// Append to the ledger. Returns `false` if the provider event id is
/// already recorded.
pub async fn insert_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &NewPaymentEvent,
) -> Result<bool, PipelineError> {
    let inserted: Option<bool> = sqlx::query_scalar(
        r#"
        INSERT INTO payment_events (id, payment_id, provider_event_id, event_type, raw)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (provider_event_id) DO NOTHING
        RETURNING true
        "#,
    )
    .bind(event.id)
    .bind(event.payment_id)
    .bind(event.provider_event_id.as_str())
    .bind(&event.event_type)
    .bind(&event.raw)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(inserted.is_some())
}

pub async fn find_event<'e, E>(
    executor: E,
    provider_event_id: &str,
) -> Result<Option<PaymentEvent>, PipelineError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, PaymentEventRow>(
        r#"
        SELECT id, payment_id, provider_event_id, event_type, raw, created_at
        FROM payment_events WHERE provider_event_id = $1
        "#,
    )
    .bind(provider_event_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(PaymentEvent::from))
}
