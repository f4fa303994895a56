use {
    crate::domain::{
        error::PipelineError,
        id::ProviderPaymentId,
        money::{Currency, MinorUnits},
        payment::{OpenedPayment, Payment, PaymentStatus},
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    provider: String,
    provider_payment_id: String,
    amount: i64,
    currency: String,
    status: String,
    checkout_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PipelineError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            provider: row.provider,
            provider_payment_id: row.provider_payment_id,
            amount: MinorUnits::new(row.amount)?,
            currency: Currency::try_from(row.currency.as_str())?,
            status: PaymentStatus::try_from(row.status.as_str())?,
            checkout_url: row.checkout_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, order_id, provider, provider_payment_id, amount, currency, \
     status, checkout_url, created_at, updated_at";

/// Insert a payment whose provider session already exists.
pub async fn insert_payment(pool: &PgPool, payment: &OpenedPayment) -> Result<Payment, PipelineError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        r#"
        INSERT INTO payments
            (id, order_id, provider, provider_payment_id, amount, currency, status, checkout_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(payment.id())
    .bind(payment.order_id())
    .bind(payment.provider())
    .bind(payment.provider_payment_id().as_str())
    .bind(payment.money().amount().value())
    .bind(payment.money().currency().as_str())
    .bind(payment.status().as_str())
    .bind(payment.checkout_url())
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn find_payment<'e, E>(executor: E, id: Uuid) -> Result<Option<Payment>, PipelineError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(Payment::try_from).transpose()
}

/// Find the payment a provider session maps to and row-lock it.
pub async fn lock_by_provider_payment_id(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    provider: &str,
    provider_payment_id: &ProviderPaymentId,
) -> Result<Option<Payment>, PipelineError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        r#"
        SELECT {PAYMENT_COLUMNS} FROM payments
        WHERE provider = $1 AND provider_payment_id = $2
        FOR UPDATE
        "#
    ))
    .bind(provider)
    .bind(provider_payment_id.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    row.map(Payment::try_from).transpose()
}

/// Row-lock a payment by local id, scoped to the provider that opened it.
pub async fn lock_payment(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    provider: &str,
    id: Uuid,
) -> Result<Option<Payment>, PipelineError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 AND provider = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(provider)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(Payment::try_from).transpose()
}

pub async fn update_payment_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    status: PaymentStatus,
) -> Result<(), PipelineError> {
    sqlx::query("UPDATE payments SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn list_payments_for_order<'e, E>(
    executor: E,
    order_id: Uuid,
) -> Result<Vec<Payment>, PipelineError>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at"
    ))
    .bind(order_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Payment::try_from).collect()
}
