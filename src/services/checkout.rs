use {
    crate::{
        domain::{
            error::PipelineError,
            money::{Currency, normalize_total},
            order::OrderStatus,
            payment::{NewPayment, Payment},
            provider::ProviderRegistry,
        },
        infra::postgres::{order_repo, payment_repo},
    },
    serde::{Deserialize, Serialize},
    sqlx::PgPool,
    std::time::Duration,
    uuid::Uuid,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreatedPayment {
    pub payment_id: Uuid,
    pub checkout_url: String,
}

/// Open a hosted checkout for a pending order and record the payment.
///
/// The payment row is written only after the provider has returned a
/// session, so a failed or timed-out call leaves no local state behind.
#[tracing::instrument(skip_all, fields(order_id = %request.order_id, user_id = %user_id))]
pub async fn create_payment(
    pool: &PgPool,
    providers: &ProviderRegistry,
    provider_timeout: Duration,
    user_id: Uuid,
    request: CreatePaymentRequest,
) -> Result<CreatedPayment, PipelineError> {
    let order = order_repo::find_order(pool, request.order_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("order {}", request.order_id)))?;

    if !order.is_owned_by(user_id) {
        return Err(PipelineError::Forbidden(format!(
            "order {} belongs to another user",
            order.id
        )));
    }

    if order.status != OrderStatus::Pending {
        return Err(PipelineError::InvalidState(format!(
            "order {} is {}, not pending",
            order.id, order.status
        )));
    }

    let money = normalize_total(order.total_amount, Currency::Vnd)?;
    let provider = providers.resolve(request.provider.as_deref())?;

    let new_payment = NewPayment::new(order.id, user_id, provider.name(), money);

    let session = match tokio::time::timeout(
        provider_timeout,
        provider.create_checkout(&new_payment, &order),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(PipelineError::Provider(format!(
                "{} did not answer within {}s",
                provider.name(),
                provider_timeout.as_secs_f32()
            )));
        }
    };

    let payment = payment_repo::insert_payment(pool, &new_payment.opened(session)).await?;

    tracing::info!(
        payment_id = %payment.id,
        provider = %payment.provider,
        amount = %money,
        "payment created"
    );

    Ok(CreatedPayment {
        payment_id: payment.id,
        checkout_url: payment.checkout_url.unwrap_or_default(),
    })
}

/// Owner-only read of a payment.
pub async fn get_payment(pool: &PgPool, user_id: Uuid, payment_id: Uuid) -> Result<Payment, PipelineError> {
    let payment = payment_repo::find_payment(pool, payment_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("payment {payment_id}")))?;

    let order = order_repo::find_order(pool, payment.order_id).await?;
    match order {
        Some(order) if order.is_owned_by(user_id) => Ok(payment),
        _ => Err(PipelineError::Forbidden(format!(
            "payment {payment_id} belongs to another user"
        ))),
    }
}
