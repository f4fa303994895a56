use {
    super::{auth::AuthUser, errors::ApiError},
    crate::{
        AppState,
        domain::payment::Payment,
        services::{
            checkout::{self, CreatePaymentRequest, CreatedPayment},
            reconciliation::{self, WebhookResult},
        },
    },
    axum::{
        Json,
        body::Bytes,
        extract::{Path, State},
        http::HeaderMap,
    },
    uuid::Uuid,
};

pub async fn create_payment_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<CreatedPayment>, ApiError> {
    let created = checkout::create_payment(
        &state.pool,
        &state.providers,
        state.provider_timeout,
        user.id,
        request,
    )
    .await?;

    Ok(Json(created))
}

pub async fn get_payment_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, ApiError> {
    Ok(Json(checkout::get_payment(&state.pool, user.id, payment_id).await?))
}

/// Webhook for the default provider.
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    receive_webhook(state, None, headers, body).await
}

pub async fn provider_webhook_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    receive_webhook(state, Some(provider), headers, body).await
}

#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(
        provider = tracing::field::Empty,
        event_id = tracing::field::Empty,
        event_type = tracing::field::Empty
    )
)]
async fn receive_webhook(
    state: AppState,
    provider: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    // Raw bytes: the signature covers them exactly, UTF-8 or not.
    let provider = state.providers.resolve(provider.as_deref())?;
    tracing::Span::current().record("provider", provider.name());

    let result =
        reconciliation::handle_webhook(&state.pool, provider.as_ref(), &headers, &body).await?;

    match &result {
        WebhookResult::Ignored { event_type } => {
            tracing::info!(event_type = %event_type, "unhandled event type, ignored");
        }
        WebhookResult::Reconciled(outcome) => {
            tracing::info!(status = outcome.as_str(), "webhook processed");
        }
    }

    Ok(Json(serde_json::json!({"status": result.as_str()})))
}
