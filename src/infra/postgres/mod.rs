pub mod event_repo;
pub mod order_repo;
pub mod payment_repo;

use crate::domain::error::PipelineError;

/// Serialize all work on `key` until the transaction ends.
///
/// The advisory lock is taken even when no row exists yet, so events that
/// race a payment insert still queue behind each other.
pub async fn lock_key(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    key: &str,
) -> Result<(), PipelineError> {
    sqlx::query("SET LOCAL lock_timeout = '5s'")
        .execute(&mut **tx)
        .await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
