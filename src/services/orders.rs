use {
    crate::{
        domain::{
            error::PipelineError,
            order::{Order, OrderStatus},
            payment::Payment,
        },
        infra::postgres::{order_repo, payment_repo},
    },
    serde::Serialize,
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub payments: Vec<Payment>,
}

/// Owner-only read of an order and every payment attempt against it.
pub async fn get_order(pool: &PgPool, user_id: Uuid, order_id: Uuid) -> Result<OrderView, PipelineError> {
    let order = order_repo::find_order(pool, order_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("order {order_id}")))?;

    if !order.is_owned_by(user_id) {
        return Err(PipelineError::Forbidden(format!(
            "order {order_id} belongs to another user"
        )));
    }

    let payments = payment_repo::list_payments_for_order(pool, order_id).await?;
    Ok(OrderView { order, payments })
}

/// Administrative status change. Only an open order may be closed by hand;
/// `paid` is reachable through reconciliation alone.
pub async fn update_order_status(
    pool: &PgPool,
    order_id: Uuid,
    target: OrderStatus,
) -> Result<Order, PipelineError> {
    let mut tx = pool.begin().await?;

    let order = order_repo::lock_order(&mut tx, order_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("order {order_id}")))?;

    let next = order.status.admin_transition(target)?;
    order_repo::update_order_status(&mut tx, order_id, next).await?;

    let updated = order_repo::find_order(&mut *tx, order_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("order {order_id}")))?;

    tx.commit().await?;

    tracing::info!(order_id = %order_id, from = %order.status, to = %next, "order status changed");
    Ok(updated)
}
