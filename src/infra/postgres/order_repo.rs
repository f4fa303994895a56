use {
    crate::domain::{
        error::PipelineError,
        order::{NewOrder, Order, OrderItem, OrderStatus},
    },
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    sqlx::{PgPool, types::Json},
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_amount: Decimal,
    status: String,
    items: Json<Vec<OrderItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = PipelineError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            total_amount: row.total_amount,
            status: OrderStatus::try_from(row.status.as_str())?,
            items: row.items.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, items, created_at, updated_at";

/// Persist an order together with its line-item snapshot.
pub async fn insert_order(pool: &PgPool, order: &NewOrder) -> Result<Order, PipelineError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r#"
        INSERT INTO orders (id, user_id, total_amount, status, items)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {ORDER_COLUMNS}
        "#
    ))
    .bind(order.id())
    .bind(order.user_id())
    .bind(order.total_amount())
    .bind(OrderStatus::Pending.as_str())
    .bind(Json(order.items()))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    row.try_into()
}

pub async fn find_order<'e, E>(executor: E, id: Uuid) -> Result<Option<Order>, PipelineError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(Order::try_from).transpose()
}

/// Read and row-lock the order for the rest of the transaction.
pub async fn lock_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> Result<Option<Order>, PipelineError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(Order::try_from).transpose()
}

pub async fn update_order_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    status: OrderStatus,
) -> Result<(), PipelineError> {
    sqlx::query("UPDATE orders SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Bump `updated_at` without changing anything else.
pub async fn touch_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
) -> Result<(), PipelineError> {
    sqlx::query("UPDATE orders SET updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
