use {
    super::{
        auth::{AdminUser, AuthUser},
        errors::ApiError,
    },
    crate::{
        AppState,
        domain::order::{Order, OrderStatus},
        services::orders::{self, OrderView},
    },
    axum::{
        Json,
        extract::{Path, State},
    },
    serde::Deserialize,
    uuid::Uuid,
};

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn get_order_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(orders::get_order(&state.pool, user.id, order_id).await?))
}

pub async fn update_order_status_handler(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>, ApiError> {
    let target = OrderStatus::try_from(update.status.trim())?;

    tracing::info!(admin_id = %admin.id, %order_id, to = %target, "admin status update");
    Ok(Json(orders::update_order_status(&state.pool, order_id, target).await?))
}
