use {
    super::error::PipelineError,
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Status change requested by an administrator. Only an open order can
    /// be closed, and only as cancelled or failed; `paid` is reserved for
    /// payment reconciliation.
    pub fn admin_transition(&self, target: OrderStatus) -> Result<OrderStatus, PipelineError> {
        match (self, target) {
            (Self::Pending, Self::Cancelled | Self::Failed) => Ok(target),
            (from, to) => Err(PipelineError::InvalidState(format!(
                "order cannot move from {from} to {to} by admin update"
            ))),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// Line item snapshotted at order time. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OrderItem {
    pub fn new(
        product_id: Uuid,
        name: impl Into<String>,
        unit_price: Decimal,
        quantity: i32,
        image_url: Option<String>,
    ) -> Result<Self, PipelineError> {
        if quantity < 1 {
            return Err(PipelineError::Validation(format!(
                "quantity must be >= 1, got: {quantity}"
            )));
        }
        if unit_price.is_sign_negative() {
            return Err(PipelineError::Validation(format!(
                "unit price cannot be negative, got: {unit_price}"
            )));
        }
        let line_total = unit_price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| PipelineError::Validation("line total overflow".into()))?;

        Ok(Self {
            product_id,
            name: name.into(),
            unit_price,
            quantity,
            line_total,
            image_url,
        })
    }
}

/// Order as stored. Status is the only field that changes after creation.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn first_image(&self) -> Option<&str> {
        self.items
            .first()
            .and_then(|item| item.image_url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }
}

/// For INSERT. The total is fixed here from the line snapshot and never
/// recomputed.
#[derive(Debug, Clone)]
pub struct NewOrder {
    id: Uuid,
    user_id: Uuid,
    total_amount: Decimal,
    items: Vec<OrderItem>,
}

impl NewOrder {
    pub fn new(user_id: Uuid, items: Vec<OrderItem>) -> Result<Self, PipelineError> {
        if items.is_empty() {
            return Err(PipelineError::Validation("order requires at least one item".into()));
        }
        let total_amount = items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_total))
            .ok_or_else(|| PipelineError::Validation("order total overflow".into()))?;

        Ok(Self {
            id: Uuid::now_v7(),
            user_id,
            total_amount,
            items,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }
}
