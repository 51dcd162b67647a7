use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Lifecycle of a purchase intent.
///
/// Forward order: `Created < Approved < Completed < Paid`. `Failed` is reachable
/// from any non-terminal state. `Paid` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Approved,
    Completed,
    Paid,
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Created,
        OrderStatus::Approved,
        OrderStatus::Completed,
        OrderStatus::Paid,
        OrderStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Failed)
    }

    /// States from which a guarded transition into `target` is allowed.
    pub fn sources_for(target: OrderStatus) -> &'static [OrderStatus] {
        match target {
            OrderStatus::Created => &[],
            OrderStatus::Approved => &[OrderStatus::Created],
            OrderStatus::Completed => &[OrderStatus::Created, OrderStatus::Approved],
            OrderStatus::Paid => &[OrderStatus::Approved, OrderStatus::Completed],
            OrderStatus::Failed => &[
                OrderStatus::Created,
                OrderStatus::Approved,
                OrderStatus::Completed,
            ],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        Self::sources_for(target).contains(self)
    }

    /// True once the provider has captured funds (sync capture or vault charge).
    pub fn is_captured(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Paid)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Created
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CREATED" => Ok(OrderStatus::Created),
            "APPROVED" => Ok(OrderStatus::Approved),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "PAID" => Ok(OrderStatus::Paid),
            "FAILED" => Ok(OrderStatus::Failed),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub order_id: String,
    pub user_id: String,
    pub merchant_id: String,
    pub status: OrderStatus,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub payer_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Input for recording a new order locally.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: String,
    pub user_id: String,
    pub merchant_id: String,
    pub status: OrderStatus,
    pub amount: i64,
    pub currency: String,
}

/// Price snapshot of one purchased product. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub currency: String,
}

impl OrderItem {
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}
