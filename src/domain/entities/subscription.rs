use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Local mirror of a remote billing subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "PENDING",
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Cancelled => "CANCELLED",
        }
    }

    /// States from which a guarded transition into `target` is allowed.
    pub fn sources_for(target: SubscriptionStatus) -> &'static [SubscriptionStatus] {
        match target {
            SubscriptionStatus::Pending => &[],
            SubscriptionStatus::Active => &[SubscriptionStatus::Pending],
            SubscriptionStatus::Cancelled => {
                &[SubscriptionStatus::Pending, SubscriptionStatus::Active]
            }
        }
    }

    pub fn can_transition_to(&self, target: SubscriptionStatus) -> bool {
        Self::sources_for(target).contains(self)
    }
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        SubscriptionStatus::Pending
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(SubscriptionStatus::Pending),
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "CANCELLED" | "CANCELED" => Ok(SubscriptionStatus::Cancelled),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub plan_id: String,
    pub user_id: String,
    pub merchant_id: String,
    pub product_code: String,
    pub status: SubscriptionStatus,
    pub start_time: Option<NaiveDateTime>,
    pub next_billing_time: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub subscription_id: String,
    pub plan_id: String,
    pub user_id: String,
    pub merchant_id: String,
    pub product_code: String,
}

/// Billing dates carried by an activation event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start_time: Option<NaiveDateTime>,
    pub next_billing_time: Option<NaiveDateTime>,
}
