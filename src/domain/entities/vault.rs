use chrono::NaiveDateTime;
use serde::Serialize;

pub const PAYPAL_PROVIDER: &str = "paypal";

/// Provider-issued reusable payment-method token owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultedPaymentMethod {
    pub user_id: String,
    pub vault_id: String,
    pub provider: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
