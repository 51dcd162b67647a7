use async_trait::async_trait;
use serde::Serialize;

use crate::{app_error::AppResult, domain::entities::merchant::MerchantCredentials};

// ============================================================================
// Port Types
// ============================================================================

/// Amount and owner of a remote order to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Internal user id, sent as `custom_id` so provider events can be traced back.
    pub user_id: String,
    pub currency: String,
    /// Minor currency units.
    pub amount_minor: i64,
}

/// A remote order awaiting buyer approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalOrder {
    pub order_id: String,
    pub approval_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    /// Provider-reported capture status (e.g. "COMPLETED")
    pub status: String,
    pub payer_id: Option<String>,
}

/// A remote subscription awaiting buyer approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteSubscription {
    pub subscription_id: String,
    pub approval_url: String,
}

pub const HEADER_AUTH_ALGO: &str = "paypal-auth-algo";
pub const HEADER_CERT_URL: &str = "paypal-cert-url";
pub const HEADER_TRANSMISSION_ID: &str = "paypal-transmission-id";
pub const HEADER_TRANSMISSION_SIG: &str = "paypal-transmission-sig";
pub const HEADER_TRANSMISSION_TIME: &str = "paypal-transmission-time";

/// Transmission headers PayPal attaches to every webhook delivery, forwarded
/// unmodified to signature verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookHeaders {
    pub auth_algo: Option<String>,
    pub cert_url: Option<String>,
    pub transmission_id: Option<String>,
    pub transmission_sig: Option<String>,
    pub transmission_time: Option<String>,
}

impl WebhookHeaders {
    pub fn is_complete(&self) -> bool {
        [
            &self.auth_algo,
            &self.cert_url,
            &self.transmission_id,
            &self.transmission_sig,
            &self.transmission_time,
        ]
        .iter()
        .all(|h| h.as_deref().is_some_and(|v| !v.is_empty()))
    }
}

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// Remote payment provider. Every call except signature verification acts on
/// behalf of a merchant and uses that merchant's credentials.
#[async_trait]
pub trait PaymentGatewayPort: Send + Sync {
    /// Create an order the buyer must approve; the resulting payment method is
    /// vaulted on success.
    async fn create_order_for_approval(
        &self,
        merchant: &MerchantCredentials,
        request: &OrderRequest,
    ) -> AppResult<ApprovalOrder>;

    /// Create and auto-capture an order against a previously vaulted payment method.
    /// Returns the remote order id.
    async fn create_order_with_vault(
        &self,
        merchant: &MerchantCredentials,
        request: &OrderRequest,
        vault_id: &str,
    ) -> AppResult<String>;

    async fn capture_order(
        &self,
        merchant: &MerchantCredentials,
        order_id: &str,
    ) -> AppResult<CaptureResult>;

    /// Verify a webhook delivery against the raw body. Fails with
    /// `UnauthorizedWebhook` when the provider does not confirm the signature.
    async fn verify_webhook_signature(&self, headers: &WebhookHeaders, body: &[u8])
    -> AppResult<()>;

    async fn create_subscription(
        &self,
        merchant: &MerchantCredentials,
        plan_id: &str,
        user_id: &str,
    ) -> AppResult<RemoteSubscription>;

    async fn cancel_subscription(
        &self,
        merchant: &MerchantCredentials,
        subscription_id: &str,
    ) -> AppResult<()>;
}
