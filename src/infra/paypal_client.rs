use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, value::RawValue};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        ApprovalOrder, CaptureResult, OrderRequest, PaymentGatewayPort, RemoteSubscription,
        WebhookHeaders,
    },
    domain::entities::merchant::MerchantCredentials,
    infra::http_client::build_client,
};

/// Currencies PayPal does not accept decimals for.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &["HUF", "JPY", "TWD"];

/// Refresh the platform token this long before PayPal expires it.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

pub struct PayPalClientConfig {
    pub api_base_url: Url,
    pub client_id: String,
    pub client_secret: SecretString,
    pub webhook_id: String,
    /// Public base URL of this service, used for return/cancel redirects.
    pub service_base_url: Url,
    pub request_timeout: Duration,
}

struct CachedToken {
    value: SecretString,
    expires_at: Instant,
}

pub struct PayPalClient {
    client: Client,
    config: PayPalClientConfig,
    platform_token: Mutex<Option<CachedToken>>,
}

impl PayPalClient {
    pub fn new(config: PayPalClientConfig) -> AppResult<Self> {
        let client = build_client(config.request_timeout)
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            platform_token: Mutex::new(None),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.api_base_url.as_str().trim_end_matches('/'),
            path
        )
    }

    fn service_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.service_base_url.as_str().trim_end_matches('/'),
            path
        )
    }

    fn merchant_post(&self, merchant: &MerchantCredentials, path: &str) -> RequestBuilder {
        self.client
            .post(self.api_url(path))
            .bearer_auth(merchant.access_token.expose_secret())
            .header("PayPal-Request-Id", Uuid::new_v4().to_string())
    }

    // ========================================================================
    // Platform token
    // ========================================================================

    async fn platform_access_token(&self) -> AppResult<SecretString> {
        let mut cached = self.platform_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(self.api_url("/v1/oauth2/token"))
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(request_failed)?;

        let token: PayPalTokenResponse = handle_response(response).await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        let value = SecretString::new(token.access_token.into());
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }
}

#[async_trait]
impl PaymentGatewayPort for PayPalClient {
    async fn create_order_for_approval(
        &self,
        merchant: &MerchantCredentials,
        request: &OrderRequest,
    ) -> AppResult<ApprovalOrder> {
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "custom_id": request.user_id,
                "amount": {
                    "currency_code": request.currency,
                    "value": format_amount(request.amount_minor, &request.currency),
                },
            }],
            "payment_source": {
                "paypal": {
                    "attributes": {
                        "vault": {
                            "store_in_vault": "ON_SUCCESS",
                            "usage_type": "MERCHANT",
                            "customer_type": "CONSUMER",
                        },
                    },
                    "experience_context": {
                        "return_url": self.service_url("/api/paypal/success"),
                        "cancel_url": self.service_url("/api/paypal/cancel"),
                        "landing_page": "LOGIN",
                        "user_action": "PAY_NOW",
                    },
                },
            },
        });

        let response = self
            .merchant_post(merchant, "/v2/checkout/orders")
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;

        let order: PayPalOrder = handle_response(response).await?;
        let approval_url = approval_link(&order.links)?;
        Ok(ApprovalOrder {
            order_id: order.id,
            approval_url,
        })
    }

    async fn create_order_with_vault(
        &self,
        merchant: &MerchantCredentials,
        request: &OrderRequest,
        vault_id: &str,
    ) -> AppResult<String> {
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "custom_id": request.user_id,
                "amount": {
                    "currency_code": request.currency,
                    "value": format_amount(request.amount_minor, &request.currency),
                },
            }],
            "payment_source": {
                "paypal": { "vault_id": vault_id },
            },
        });

        let response = self
            .merchant_post(merchant, "/v2/checkout/orders")
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;

        let order: PayPalOrder = handle_response(response).await?;
        Ok(order.id)
    }

    async fn capture_order(
        &self,
        merchant: &MerchantCredentials,
        order_id: &str,
    ) -> AppResult<CaptureResult> {
        let response = self
            .merchant_post(merchant, &format!("/v2/checkout/orders/{}/capture", order_id))
            .json(&json!({}))
            .send()
            .await
            .map_err(request_failed)?;

        let capture: PayPalCapture = handle_response(response).await?;
        Ok(CaptureResult {
            status: capture.status,
            payer_id: capture.payer.and_then(|p| p.payer_id),
        })
    }

    async fn verify_webhook_signature(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> AppResult<()> {
        if !headers.is_complete() {
            return Err(AppError::UnauthorizedWebhook);
        }
        // PayPal checks the signature against the exact bytes it sent.
        let event: &RawValue = std::str::from_utf8(body)
            .ok()
            .and_then(|text| serde_json::from_str(text).ok())
            .ok_or(AppError::UnauthorizedWebhook)?;
        let request = VerifyWebhookRequest {
            auth_algo: headers.auth_algo.as_deref(),
            cert_url: headers.cert_url.as_deref(),
            transmission_id: headers.transmission_id.as_deref(),
            transmission_sig: headers.transmission_sig.as_deref(),
            transmission_time: headers.transmission_time.as_deref(),
            webhook_id: &self.config.webhook_id,
            webhook_event: event,
        };

        let token = self.platform_access_token().await?;
        let response = self
            .client
            .post(self.api_url("/v1/notifications/verify-webhook-signature"))
            .bearer_auth(token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(request_failed)?;

        let verification: PayPalVerification = handle_response(response).await?;
        if verification.verification_status != "SUCCESS" {
            return Err(AppError::UnauthorizedWebhook);
        }
        Ok(())
    }

    async fn create_subscription(
        &self,
        merchant: &MerchantCredentials,
        plan_id: &str,
        user_id: &str,
    ) -> AppResult<RemoteSubscription> {
        let body = json!({
            "plan_id": plan_id,
            "custom_id": user_id,
            "application_context": {
                "user_action": "SUBSCRIBE_NOW",
                "return_url": self.service_url("/api/paypal/subscriptions/success"),
                "cancel_url": self.service_url("/api/paypal/cancel"),
            },
        });

        let response = self
            .merchant_post(merchant, "/v1/billing/subscriptions")
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;

        let subscription: PayPalSubscription = handle_response(response).await?;
        let approval_url = approval_link(&subscription.links)?;
        Ok(RemoteSubscription {
            subscription_id: subscription.id,
            approval_url,
        })
    }

    async fn cancel_subscription(
        &self,
        merchant: &MerchantCredentials,
        subscription_id: &str,
    ) -> AppResult<()> {
        let response = self
            .merchant_post(
                merchant,
                &format!("/v1/billing/subscriptions/{}/cancel", subscription_id),
            )
            .json(&json!({ "reason": "Cancelled by user" }))
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(gateway_error(status, &body));
        }
        Ok(())
    }
}

// ============================================================================
// Response handling
// ============================================================================

fn request_failed(e: reqwest::Error) -> AppError {
    tracing::error!(error = %e, "PayPal request failed");
    AppError::Gateway(format!("PayPal request failed: {}", e))
}

fn gateway_error(status: reqwest::StatusCode, body: &str) -> AppError {
    tracing::error!(status = %status, body = %body, "PayPal API error");

    if let Ok(error) = serde_json::from_str::<PayPalErrorResponse>(body) {
        let issue = error
            .details
            .into_iter()
            .next()
            .and_then(|d| d.issue)
            .or(error.message)
            .unwrap_or_default();
        return AppError::Gateway(format!("{}: {}", error.name, issue));
    }

    AppError::Gateway(format!("PayPal API error: {} - {}", status, body))
}

async fn handle_response<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::Gateway(format!("Failed to read PayPal response: {}", e)))?;

    if !status.is_success() {
        return Err(gateway_error(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(body = %body, error = %e, "Failed to parse PayPal response");
        AppError::Gateway(format!("Failed to parse PayPal response: {}", e))
    })
}

fn approval_link(links: &[PayPalLink]) -> AppResult<String> {
    links
        .iter()
        .find(|l| l.rel == "approve" || l.rel == "payer-action")
        .map(|l| l.href.clone())
        .ok_or_else(|| AppError::Gateway("PayPal response has no approval link".to_string()))
}

/// Render minor units as a PayPal amount string using integer arithmetic only.
pub fn format_amount(amount_minor: i64, currency: &str) -> String {
    if ZERO_DECIMAL_CURRENCIES.contains(&currency.to_uppercase().as_str()) {
        return amount_minor.to_string();
    }
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

// ============================================================================
// PayPal Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct PayPalTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct PayPalLink {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PayPalOrder {
    id: String,
    #[serde(default)]
    links: Vec<PayPalLink>,
}

#[derive(Debug, Deserialize)]
struct PayPalPayer {
    payer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayPalCapture {
    status: String,
    payer: Option<PayPalPayer>,
}

#[derive(Serialize)]
struct VerifyWebhookRequest<'a> {
    auth_algo: Option<&'a str>,
    cert_url: Option<&'a str>,
    transmission_id: Option<&'a str>,
    transmission_sig: Option<&'a str>,
    transmission_time: Option<&'a str>,
    webhook_id: &'a str,
    webhook_event: &'a RawValue,
}

#[derive(Debug, Deserialize)]
struct PayPalVerification {
    verification_status: String,
}

#[derive(Debug, Deserialize)]
struct PayPalSubscription {
    id: String,
    #[serde(default)]
    links: Vec<PayPalLink>,
}

#[derive(Debug, Deserialize)]
struct PayPalErrorDetail {
    issue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayPalErrorResponse {
    name: String,
    message: Option<String>,
    #[serde(default)]
    details: Vec<PayPalErrorDetail>,
}
