use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::infra::http_client::DEFAULT_REQUEST_TIMEOUT;

pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    /// Public base URL of this service; PayPal redirects buyers back here.
    pub service_base_url: Url,
    pub paypal_api_base_url: Url,
    pub paypal_client_id: String,
    pub paypal_client_secret: SecretString,
    /// Webhook id registered in the PayPal dashboard, required for signature verification.
    pub paypal_webhook_id: String,
    pub gateway_timeout: Duration,
    pub webhook_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url: String = get_env("DATABASE_URL");
        let database_max_connections: u32 = get_env_default("DATABASE_MAX_CONNECTIONS", 5);

        let bind_addr: SocketAddr = get_env_default(
            "BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        );
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .map_err(|e| anyhow::anyhow!("CORS_ORIGIN must be a valid header value: {e}"))?;

        let service_base_url: Url = get_env("SERVICE_BASE_URL");
        let paypal_api_base_url: Url = get_env_default(
            "PAYPAL_API_BASE_URL",
            Url::parse("https://api-m.sandbox.paypal.com")?,
        );
        let paypal_client_id: String = get_env("PAYPAL_CLIENT_ID");
        let paypal_client_secret =
            SecretString::new(get_env::<String>("PAYPAL_CLIENT_SECRET").into());
        let paypal_webhook_id: String = get_env("PAYPAL_WEBHOOK_ID");

        let gateway_timeout_secs: u64 =
            get_env_default("GATEWAY_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT.as_secs());
        let webhook_timeout_secs: u64 = get_env_default("WEBHOOK_TIMEOUT_SECS", 20);

        Ok(Self {
            database_url,
            database_max_connections,
            bind_addr,
            cors_origin,
            service_base_url,
            paypal_api_base_url,
            paypal_client_id,
            paypal_client_secret,
            paypal_webhook_id,
            gateway_timeout: Duration::from_secs(gateway_timeout_secs),
            webhook_timeout: Duration::from_secs(webhook_timeout_secs),
        })
    }
}
