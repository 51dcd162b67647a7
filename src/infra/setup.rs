use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::ports::{
        catalog::{MerchantDirectory, ProductCatalog},
        payment_gateway::PaymentGatewayPort,
    },
    infra::{
        config::AppConfig,
        paypal_client::{PayPalClient, PayPalClientConfig},
        postgres_persistence,
    },
    use_cases::reconciliation::ReconciliationEngine,
};

pub async fn init_app_state() -> anyhow::Result<AppState<PostgresPersistence>> {
    let config = AppConfig::from_env()?;

    let postgres_arc = Arc::new(
        postgres_persistence(&config.database_url, config.database_max_connections).await?,
    );

    let paypal = PayPalClient::new(PayPalClientConfig {
        api_base_url: config.paypal_api_base_url.clone(),
        client_id: config.paypal_client_id.clone(),
        client_secret: config.paypal_client_secret.clone(),
        webhook_id: config.paypal_webhook_id.clone(),
        service_base_url: config.service_base_url.clone(),
        request_timeout: config.gateway_timeout,
    })
    .map_err(|e| anyhow::anyhow!("failed to build PayPal client: {e}"))?;

    let engine = ReconciliationEngine::new(
        postgres_arc.clone(),
        Arc::new(paypal) as Arc<dyn PaymentGatewayPort>,
        postgres_arc.clone() as Arc<dyn ProductCatalog>,
        postgres_arc as Arc<dyn MerchantDirectory>,
    )
    .with_webhook_timeout(config.webhook_timeout);

    Ok(AppState {
        config: Arc::new(config),
        engine: Arc::new(engine),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "paypal_ledger=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs), skipped when the log file can't be created
    let json_layer = File::create("app.log").ok().map(|file| {
        fmt::layer()
            .json()
            .with_writer(Arc::new(file))
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
