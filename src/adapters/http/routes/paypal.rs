use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    adapters::http::{
        app_state::AppState,
        routes::{current_merchant, current_user},
    },
    app_error::AppResult,
    application::ports::payment_gateway::{
        HEADER_AUTH_ALGO, HEADER_CERT_URL, HEADER_TRANSMISSION_ID, HEADER_TRANSMISSION_SIG,
        HEADER_TRANSMISSION_TIME, WebhookHeaders,
    },
    domain::entities::product::LineItem,
    use_cases::ledger::Ledgers,
};

pub fn router<S: Ledgers>() -> Router<AppState<S>> {
    Router::new()
        .route("/pay", post(pay::<S>))
        .route("/pay-again", post(pay_again::<S>))
        .route("/success", get(payment_success::<S>))
        .route("/cancel", get(payment_cancelled))
        .route("/webhook", post(webhook::<S>))
        .route("/saved-payment", get(saved_payment::<S>))
        .route("/subscriptions", post(subscribe::<S>))
        .route("/subscriptions/success", get(subscription_success::<S>))
        .route("/subscriptions/status", get(subscription_status::<S>))
        .route("/subscriptions/cancel", post(cancel_subscription::<S>))
        .route("/inventory", get(inventory::<S>))
}

#[derive(Deserialize)]
struct PurchasePayload {
    items: Vec<LineItem>,
}

#[derive(Deserialize)]
struct ReturnQuery {
    token: String,
}

#[derive(Deserialize)]
struct SubscribePayload {
    product_code: String,
}

#[derive(Deserialize)]
struct SubscriptionReturnQuery {
    subscription_id: String,
}

/// POST /api/paypal/pay
/// Creates a PayPal order and returns the buyer approval link.
async fn pay<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    headers: HeaderMap,
    Json(payload): Json<PurchasePayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;
    let merchant_id = current_merchant(&headers)?;
    let order = app_state
        .engine
        .initiate_purchase(&user_id, &merchant_id, &payload.items)
        .await?;
    Ok(Json(order))
}

/// POST /api/paypal/pay-again
/// One-click purchase charged to the user's saved PayPal account.
async fn pay_again<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    headers: HeaderMap,
    Json(payload): Json<PurchasePayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;
    let merchant_id = current_merchant(&headers)?;
    let order_id = app_state
        .engine
        .initiate_vaulted_purchase(&user_id, &merchant_id, &payload.items)
        .await?;
    Ok(Json(json!({ "order_id": order_id })))
}

/// GET /api/paypal/success?token=
/// Buyer return url; captures the approved order.
async fn payment_success<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    Query(query): Query<ReturnQuery>,
) -> AppResult<impl IntoResponse> {
    let order = app_state.engine.capture_approved_order(&query.token).await?;
    Ok(Json(order))
}

/// GET /api/paypal/cancel
async fn payment_cancelled() -> impl IntoResponse {
    Json(json!({ "message": "Payment cancelled" }))
}

/// POST /api/paypal/webhook
/// PayPal event delivery. Any non-2xx response makes PayPal redeliver.
async fn webhook<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let outcome = app_state
        .engine
        .handle_webhook(&webhook_headers(&headers), &body)
        .await?;
    Ok(Json(json!({ "outcome": outcome })))
}

fn webhook_headers(headers: &HeaderMap) -> WebhookHeaders {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    WebhookHeaders {
        auth_algo: header(HEADER_AUTH_ALGO),
        cert_url: header(HEADER_CERT_URL),
        transmission_id: header(HEADER_TRANSMISSION_ID),
        transmission_sig: header(HEADER_TRANSMISSION_SIG),
        transmission_time: header(HEADER_TRANSMISSION_TIME),
    }
}

/// GET /api/paypal/saved-payment
async fn saved_payment<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;
    let has_saved_payment = app_state.engine.has_saved_payment_method(&user_id).await?;
    Ok(Json(json!({ "has_saved_payment": has_saved_payment })))
}

/// POST /api/paypal/subscriptions
async fn subscribe<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    headers: HeaderMap,
    Json(payload): Json<SubscribePayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;
    let merchant_id = current_merchant(&headers)?;
    let subscription = app_state
        .engine
        .subscribe_to_plan(&user_id, &merchant_id, &payload.product_code)
        .await?;
    Ok(Json(subscription))
}

/// GET /api/paypal/subscriptions/success?subscription_id=
/// Status stays `PENDING` until the activation webhook arrives.
async fn subscription_success<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    Query(query): Query<SubscriptionReturnQuery>,
) -> AppResult<impl IntoResponse> {
    let subscription = app_state
        .engine
        .subscription_return(&query.subscription_id)
        .await?;
    Ok(Json(subscription))
}

/// GET /api/paypal/subscriptions/status
async fn subscription_status<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;
    let merchant_id = current_merchant(&headers)?;
    let active = app_state
        .engine
        .has_active_subscription(&user_id, &merchant_id)
        .await?;
    Ok(Json(json!({ "active": active })))
}

/// POST /api/paypal/subscriptions/cancel
async fn cancel_subscription<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;
    let merchant_id = current_merchant(&headers)?;
    let subscription = app_state
        .engine
        .cancel_subscription(&user_id, &merchant_id)
        .await?;
    Ok(Json(subscription))
}

/// GET /api/paypal/inventory
async fn inventory<S: Ledgers>(
    State(app_state): State<AppState<S>>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&headers)?;
    let entries = app_state.engine.inventory_for_user(&user_id).await?;
    Ok(Json(entries))
}
