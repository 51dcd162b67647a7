pub mod paypal;

use axum::{Router, http::HeaderMap};

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    use_cases::ledger::Ledgers,
};

/// Caller identity as established by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const MERCHANT_ID_HEADER: &str = "x-merchant-id";

pub fn router<S: Ledgers>() -> Router<AppState<S>> {
    Router::new().nest("/paypal", paypal::router::<S>())
}

/// Authenticated user id from `X-User-Id`.
pub(crate) fn current_user(headers: &HeaderMap) -> AppResult<String> {
    required_header(headers, USER_ID_HEADER)
}

/// Merchant the request acts for, from `X-Merchant-Id`.
pub(crate) fn current_merchant(headers: &HeaderMap) -> AppResult<String> {
    required_header(headers, MERCHANT_ID_HEADER)
}

fn required_header(headers: &HeaderMap, name: &'static str) -> AppResult<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidInput(format!("Missing {} header", name)))
}
