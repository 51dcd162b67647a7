use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        if self.is_retryable() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::warn!(error = ?self, "Request rejected");
        }

        match self {
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            e @ AppError::InvalidQuantity(_) => error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidQuantity,
                Some(e.to_string()),
            ),
            e @ AppError::ProductNotFound(_) => error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::ProductNotFound,
                Some(e.to_string()),
            ),
            AppError::NoVaultedMethod => error_resp(
                StatusCode::CONFLICT,
                ErrorCode::NoVaultedMethod,
                Some("No saved payment method; complete a regular checkout first".to_string()),
            ),
            AppError::Gateway(msg) => {
                error_resp(StatusCode::BAD_GATEWAY, ErrorCode::GatewayError, Some(msg))
            }
            AppError::UnauthorizedWebhook => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::UnauthorizedWebhook, None)
            }
            e @ AppError::OrderNotCaptured(_) => error_resp(
                StatusCode::CONFLICT,
                ErrorCode::OrderNotCaptured,
                Some(e.to_string()),
            ),
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
