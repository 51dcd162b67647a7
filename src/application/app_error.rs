use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Quantity must be positive for {0}")]
    InvalidQuantity(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("No vaulted payment method for user")]
    NoVaultedMethod,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Webhook signature verification failed")]
    UnauthorizedWebhook,

    /// Capture notification arrived before the order left `CREATED`.
    /// Surfaced to the provider so the event is redelivered.
    #[error("Order {0} has not been captured yet")]
    OrderNotCaptured(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the provider should redeliver a webhook that failed with this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Internal(_)
                | AppError::Gateway(_)
                | AppError::OrderNotCaptured(_)
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    InvalidInput,
    InvalidQuantity,
    ProductNotFound,
    NoVaultedMethod,
    GatewayError,
    UnauthorizedWebhook,
    OrderNotCaptured,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InvalidQuantity => "INVALID_QUANTITY",
            ErrorCode::ProductNotFound => "PRODUCT_NOT_FOUND",
            ErrorCode::NoVaultedMethod => "NO_VAULTED_METHOD",
            ErrorCode::GatewayError => "GATEWAY_ERROR",
            ErrorCode::UnauthorizedWebhook => "UNAUTHORIZED_WEBHOOK",
            ErrorCode::OrderNotCaptured => "ORDER_NOT_CAPTURED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
