use thiserror::Error;

use crate::storage::StorageError;

/// Unified error type for everything the ordering client can fail at.
///
/// Calls that talk to the backend surface transport and protocol failures
/// here; the UI layer is expected to show [`ClientError::user_message`]
/// rather than the raw error, which stays in the logs.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Order error: {0}")]
    OrderError(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Delivery zone blocked: {0}")]
    ZoneBlocked(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// Convenience constructor for backend responses carrying an error payload.
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        ClientError::Backend {
            status,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }

    /// Returns the message suitable for end users.
    ///
    /// Field-level validation and zone rejections carry their own wording;
    /// everything else collapses to a generic localized message so transport
    /// and backend internals never reach the screen.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::ZoneBlocked(msg) => msg.clone(),
            Self::PaymentFailed(_) => "خطا در درخواست پرداخت".to_string(),
            Self::OrderError(_) => "خطا در ایجاد سفارش".to_string(),
            Self::NotFound(_) => "خطا در دریافت سفارش".to_string(),
            Self::Unauthorized | Self::AuthError(_) => "لطفاً دوباره وارد شوید.".to_string(),
            _ => "خطا در اتصال به سرور. لطفاً دوباره تلاش کنید.".to_string(),
        }
    }
}
