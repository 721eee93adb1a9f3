use crate::domain::ids::IntentId;
use crate::domain::intent::IntentStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("Insufficient stock for {product}: only {available} available")]
    InsufficientStock { product: String, available: u32 },
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Unknown payment intent: {0}")]
    UnknownIntent(IntentId),
    #[error("Payment intent {intent} is not confirmed (status: {status})")]
    IntentNotConfirmed {
        intent: IntentId,
        status: IntentStatus,
    },
    #[error("Payment provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),
    #[error("Internal persistence failure")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckoutError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn persistence(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Persistence(err.into())
    }

    /// Only provider outages are worth retrying; everything else is final for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for CheckoutError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Persistence(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_hides_detail() {
        let err = CheckoutError::persistence("column family `orders` missing");
        assert_eq!(err.to_string(), "Internal persistence failure");
    }

    #[test]
    fn test_only_provider_errors_are_retryable() {
        assert!(CheckoutError::ProviderUnavailable("timeout".into()).is_retryable());
        assert!(!CheckoutError::EmptyCart.is_retryable());
        assert!(!CheckoutError::InvalidArgument("qty".into()).is_retryable());
    }
}
