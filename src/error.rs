use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors raised by the gateway adapters.
///
/// Declines and gateway-reported errors are not represented here: they come back
/// as a [`crate::payments::types::Response`] whose outcome is a failure.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Configuration error: {message} ({key})")]
    Configuration { key: String, message: String },

    #[error("Missing required field: {field}")]
    Validation { field: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Malformed gateway response: {message}")]
    MalformedResponse { message: String },

    #[error("Failed to encode request: {message}")]
    Encoding { message: String },

    #[error("{gateway} does not support {operation}")]
    UnsupportedOperation {
        gateway: &'static str,
        operation: &'static str,
    },

    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },
}

impl GatewayError {
    pub fn missing_option(key: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: "Missing required parameter".to_string(),
        }
    }

    pub fn invalid_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    pub fn unsupported(gateway: &'static str, operation: &'static str) -> Self {
        Self::UnsupportedOperation { gateway, operation }
    }

    pub fn unsupported_currency(currency: impl Into<String>) -> Self {
        Self::UnsupportedCurrency {
            currency: currency.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            GatewayError::transport(format!("Request timed out: {}", err))
        } else {
            GatewayError::transport(format!("Request error: {}", err))
        }
    }
}

impl From<quick_xml::Error> for GatewayError {
    fn from(err: quick_xml::Error) -> Self {
        GatewayError::malformed(format!("XML error: {}", err))
    }
}
