//! Error types for the provider adapters

/// Result type for provider operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
/// Used throughout the crate for operations that can fail.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding and completion calls.
///
/// Provider calls cross the network, so most failures here are about the
/// remote service: refused connections, timeouts, throttling, or a response
/// body that does not look like what an OpenAI-compatible endpoint returns.
/// Configuration problems are reported up front, when a provider is built.
///
/// # Error Categories
///
/// - **Configuration Errors**: invalid settings or a missing API key
/// - **Transport Errors**: the request never produced an HTTP response
/// - **Service Errors**: the endpoint answered with a non-success status
/// - **Protocol Errors**: a success status with an unusable body
///
/// Use [`EmbedError::is_retryable`] to tell transient failures apart from
/// permanent ones.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when provider configuration is invalid
    #[error("Invalid provider configuration: {message}")]
    InvalidConfig { message: String },

    /// No API key in the configuration or the environment
    #[error("Missing API key: set `api_key` in the configuration or the {env_var} environment variable")]
    MissingApiKey { env_var: &'static str },

    /// Transport-level failure (connect, timeout, TLS)
    #[error("HTTP request failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    /// The endpoint returned a non-success status
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint returned a body we could not use
    #[error("Unexpected provider response: {message}")]
    UnexpectedResponse { message: String },

    /// IO errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    ///
    /// # Arguments
    /// * `message` - A descriptive error message explaining what's wrong with the configuration
    ///
    /// # Returns
    /// A new [`EmbedError::InvalidConfig`] variant
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unexpected response error with a custom message.
    pub fn unexpected_response<S: Into<String>>(message: S) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }

    /// Whether retrying the same request later may succeed.
    ///
    /// True for throttling (HTTP 429), server errors (5xx), timeouts and
    /// connection failures. Everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { source } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
