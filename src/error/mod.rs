//! Error Types
//!
//! Error hierarchy for the Bullhorn integration, with the classification the
//! call wrapper uses to decide between retry, renewal and propagation.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the Bullhorn integration.
#[derive(Error, Debug)]
pub enum BullhornError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

impl BullhornError {
    /// Get error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "BH_CONFIG",
            Self::Network(_) => "BH_NETWORK",
            Self::Authentication(_) => "BH_AUTH",
            Self::Protocol(_) => "BH_PROTOCOL",
            Self::Storage(_) => "BH_STORAGE",
            Self::Api(_) => "BH_API",
        }
    }

    /// Timeout, DNS failure, connection reset and similar.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// The request was rejected because the session or access token is stale.
    pub fn needs_renewal(&self) -> bool {
        matches!(
            self,
            Self::Authentication(AuthenticationError::TokenExpired { .. })
        )
    }

    /// Errors after which the process must stop rather than continue with
    /// stale credentials.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authentication(
                AuthenticationError::Unrecoverable { .. }
                    | AuthenticationError::TooManyConsecutiveFailures { .. }
            )
        )
    }

    /// Get retry-after duration if the server provided one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Network(NetworkError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Failed to read configuration file {path}: {message}")]
    ReadFailed { path: String, message: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("DNS resolution failed: {message}")]
    DnsResolution { message: String },

    #[error("Connection reset: {message}")]
    ConnectionReset { message: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Server unavailable (HTTP {status})")]
    ServerUnavailable { status: u16 },

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("TLS error: {message}")]
    Tls { message: String },
}

impl NetworkError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Tls { .. })
    }
}

/// Which part of the renewal protocol failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenewalStage {
    /// Refresh-token grant.
    Refresh,
    /// Access token to session token exchange.
    SessionLogin,
    /// Username/password authorization code.
    AuthorizationCode,
    /// Authorization code to token pair exchange.
    CodeExchange,
}

impl std::fmt::Display for RenewalStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Refresh => "refresh",
            Self::SessionLogin => "session login",
            Self::AuthorizationCode => "authorization code",
            Self::CodeExchange => "code exchange",
        };
        f.write_str(name)
    }
}

/// Authentication error.
#[derive(Error, Debug)]
pub enum AuthenticationError {
    #[error("Token expired or invalid: {message}")]
    TokenExpired { message: String },

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Authorization code not found in redirect")]
    MissingAuthorizationCode { location: Option<String> },

    #[error("Renewal step '{stage}' failed: {message}")]
    StepFailed { stage: RenewalStage, message: String },

    #[error("Full re-authentication failed at '{stage}': {message}")]
    Unrecoverable { stage: RenewalStage, message: String },

    #[error("Too many consecutive authentication failures ({count})")]
    TooManyConsecutiveFailures { count: u32 },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unexpected rest URL format: {rest_url}")]
    InvalidRestUrl { rest_url: String },

    #[error("Unexpected status {status}")]
    UnexpectedStatus { status: u16 },
}

/// Credential persistence error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Read failed for {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("Write failed for {path}: {message}")]
    WriteFailed { path: String, message: String },
}

/// Error reported by the REST API itself.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Record {id} rejected: {message}")]
    InvalidRecord { id: i64, message: String },
}

/// Result type for Bullhorn operations.
pub type BullhornResult<T> = Result<T, BullhornError>;

/// Error payload returned by the auth and REST endpoints.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default, alias = "errorMessage")]
    pub message: Option<String>,
}

impl ErrorPayload {
    fn describe(&self, status: u16) -> String {
        self.error_description
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| format!("HTTP {}", status))
    }
}

/// Parse error payload from HTTP body.
pub fn parse_error_payload(body: &str) -> Option<ErrorPayload> {
    serde_json::from_str(body).ok()
}

/// `Retry-After` in delta-seconds form.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Create error from a non-success HTTP response.
pub fn create_error_from_response(status: u16, body: &str) -> BullhornError {
    let payload = parse_error_payload(body);
    let message = payload
        .as_ref()
        .map(|p| p.describe(status))
        .unwrap_or_else(|| format!("HTTP {}", status));

    match payload.as_ref().and_then(|p| p.error.as_deref()) {
        Some("invalid_token") => {
            return AuthenticationError::TokenExpired { message }.into();
        }
        Some("invalid_grant") => {
            return AuthenticationError::InvalidGrant { message }.into();
        }
        _ => {}
    }

    match status {
        401 => AuthenticationError::TokenExpired { message }.into(),
        408 => NetworkError::Timeout {
            timeout: Duration::ZERO,
        }
        .into(),
        429 => NetworkError::RateLimited { retry_after: None }.into(),
        502 | 503 | 504 => NetworkError::ServerUnavailable { status }.into(),
        _ => ApiError::Status { status, message }.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_needs_renewal() {
        let error = create_error_from_response(401, "");
        assert!(error.needs_renewal());
        assert!(!error.is_transient());
        assert!(!error.is_fatal());
    }

    #[test]
    fn test_invalid_token_payload_needs_renewal() {
        let body = r#"{"error":"invalid_token","error_description":"expired"}"#;
        let error = create_error_from_response(400, body);
        assert!(error.needs_renewal());
    }

    #[test]
    fn test_invalid_grant_is_not_renewal_trigger() {
        let body = r#"{"error":"invalid_grant","error_description":"refresh token expired"}"#;
        let error = create_error_from_response(400, body);
        assert!(matches!(
            error,
            BullhornError::Authentication(AuthenticationError::InvalidGrant { .. })
        ));
        assert!(!error.needs_renewal());
    }

    #[test]
    fn test_gateway_errors_are_transient() {
        assert!(create_error_from_response(503, "").is_transient());
        assert!(create_error_from_response(429, "").is_transient());
        assert!(!create_error_from_response(500, "boom").is_transient());
    }

    #[test]
    fn test_fatal_classification() {
        let error: BullhornError = AuthenticationError::Unrecoverable {
            stage: RenewalStage::AuthorizationCode,
            message: "bad password".to_string(),
        }
        .into();
        assert!(error.is_fatal());
        assert_eq!(error.error_code(), "BH_AUTH");

        let error: BullhornError =
            AuthenticationError::TooManyConsecutiveFailures { count: 6 }.into();
        assert!(error.is_fatal());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(" 12 "), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_tls_not_retryable() {
        let error: BullhornError = NetworkError::Tls {
            message: "bad cert".to_string(),
        }
        .into();
        assert!(!error.is_transient());
    }

    #[test]
    fn test_api_error_message_from_payload() {
        let body = r#"{"errorMessage":"Field customText26 is read-only"}"#;
        let error = create_error_from_response(400, body);
        assert!(error.to_string().contains("read-only"));
    }
}
