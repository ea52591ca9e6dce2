//! Unified error types for the keeper.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading, parsing, or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Json(e) => write!(f, "json: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors from the persisted state store.
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "store io: {e}"),
            Self::Json(e) => write!(f, "store json: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors from the session data source HTTP layer.
#[derive(Debug)]
pub enum ApiError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the API, with a user-facing message.
    Status { code: u16, message: String },
    /// The response body did not have the expected shape.
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status code when this error came from a non-2xx response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status { code, message } => write!(f, "status {code}: {message}"),
            Self::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Errors surfaced by the supervisor gateway.
#[derive(Debug)]
pub enum GatewayError {
    /// A required request field was missing or empty. Raised before any I/O.
    MissingField(&'static str),
    /// The provider name is not one of the supported protocols.
    UnknownProvider(String),
    /// A protocol step answered with a non-success status.
    Step { step: &'static str, detail: String },
    /// A stateful run ended in a non-completed state or ran out of attempts.
    RunNotCompleted(String),
    /// Network-level failure talking to the provider.
    Http(reqwest::Error),
}

impl GatewayError {
    /// True for request-validation failures (mapped to HTTP 400).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::UnknownProvider(_))
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field: {field}"),
            Self::UnknownProvider(name) => write!(f, "invalid provider: {name}"),
            Self::Step { step, detail } if detail.is_empty() => write!(f, "{step}"),
            Self::Step { step, detail } => write!(f, "{step}: {detail}"),
            Self::RunNotCompleted(status) => {
                write!(f, "assistant run failed or timed out: {status}")
            }
            Self::Http(e) => write!(f, "http: {e}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// KeeperError
// ---------------------------------------------------------------------------

/// Top-level error type for the supervision loop and CLI.
#[derive(Debug)]
pub enum KeeperError {
    Config(ConfigError),
    Store(StoreError),
    Api(ApiError),
    Gateway(GatewayError),
}

impl fmt::Display for KeeperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Store(e) => write!(f, "{e}"),
            Self::Api(e) => write!(f, "api: {e}"),
            Self::Gateway(e) => write!(f, "supervisor: {e}"),
        }
    }
}

impl std::error::Error for KeeperError {}

impl From<ConfigError> for KeeperError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StoreError> for KeeperError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<ApiError> for KeeperError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<GatewayError> for KeeperError {
    fn from(e: GatewayError) -> Self {
        Self::Gateway(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let e = ConfigError::from(io_err);
        let s = e.to_string();
        assert!(s.starts_with("io:"), "got: {s}");
        assert!(s.contains("file not found"));
    }

    #[test]
    fn config_error_from_toml() {
        let toml_err: toml::de::Error = toml::from_str::<toml::Value>("x = [unclosed").unwrap_err();
        let e = ConfigError::from(toml_err);
        assert!(e.to_string().starts_with("toml:"));
    }

    #[test]
    fn gateway_step_error_names_the_step() {
        let e = GatewayError::Step {
            step: "failed to create assistant",
            detail: String::new(),
        };
        assert_eq!(e.to_string(), "failed to create assistant");

        let e = GatewayError::Step {
            step: "OpenAI API error",
            detail: "quota exceeded".into(),
        };
        assert_eq!(e.to_string(), "OpenAI API error: quota exceeded");
    }

    #[test]
    fn run_not_completed_carries_status() {
        let e = GatewayError::RunNotCompleted("expired".into());
        assert_eq!(e.to_string(), "assistant run failed or timed out: expired");
    }

    #[test]
    fn validation_errors_are_flagged() {
        assert!(GatewayError::MissingField("apiKey").is_validation());
        assert!(GatewayError::UnknownProvider("x".into()).is_validation());
        assert!(!GatewayError::RunNotCompleted("failed".into()).is_validation());
    }

    #[test]
    fn keeper_error_from_api_error() {
        let ke = KeeperError::from(ApiError::Status {
            code: 401,
            message: "Invalid API key".into(),
        });
        assert_eq!(ke.to_string(), "api: status 401: Invalid API key");
    }
}
