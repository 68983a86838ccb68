use serde::{Deserialize, Serialize};

/// Failure categories reported by a pool gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GatewayErrorKind {
    InvalidInput,
    NotFound,
    RateLimited,
    RpcError,
    SdkError,
}

impl GatewayErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayErrorKind::InvalidInput => "INVALID_INPUT",
            GatewayErrorKind::NotFound => "NOT_FOUND",
            GatewayErrorKind::RateLimited => "RATE_LIMITED",
            GatewayErrorKind::RpcError => "RPC_ERROR",
            GatewayErrorKind::SdkError => "SDK_ERROR",
        }
    }

    /// Whether the gateway may retry a call that failed this way.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayErrorKind::RateLimited | GatewayErrorKind::RpcError)
    }
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged error returned by every `PoolGateway` call.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::NotFound, message)
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::RpcError, message)
    }

    pub fn sdk(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::SdkError, message)
    }
}

/// All application errors, categorized by domain.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ── Requests ──
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // ── Gateway ──
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] GatewayError),

    // ── Data / Import ──
    #[error("CSV validation failed: {0}")]
    CsvValidation(String),

    #[error("CSV parse error at row {row}, column '{column}': {message}")]
    CsvParseError {
        row: u64,
        column: String,
        message: String,
    },

    #[error("No candle data to process")]
    NoData,

    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Failed to write file: {0}")]
    FileWrite(String),

    // ── Backtest ──
    #[error("Backtest cancelled")]
    BacktestCancelled,

    #[error("Too many combinations: {count} exceeds limit of {limit}")]
    TooManyCombinations { count: usize, limit: usize },

    // ── Configuration ──
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Serialization ──
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ── General ──
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AppError::CsvValidation(_) => "CSV_VALIDATION",
            AppError::CsvParseError { .. } => "CSV_PARSE_ERROR",
            AppError::NoData => "NO_DATA",
            AppError::FileRead(_) => "FILE_READ",
            AppError::FileWrite(_) => "FILE_WRITE",
            AppError::BacktestCancelled => "BACKTEST_CANCELLED",
            AppError::TooManyCombinations { .. } => "TOO_MANY_COMBINATIONS",
            AppError::InvalidConfig(_) => "INVALID_CONFIG",
            AppError::Serialization(_) => "SERIALIZATION",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// Status an HTTP front end should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::InvalidInput(_)
            | AppError::CsvValidation(_)
            | AppError::CsvParseError { .. }
            | AppError::NoData
            | AppError::TooManyCombinations { .. } => 400,
            AppError::NotFound(_) => 404,
            AppError::RateLimited(_) => 429,
            AppError::BacktestCancelled => 409,
            AppError::UpstreamUnavailable(e) => match e.kind {
                GatewayErrorKind::InvalidInput => 400,
                GatewayErrorKind::NotFound => 404,
                GatewayErrorKind::RateLimited => 429,
                GatewayErrorKind::RpcError | GatewayErrorKind::SdkError => 502,
            },
            AppError::FileRead(_)
            | AppError::FileWrite(_)
            | AppError::InvalidConfig(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => 500,
        }
    }
}

/// Serializable error response for callers.
#[derive(Debug, Serialize, Clone)]
pub struct ErrorResponse {
    pub code: String,
    /// Gateway failure kind when the error came from upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<GatewayErrorKind>,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let kind = match err {
            AppError::UpstreamUnavailable(e) => Some(e.kind),
            _ => None,
        };
        ErrorResponse {
            code: err.code().to_string(),
            kind,
            message: err.to_string(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let response = ErrorResponse::from(self);
        response.serialize(serializer)
    }
}

// ── Conversions from external errors ──

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileRead(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        let row = err.position().map(|p| p.line()).unwrap_or(0);
        AppError::CsvParseError {
            row,
            column: String::new(),
            message: err.to_string(),
        }
    }
}
