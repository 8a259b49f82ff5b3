use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatrolError {
    #[error("API request failed: {0}")]
    ApiError(reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Scan could not start: {message}")]
    ScanStartError { message: String },

    #[error("Marketplace search rate limited (HTTP 429)")]
    RateLimited,

    #[error("Marketplace search failed (status {status}): {message}")]
    SearchError { status: u16, message: String },

    #[error("Classification failed: {message}")]
    ClassificationError { message: String },

    #[error("Persistence error: {message}")]
    PersistenceError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Upstream,
    Classification,
    Persistence,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

// 請求網址帶有憑證參數，錯誤訊息一律去掉網址
impl From<reqwest::Error> for PatrolError {
    fn from(e: reqwest::Error) -> Self {
        PatrolError::ApiError(e.without_url())
    }
}

impl PatrolError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PatrolError::ConfigurationError { .. }
            | PatrolError::InvalidConfigValueError { .. }
            | PatrolError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            PatrolError::ScanStartError { .. }
            | PatrolError::RateLimited
            | PatrolError::SearchError { .. }
            | PatrolError::ApiError(_) => ErrorCategory::Upstream,
            PatrolError::ClassificationError { .. } => ErrorCategory::Classification,
            PatrolError::PersistenceError { .. } => ErrorCategory::Persistence,
            PatrolError::CsvError(_)
            | PatrolError::IoError(_)
            | PatrolError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 單一商品或持久化失敗不影響整體掃描
            PatrolError::ClassificationError { .. } | PatrolError::PersistenceError { .. } => {
                ErrorSeverity::Low
            }
            PatrolError::RateLimited | PatrolError::ApiError(_) => ErrorSeverity::Medium,
            PatrolError::ConfigurationError { .. }
            | PatrolError::InvalidConfigValueError { .. }
            | PatrolError::ConfigValidationError { .. }
            | PatrolError::ScanStartError { .. }
            | PatrolError::SearchError { .. } => ErrorSeverity::High,
            PatrolError::CsvError(_)
            | PatrolError::IoError(_)
            | PatrolError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PatrolError::ConfigurationError { message } => message.clone(),
            PatrolError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            PatrolError::ConfigValidationError { field, message } => {
                format!("Configuration problem in '{}': {}", field, message)
            }
            PatrolError::ScanStartError { message } => format!("Scan start error: {}", message),
            PatrolError::RateLimited => {
                "The marketplace API is rate limiting requests".to_string()
            }
            PatrolError::SearchError { status, message } => {
                format!("Catalog search failed ({}): {}", status, message)
            }
            PatrolError::ApiError(e) => format!("Network request failed: {}", e),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PatrolError::ConfigurationError { .. } => {
                "Set marketplace_app_id and ai_api_key in the config file or pass --app-id/--api-key"
            }
            PatrolError::InvalidConfigValueError { .. }
            | PatrolError::ConfigValidationError { .. } => {
                "Check the config file against the documented sections and ranges"
            }
            PatrolError::ScanStartError { .. } => {
                "Check that the URL points at a shop top page, e.g. https://www.rakuten.co.jp/<shop>/"
            }
            PatrolError::RateLimited => "Wait a minute and start the scan again",
            PatrolError::SearchError { .. } | PatrolError::ApiError(_) => {
                "Verify the marketplace application id and network connectivity"
            }
            PatrolError::ClassificationError { .. } => "Verify the AI API key and model name",
            PatrolError::PersistenceError { .. } => {
                "Check that the store path is writable"
            }
            PatrolError::CsvError(_)
            | PatrolError::IoError(_)
            | PatrolError::SerializationError(_) => "Check file permissions and disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, PatrolError>;
