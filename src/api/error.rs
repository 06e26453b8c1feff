use thiserror::Error;

/// Failure of a single API call. Every variant carries a message fit to show a user.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {message}")]
    Transport { message: String },

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("{message}")]
    Rejected { message: String },

    #[error("unexpected response: {message}")]
    Decode { message: String },

    #[error("server returned page {current} of {total}")]
    InvalidPage { current: i64, total: i64 },
}

impl ApiError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ApiError::Transport {
            message: err.to_string(),
        }
    }

    pub fn unexpected_status(status: u16) -> Self {
        ApiError::Status {
            status,
            message: format!("Unexpected error: {status}"),
        }
    }

    pub fn rejected(message: Option<String>) -> Self {
        ApiError::Rejected {
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Request failed".to_string()),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the server answered, as opposed to the call never completing.
    pub fn is_server_reply(&self) -> bool {
        matches!(self, ApiError::Status { .. } | ApiError::Rejected { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::Decode {
                message: err.to_string(),
            };
        }
        ApiError::transport(err)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid base URL: {url}")]
    InvalidBaseUrl { url: String },

    #[error("invalid header '{header}', expected 'Key: Value'")]
    InvalidHeader { header: String },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },
}
