use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request to the findings API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("findings API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response body from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid API configuration: {0}")]
    Config(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
