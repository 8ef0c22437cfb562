use actix_web::http::StatusCode;
use actix_web::ResponseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CspError {
    #[error("Invalid directive value: {0}")]
    InvalidDirectiveValue(String),

    #[error("Invalid report URI: {0}")]
    InvalidReportUri(String),

    #[error("Header processing error: {0}")]
    HeaderError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl ResponseError for CspError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDirectiveValue(_)
            | Self::InvalidReportUri(_)
            | Self::ConfigError(_)
            | Self::SerializationError(_) => StatusCode::BAD_REQUEST,

            Self::HeaderError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
