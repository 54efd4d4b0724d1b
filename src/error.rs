//! Error type shared by the proxy handlers and the backend client.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    /// The browser sent something we refuse to forward.
    #[error("{0}")]
    BadRequest(String),

    #[error("File is larger than the {limit} byte upload limit")]
    PayloadTooLarge { limit: usize },

    #[error("Backend responded with status: {0}")]
    BackendStatus(u16),

    #[error("Role sync failed with status {status}: {body}")]
    RoleSync { status: u16, body: String },

    #[error("Backend reset failed with status {status}: {body}")]
    Reset { status: u16, body: String },

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read upload: {0}")]
    Multipart(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

impl ProxyError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl From<actix_multipart::MultipartError> for ProxyError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        Self::Multipart(err.to_string())
    }
}

impl ResponseError for ProxyError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Multipart(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
