use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DomainError, EngineError, NotFound};
use crate::protocol::ProtocolViolation;
use crate::recommender::RecommenderError;

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 - missing or malformed fields
    #[error("{0}")]
    Validation(String),

    /// 404
    #[error(transparent)]
    NotFound(#[from] NotFound),

    /// 409 - event not legal in the session's current protocol state
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    /// 400 - business rule
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// 502 - oracle unreachable after the retry
    #[error(transparent)]
    Remote(#[from] RecommenderError),

    /// 405
    #[error("Use {0}")]
    MethodNotAllowed(&'static str),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(e) => ApiError::NotFound(e),
            EngineError::Protocol(e) => ApiError::Protocol(e),
            EngineError::Domain(e) => ApiError::Domain(e),
        }
    }
}

impl ApiError {
    fn label(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Invalid request",
            ApiError::NotFound(_) => "Not found",
            ApiError::Protocol(_) => "Protocol violation",
            ApiError::Domain(DomainError::AuctionEnded(_)) => "Auction ended",
            ApiError::Domain(_) => "Decision not allowed",
            ApiError::Remote(_) => "Recommender unavailable",
            ApiError::MethodNotAllowed(_) => "Method not allowed",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Domain(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Protocol(_) => StatusCode::CONFLICT,
            ApiError::Remote(_) => StatusCode::BAD_GATEWAY,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.label().to_string(),
            details: self.to_string(),
        })
    }
}
