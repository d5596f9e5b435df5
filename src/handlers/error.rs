// src/handlers/error.rs
use std::fmt;
use warp::reject::Reject;

use crate::services::yahoo::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    UnknownTicker,
    SourceUnavailable,
    IncompleteData,
    SchemaMismatch,
}

#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn unknown_ticker(ticker: &str) -> Self {
        ApiError {
            kind: ApiErrorKind::UnknownTicker,
            message: format!("unknown ticker: {}", ticker),
        }
    }

    pub fn from_data_error(err: DataError) -> Self {
        let kind = match &err {
            DataError::Unavailable(_) => ApiErrorKind::SourceUnavailable,
            DataError::Incomplete { .. } => ApiErrorKind::IncompleteData,
            DataError::Schema(_) => ApiErrorKind::SchemaMismatch,
        };
        ApiError {
            kind,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}
