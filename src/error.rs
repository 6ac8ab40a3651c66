// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel_async::pooled_connection::PoolError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type SocialResult<T> = Result<T, SocialError>;

/// Failures surfaced by the social graph and engagement operations
#[derive(Debug, Error)]
pub enum SocialError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Not authorized to {0}")]
    Forbidden(&'static str),

    #[error("Already following this user")]
    AlreadyFollowing,

    #[error("You cannot follow yourself")]
    SelfFollowNotAllowed,

    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl SocialError {
    pub fn validation(message: impl Into<String>) -> Self {
        SocialError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SocialError::NotFound(_) => StatusCode::NOT_FOUND,
            SocialError::Forbidden(_) => StatusCode::FORBIDDEN,
            SocialError::AlreadyFollowing
            | SocialError::SelfFollowNotAllowed
            | SocialError::Validation(_) => StatusCode::BAD_REQUEST,
            SocialError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SocialError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SocialError::NotFound(_) => "not_found",
            SocialError::Forbidden(_) => "forbidden",
            SocialError::AlreadyFollowing => "already_following",
            SocialError::SelfFollowNotAllowed => "self_follow",
            SocialError::Validation(_) => "validation",
            SocialError::Unauthenticated => "unauthenticated",
            SocialError::Storage(_) => "storage",
        }
    }
}

impl From<diesel::result::Error> for SocialError {
    fn from(err: diesel::result::Error) -> Self {
        SocialError::Storage(err.to_string())
    }
}

impl From<deadpool::managed::PoolError<PoolError>> for SocialError {
    fn from(err: deadpool::managed::PoolError<PoolError>) -> Self {
        SocialError::Storage(format!("Failed to get database connection: {}", err))
    }
}

impl IntoResponse for SocialError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            SocialError::Storage(cause) => {
                error!("Request failed on storage: {}", cause);
                "Server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
