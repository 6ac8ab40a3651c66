// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::error;

use crate::api::AppState;
use crate::metrics;

/// Service description
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Social API",
        "endpoints": {
            "users": "/api/users",
            "posts": "/api/posts",
            "comments": "/api/comments",
            "health": "/health",
            "metrics": "/metrics"
        }
    }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "message": "API server is running"
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "message": "Storage is unavailable"
                })),
            )
        }
    }
}

/// Prometheus metrics in the text exposition format
pub async fn get_metrics() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                String::from("failed to encode metrics"),
            )
        }
    }
}
