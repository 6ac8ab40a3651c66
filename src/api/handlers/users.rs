// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::api::auth::Actor;
use crate::api::AppState;
use crate::directory::Registration;
use crate::error::SocialResult;
use crate::models::UpdateProfile;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Search users by username or name
pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> SocialResult<impl IntoResponse> {
    debug!("Searching users for {:?}", query.search);
    let users = state
        .directory
        .search(query.search.as_deref(), query.limit)
        .await?;
    Ok(Json(users))
}

/// Provision an account for a newly registered identity
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> SocialResult<impl IntoResponse> {
    let user = state
        .directory
        .register(Registration {
            username: body.username,
            email: body.email,
            first_name: body.first_name,
            last_name: body.last_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "user": user
        })),
    ))
}

/// Full profile with follow lists and recent posts
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> SocialResult<impl IntoResponse> {
    Ok(Json(state.directory.profile(id).await?))
}

/// Edit the caller's own profile
pub async fn update_profile(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(changes): Json<UpdateProfile>,
) -> SocialResult<impl IntoResponse> {
    let user = state.directory.update_profile(actor, changes).await?;
    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": user
    })))
}
