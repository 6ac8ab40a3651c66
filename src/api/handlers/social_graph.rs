// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::PaginationQuery;
use crate::api::auth::Actor;
use crate::api::AppState;
use crate::error::SocialResult;
use crate::models::{FollowDetail, Page};

/// Follow another user
pub async fn follow_user(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(target): Path<i32>,
) -> SocialResult<impl IntoResponse> {
    let counts = state.graph.follow(actor, target).await?;
    Ok(Json(json!({
        "message": "User followed successfully",
        "following": true,
        "followersCount": counts.followers_count,
        "followingCount": counts.following_count
    })))
}

/// Stop following a user; unfollowing someone not followed still succeeds
pub async fn unfollow_user(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(target): Path<i32>,
) -> SocialResult<impl IntoResponse> {
    let counts = state.graph.unfollow(actor, target).await?;
    Ok(Json(json!({
        "message": "User unfollowed successfully",
        "following": false,
        "followersCount": counts.followers_count,
        "followingCount": counts.following_count
    })))
}

/// Get a list of users following a user
pub async fn get_followers(
    State(state): State<AppState>,
    Path(user): Path<i32>,
    Query(query): Query<PaginationQuery>,
) -> SocialResult<impl IntoResponse> {
    let page = state.page(query.page, query.limit);
    let followers = state.graph.list_followers(user, page).await?;
    Ok(Json(follow_page("followers", followers)))
}

/// Get a list of users a user is following
pub async fn get_following(
    State(state): State<AppState>,
    Path(user): Path<i32>,
    Query(query): Query<PaginationQuery>,
) -> SocialResult<impl IntoResponse> {
    let page = state.page(query.page, query.limit);
    let following = state.graph.list_following(user, page).await?;
    Ok(Json(follow_page("following", following)))
}

/// Check whether one user follows another
pub async fn check_following(
    State(state): State<AppState>,
    Path((user, other)): Path<(i32, i32)>,
) -> SocialResult<impl IntoResponse> {
    let following = state.graph.is_following(user, other).await?;
    Ok(Json(json!({ "following": following })))
}

fn follow_page(key: &str, page: Page<FollowDetail>) -> serde_json::Value {
    let total_pages = page.total_pages();
    json!({
        key: page.items,
        "currentPage": page.page,
        "totalPages": total_pages,
        "total": page.total
    })
}
