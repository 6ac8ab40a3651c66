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

use super::PaginationQuery;
use crate::api::auth::Actor;
use crate::api::AppState;
use crate::error::SocialResult;
use crate::models::{LikeTarget, Page, PostView};

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub content: String,
    pub image: Option<String>,
}

/// Posts of followed users and the caller, newest first
pub async fn get_feed(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Query(query): Query<PaginationQuery>,
) -> SocialResult<impl IntoResponse> {
    let page = state.page(query.page, query.limit);
    let posts = state.timeline.feed(actor, page).await?;
    Ok(Json(posts_page(posts)))
}

pub async fn get_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Query(query): Query<PaginationQuery>,
) -> SocialResult<impl IntoResponse> {
    let page = state.page(query.page, query.limit);
    let posts = state.timeline.user_posts(user_id, page).await?;
    Ok(Json(posts_page(posts)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> SocialResult<impl IntoResponse> {
    Ok(Json(state.timeline.get_post(id).await?))
}

pub async fn create_post(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<PostRequest>,
) -> SocialResult<impl IntoResponse> {
    let post = state
        .timeline
        .create_post(actor, &body.content, body.image)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Post created successfully",
            "post": post
        })),
    ))
}

pub async fn update_post(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<i32>,
    Json(body): Json<PostRequest>,
) -> SocialResult<impl IntoResponse> {
    let post = state
        .timeline
        .update_post(actor, id, &body.content, body.image)
        .await?;
    Ok(Json(json!({
        "message": "Post updated successfully",
        "post": post
    })))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<i32>,
) -> SocialResult<impl IntoResponse> {
    state.ledger.delete_post(actor, id).await?;
    Ok(Json(json!({ "message": "Post deleted successfully" })))
}

/// Toggle the caller's like on a post
pub async fn like_post(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<i32>,
) -> SocialResult<impl IntoResponse> {
    let toggle = state.ledger.toggle_like(actor, LikeTarget::Post(id)).await?;
    let message = if toggle.liked { "Post liked" } else { "Post unliked" };
    Ok(Json(json!({
        "message": message,
        "liked": toggle.liked,
        "likesCount": toggle.likes_count
    })))
}

fn posts_page(page: Page<PostView>) -> serde_json::Value {
    let total_pages = page.total_pages();
    json!({
        "posts": page.items,
        "currentPage": page.page,
        "totalPages": total_pages,
        "totalPosts": page.total
    })
}
