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
use crate::models::LikeTarget;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub post_id: i32,
    pub content: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<AddCommentRequest>,
) -> SocialResult<impl IntoResponse> {
    let comment = state
        .ledger
        .add_comment(actor, body.post_id, &body.content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Comment added successfully",
            "comment": comment
        })),
    ))
}

/// Comments on a post, newest first
pub async fn get_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i32>,
    Query(query): Query<PaginationQuery>,
) -> SocialResult<impl IntoResponse> {
    let page = state.page(query.page, query.limit);
    let comments = state.ledger.list_comments(post_id, page).await?;
    let total_pages = comments.total_pages();

    Ok(Json(json!({
        "comments": comments.items,
        "currentPage": comments.page,
        "totalPages": total_pages,
        "totalComments": comments.total
    })))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<i32>,
) -> SocialResult<impl IntoResponse> {
    state.ledger.delete_comment(actor, id).await?;
    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}

/// Toggle the caller's like on a comment
pub async fn like_comment(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<i32>,
) -> SocialResult<impl IntoResponse> {
    let toggle = state
        .ledger
        .toggle_like(actor, LikeTarget::Comment(id))
        .await?;
    let message = if toggle.liked { "Comment liked" } else { "Comment unliked" };
    Ok(Json(json!({
        "message": message,
        "liked": toggle.liked,
        "likesCount": toggle.likes_count
    })))
}
