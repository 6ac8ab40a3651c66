// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use crate::schema::{comment_likes, comments};
use super::post::LikeRecord;
use super::user::UserSummary;

pub const MAX_COMMENT_LENGTH: usize = 500;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: i32,
    pub user_id: i32,
    pub post_id: i32,
    pub content: String,
    pub likes_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub user_id: i32,
    pub post_id: i32,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comment_likes)]
pub struct NewCommentLike {
    pub comment_id: i32,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i32,
    pub user: UserSummary,
    pub post: i32,
    pub content: String,
    pub likes: Vec<LikeRecord>,
    pub likes_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CommentView {
    pub fn new(comment: Comment, user: UserSummary, likes: Vec<LikeRecord>) -> Self {
        Self {
            id: comment.id,
            user,
            post: comment.post_id,
            content: comment.content,
            likes,
            likes_count: comment.likes_count,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}
